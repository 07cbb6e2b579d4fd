//! Configuration validation logic.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::loader::{Config, FileFormats};
use crate::error::{Error, Result};
use crate::media::MediaKind;

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_chat_id(&config.chat.chat_id)?;
    validate_media_types(&config.media.media_types)?;
    validate_file_formats(&config.media.media_types, &config.media.file_formats)?;
    validate_page_size(config.options.page_size)?;

    Ok(())
}

fn chat_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Public username (optionally @-prefixed) or a numeric chat id.
    PATTERN.get_or_init(|| {
        Regex::new(r"^(@?[A-Za-z][A-Za-z0-9_]{3,31}|-?\d+)$").expect("chat id pattern is valid")
    })
}

/// Validate the chat reference.
pub fn validate_chat_id(chat_id: &str) -> Result<()> {
    let chat_id = chat_id.trim();

    if chat_id.is_empty() {
        return Err(Error::MissingConfig("chat_id".to_string()));
    }

    let lower = chat_id.trim_start_matches('@').to_lowercase();
    if matches!(lower.as_str(), "replaceme" | "your_chat" | "your_channel" | "chat_id") {
        return Err(Error::ConfigValidation {
            field: "chat_id".to_string(),
            message: format!(
                "Chat '{}' appears to be a placeholder. Please provide a real chat username or id.",
                chat_id
            ),
        });
    }

    if !chat_id_pattern().is_match(chat_id) {
        return Err(Error::ConfigValidation {
            field: "chat_id".to_string(),
            message: format!(
                "Chat '{}' is neither a username (4-32 chars, letters, digits, underscores) nor a numeric id.",
                chat_id
            ),
        });
    }

    Ok(())
}

/// Validate the requested media types.
pub fn validate_media_types(media_types: &[MediaKind]) -> Result<()> {
    if media_types.is_empty() {
        return Err(Error::MissingConfig(
            "media_types (at least one media type required)".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for kind in media_types {
        if !seen.insert(kind) {
            return Err(Error::ConfigValidation {
                field: "media_types".to_string(),
                message: format!("Media type '{}' is listed more than once", kind),
            });
        }
    }

    Ok(())
}

/// Validate that every requested format-restricted kind has an allowlist.
pub fn validate_file_formats(media_types: &[MediaKind], file_formats: &FileFormats) -> Result<()> {
    for kind in media_types.iter().filter(|k| k.is_format_restricted()) {
        let formats = file_formats.get(kind.as_str()).ok_or_else(|| {
            Error::MissingConfig(format!(
                "file_formats.{} (list formats or use [\"all\"])",
                kind
            ))
        })?;

        if formats.is_empty() || formats.iter().any(|f| f.trim().is_empty()) {
            return Err(Error::ConfigValidation {
                field: format!("file_formats.{}", kind),
                message: "Format list must be non-empty and contain no blank entries".to_string(),
            });
        }
    }

    for key in file_formats.keys() {
        match key.parse::<MediaKind>() {
            Ok(kind) if kind.is_format_restricted() => {}
            Ok(_) => tracing::warn!(
                "file_formats.{} is ignored: only audio, document and video are format-filtered",
                key
            ),
            Err(_) => {
                return Err(Error::ConfigValidation {
                    field: "file_formats".to_string(),
                    message: format!("Unknown media type '{}'", key),
                })
            }
        }
    }

    Ok(())
}

/// Validate the batch size.
pub fn validate_page_size(page_size: usize) -> Result<()> {
    if page_size == 0 {
        return Err(Error::ConfigValidation {
            field: "page_size".to_string(),
            message: "Page size must be at least 1".to_string(),
        });
    }

    Ok(())
}
