//! Path and directory management.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Result;
use crate::fs::naming::sanitize_path_component;
use crate::media::MediaKind;

/// Working directory for one media kind: `<download_dir>/<kind>`.
pub fn media_dir(download_dir: &Path, kind: MediaKind) -> PathBuf {
    download_dir.join(kind.as_str())
}

/// Long-term storage folder for a chat, if an archive directory is configured.
///
/// Returns an error if the chat reference cannot be used as a folder name.
pub fn get_archive_folder(config: &Config) -> Result<Option<PathBuf>> {
    let Some(root) = config.options.archive_directory.as_ref() else {
        return Ok(None);
    };

    let chat_folder = sanitize_path_component(config.chat.chat_id.trim_start_matches('@'))?;
    Ok(Some(root.join(chat_folder)))
}

/// Ensure a directory exists, creating it if necessary.
pub async fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        tokio::fs::create_dir_all(path).await?;
    }
    Ok(())
}
