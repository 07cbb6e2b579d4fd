//! Media classification: does a message carry wanted media, and where does it go.

use std::path::{Path, PathBuf};

use crate::config::{FileFormats, ALL_FORMATS};
use crate::fs::naming::sanitize_filename;
use crate::fs::paths::media_dir;
use crate::media::item::{MediaKind, MediaRef, Message, MessageId};

/// Timestamp layout used in generated file names (filesystem safe).
const FILENAME_TIMESTAMP: &str = "%Y-%m-%dT%H-%M-%S";

/// Where a classified message should be downloaded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub path: PathBuf,
    pub kind: MediaKind,
    /// Format token the gate was evaluated with (MIME subtype).
    pub format: Option<String>,
}

/// Decide whether a message should be downloaded and derive its destination.
///
/// Requested kinds are tried in order. Returns `None` when the message has
/// no media, its kind was not requested, or the format gate rejects it.
pub fn classify(
    message: &Message,
    media_types: &[MediaKind],
    file_formats: &FileFormats,
    download_dir: &Path,
) -> Option<Destination> {
    for &kind in media_types {
        let Some(media) = message.media_of(kind) else {
            continue;
        };

        let format = media_format(media);
        if !can_download(kind, file_formats, format.as_deref()) {
            tracing::debug!(
                "Message[{}]: {} format {:?} not in allowlist",
                message.id,
                kind,
                format
            );
            return None;
        }

        let file_name = destination_file_name(message, media, format.as_deref());
        return Some(Destination {
            path: media_dir(download_dir, kind).join(file_name),
            kind,
            format,
        });
    }

    None
}

/// Format token for a media object; photos are never format-filtered.
pub fn media_format(media: &MediaRef) -> Option<String> {
    match media.kind {
        MediaKind::Photo => None,
        _ => media.mime_subtype().map(str::to_lowercase),
    }
}

/// Check if the given format can be downloaded for a media kind.
///
/// A restricted kind without an allowlist entry is treated as allowing all
/// formats.
pub fn can_download(kind: MediaKind, file_formats: &FileFormats, format: Option<&str>) -> bool {
    if !kind.is_format_restricted() {
        return true;
    }

    let Some(allowed) = file_formats.get(kind.as_str()) else {
        return true;
    };

    if allowed.iter().any(|f| f.eq_ignore_ascii_case(ALL_FORMATS)) {
        return true;
    }

    match format {
        Some(format) => allowed.iter().any(|f| f.eq_ignore_ascii_case(format)),
        None => false,
    }
}

/// Derive the canonical file name for a message's media.
fn destination_file_name(message: &Message, media: &MediaRef, format: Option<&str>) -> String {
    let extension = file_extension(media, format);

    if !media.kind.has_natural_name() {
        let stamp = media
            .date
            .or(message.date)
            .map(|date| date.format(FILENAME_TIMESTAMP).to_string())
            .unwrap_or_else(|| message.id.to_string());
        return format!("{}_{}.{}", media.kind, stamp, extension);
    }

    match media.file_name.as_deref().map(sanitize_filename) {
        Some(Ok(name)) => name,
        Some(Err(e)) => {
            tracing::warn!(
                "Message[{}]: unusable file name, falling back to generated one: {}",
                message.id,
                e
            );
            generated_name(message.id, media.kind, &extension)
        }
        None => generated_name(message.id, media.kind, &extension),
    }
}

fn generated_name(id: MessageId, kind: MediaKind, extension: &str) -> String {
    format!("{}_{}.{}", kind, id, extension)
}

/// Pick a file extension from the MIME type, falling back to the format token.
fn file_extension(media: &MediaRef, format: Option<&str>) -> String {
    if let Some(ext) = media.mime_type.as_deref().and_then(mime_to_extension) {
        return ext.to_string();
    }

    if let Some(format) = format.filter(|f| f.chars().all(|c| c.is_ascii_alphanumeric())) {
        return format.to_string();
    }

    match media.kind {
        MediaKind::Photo => "jpg",
        MediaKind::Voice => "ogg",
        MediaKind::VideoNote => "mp4",
        _ => "bin",
    }
    .to_string()
}

/// Convert MIME type to file extension.
fn mime_to_extension(mimetype: &str) -> Option<&'static str> {
    let ext = match mimetype.split(';').next().unwrap_or(mimetype).trim() {
        // Images
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",

        // Videos
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "video/x-matroska" => "mkv",

        // Audio
        "audio/mpeg" => "mp3",
        "audio/mp4" => "m4a",
        "audio/ogg" => "ogg",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/flac" | "audio/x-flac" => "flac",

        // Documents
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "application/epub+zip" => "epub",

        _ => return None,
    };
    Some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn formats(entries: &[(&str, &[&str])]) -> FileFormats {
        entries
            .iter()
            .map(|(kind, list)| {
                (
                    kind.to_string(),
                    list.iter().map(|f| f.to_string()).collect(),
                )
            })
            .collect()
    }

    fn dl() -> &'static Path {
        Path::new("/dl")
    }

    #[test]
    fn test_no_media() {
        let msg = Message::text(1);
        assert_eq!(classify(&msg, &MediaKind::ALL, &FileFormats::new(), dl()), None);
    }

    #[test]
    fn test_kind_not_requested() {
        let msg = Message::with_media(1, MediaRef::new(MediaKind::Photo));
        assert_eq!(
            classify(&msg, &[MediaKind::Audio], &FileFormats::new(), dl()),
            None
        );
    }

    #[test]
    fn test_document_uses_suggested_name() {
        let msg = Message::with_media(
            5,
            MediaRef::new(MediaKind::Document)
                .with_mime_type("application/pdf")
                .with_file_name("report.pdf"),
        );
        let dest = classify(
            &msg,
            &[MediaKind::Document],
            &formats(&[("document", &["pdf"])]),
            dl(),
        )
        .unwrap();

        assert_eq!(dest.path, PathBuf::from("/dl/document/report.pdf"));
        assert_eq!(dest.kind, MediaKind::Document);
        assert_eq!(dest.format.as_deref(), Some("pdf"));
    }

    #[test]
    fn test_format_gate_rejects_unlisted_format() {
        let msg = Message::with_media(
            5,
            MediaRef::new(MediaKind::Video)
                .with_mime_type("video/webm")
                .with_file_name("clip.webm"),
        );
        let allow = formats(&[("video", &["mp4"])]);
        assert_eq!(classify(&msg, &[MediaKind::Video], &allow, dl()), None);

        let allow_all = formats(&[("video", &["all"])]);
        assert!(classify(&msg, &[MediaKind::Video], &allow_all, dl()).is_some());
    }

    #[test]
    fn test_format_gate_never_filters_unrestricted_kinds() {
        let nothing_allowed = formats(&[
            ("audio", &["flac"]),
            ("document", &["flac"]),
            ("video", &["flac"]),
        ]);

        for kind in [MediaKind::Photo, MediaKind::Voice, MediaKind::VideoNote] {
            let msg = Message::with_media(9, MediaRef::new(kind).with_mime_type("video/mp4"));
            assert!(
                classify(&msg, &[kind], &nothing_allowed, dl()).is_some(),
                "{} must not be format filtered",
                kind
            );
        }
    }

    #[test]
    fn test_can_download() {
        let allow = formats(&[("audio", &["mp3", "OGG"])]);
        assert!(can_download(MediaKind::Audio, &allow, Some("ogg")));
        assert!(!can_download(MediaKind::Audio, &allow, Some("wav")));
        assert!(!can_download(MediaKind::Audio, &allow, None));
        // Missing allowlist entry admits everything.
        assert!(can_download(MediaKind::Document, &allow, Some("pdf")));
        assert!(can_download(MediaKind::Photo, &allow, None));
    }

    #[test]
    fn test_voice_name_encodes_kind_timestamp_and_format() {
        let date = Utc.with_ymd_and_hms(2023, 4, 5, 6, 7, 8).unwrap();
        let msg = Message::with_media(
            3,
            MediaRef::new(MediaKind::Voice)
                .with_mime_type("audio/ogg")
                .with_date(date),
        );
        let dest = classify(&msg, &[MediaKind::Voice], &FileFormats::new(), dl()).unwrap();
        assert_eq!(
            dest.path,
            PathBuf::from("/dl/voice/voice_2023-04-05T06-07-08.ogg")
        );
    }

    #[test]
    fn test_video_note_without_date_uses_id() {
        let msg = Message::with_media(
            77,
            MediaRef::new(MediaKind::VideoNote).with_mime_type("video/mp4"),
        );
        let dest = classify(&msg, &[MediaKind::VideoNote], &FileFormats::new(), dl()).unwrap();
        assert_eq!(dest.path, PathBuf::from("/dl/video_note/video_note_77.mp4"));
    }

    #[test]
    fn test_photo_without_name_gets_generated_name() {
        let msg = Message::with_media(12, MediaRef::new(MediaKind::Photo));
        let dest = classify(&msg, &[MediaKind::Photo], &FileFormats::new(), dl()).unwrap();
        assert_eq!(dest.path, PathBuf::from("/dl/photo/photo_12.jpg"));
        assert_eq!(dest.format, None);
    }

    #[test]
    fn test_unsafe_suggested_name_is_replaced() {
        let msg = Message::with_media(
            4,
            MediaRef::new(MediaKind::Audio)
                .with_mime_type("audio/mpeg")
                .with_file_name("../../etc/passwd"),
        );
        let dest = classify(&msg, &[MediaKind::Audio], &FileFormats::new(), dl()).unwrap();
        assert_eq!(dest.path, PathBuf::from("/dl/audio/audio_4.mp3"));
    }

    #[test]
    fn test_mime_to_extension() {
        assert_eq!(mime_to_extension("image/jpeg"), Some("jpg"));
        assert_eq!(mime_to_extension("audio/ogg; codecs=opus"), Some("ogg"));
        assert_eq!(mime_to_extension("unknown/type"), None);
    }
}
