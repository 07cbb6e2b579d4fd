//! Message and attached media representation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source-assigned message identifier, monotonically increasing within a chat.
pub type MessageId = i64;

/// Kind of media a message can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Document,
    Photo,
    Video,
    Voice,
    VideoNote,
}

impl MediaKind {
    pub const ALL: [MediaKind; 6] = [
        MediaKind::Audio,
        MediaKind::Document,
        MediaKind::Photo,
        MediaKind::Video,
        MediaKind::Voice,
        MediaKind::VideoNote,
    ];

    /// Configuration key and working directory name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Voice => "voice",
            MediaKind::VideoNote => "video_note",
        }
    }

    /// Whether downloads of this kind are gated by a format allowlist.
    pub fn is_format_restricted(&self) -> bool {
        matches!(
            self,
            MediaKind::Audio | MediaKind::Document | MediaKind::Video
        )
    }

    /// Voice and video notes have no natural file name.
    pub fn has_natural_name(&self) -> bool {
        !matches!(self, MediaKind::Voice | MediaKind::VideoNote)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        MediaKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lower)
            .ok_or_else(|| format!("Unknown media type: {}", s))
    }
}

/// Media object attached to a message.
///
/// Not downloadable on its own: the source downloads the owning [`Message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl MediaRef {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            mime_type: None,
            file_name: None,
            date: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// MIME subtype, e.g. `ogg` for `audio/ogg`.
    pub fn mime_subtype(&self) -> Option<&str> {
        self.mime_type
            .as_deref()
            .and_then(|mime| mime.rsplit('/').next())
            .map(|subtype| subtype.split(';').next().unwrap_or(subtype).trim())
            .filter(|subtype| !subtype.is_empty())
    }
}

/// A message fetched from the chat history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub date: Option<DateTime<Utc>>,
    pub media: Option<MediaRef>,
}

impl Message {
    /// A message without attached media.
    pub fn text(id: MessageId) -> Self {
        Self {
            id,
            date: None,
            media: None,
        }
    }

    pub fn with_media(id: MessageId, media: MediaRef) -> Self {
        Self {
            id,
            date: media.date,
            media: Some(media),
        }
    }

    /// The attached media if it is of the given kind.
    pub fn media_of(&self, kind: MediaKind) -> Option<&MediaRef> {
        self.media.as_ref().filter(|media| media.kind == kind)
    }
}
