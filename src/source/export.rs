//! Message source backed by a chat export directory.
//!
//! The desktop client's JSON export writes a `result.json` next to the
//! exported files. Each message entry references its media by a path relative
//! to the export root.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Error, Result, SourceError};
use crate::media::{MediaKind, MediaRef, Message, MessageId};
use crate::source::{MessageSource, SourceResult};

/// File name of the export index.
pub const EXPORT_INDEX: &str = "result.json";

/// Prefix the client writes instead of a path when a file was left out.
const NOT_INCLUDED_PREFIX: &str = "(File not included";

#[derive(Debug, Deserialize)]
struct ExportFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    messages: Vec<ExportMessage>,
}

#[derive(Debug, Deserialize)]
struct ExportMessage {
    id: MessageId,
    #[serde(rename = "type", default)]
    entry_type: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    date_unixtime: Option<String>,
    #[serde(default)]
    photo: Option<String>,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

impl ExportMessage {
    fn parsed_date(&self) -> Option<DateTime<Utc>> {
        if let Some(ts) = self
            .date_unixtime
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
        {
            return Utc.timestamp_opt(ts, 0).single();
        }

        self.date
            .as_deref()
            .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok())
            .map(|naive| naive.and_utc())
    }

    /// The attached media and the export-relative path of its file.
    fn media(&self) -> Option<(MediaRef, String)> {
        if self.entry_type != "message" {
            return None;
        }

        if let Some(photo) = &self.photo {
            let mut media = MediaRef::new(MediaKind::Photo);
            if let Some(mime) = mime_guess::from_path(photo).first() {
                media = media.with_mime_type(mime.essence_str());
            }
            return Some((media, photo.clone()));
        }

        let file = self.file.as_ref()?;
        let kind = match self.media_type.as_deref() {
            None => MediaKind::Document,
            Some("audio_file") => MediaKind::Audio,
            Some("voice_message") => MediaKind::Voice,
            Some("video_message") => MediaKind::VideoNote,
            Some("video_file") => MediaKind::Video,
            Some(_) => return None,
        };

        let mut media = MediaRef::new(kind);

        let mime = self
            .mime_type
            .clone()
            .or_else(|| {
                mime_guess::from_path(file)
                    .first()
                    .map(|m| m.essence_str().to_string())
            });
        if let Some(mime) = mime {
            media = media.with_mime_type(mime);
        }

        if kind.has_natural_name() {
            let name = self.file_name.clone().or_else(|| {
                (!file.starts_with(NOT_INCLUDED_PREFIX))
                    .then(|| Path::new(file).file_name()?.to_str().map(str::to_string))
                    .flatten()
            });
            if let Some(name) = name {
                media = media.with_file_name(name);
            }
        }

        Some((media, file.clone()))
    }

    fn into_message(self) -> (Message, Option<String>) {
        let date = self.parsed_date();
        match self.media() {
            Some((media, file)) => {
                let mut message = Message::with_media(self.id, media);
                if let Some(date) = date {
                    message.date = Some(date);
                    if let Some(media) = message.media.as_mut() {
                        media.date = Some(date);
                    }
                }
                (message, Some(file))
            }
            None => {
                let mut message = Message::text(self.id);
                message.date = date;
                (message, None)
            }
        }
    }
}

/// A chat read from an export directory.
#[derive(Debug)]
pub struct ExportSource {
    root: PathBuf,
    chat_name: Option<String>,
    chat_id: Option<i64>,
    messages: BTreeMap<MessageId, Message>,
    files: HashMap<MessageId, String>,
}

impl ExportSource {
    /// Load the export index found in `root`.
    pub fn open(root: &Path) -> Result<Self> {
        let index = root.join(EXPORT_INDEX);
        if !index.is_file() {
            return Err(Error::Export(format!(
                "{} not found in {}",
                EXPORT_INDEX,
                root.display()
            )));
        }

        let content = std::fs::read_to_string(&index)?;
        let export: ExportFile = serde_json::from_str(&content)?;

        let mut messages = BTreeMap::new();
        let mut files = HashMap::new();
        for entry in export.messages {
            let (message, file) = entry.into_message();
            if let Some(file) = file {
                files.insert(message.id, file);
            }
            messages.insert(message.id, message);
        }

        tracing::debug!(
            "Loaded {} messages ({} with media) from {}",
            messages.len(),
            files.len(),
            index.display()
        );

        Ok(Self {
            root: root.to_path_buf(),
            chat_name: export.name,
            chat_id: export.id,
            messages,
            files,
        })
    }

    /// Title of the exported chat, if the export records one.
    pub fn chat_name(&self) -> Option<&str> {
        self.chat_name.as_deref()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Whether `chat` refers to the exported chat.
    ///
    /// Accepts the numeric id (with or without the `-100` channel prefix) or
    /// the chat title. Exports without either accept any reference.
    pub fn serves(&self, chat: &str) -> bool {
        if self.chat_id.is_none() && self.chat_name.is_none() {
            return true;
        }

        let chat = chat.trim_start_matches('@');
        let by_id = self.chat_id.is_some_and(|id| {
            chat == id.to_string() || chat == format!("-100{}", id) || chat == format!("-{}", id)
        });
        let by_name = self
            .chat_name
            .as_deref()
            .is_some_and(|name| name.eq_ignore_ascii_case(chat));
        by_id || by_name
    }

    fn check_chat(&self, chat: &str) -> SourceResult<()> {
        if self.serves(chat) {
            Ok(())
        } else {
            Err(SourceError::Other(format!(
                "chat '{}' is not in this export",
                chat
            )))
        }
    }

    fn exported_file(&self, id: MessageId) -> SourceResult<PathBuf> {
        let relative = self.files.get(&id).ok_or_else(|| {
            SourceError::Other(format!("message {} has no exported media", id))
        })?;

        if relative.starts_with(NOT_INCLUDED_PREFIX) {
            return Err(SourceError::Other(format!(
                "media of message {} was not included in the export",
                id
            )));
        }

        let relative = Path::new(relative);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(SourceError::Other(format!(
                "media path of message {} leaves the export directory",
                id
            )));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MessageSource for ExportSource {
    fn history<'a>(
        &'a self,
        chat: &'a str,
        after: MessageId,
    ) -> BoxStream<'a, SourceResult<Message>> {
        if let Err(e) = self.check_chat(chat) {
            return stream::once(async move { Err(e) }).boxed();
        }

        stream::iter(
            self.messages
                .range((Bound::Excluded(after), Bound::Unbounded))
                .map(|(_, message)| Ok(message.clone())),
        )
        .boxed()
    }

    async fn get_messages(&self, chat: &str, ids: &[MessageId]) -> SourceResult<Vec<Message>> {
        self.check_chat(chat)?;
        Ok(ids
            .iter()
            .filter_map(|id| self.messages.get(id).cloned())
            .collect())
    }

    async fn download_media(
        &self,
        message: &Message,
        destination: &Path,
    ) -> SourceResult<PathBuf> {
        let source = self.exported_file(message.id)?;

        let dir = destination.parent().unwrap_or(Path::new("."));
        let temp = dir.join(format!(".{}.part", Uuid::new_v4()));

        let copied = async {
            tokio::fs::copy(&source, &temp).await?;
            tokio::fs::rename(&temp, destination).await
        }
        .await;

        if let Err(e) = copied {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(SourceError::from(e));
        }

        Ok(destination.to_path_buf())
    }
}
