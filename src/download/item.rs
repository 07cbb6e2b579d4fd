//! Per-message download state machine.
//!
//! Each message moves through `Start -> Classifying -> Downloading` and ends
//! in exactly one [`DownloadOutcome`]. Failed attempts are routed through the
//! [`RetryPolicy`] table: expired references are re-fetched, timeouts wait,
//! anything else fails at once.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, FileFormats};
use crate::dedup::{PathSlot, Placement};
use crate::download::retry::RetryPolicy;
use crate::error::SourceError;
use crate::media::{classify, Destination, MediaKind, Message, MessageId};
use crate::source::MessageSource;

/// Terminal result for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Media written to this path.
    Downloaded(PathBuf),
    /// Media was byte-identical to this existing file; the new copy was removed.
    Duplicate(PathBuf),
    /// The message carries no media.
    NoMedia,
    /// Media kind not requested, or its format is not allowed.
    Skipped,
    /// Gave up on the message; it goes to the retry backlog.
    Failed(SourceError),
}

impl DownloadOutcome {
    /// Everything except a permanent failure counts as processed.
    pub fn is_success(&self) -> bool {
        !matches!(self, DownloadOutcome::Failed(_))
    }
}

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub message_id: MessageId,
    pub kind: Option<MediaKind>,
    pub outcome: DownloadOutcome,
    /// Download attempts made (0 if nothing was downloaded).
    pub attempts: u32,
}

/// Settings the state machine needs, detached from the mutable config.
#[derive(Debug, Clone)]
pub struct ItemSettings {
    pub chat_id: String,
    pub media_types: Vec<MediaKind>,
    pub file_formats: FileFormats,
    pub download_dir: PathBuf,
    pub retry_delay: Duration,
    pub show_downloads: bool,
}

impl ItemSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chat_id: config.chat.chat_id.clone(),
            media_types: config.media.media_types.clone(),
            file_formats: config.media.file_formats.clone(),
            download_dir: config.download_directory(),
            retry_delay: config.retry_delay(),
            show_downloads: config.options.show_downloads,
        }
    }
}

enum State {
    Start,
    Classifying,
    Downloading(Destination),
    AttemptFailed(Destination, SourceError),
    Done(DownloadOutcome),
}

/// Drive one message to a terminal outcome.
pub async fn download_item<S>(source: &S, settings: &ItemSettings, message: Message) -> ItemReport
where
    S: MessageSource + ?Sized,
{
    let message_id = message.id;
    let mut message = message;
    let mut kind = None;
    let mut attempts = 0u32;
    let mut state = State::Start;

    let outcome = loop {
        state = match state {
            State::Start => match &message.media {
                None => State::Done(DownloadOutcome::NoMedia),
                Some(_) => State::Classifying,
            },

            State::Classifying => {
                match classify(
                    &message,
                    &settings.media_types,
                    &settings.file_formats,
                    &settings.download_dir,
                ) {
                    Some(destination) => {
                        kind = Some(destination.kind);
                        State::Downloading(destination)
                    }
                    None => {
                        tracing::debug!("Message[{}]: skipped", message_id);
                        State::Done(DownloadOutcome::Skipped)
                    }
                }
            }

            State::Downloading(destination) => {
                attempts += 1;
                match attempt_download(source, &message, &destination).await {
                    Ok(outcome) => State::Done(outcome),
                    Err(error) => State::AttemptFailed(destination, error),
                }
            }

            State::AttemptFailed(destination, error) => {
                let policy = RetryPolicy::for_kind(error.kind(), settings.retry_delay);
                if !policy.allows_retry(attempts) {
                    tracing::error!(
                        "Message[{}]: giving up after {} attempt(s): {}",
                        message_id,
                        attempts,
                        error
                    );
                    State::Done(DownloadOutcome::Failed(error))
                } else {
                    tracing::warn!(
                        "Message[{}]: attempt {}/{} failed: {}",
                        message_id,
                        attempts,
                        policy.max_attempts,
                        error
                    );

                    let mut next = State::Downloading(destination);
                    if policy.refetch {
                        match refetch(source, &settings.chat_id, message_id).await {
                            Ok(fresh) => message = fresh,
                            Err(e) => {
                                tracing::error!(
                                    "Message[{}]: could not refresh file reference: {}",
                                    message_id,
                                    e
                                );
                                next = State::Done(DownloadOutcome::Failed(e));
                            }
                        }
                    }
                    if let (Some(delay), State::Downloading(_)) = (policy.delay, &next) {
                        tokio::time::sleep(delay).await;
                    }
                    next
                }
            }

            State::Done(outcome) => break outcome,
        };
    };

    if settings.show_downloads {
        match &outcome {
            DownloadOutcome::Downloaded(path) => {
                tracing::info!("Downloaded: {}", path.display())
            }
            DownloadOutcome::Duplicate(path) => {
                tracing::info!("Already downloaded: {}", path.display())
            }
            _ => {}
        }
    }

    ItemReport {
        message_id,
        kind,
        outcome,
        attempts,
    }
}

/// One download attempt into a temp file, committed to the destination.
async fn attempt_download<S>(
    source: &S,
    message: &Message,
    destination: &Destination,
) -> Result<DownloadOutcome, SourceError>
where
    S: MessageSource + ?Sized,
{
    let slot = PathSlot::acquire(&destination.path)
        .await
        .map_err(|e| SourceError::Other(e.to_string()))?;

    let written = source.download_media(message, slot.path()).await?;
    if written != slot.path() {
        return Ok(DownloadOutcome::Downloaded(written));
    }

    match slot
        .commit()
        .await
        .map_err(|e| SourceError::Other(e.to_string()))?
    {
        Placement::Stored(path) => Ok(DownloadOutcome::Downloaded(path)),
        Placement::Duplicate(path) => Ok(DownloadOutcome::Duplicate(path)),
    }
}

async fn refetch<S>(source: &S, chat: &str, id: MessageId) -> Result<Message, SourceError>
where
    S: MessageSource + ?Sized,
{
    source
        .get_messages(chat, &[id])
        .await?
        .into_iter()
        .find(|m| m.id == id)
        .ok_or_else(|| SourceError::Other(format!("message {} no longer exists", id)))
}
