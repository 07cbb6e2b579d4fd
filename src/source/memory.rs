//! In-memory message source.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::SourceError;
use crate::media::{Message, MessageId};
use crate::source::{MessageSource, SourceResult};

/// A chat held entirely in memory.
///
/// Download failures can be scripted per message, which makes it the
/// reference source for exercising the retry and resume logic.
#[derive(Debug, Default)]
pub struct MemorySource {
    chat_id: String,
    messages: BTreeMap<MessageId, Message>,
    payloads: HashMap<MessageId, Vec<u8>>,
    history_fails_after: Option<MessageId>,
    failures: Mutex<HashMap<MessageId, VecDeque<SourceError>>>,
    attempts: Mutex<HashMap<MessageId, u32>>,
    lookups: Mutex<HashMap<MessageId, u32>>,
}

impl MemorySource {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            ..Default::default()
        }
    }

    /// Add a message; `payload` is what a download of its media writes.
    pub fn with_message(mut self, message: Message, payload: impl Into<Vec<u8>>) -> Self {
        self.insert(message, payload);
        self
    }

    pub fn insert(&mut self, message: Message, payload: impl Into<Vec<u8>>) {
        self.payloads.insert(message.id, payload.into());
        self.messages.insert(message.id, message);
    }

    /// Make the next `times` downloads of message `id` fail with `error`.
    pub fn fail_with(&self, id: MessageId, error: SourceError, times: usize) {
        let mut failures = lock(&self.failures);
        let queue = failures.entry(id).or_default();
        queue.extend(std::iter::repeat(error).take(times));
    }

    /// Make the history stream fail once it passes message `id`.
    pub fn fail_history_after(mut self, id: MessageId) -> Self {
        self.history_fails_after = Some(id);
        self
    }

    /// Number of download attempts made for message `id`.
    pub fn attempts(&self, id: MessageId) -> u32 {
        lock(&self.attempts).get(&id).copied().unwrap_or(0)
    }

    /// Number of times message `id` was fetched by id.
    pub fn lookups(&self, id: MessageId) -> u32 {
        lock(&self.lookups).get(&id).copied().unwrap_or(0)
    }

    fn check_chat(&self, chat: &str) -> SourceResult<()> {
        if chat == self.chat_id {
            Ok(())
        } else {
            Err(SourceError::Other(format!("unknown chat '{}'", chat)))
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl MessageSource for MemorySource {
    fn history<'a>(
        &'a self,
        chat: &'a str,
        after: MessageId,
    ) -> BoxStream<'a, SourceResult<Message>> {
        if let Err(e) = self.check_chat(chat) {
            return stream::once(async move { Err(e) }).boxed();
        }

        let fails_after = self.history_fails_after;
        let messages = self
            .messages
            .range((Bound::Excluded(after), Bound::Unbounded))
            .map(|(_, message)| message.clone());

        match fails_after {
            Some(limit) => {
                let (ok, rest): (Vec<_>, Vec<_>) = messages.partition(|m| m.id <= limit);
                let tail = (!rest.is_empty()).then(|| {
                    Err(SourceError::Other(format!(
                        "history unavailable after message {}",
                        limit
                    )))
                });
                stream::iter(ok.into_iter().map(Ok).chain(tail)).boxed()
            }
            None => stream::iter(messages.map(Ok)).boxed(),
        }
    }

    async fn get_messages(&self, chat: &str, ids: &[MessageId]) -> SourceResult<Vec<Message>> {
        self.check_chat(chat)?;

        let mut lookups = lock(&self.lookups);
        Ok(ids
            .iter()
            .filter_map(|id| {
                *lookups.entry(*id).or_default() += 1;
                self.messages.get(id).cloned()
            })
            .collect())
    }

    async fn download_media(
        &self,
        message: &Message,
        destination: &Path,
    ) -> SourceResult<PathBuf> {
        *lock(&self.attempts).entry(message.id).or_default() += 1;

        let scripted = lock(&self.failures)
            .get_mut(&message.id)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }

        let payload = self.payloads.get(&message.id).ok_or_else(|| {
            SourceError::Other(format!("message {} has no downloadable media", message.id))
        })?;

        tokio::fs::write(destination, payload).await?;
        Ok(destination.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaKind, MediaRef};

    fn source() -> MemorySource {
        MemorySource::new("chat")
            .with_message(Message::text(1), b"".to_vec())
            .with_message(Message::with_media(2, MediaRef::new(MediaKind::Photo)), b"p2".to_vec())
            .with_message(Message::text(3), b"".to_vec())
    }

    #[tokio::test]
    async fn test_history_is_ascending_after_position() {
        let source = source();
        let ids: Vec<MessageId> = source
            .history("chat", 1)
            .map(|m| m.unwrap().id)
            .collect()
            .await;
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_history_unknown_chat() {
        let source = source();
        let items: Vec<_> = source.history("other", 0).collect().await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    #[tokio::test]
    async fn test_history_failure_after_limit() {
        let source = source().fail_history_after(2);
        let items: Vec<_> = source.history("chat", 0).collect().await;
        assert_eq!(items.len(), 3);
        assert!(items[1].is_ok());
        assert!(items[2].is_err());
    }

    #[tokio::test]
    async fn test_get_messages_omits_unknown_ids() {
        let source = source();
        let found = source.get_messages("chat", &[3, 99]).await.unwrap();
        assert_eq!(found, vec![Message::text(3)]);
        assert_eq!(source.lookups(99), 1);
    }

    #[tokio::test]
    async fn test_scripted_failures_then_success() {
        let dir = tempfile::tempdir().unwrap();
        let source = source();
        source.fail_with(2, SourceError::Timeout("slow".into()), 1);

        let message = Message::with_media(2, MediaRef::new(MediaKind::Photo));
        let target = dir.path().join("p.jpg");

        let first = source.download_media(&message, &target).await;
        assert_eq!(first, Err(SourceError::Timeout("slow".into())));

        let second = source.download_media(&message, &target).await.unwrap();
        assert_eq!(second, target);
        assert_eq!(std::fs::read(&target).unwrap(), b"p2");
        assert_eq!(source.attempts(2), 2);
    }
}
