//! Pagination controller: drives a whole run.
//!
//! Previously failed messages are fetched first and seeded into the buffer,
//! then history is read after the saved watermark. Every full buffer is one
//! batch; the config is checkpointed once the batch has settled.

use std::collections::HashSet;
use std::path::PathBuf;

use futures::StreamExt;
use indicatif::ProgressBar;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::download::batch::run_batch;
use crate::download::item::ItemSettings;
use crate::download::state::RunResult;
use crate::error::Result;
use crate::media::{Message, MessageId};
use crate::source::MessageSource;

/// Run-wide knobs that are not part of the persisted config.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Where checkpoints are saved; `None` keeps progress in memory only.
    pub config_path: Option<PathBuf>,
    /// Shutdown request, honoured between batches.
    pub cancel: CancellationToken,
    pub progress: Option<ProgressBar>,
}

struct Controller<'a, S: ?Sized> {
    source: &'a S,
    options: &'a RunOptions,
    settings: ItemSettings,
    page_size: usize,
    concurrency: usize,
}

impl<S> Controller<'_, S>
where
    S: MessageSource + ?Sized,
{
    async fn dispatch(
        &self,
        buffer: &mut Vec<Message>,
        config: &mut Config,
        result: &mut RunResult,
    ) -> Result<()> {
        let batch = std::mem::replace(buffer, Vec::with_capacity(self.page_size));
        let report = run_batch(
            self.source,
            &self.settings,
            batch,
            self.concurrency,
            self.options.progress.as_ref(),
        )
        .await;

        result.absorb(&report);
        config.checkpoint(&report, self.options.config_path.as_deref())?;

        tracing::debug!(
            "Batch settled: {} ok, {} failed, watermark {}",
            report.succeeded().len(),
            report.failed().len(),
            config.progress.last_read_message_id
        );
        Ok(())
    }
}

/// Download all media of the configured chat not yet processed.
///
/// The config is updated in place: watermark after every batch, backlog
/// reconciled at the end. A source failure outside a single download aborts
/// the run with the last checkpoint as the resume point.
pub async fn run<S>(source: &S, config: &mut Config, options: &RunOptions) -> Result<RunResult>
where
    S: MessageSource + ?Sized,
{
    let page_size = config.options.page_size.max(1);
    let controller = Controller {
        source,
        options,
        settings: ItemSettings::from_config(config),
        page_size,
        concurrency: config.options.max_concurrent_downloads,
    };
    let chat = config.chat.chat_id.clone();

    let mut result = RunResult::new(config.progress.last_read_message_id);
    let mut seen: HashSet<MessageId> = HashSet::new();
    let mut buffer: Vec<Message> = Vec::with_capacity(page_size);

    let backlog: Vec<MessageId> = config.progress.ids_to_retry.iter().copied().collect();
    if !backlog.is_empty() {
        tracing::info!("Retrying {} previously failed message(s)", backlog.len());

        let found = source.get_messages(&chat, &backlog).await?;
        let found_ids: HashSet<MessageId> = found.iter().map(|m| m.id).collect();
        result.missing = backlog
            .iter()
            .copied()
            .filter(|id| !found_ids.contains(id))
            .collect();
        if !result.missing.is_empty() {
            tracing::warn!(
                "{} backlog message(s) no longer exist: {:?}",
                result.missing.len(),
                result.missing
            );
        }

        for message in found {
            if !seen.insert(message.id) {
                continue;
            }
            buffer.push(message);
            if buffer.len() >= page_size {
                controller.dispatch(&mut buffer, config, &mut result).await?;
            }
        }
    }

    if options.cancel.is_cancelled() {
        result.cancelled = true;
    } else {
        let start = config.progress.last_read_message_id;
        tracing::info!("Reading history of {} after message {}", chat, start);

        let mut history = source.history(&chat, start);
        while let Some(message) = history.next().await {
            let message = message?;
            if !seen.insert(message.id) {
                continue;
            }

            buffer.push(message);
            if buffer.len() >= page_size {
                controller.dispatch(&mut buffer, config, &mut result).await?;
                if options.cancel.is_cancelled() {
                    tracing::info!("Shutdown requested, stopping after this batch");
                    result.cancelled = true;
                    break;
                }
            }
        }
    }

    if !buffer.is_empty() && !result.cancelled {
        controller.dispatch(&mut buffer, config, &mut result).await?;
    }

    config.reconcile_backlog(&result);
    if let Some(path) = &options.config_path {
        config.save(path)?;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::media::{MediaKind, MediaRef};
    use crate::source::MemorySource;
    use std::collections::BTreeSet;
    use std::path::Path;

    fn config(dir: &Path, page_size: usize) -> Config {
        let mut config = Config::default();
        config.chat.chat_id = "chat".to_string();
        config.options.download_directory = Some(dir.to_path_buf());
        config.options.page_size = page_size;
        config.options.retry_delay_seconds = 0;
        config.options.show_downloads = false;
        config
    }

    fn photo(id: MessageId) -> Message {
        Message::with_media(id, MediaRef::new(MediaKind::Photo))
    }

    fn document(id: MessageId, name: &str) -> Message {
        Message::with_media(
            id,
            MediaRef::new(MediaKind::Document)
                .with_mime_type("application/pdf")
                .with_file_name(name),
        )
    }

    fn photos(ids: std::ops::RangeInclusive<MessageId>) -> MemorySource {
        ids.fold(MemorySource::new("chat"), |source, id| {
            source.with_message(photo(id), format!("photo {}", id).into_bytes())
        })
    }

    fn files_in(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_expired_reference_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let source = photos(1..=5);
        source.fail_with(3, SourceError::ExpiredReference("stale".into()), 2);

        let mut config = config(dir.path(), 5);
        let result = run(&source, &mut config, &RunOptions::default()).await.unwrap();

        assert_eq!(result.last_processed, 5);
        assert_eq!(config.progress.last_read_message_id, 5);
        assert!(result.failed.is_empty());
        assert_eq!(source.attempts(3), 3);
        assert_eq!(files_in(&dir.path().join("photo")), 5);
        assert_eq!(result.stats.batches, 1);
    }

    #[tokio::test]
    async fn test_backlog_failure_stays_in_backlog() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemorySource::new("chat").with_message(document(42, "x.pdf"), b"x".to_vec());
        source.fail_with(42, SourceError::Other("refused".into()), 1);

        let mut config = config(dir.path(), 10);
        config.progress.last_read_message_id = 50;
        config.progress.ids_to_retry = BTreeSet::from([42]);

        let result = run(&source, &mut config, &RunOptions::default()).await.unwrap();

        assert_eq!(result.failed, BTreeSet::from([42]));
        assert!(config.progress.ids_to_retry.contains(&42));
        assert_eq!(config.progress.last_read_message_id, 50);
        assert_eq!(source.attempts(42), 1);
    }

    #[tokio::test]
    async fn test_backlog_success_and_missing_are_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let source = photos(1..=3);

        let mut config = config(dir.path(), 10);
        config.progress.last_read_message_id = 1;
        config.progress.ids_to_retry = BTreeSet::from([2, 99]);

        let result = run(&source, &mut config, &RunOptions::default()).await.unwrap();

        assert_eq!(result.missing, BTreeSet::from([99]));
        assert_eq!(result.succeeded, BTreeSet::from([2, 3]));
        assert!(config.progress.ids_to_retry.is_empty());
        // Message 2 was both in the backlog and in history.
        assert_eq!(source.attempts(2), 1);
    }

    #[tokio::test]
    async fn test_retry_bound_per_item() {
        let dir = tempfile::tempdir().unwrap();
        let source = photos(1..=2);
        source.fail_with(1, SourceError::Timeout("slow".into()), 100);

        let mut config = config(dir.path(), 10);
        let result = run(&source, &mut config, &RunOptions::default()).await.unwrap();

        assert_eq!(source.attempts(1), 3);
        assert_eq!(result.failed, BTreeSet::from([1]));
        assert_eq!(config.progress.ids_to_retry, BTreeSet::from([1]));
        assert_eq!(config.progress.last_read_message_id, 2);
    }

    #[tokio::test]
    async fn test_checkpoint_survives_source_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let options = RunOptions {
            config_path: Some(config_path.clone()),
            ..Default::default()
        };

        let broken = photos(1..=7).fail_history_after(4);
        broken.fail_with(2, SourceError::Other("refused".into()), 1);
        let mut config = config(dir.path(), 3);
        assert!(run(&broken, &mut config, &options).await.is_err());

        let saved = Config::load(&config_path).unwrap();
        assert_eq!(saved.progress.last_read_message_id, 3);
        assert_eq!(saved.progress.ids_to_retry, BTreeSet::from([2]));

        let healthy = photos(1..=7);
        let mut config = saved;
        let result = run(&healthy, &mut config, &options).await.unwrap();

        assert_eq!(result.last_processed, 7);
        assert!(config.progress.ids_to_retry.is_empty());
        assert_eq!(healthy.attempts(1), 0);
        assert_eq!(healthy.attempts(2), 1);
        assert_eq!(files_in(&dir.path().join("photo")), 7);
    }

    #[tokio::test]
    async fn test_watermark_monotonic_across_batches() {
        let dir = tempfile::tempdir().unwrap();
        let source = photos(1..=7);

        let mut config = config(dir.path(), 3);
        config.progress.ids_to_retry = BTreeSet::from([1]);
        config.progress.last_read_message_id = 1;
        let result = run(&source, &mut config, &RunOptions::default()).await.unwrap();

        assert_eq!(result.stats.batches, 3);
        assert_eq!(result.last_processed, 7);
        assert_eq!(config.progress.last_read_message_id, 7);
    }

    #[tokio::test]
    async fn test_idempotent_resume() {
        let dir = tempfile::tempdir().unwrap();
        let source = photos(1..=4);

        let mut config = config(dir.path(), 2);
        run(&source, &mut config, &RunOptions::default()).await.unwrap();
        let first: BTreeSet<_> = std::fs::read_dir(dir.path().join("photo"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();

        // Lose the watermark, as if the process died before checkpointing.
        config.progress.last_read_message_id = 0;
        let result = run(&source, &mut config, &RunOptions::default()).await.unwrap();
        let second: BTreeSet<_> = std::fs::read_dir(dir.path().join("photo"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();

        assert_eq!(first, second);
        assert_eq!(result.stats.duplicate_count, 4);
        assert_eq!(result.stats.total_downloaded(), 0);
    }

    #[tokio::test]
    async fn test_same_name_identical_content_kept_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemorySource::new("chat")
            .with_message(document(1, "report.pdf"), b"same".to_vec())
            .with_message(document(2, "report.pdf"), b"same".to_vec())
            .with_message(document(3, "report.pdf"), b"different".to_vec());

        let mut config = config(dir.path(), 1);
        let result = run(&source, &mut config, &RunOptions::default()).await.unwrap();

        let documents = dir.path().join("document");
        assert_eq!(std::fs::read(documents.join("report.pdf")).unwrap(), b"same");
        assert_eq!(
            std::fs::read(documents.join("report-copy1.pdf")).unwrap(),
            b"different"
        );
        assert_eq!(files_in(&documents), 2);
        assert_eq!(result.stats.duplicate_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_batch_identical_content_kept_once() {
        for _ in 0..10 {
            let dir = tempfile::tempdir().unwrap();
            let source = MemorySource::new("chat")
                .with_message(document(1, "report.pdf"), b"same".to_vec())
                .with_message(document(2, "report.pdf"), b"same".to_vec());

            let mut config = config(dir.path(), 10);
            let result = run(&source, &mut config, &RunOptions::default()).await.unwrap();

            let documents = dir.path().join("document");
            assert_eq!(files_in(&documents), 1);
            assert_eq!(std::fs::read(documents.join("report.pdf")).unwrap(), b"same");
            assert_eq!(result.stats.duplicate_count, 1);
        }
    }

    #[tokio::test]
    async fn test_resume_replaces_empty_leftover() {
        let dir = tempfile::tempdir().unwrap();
        let documents = dir.path().join("document");
        std::fs::create_dir_all(&documents).unwrap();
        std::fs::write(documents.join("report.pdf"), b"").unwrap();

        let source =
            MemorySource::new("chat").with_message(document(1, "report.pdf"), b"content".to_vec());
        let mut config = config(dir.path(), 10);
        run(&source, &mut config, &RunOptions::default()).await.unwrap();

        assert_eq!(files_in(&documents), 1);
        assert_eq!(std::fs::read(documents.join("report.pdf")).unwrap(), b"content");
    }

    #[tokio::test]
    async fn test_cancelled_before_history() {
        let dir = tempfile::tempdir().unwrap();
        let source = photos(1..=5);
        let options = RunOptions::default();
        options.cancel.cancel();

        let mut config = config(dir.path(), 2);
        let result = run(&source, &mut config, &options).await.unwrap();

        assert!(result.cancelled);
        assert_eq!(result.processed(), 0);
        assert_eq!(config.progress.last_read_message_id, 0);
    }

    #[tokio::test]
    async fn test_skipped_kinds_still_advance() {
        let dir = tempfile::tempdir().unwrap();
        let source = photos(1..=3).with_message(Message::text(4), b"".to_vec());

        let mut config = config(dir.path(), 10);
        config.media.media_types = vec![MediaKind::Audio];
        let result = run(&source, &mut config, &RunOptions::default()).await.unwrap();

        assert_eq!(result.last_processed, 4);
        assert_eq!(result.stats.skipped_count, 3);
        assert_eq!(result.stats.no_media_count, 1);
        assert_eq!(files_in(&dir.path().join("photo")), 0);
    }
}
