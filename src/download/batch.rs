//! Batch dispatcher: run the item state machine over a batch concurrently.

use std::collections::BTreeSet;

use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;

use crate::download::item::{download_item, ItemReport, ItemSettings};
use crate::media::{Message, MessageId};
use crate::source::MessageSource;

/// Settled result of one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Highest message id in the batch, whatever its outcome.
    pub watermark: Option<MessageId>,
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> BTreeSet<MessageId> {
        self.items
            .iter()
            .filter(|item| item.outcome.is_success())
            .map(|item| item.message_id)
            .collect()
    }

    pub fn failed(&self) -> BTreeSet<MessageId> {
        self.items
            .iter()
            .filter(|item| !item.outcome.is_success())
            .map(|item| item.message_id)
            .collect()
    }
}

/// Download every message of a batch and wait for all of them to settle.
///
/// `concurrency` caps in-flight items; 0 runs the whole batch at once.
pub async fn run_batch<S>(
    source: &S,
    settings: &ItemSettings,
    messages: Vec<Message>,
    concurrency: usize,
    progress: Option<&ProgressBar>,
) -> BatchReport
where
    S: MessageSource + ?Sized,
{
    let watermark = messages.iter().map(|m| m.id).max();
    let limit = match concurrency {
        0 => messages.len().max(1),
        n => n,
    };

    tracing::debug!(
        "Dispatching batch of {} messages (watermark {:?})",
        messages.len(),
        watermark
    );

    let items: Vec<ItemReport> = stream::iter(messages)
        .map(|message| download_item(source, settings, message))
        .buffer_unordered(limit)
        .inspect(|_| {
            if let Some(pb) = progress {
                pb.inc(1);
            }
        })
        .collect()
        .await;

    BatchReport { watermark, items }
}
