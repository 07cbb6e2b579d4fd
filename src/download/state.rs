//! Run state tracking.

use std::collections::{BTreeMap, BTreeSet};

use crate::download::batch::BatchReport;
use crate::download::item::{DownloadOutcome, ItemReport};
use crate::media::{MediaKind, MessageId};

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub downloaded: BTreeMap<MediaKind, u64>,
    pub duplicate_count: u64,
    pub skipped_count: u64,
    pub no_media_count: u64,
    pub failed_count: u64,
    pub batches: u64,
    pub attempts: u64,
}

impl RunStats {
    /// Count one settled item.
    pub fn record(&mut self, report: &ItemReport) {
        self.attempts += u64::from(report.attempts);
        match &report.outcome {
            DownloadOutcome::Downloaded(_) => {
                if let Some(kind) = report.kind {
                    *self.downloaded.entry(kind).or_default() += 1;
                }
            }
            DownloadOutcome::Duplicate(_) => self.duplicate_count += 1,
            DownloadOutcome::Skipped => self.skipped_count += 1,
            DownloadOutcome::NoMedia => self.no_media_count += 1,
            DownloadOutcome::Failed(_) => self.failed_count += 1,
        }
    }

    /// Get total downloaded count.
    pub fn total_downloaded(&self) -> u64 {
        self.downloaded.values().sum()
    }
}

/// Outcome of a whole run, used to reconcile the retry backlog.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    /// Watermark after the last settled batch.
    pub last_processed: MessageId,
    pub succeeded: BTreeSet<MessageId>,
    pub failed: BTreeSet<MessageId>,
    /// Backlog ids the source no longer returns.
    pub missing: BTreeSet<MessageId>,
    pub stats: RunStats,
    /// Whether the run stopped early on a shutdown request.
    pub cancelled: bool,
}

impl RunResult {
    pub fn new(start: MessageId) -> Self {
        Self {
            last_processed: start,
            ..Default::default()
        }
    }

    /// Merge a settled batch.
    pub fn absorb(&mut self, report: &BatchReport) {
        for item in &report.items {
            if item.outcome.is_success() {
                self.failed.remove(&item.message_id);
                self.succeeded.insert(item.message_id);
            } else {
                self.succeeded.remove(&item.message_id);
                self.failed.insert(item.message_id);
            }
            self.stats.record(item);
        }

        if let Some(watermark) = report.watermark {
            self.last_processed = self.last_processed.max(watermark);
        }
        self.stats.batches += 1;
    }

    pub fn processed(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}
