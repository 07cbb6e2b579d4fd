//! Configuration structures and loading logic.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::download::{BatchReport, RunResult};
use crate::error::{Error, Result};
use crate::media::{MediaKind, MessageId};

/// Allowlist entry that admits every format of a media kind.
pub const ALL_FORMATS: &str = "all";

/// Allowed formats per media kind, keyed by [`MediaKind::as_str`].
pub type FileFormats = BTreeMap<String, Vec<String>>;

/// Main configuration structure.
///
/// Loaded once per run, checkpointed after every batch. Keys this struct does
/// not know about are kept in `extra` so a save never drops them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub options: OptionsConfig,

    #[serde(default)]
    pub progress: ProgressConfig,

    #[serde(flatten)]
    pub extra: toml::Table,
}

/// Chat targeting configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Chat username or numeric id to read history from.
    #[serde(default)]
    pub chat_id: String,

    /// Chat export directory (containing result.json) for this chat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_directory: Option<PathBuf>,

    #[serde(flatten)]
    pub extra: toml::Table,
}

/// Which media to download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Requested media kinds, in priority order.
    #[serde(default = "default_media_types")]
    pub media_types: Vec<MediaKind>,

    /// Allowed formats for audio, document and video.
    #[serde(default = "default_file_formats")]
    pub file_formats: FileFormats,

    #[serde(flatten)]
    pub extra: toml::Table,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            media_types: default_media_types(),
            file_formats: default_file_formats(),
            extra: toml::Table::new(),
        }
    }
}

/// Download options configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsConfig {
    /// Base directory for per-kind working folders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_directory: Option<PathBuf>,

    /// Long-term storage root; files are moved there after a run when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_directory: Option<PathBuf>,

    /// Number of messages processed concurrently as one checkpoint unit.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Seconds to wait before retrying a timed out download.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,

    /// Cap on concurrent downloads within a batch (0 = the whole batch).
    #[serde(default)]
    pub max_concurrent_downloads: usize,

    /// Whether to show download progress.
    #[serde(default = "default_true")]
    pub show_downloads: bool,

    #[serde(flatten)]
    pub extra: toml::Table,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            download_directory: None,
            archive_directory: None,
            page_size: default_page_size(),
            retry_delay_seconds: default_retry_delay(),
            max_concurrent_downloads: 0,
            show_downloads: true,
            extra: toml::Table::new(),
        }
    }
}

/// Resumption state, rewritten at every checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Highest message id confirmed processed.
    #[serde(default)]
    pub last_read_message_id: MessageId,

    /// Messages whose download failed permanently in an earlier run.
    #[serde(default)]
    pub ids_to_retry: BTreeSet<MessageId>,

    #[serde(flatten)]
    pub extra: toml::Table,
}

fn default_media_types() -> Vec<MediaKind> {
    MediaKind::ALL.to_vec()
}

fn default_file_formats() -> FileFormats {
    [MediaKind::Audio, MediaKind::Document, MediaKind::Video]
        .into_iter()
        .map(|kind| (kind.as_str().to_string(), vec![ALL_FORMATS.to_string()]))
        .collect()
}

fn default_page_size() -> usize {
    100
}

fn default_retry_delay() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!(
                    "Configuration file not found: {}. Create one from config.example.toml",
                    path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    ///
    /// Writes a sibling temp file and renames it over `path`, so an interrupted
    /// save leaves the previous checkpoint intact.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Get the effective download directory.
    pub fn download_directory(&self) -> PathBuf {
        self.options
            .download_directory
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Delay applied before retrying a timed out download.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.options.retry_delay_seconds)
    }

    /// Record a new watermark and save to file if path provided.
    ///
    /// The watermark never moves backwards.
    pub fn update_progress(&mut self, position: MessageId, path: Option<&Path>) -> Result<()> {
        self.progress.last_read_message_id = self.progress.last_read_message_id.max(position);

        if let Some(path) = path {
            self.save(path)?;
            tracing::debug!(
                "Checkpoint saved: last_read_message_id = {}",
                self.progress.last_read_message_id
            );
        }

        Ok(())
    }

    /// Checkpoint a settled batch: fold its outcomes into the backlog, advance
    /// the watermark and save if a path is given.
    ///
    /// Once saved, every failed id of the batch is in the persisted backlog.
    pub fn checkpoint(&mut self, report: &BatchReport, path: Option<&Path>) -> Result<()> {
        let backlog = &mut self.progress.ids_to_retry;
        for id in report.succeeded() {
            backlog.remove(&id);
        }
        backlog.extend(report.failed());

        match report.watermark {
            Some(watermark) => self.update_progress(watermark, path),
            None => Ok(()),
        }
    }

    /// Fold a finished run into the retry backlog.
    ///
    /// `backlog = (backlog - succeeded - missing) ∪ failed`
    pub fn reconcile_backlog(&mut self, result: &RunResult) {
        let backlog = &mut self.progress.ids_to_retry;
        backlog.retain(|id| !result.succeeded.contains(id) && !result.missing.contains(id));
        backlog.extend(result.failed.iter().copied());
        self.progress.last_read_message_id =
            self.progress.last_read_message_id.max(result.last_processed);
    }
}
