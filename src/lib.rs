//! Chat Media Downloader - resumable media downloads from chat history
//!
//! This library downloads the media attached to a chat's messages and keeps
//! enough state to resume after an interruption.
//!
//! # Features
//!
//! - Paginated history reading with a checkpoint after every batch
//! - Concurrent downloads within a batch
//! - Per-message retries: expired file references are re-fetched, timeouts wait
//! - A persisted backlog of failed messages, retried on the next run
//! - Media kind and format filtering
//! - Content-hash deduplication of same-named files
//! - Optional relocation of finished files into an archive
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use chat_media_downloader::{download, Config, ExportSource, RunOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config_path = Path::new("config.toml");
//!     let mut config = Config::load(config_path)?;
//!     let source = ExportSource::open(Path::new("export"))?;
//!
//!     let options = RunOptions {
//!         config_path: Some(config_path.to_path_buf()),
//!         ..Default::default()
//!     };
//!     let result = download::run(&source, &mut config, &options).await?;
//!     println!("{} failed", result.failed.len());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod dedup;
pub mod download;
pub mod error;
pub mod fs;
pub mod media;
pub mod output;
pub mod source;

// Re-exports for convenience
pub use config::Config;
pub use download::{run, DownloadOutcome, RunOptions, RunResult};
pub use error::{Error, Result, SourceError};
pub use media::{MediaKind, MediaRef, Message, MessageId};
pub use source::{ExportSource, MemorySource, MessageSource};
