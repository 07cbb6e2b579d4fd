//! Download module.
//!
//! This module provides:
//! - The retry policy table
//! - The per-message download state machine
//! - The concurrent batch dispatcher
//! - The pagination controller that checkpoints progress
//! - Run statistics and results

pub mod batch;
pub mod item;
pub mod pipeline;
pub mod retry;
pub mod state;

pub use batch::{run_batch, BatchReport};
pub use item::{download_item, DownloadOutcome, ItemReport, ItemSettings};
pub use pipeline::{run, RunOptions};
pub use retry::{RetryPolicy, MAX_ATTEMPTS};
pub use state::{RunResult, RunStats};
