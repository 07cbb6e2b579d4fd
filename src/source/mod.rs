//! Message source module.
//!
//! This module provides:
//! - The `MessageSource` capability the download pipeline consumes
//! - An in-memory source with scripted failures
//! - A source backed by a desktop client's JSON chat export

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::SourceError;
use crate::media::{Message, MessageId};

pub mod export;
pub mod memory;

pub use export::ExportSource;
pub use memory::MemorySource;

/// Result type for message source calls.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Access to a chat's history and the media attached to its messages.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Messages with ids strictly greater than `after`, in ascending order.
    ///
    /// The stream is finite and can be restarted from any position.
    fn history<'a>(
        &'a self,
        chat: &'a str,
        after: MessageId,
    ) -> BoxStream<'a, SourceResult<Message>>;

    /// Fetch specific messages. Ids the source no longer knows are omitted.
    async fn get_messages(&self, chat: &str, ids: &[MessageId]) -> SourceResult<Vec<Message>>;

    /// Download the media attached to `message` into `destination`.
    ///
    /// Returns the path actually written.
    async fn download_media(&self, message: &Message, destination: &Path)
        -> SourceResult<PathBuf>;
}
