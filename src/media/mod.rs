//! Media module: message representation and classification.

pub mod classifier;
pub mod item;

pub use classifier::{can_download, classify, media_format, Destination};
pub use item::{MediaKind, MediaRef, Message, MessageId};
