//! Deduplication module.
//!
//! Provides:
//! - Content hashing (MD5)
//! - Temp-file downloads committed under a free name
//! - Post-download collapse of byte-identical files

pub mod hash;
pub mod resolver;

pub use hash::files_identical;
pub use resolver::{deduplicate, resolve, PathSlot, Placement};
