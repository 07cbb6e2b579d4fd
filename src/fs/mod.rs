//! Filesystem module.
//!
//! Provides:
//! - Path and directory management
//! - Filename generation and manipulation
//! - Relocation of finished downloads into an archive

pub mod archive;
pub mod naming;
pub mod paths;

pub use archive::{relocate, working_files, RelocationReport};
pub use naming::{copy_name, next_available_name, sanitize_filename};
pub use paths::{ensure_dir, get_archive_folder, media_dir};
