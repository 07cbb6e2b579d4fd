//! Configuration module for the chat-media-downloader.
//!
//! This module handles:
//! - Loading and checkpointing configuration as TOML
//! - Preserving keys the program does not know about
//! - Configuration validation

pub mod loader;
pub mod validation;

pub use loader::{
    ChatConfig, Config, FileFormats, MediaConfig, OptionsConfig, ProgressConfig, ALL_FORMATS,
};
pub use validation::validate_config;
