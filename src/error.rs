//! Error types for the chat-media-downloader application.

use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    // Message source errors
    #[error("Message source error: {0}")]
    Source(#[from] SourceError),

    #[error("Invalid chat export: {0}")]
    Export(String),

    // File system errors
    #[error("Invalid filename (path traversal attempt): {0}")]
    InvalidFilename(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Process exit code reported for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_)
            | Error::ConfigValidation { .. }
            | Error::MissingConfig(_)
            | Error::TomlParse(_) => exit_codes::CONFIG_ERROR,
            Error::Source(_) | Error::Export(_) => exit_codes::SOURCE_ERROR,
            Error::Io(_) | Error::InvalidFilename(_) => exit_codes::DOWNLOAD_ERROR,
            Error::Json(_) => exit_codes::UNEXPECTED_ERROR,
        }
    }
}

/// Failure reported by a message source.
///
/// Item-level download failures are classified by [`SourceError::kind`] and
/// handled by the per-item retry policy; they only become an [`Error`] when a
/// batch-level call (history or backlog fetch) fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("file reference expired: {0}")]
    ExpiredReference(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification of a [`SourceError`], used to pick a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ExpiredReference,
    Timeout,
    Other,
}

impl SourceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::ExpiredReference(_) => ErrorKind::ExpiredReference,
            SourceError::Timeout(_) => ErrorKind::Timeout,
            SourceError::Other(_) => ErrorKind::Other,
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => SourceError::Timeout(err.to_string()),
            _ => SourceError::Other(err.to_string()),
        }
    }
}

/// Process exit codes.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const ABORT: i32 = 1;
    pub const SOURCE_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const DOWNLOAD_ERROR: i32 = 4;
    pub const UNEXPECTED_ERROR: i32 = 5;
    pub const SOME_ITEMS_FAILED: i32 = 6;
}
