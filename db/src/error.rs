//! Error types for dictionary database operations.
//!
//! Covers every way loading can fail: I/O, JSON and YAML parsing, unknown
//! file formats, and an exhausted fallback chain.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading dictionaries or configuration.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// File extension is not `.json`, `.yaml` or `.yml`.
    #[error("unsupported dictionary format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// A dictionary failed to load, with the file it came from.
    #[error("{}: {source}", .path.display())]
    InFile {
        /// The offending file.
        path: PathBuf,
        /// What went wrong.
        #[source]
        source: Box<DatabaseError>,
    },

    /// All configured loader sources failed.
    #[error("no dictionary sources available")]
    NoSourcesAvailable,
}

/// Convenience alias for results with [`DatabaseError`].
pub type Result<T> = std::result::Result<T, DatabaseError>;
