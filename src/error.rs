//! Error types for `soup_orderlog`.

use std::path::PathBuf;

/// Errors that can occur in the OrderLog core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON parsing error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error occurred.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A `SQLite` database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A versioned document was written by a different format version.
    #[error("Document {path} has version {found}, expected {expected}")]
    VersionMismatch {
        /// The document that was rejected.
        path: PathBuf,
        /// The version this build understands.
        expected: u32,
        /// The version found on disk.
        found: u32,
    },

    /// A time-of-day value could not be parsed.
    #[error("Invalid time: {0}")]
    InvalidTime(String),

    /// The configuration file is structurally valid but semantically wrong.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller-supplied input was rejected.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
