//! Error types for document loading and field-record handling
//!
//! Per-field collect/fill outcomes are not errors; they are reported through
//! [`crate::FillResult`]. The variants here cover the surrounding plumbing.

use thiserror::Error;

/// Result type alias for formsnap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur outside the per-field collect/fill path
#[derive(Error, Debug)]
pub enum Error {
    /// A CSS selector could not be parsed
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// A node id does not belong to the document it was used with
    #[error("Node not found in document: {0}")]
    NodeNotFound(String),

    /// Failed to load a document
    #[error("Failed to load document: {0}")]
    LoadError(String),

    /// Network error while fetching a page or stylesheet
    #[cfg(feature = "fetch")]
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Field records could not be encoded or decoded
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(feature = "fetch")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::NetworkError(err.to_string())
    }
}
