//! Error types for stash.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Input errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Archive errors
    #[error("Archive failure: {0}")]
    ArchiveFailure(String),

    // Object store errors
    #[error("Object store failure: {0}")]
    StoreFailure(String),

    #[error("Tag {tag} not found on {object}")]
    TagNotFound { object: String, tag: String },

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl Error {
    /// Shorthand for a missing or malformed input.
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Whether this error means the requested tag is absent.
    pub fn is_tag_not_found(&self) -> bool {
        matches!(self, Error::TagNotFound { .. })
    }
}
