/// Core error types for Trove
use crate::types::TagFields;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `TroveError`
pub type Result<T> = std::result::Result<T, TroveError>;

/// Core error type for Trove
#[derive(Error, Debug)]
pub enum TroveError {
    /// Metadata extraction errors
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl TroveError {
    /// Create a metadata error
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Failure to read tags from a single file.
///
/// Carries whatever fields were recovered before the failure so the walker can
/// still record the file.
#[derive(Error, Debug, Clone)]
#[error("failed to read tags from {}: {reason}", path.display())]
pub struct ExtractError {
    /// File that failed
    pub path: PathBuf,
    /// Human-readable cause
    pub reason: String,
    /// Fields read before the failure (may be all defaults)
    pub partial: TagFields,
}

impl ExtractError {
    /// Failure with no recovered fields
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
            partial: TagFields::default(),
        }
    }

    /// Attach the fields that were recovered
    pub fn with_partial(mut self, partial: TagFields) -> Self {
        self.partial = partial;
        self
    }
}

impl From<ExtractError> for TroveError {
    fn from(err: ExtractError) -> Self {
        TroveError::metadata(err.to_string())
    }
}
