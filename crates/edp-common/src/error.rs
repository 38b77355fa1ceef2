//! Error types for EDP

use thiserror::Error;

/// Result type alias for EDP operations
pub type Result<T> = std::result::Result<T, EdpError>;

/// Main error type for EDP
#[derive(Error, Debug)]
pub enum EdpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}
