//! ETL error taxonomy

use thiserror::Error;

/// Result type alias for engine operations
pub type EtlResult<T> = std::result::Result<T, EtlError>;

/// Errors surfaced by the ETL engine.
///
/// Per-record transform failures are not represented here; they are isolated
/// into [`super::models::TransformFailure`] entries and never fail a run on
/// their own.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Extraction gave up after exhausting its retry budget.
    #[error("extraction failed after {attempts} attempts: {cause}")]
    Extraction { attempts: u32, cause: String },

    /// The extracted dataset failed the structural validator.
    #[error("extracted dataset failed structural validation")]
    MalformedDataset,

    #[error("load error: {0}")]
    Load(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("csv rendering error: {0}")]
    Csv(#[from] csv::Error),

    #[error("snapshot checksum mismatch: expected {expected}, got {actual}")]
    CorruptSnapshot { expected: String, actual: String },

    #[error("a pipeline run is already in progress")]
    AlreadyRunning,

    #[error("no snapshot has been persisted yet")]
    NoSnapshot,
}
