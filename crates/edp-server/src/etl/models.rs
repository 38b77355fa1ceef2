//! ETL domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Canonical university record produced by the transformer.
///
/// Never mutated after creation; a record is superseded wholesale by the next
/// full run. `id` is a deterministic URL-safe slug of
/// `country[-state_province]-name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct University {
    pub id: String,
    pub name: String,
    pub country: String,
    pub alpha_two_code: Option<String>,
    pub state_province: Option<String>,
    pub domains: Vec<String>,
    pub web_pages: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

/// One rejected input record with its position and reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformFailure {
    pub index: usize,
    pub raw_record: Value,
    pub error: String,
}

/// Result of transforming one raw batch.
///
/// Invariant: `success_count + failure_count == total_input` and
/// `success_count == records.len()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformBatch {
    pub records: Vec<University>,
    pub total_input: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub transformed_at: DateTime<Utc>,
    pub failures: Vec<TransformFailure>,
}

/// Metadata stored alongside the snapshot records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub saved_at: DateTime<Utc>,
    pub transformed_at: DateTime<Utc>,
    pub total_input: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// SHA-256 of the serialized records, verified on read-back.
    pub checksum: String,
}

/// The durable form of the most recent successful batch. Exactly one live
/// snapshot exists at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub metadata: SnapshotMetadata,
    pub records: Vec<University>,
}

/// What triggered a pipeline firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Scheduled,
    Manual,
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerKind::Scheduled => write!(f, "scheduled"),
            TriggerKind::Manual => write!(f, "manual"),
        }
    }
}

/// Immutable record of one pipeline firing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_loaded: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub trigger: TriggerKind,
}

/// Per-stage counts for a successful run. Extracted and transformed counts
/// legitimately differ when individual records fail transformation.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub extracted: usize,
    pub transformed: usize,
    pub failed_records: usize,
    pub loaded: usize,
    pub duration_ms: u64,
}

/// Locations written by a save.
#[derive(Debug, Clone, Serialize)]
pub struct SaveReport {
    pub records_loaded: usize,
    pub snapshot_path: PathBuf,
    /// Absent when the batch had zero records.
    pub csv_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TriggerKind::Scheduled).unwrap(),
            "\"scheduled\""
        );
        assert_eq!(TriggerKind::Manual.to_string(), "manual");
    }

    #[test]
    fn run_outcome_omits_absent_fields() {
        let outcome = RunOutcome {
            timestamp: Utc::now(),
            success: true,
            duration_ms: 12,
            records_loaded: Some(3),
            error: None,
            trigger: TriggerKind::Manual,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["records_loaded"], 3);
    }
}
