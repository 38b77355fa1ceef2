//! Snapshot persistence
//!
//! Writes the canonical JSON snapshot and the derived CSV rendering, taking a
//! timestamped backup of the live snapshot before every overwrite. Primary
//! writes go through a temp file and an atomic rename; backup failures are
//! logged but never fail a save.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use edp_common::checksum;

use super::error::{EtlError, EtlResult};
use super::models::{
    PersistedSnapshot, SaveReport, SnapshotMetadata, TransformBatch, University,
};
use crate::config::StorageConfig;

/// File name of the live snapshot.
pub const SNAPSHOT_FILE: &str = "universities.json";

/// File name of the derived tabular rendering.
pub const CSV_FILE: &str = "universities.csv";

/// Fixed CSV column order.
pub const CSV_COLUMNS: [&str; 8] = [
    "id",
    "name",
    "country",
    "alpha_two_code",
    "state_province",
    "domains",
    "web_pages",
    "last_updated",
];

/// A rendering of the live snapshot prepared for download.
#[derive(Debug, Clone)]
pub struct Export {
    pub filename: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// Snapshot store over the primary and backup directories.
#[derive(Debug, Clone)]
pub struct Loader {
    config: StorageConfig,
}

impl Loader {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    fn snapshot_path(&self) -> PathBuf {
        self.config.data_dir.join(SNAPSHOT_FILE)
    }

    fn csv_path(&self) -> PathBuf {
        self.config.data_dir.join(CSV_FILE)
    }

    /// Persist a batch: back up the live snapshot, then atomically replace
    /// the primary JSON and regenerate the CSV.
    pub async fn save(&self, batch: &TransformBatch) -> EtlResult<SaveReport> {
        tokio::fs::create_dir_all(&self.config.data_dir).await?;
        tokio::fs::create_dir_all(&self.config.backup_dir).await?;

        // Best-effort durability of history; the current save proceeds even
        // if the backup copy fails.
        if let Err(error) = self.backup_existing().await {
            warn!(%error, "Snapshot backup failed; continuing with save");
        }

        let snapshot = build_snapshot(batch)?;
        let json = serde_json::to_vec_pretty(&snapshot)?;
        let snapshot_path = self.snapshot_path();
        write_atomic(&snapshot_path, &json).await?;
        info!(
            records = snapshot.records.len(),
            path = %snapshot_path.display(),
            "Snapshot written"
        );

        let csv_path = if batch.records.is_empty() {
            None
        } else {
            let rendered = render_csv(&batch.records)?;
            let path = self.csv_path();
            write_atomic(&path, &rendered).await?;
            info!(path = %path.display(), "CSV rendering written");
            Some(path)
        };

        Ok(SaveReport {
            records_loaded: batch.records.len(),
            snapshot_path,
            csv_path,
        })
    }

    /// Read the live snapshot. `Ok(None)` means no snapshot exists yet; any
    /// other failure (unreadable file, bad JSON, checksum mismatch) is an
    /// error so callers can tell "no data yet" from "data unreadable".
    pub async fn read(&self) -> EtlResult<Option<PersistedSnapshot>> {
        let path = self.snapshot_path();

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        let snapshot: PersistedSnapshot = serde_json::from_slice(&bytes)?;

        let serialized = serde_json::to_vec(&snapshot.records)?;
        let actual = checksum::sha256_hex(&serialized);
        if actual != snapshot.metadata.checksum {
            return Err(EtlError::CorruptSnapshot {
                expected: snapshot.metadata.checksum.clone(),
                actual,
            });
        }

        Ok(Some(snapshot))
    }

    /// JSON rendering of the live snapshot for download.
    pub async fn export_json(&self) -> EtlResult<Export> {
        let snapshot = self.read().await?.ok_or(EtlError::NoSnapshot)?;
        Ok(Export {
            filename: dated_filename("json"),
            content_type: "application/json",
            body: serde_json::to_vec_pretty(&snapshot)?,
        })
    }

    /// CSV rendering of the live snapshot for download.
    pub async fn export_csv(&self) -> EtlResult<Export> {
        let snapshot = self.read().await?.ok_or(EtlError::NoSnapshot)?;
        Ok(Export {
            filename: dated_filename("csv"),
            content_type: "text/csv",
            body: render_csv(&snapshot.records)?,
        })
    }

    /// Copy the live snapshot into the backup directory under a timestamped
    /// name, then prune backups past the retention cap.
    async fn backup_existing(&self) -> EtlResult<()> {
        let live = self.snapshot_path();

        match tokio::fs::metadata(&live).await {
            Ok(_) => {},
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(error) => return Err(error.into()),
        }

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
        let mut backup_path = self
            .config
            .backup_dir
            .join(format!("universities-{stamp}.json"));

        // Millisecond stamps can collide under rapid successive saves; a
        // sequence suffix keeps names unique.
        let mut sequence = 1u32;
        while tokio::fs::try_exists(&backup_path).await? {
            backup_path = self
                .config
                .backup_dir
                .join(format!("universities-{stamp}-{sequence}.json"));
            sequence += 1;
        }

        tokio::fs::copy(&live, &backup_path).await?;
        info!(path = %backup_path.display(), "Backed up previous snapshot");

        self.prune_backups().await;

        Ok(())
    }

    /// Keep only the newest `backup_retention` backups, oldest pruned first.
    /// Prune failures are warnings.
    async fn prune_backups(&self) {
        let retention = self.config.backup_retention;

        let mut backups = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.config.backup_dir).await {
            Ok(entries) => entries,
            Err(error) => {
                warn!(%error, "Failed to list backup directory for pruning");
                return;
            },
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if name.starts_with("universities-") && name.ends_with(".json") {
                        backups.push(entry.path());
                    }
                },
                Ok(None) => break,
                Err(error) => {
                    warn!(%error, "Failed to read backup directory entry");
                    return;
                },
            }
        }

        if backups.len() <= retention {
            return;
        }

        // Timestamped names sort chronologically.
        backups.sort();
        for path in backups.iter().take(backups.len() - retention) {
            match tokio::fs::remove_file(path).await {
                Ok(()) => info!(path = %path.display(), "Pruned old backup"),
                Err(error) => warn!(path = %path.display(), %error, "Failed to prune backup"),
            }
        }
    }
}

/// Assemble the durable snapshot, fingerprinting the serialized records.
fn build_snapshot(batch: &TransformBatch) -> EtlResult<PersistedSnapshot> {
    let serialized = serde_json::to_vec(&batch.records)?;

    Ok(PersistedSnapshot {
        metadata: SnapshotMetadata {
            saved_at: Utc::now(),
            transformed_at: batch.transformed_at,
            total_input: batch.total_input,
            success_count: batch.success_count,
            failure_count: batch.failure_count,
            checksum: checksum::sha256_hex(&serialized),
        },
        records: batch.records.clone(),
    })
}

/// Render records in the fixed column order. Multi-valued fields join with
/// `;`; missing optional scalars render empty. Quoting follows the standard
/// rule: fields containing commas or quotes are quoted with embedded quotes
/// doubled.
pub(crate) fn render_csv(records: &[University]) -> EtlResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS)?;

    for record in records {
        let domains = record.domains.join(";");
        let web_pages = record.web_pages.join(";");
        let last_updated = record.last_updated.to_rfc3339();

        writer.write_record([
            record.id.as_str(),
            record.name.as_str(),
            record.country.as_str(),
            record.alpha_two_code.as_deref().unwrap_or(""),
            record.state_province.as_deref().unwrap_or(""),
            domains.as_str(),
            web_pages.as_str(),
            last_updated.as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|error| EtlError::Load(std::io::Error::other(error.to_string())))
}

/// Write via a temp file in the same directory followed by an atomic rename.
async fn write_atomic(path: &Path, data: &[u8]) -> EtlResult<()> {
    let temp_path = path.with_extension("tmp");

    let mut file = tokio::fs::File::create(&temp_path).await?;
    file.write_all(data).await?;
    file.flush().await?;

    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

/// Download filename embedding the current date.
fn dated_filename(extension: &str) -> String {
    format!("universities-{}.{extension}", Utc::now().format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(name: &str) -> University {
        University {
            id: format!("testland-{}", name.to_lowercase()),
            name: name.to_string(),
            country: "Testland".to_string(),
            alpha_two_code: Some("TL".to_string()),
            state_province: None,
            domains: vec!["a.edu".to_string(), "b.edu".to_string()],
            web_pages: vec!["https://a.edu".to_string()],
            last_updated: Utc.with_ymd_and_hms(2026, 8, 8, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn csv_has_fixed_header_and_joined_lists() {
        let rendered = render_csv(&[record("Alpha")]).unwrap();
        let text = String::from_utf8(rendered).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "id,name,country,alpha_two_code,state_province,domains,web_pages,last_updated"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("a.edu;b.edu"));
        assert!(row.contains("testland-alpha"));
        // state_province is empty between two commas
        assert!(row.contains("TL,,"));
    }

    #[test]
    fn csv_quotes_fields_containing_commas_and_quotes() {
        let mut special = record("Beta");
        special.name = "Beta, the \"Great\"".to_string();
        let rendered = render_csv(&[special]).unwrap();
        let text = String::from_utf8(rendered).unwrap();

        assert!(text.contains("\"Beta, the \"\"Great\"\"\""));
    }

    #[test]
    fn dated_filename_embeds_extension() {
        let name = dated_filename("csv");
        assert!(name.starts_with("universities-"));
        assert!(name.ends_with(".csv"));
    }
}
