//! Pipeline orchestration
//!
//! Composes extract → transform → load into one timed run. Stage errors
//! propagate unchanged so history records the failing stage verbatim, and
//! nothing reaches the loader when extraction or validation fails.

use std::time::Instant;
use tracing::{info, warn};

use super::error::{EtlError, EtlResult};
use super::extractor::{self, Extractor};
use super::loader::Loader;
use super::models::RunReport;
use super::transformer::Transformer;

/// One-shot ETL pipeline over the three stages.
pub struct Pipeline {
    extractor: Extractor,
    transformer: Transformer,
    loader: Loader,
}

impl Pipeline {
    pub fn new(extractor: Extractor, transformer: Transformer, loader: Loader) -> Self {
        Self {
            extractor,
            transformer,
            loader,
        }
    }

    /// Run one full ETL cycle and report per-stage counts.
    pub async fn run_once(&self) -> EtlResult<RunReport> {
        let started = Instant::now();
        info!("Starting ETL run");

        let raw = self.extractor.extract().await?;
        if !extractor::is_well_formed(&raw) {
            return Err(EtlError::MalformedDataset);
        }
        let extracted = raw.len();

        let batch = self.transformer.transform(&raw);
        if batch.failure_count > 0 {
            warn!(
                failed = batch.failure_count,
                total = batch.total_input,
                "Some records failed transformation"
            );
        }

        let save = self.loader.save(&batch).await?;

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            extracted,
            transformed = batch.success_count,
            loaded = save.records_loaded,
            duration_ms,
            "ETL run completed"
        );

        Ok(RunReport {
            extracted,
            transformed: batch.success_count,
            failed_records: batch.failure_count,
            loaded: save.records_loaded,
            duration_ms,
        })
    }
}
