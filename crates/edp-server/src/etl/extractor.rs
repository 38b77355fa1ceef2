//! Dataset extraction over HTTP
//!
//! Fetches the full universities dataset with bounded retry and exponential
//! backoff plus jitter. A response only counts as a success if it decodes to
//! a JSON array; transport failures, non-2xx statuses, decode failures and
//! wrong top-level shapes all consume one attempt.

use anyhow::Context;
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::{EtlError, EtlResult};
use crate::config::SourceConfig;

/// Upper bound on the uniform jitter added to each backoff delay.
pub const JITTER_MS: u64 = 1000;

/// Sleep seam for retry backoff. Tests install a recorder so retries do not
/// wait on real timers.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Default sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// HTTP extractor for the universities dataset.
pub struct Extractor {
    config: SourceConfig,
    client: reqwest::Client,
    sleeper: Arc<dyn Sleeper>,
}

impl Extractor {
    /// Create an extractor with a request timeout taken from the source
    /// configuration.
    pub fn new(config: SourceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            config,
            client,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the backoff sleeper.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Fetch the full dataset, retrying up to the configured attempt budget.
    ///
    /// The returned error names the attempt count and carries the last
    /// underlying cause; this is the only externally visible failure mode.
    pub async fn extract(&self) -> EtlResult<Vec<Value>> {
        let max_attempts = self.config.max_attempts;
        let mut last_cause = String::new();

        for attempt in 1..=max_attempts {
            debug!(attempt, max_attempts, url = %self.config.url, "Fetching dataset");

            match self.fetch_once().await {
                Ok(records) => {
                    info!(records = records.len(), attempt, "Dataset fetched");
                    return Ok(records);
                },
                Err(cause) => {
                    warn!(attempt, max_attempts, error = %cause, "Fetch attempt failed");
                    last_cause = cause;

                    if attempt < max_attempts {
                        let delay = backoff_delay(
                            attempt,
                            Duration::from_millis(self.config.base_delay_ms),
                            Duration::from_millis(self.config.max_delay_ms),
                        );
                        debug!(delay_ms = delay.as_millis() as u64, "Backing off before retry");
                        self.sleeper.sleep(delay).await;
                    }
                },
            }
        }

        Err(EtlError::Extraction {
            attempts: max_attempts,
            cause: last_cause,
        })
    }

    /// One fetch attempt: request, status check, decode, shape check.
    async fn fetch_once(&self) -> Result<Vec<Value>, String> {
        let response = self
            .client
            .get(&self.config.url)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("unexpected status {}", response.status()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("invalid JSON body: {e}"))?;

        match body {
            Value::Array(records) => Ok(records),
            other => Err(format!(
                "expected a JSON array of records, got {}",
                json_kind(&other)
            )),
        }
    }
}

/// Delay before retry `attempt` (1-indexed): `base * 2^(attempt-1)` plus up
/// to [`JITTER_MS`] of uniform jitter, capped at `max_delay`. The jitter
/// spreads retries so simultaneous instances do not hammer the upstream in
/// lockstep.
pub(crate) fn backoff_delay(attempt: u32, base: Duration, max_delay: Duration) -> Duration {
    let exponential = base.saturating_mul(1u32 << (attempt - 1).min(20));
    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..JITTER_MS));
    (exponential + jitter).min(max_delay)
}

/// Structural validator for an extracted dataset.
///
/// An empty dataset is well-formed. Otherwise only the FIRST element is
/// inspected as a representative sample: it must be an object with non-empty
/// string `name` and `country` fields. Full per-record validation is the
/// transformer's job.
pub fn is_well_formed(records: &[Value]) -> bool {
    let Some(first) = records.first() else {
        return true;
    };
    let Some(object) = first.as_object() else {
        return false;
    };

    ["name", "country"].iter().all(|key| {
        object
            .get(*key)
            .and_then(Value::as_str)
            .is_some_and(|text| !text.trim().is_empty())
    })
}

/// Human-readable JSON value kind for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn backoff_delay_stays_within_bounds() {
        let base = Duration::from_millis(1000);
        let max_delay = Duration::from_millis(10_000);

        for attempt in 1..=3u32 {
            let floor = Duration::from_millis(1000 * 2u64.pow(attempt - 1));
            let ceiling = floor + Duration::from_millis(JITTER_MS);
            for _ in 0..50 {
                let delay = backoff_delay(attempt, base, max_delay);
                assert!(delay >= floor, "attempt {attempt}: {delay:?} below {floor:?}");
                assert!(delay <= ceiling, "attempt {attempt}: {delay:?} above {ceiling:?}");
            }
        }
    }

    #[test]
    fn backoff_delay_is_capped() {
        let base = Duration::from_millis(1000);
        let max_delay = Duration::from_millis(3000);

        for _ in 0..50 {
            let delay = backoff_delay(5, base, max_delay);
            assert_eq!(delay, max_delay);
        }
    }

    #[test]
    fn empty_dataset_is_well_formed() {
        assert!(is_well_formed(&[]));
    }

    #[test]
    fn first_element_must_carry_name_and_country() {
        let records = vec![json!({"name": "MIT", "country": "United States"})];
        assert!(is_well_formed(&records));

        let missing_country = vec![json!({"name": "MIT"})];
        assert!(!is_well_formed(&missing_country));

        let blank_name = vec![json!({"name": "   ", "country": "United States"})];
        assert!(!is_well_formed(&blank_name));

        let not_an_object = vec![json!("MIT")];
        assert!(!is_well_formed(&not_an_object));
    }

    // The validator deliberately samples only the head of the dataset; a
    // garbage tail passes. Pinned here so the heuristic stays visible.
    #[test]
    fn well_formed_samples_only_the_first_element() {
        let records = vec![
            json!({"name": "MIT", "country": "United States"}),
            json!("garbage"),
            json!({"country": "nowhere"}),
        ];
        assert!(is_well_formed(&records));
    }
}
