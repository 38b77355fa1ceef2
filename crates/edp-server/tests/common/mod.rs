//! Shared test fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use edp_server::config::{SchedulerConfig, SourceConfig, StorageConfig};
use edp_server::etl::extractor::Sleeper;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Source configuration pointed at a test server, with real backoff bounds.
pub fn source_config(url: impl Into<String>) -> SourceConfig {
    SourceConfig {
        url: url.into(),
        timeout_secs: 5,
        max_attempts: 3,
        base_delay_ms: 1000,
        max_delay_ms: 10_000,
    }
}

/// Storage configuration rooted in a temp directory.
pub fn storage_config(root: &Path) -> StorageConfig {
    StorageConfig {
        data_dir: root.join("data"),
        backup_dir: root.join("backups"),
        backup_retention: 30,
    }
}

/// Scheduler configuration with auto-start disabled.
pub fn scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        enabled: false,
        hour: 2,
        minute: 0,
        timezone: chrono_tz::UTC,
        history_cap: 10,
        status_history_cap: 5,
    }
}

/// A small dataset in the upstream shape.
pub fn sample_dataset() -> Vec<Value> {
    vec![
        json!({
            "name": "Massachusetts Institute of Technology",
            "country": "United States",
            "alpha_two_code": "US",
            "state-province": "Massachusetts",
            "domains": ["mit.edu"],
            "web_pages": ["http://web.mit.edu"]
        }),
        json!({
            "name": "University of Oxford",
            "country": "United Kingdom",
            "alpha_two_code": "GB",
            "state-province": null,
            "domains": ["ox.ac.uk"],
            "web_pages": ["www.ox.ac.uk"]
        }),
    ]
}

/// Sleeper that records requested delays instead of waiting on timers.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}
