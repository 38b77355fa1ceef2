//! Configuration management

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default upstream dataset endpoint.
pub const DEFAULT_SOURCE_URL: &str = "http://universities.hipolabs.com/search";

/// Default per-request timeout in seconds.
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 30;

/// Default extraction attempt budget.
pub const DEFAULT_SOURCE_MAX_ATTEMPTS: u32 = 3;

/// Default backoff base delay in milliseconds.
pub const DEFAULT_SOURCE_BASE_DELAY_MS: u64 = 1000;

/// Default backoff delay ceiling in milliseconds.
pub const DEFAULT_SOURCE_MAX_DELAY_MS: u64 = 10_000;

/// Default primary data directory.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default backup directory.
pub const DEFAULT_BACKUP_DIR: &str = "./data/backups";

/// Default number of snapshot backups kept after pruning.
pub const DEFAULT_BACKUP_RETENTION: usize = 30;

/// Default daily trigger hour (24h clock).
pub const DEFAULT_SCHEDULE_HOUR: u32 = 2;

/// Default daily trigger minute.
pub const DEFAULT_SCHEDULE_MINUTE: u32 = 0;

/// Default scheduler timezone.
pub const DEFAULT_SCHEDULE_TIMEZONE: Tz = chrono_tz::UTC;

/// Default run-history cap.
pub const DEFAULT_HISTORY_CAP: usize = 10;

/// Default number of outcomes shown in a status view.
pub const DEFAULT_STATUS_HISTORY_CAP: usize = 5;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
    pub cors: CorsConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Upstream dataset source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// Snapshot storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub backup_retention: usize,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub hour: u32,
    pub minute: u32,
    pub timezone: Tz,
    pub history_cap: usize,
    pub status_history_cap: usize,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("EDP_HOST").unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: std::env::var("EDP_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: std::env::var("EDP_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            },
            source: SourceConfig {
                url: std::env::var("SOURCE_API_URL")
                    .unwrap_or_else(|_| DEFAULT_SOURCE_URL.to_string()),
                timeout_secs: std::env::var("SOURCE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SOURCE_TIMEOUT_SECS),
                max_attempts: std::env::var("SOURCE_MAX_ATTEMPTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SOURCE_MAX_ATTEMPTS),
                base_delay_ms: std::env::var("SOURCE_BASE_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SOURCE_BASE_DELAY_MS),
                max_delay_ms: std::env::var("SOURCE_MAX_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SOURCE_MAX_DELAY_MS),
            },
            storage: StorageConfig {
                data_dir: std::env::var("EDP_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR)),
                backup_dir: std::env::var("EDP_BACKUP_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_BACKUP_DIR)),
                backup_retention: std::env::var("EDP_BACKUP_RETENTION")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_BACKUP_RETENTION),
            },
            scheduler: SchedulerConfig {
                enabled: std::env::var("SCHEDULER_ENABLED")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
                hour: std::env::var("SCHEDULER_HOUR")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SCHEDULE_HOUR),
                minute: std::env::var("SCHEDULER_MINUTE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SCHEDULE_MINUTE),
                timezone: match std::env::var("SCHEDULER_TIMEZONE") {
                    Ok(name) => name
                        .parse()
                        .map_err(|e| anyhow::anyhow!("Invalid SCHEDULER_TIMEZONE: {e}"))?,
                    Err(_) => DEFAULT_SCHEDULE_TIMEZONE,
                },
                history_cap: std::env::var("SCHEDULER_HISTORY_CAP")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_HISTORY_CAP),
                status_history_cap: std::env::var("SCHEDULER_STATUS_HISTORY_CAP")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_STATUS_HISTORY_CAP),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.source.url.is_empty() {
            anyhow::bail!("Source API URL cannot be empty");
        }

        if self.source.max_attempts == 0 {
            anyhow::bail!("Source max_attempts must be at least 1");
        }

        if self.source.base_delay_ms > self.source.max_delay_ms {
            anyhow::bail!(
                "Source base_delay_ms ({}) cannot be greater than max_delay_ms ({})",
                self.source.base_delay_ms,
                self.source.max_delay_ms
            );
        }

        if self.scheduler.hour > 23 || self.scheduler.minute > 59 {
            anyhow::bail!(
                "Invalid schedule time {:02}:{:02}",
                self.scheduler.hour,
                self.scheduler.minute
            );
        }

        if self.scheduler.history_cap == 0 {
            anyhow::bail!("Scheduler history_cap must be at least 1");
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            source: SourceConfig::default(),
            storage: StorageConfig {
                data_dir: PathBuf::from(DEFAULT_DATA_DIR),
                backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
                backup_retention: DEFAULT_BACKUP_RETENTION,
            },
            scheduler: SchedulerConfig::default(),
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
            },
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            timeout_secs: DEFAULT_SOURCE_TIMEOUT_SECS,
            max_attempts: DEFAULT_SOURCE_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_SOURCE_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_SOURCE_MAX_DELAY_MS,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: DEFAULT_SCHEDULE_HOUR,
            minute: DEFAULT_SCHEDULE_MINUTE,
            timezone: DEFAULT_SCHEDULE_TIMEZONE,
            history_cap: DEFAULT_HISTORY_CAP,
            status_history_cap: DEFAULT_STATUS_HISTORY_CAP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_attempts() {
        let mut config = Config::default();
        config.source.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_delay_bounds() {
        let mut config = Config::default();
        config.source.base_delay_ms = 20_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_schedule_time() {
        let mut config = Config::default();
        config.scheduler.hour = 24;
        assert!(config.validate().is_err());
    }
}
