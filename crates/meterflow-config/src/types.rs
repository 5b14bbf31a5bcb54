//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [api]        # source endpoint and batch size
//! [storage]    # intermediate file locations
//! [database]   # postgres destination
//! [schedule]   # pipeline cadence
//! [engine]     # workflow engine knobs
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// Maps to the full TOML config file. All sections are optional so that
/// partial configs (e.g., project-local overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterflowConfig {
    /// Source API endpoint configuration.
    pub api: Option<ApiConfig>,

    /// Intermediate file storage configuration.
    pub storage: Option<StorageConfig>,

    /// Destination database configuration.
    pub database: Option<DatabaseConfig>,

    /// Pipeline cadence configuration.
    pub schedule: Option<ScheduleConfig>,

    /// Workflow engine configuration.
    pub engine: Option<EngineConfig>,
}

impl MeterflowConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced wholesale when present in `other`.
    pub fn merge(&mut self, other: MeterflowConfig) {
        if other.api.is_some() {
            self.api = other.api;
        }
        if other.storage.is_some() {
            self.storage = other.storage;
        }
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.schedule.is_some() {
            self.schedule = other.schedule;
        }
        if other.engine.is_some() {
            self.engine = other.engine;
        }
    }

    /// Effective API section (defaults where unset).
    pub fn api(&self) -> ApiConfig {
        self.api.clone().unwrap_or_default()
    }

    /// Effective storage section.
    pub fn storage(&self) -> StorageConfig {
        self.storage.clone().unwrap_or_default()
    }

    /// Effective database section.
    pub fn database(&self) -> DatabaseConfig {
        self.database.clone().unwrap_or_default()
    }

    /// Effective schedule section.
    pub fn schedule(&self) -> ScheduleConfig {
        self.schedule.clone().unwrap_or_default()
    }

    /// Effective engine section.
    pub fn engine(&self) -> EngineConfig {
        self.engine.clone().unwrap_or_default()
    }

    /// Validate that the config can actually drive the pipeline.
    ///
    /// The source endpoint has no sensible default (the upstream deployment
    /// keeps it out of the repository), so an unset or empty `api.base_url`
    /// is rejected here rather than at request time.
    pub fn validate(&self) -> Result<()> {
        if self.api().base_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "base_url".into(),
                context: "[api]".into(),
            });
        }
        if self.api().record_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "api.record_limit".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.database().table.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "table".into(),
                context: "[database]".into(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Source API endpoint: where transaction records come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the transaction feed. Required; no baked-in default.
    pub base_url: String,

    /// Number of records requested per run (the `$top` query parameter).
    pub record_limit: u32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            record_limit: 50,
            timeout_secs: 30,
        }
    }
}

/// Locations of the intermediate flat files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory the CSV batch file is appended under.
    pub csv_dir: PathBuf,

    /// Directory the JSON Lines mirror is written under.
    pub json_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            csv_dir: PathBuf::from("data"),
            json_dir: PathBuf::from("data"),
        }
    }
}

/// Destination PostgreSQL connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,

    /// Database port.
    pub port: u16,

    /// Role to connect as.
    pub user: String,

    /// Password. Usually left empty in files and supplied via the
    /// `METERFLOW_DB_PASSWORD` environment variable (see discovery).
    pub password: String,

    /// Database name.
    pub dbname: String,

    /// Destination table for transformed rows.
    pub table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: String::new(),
            dbname: "postgres".into(),
            table: "parking_data".into(),
        }
    }
}

/// Pipeline cadence, handed verbatim to the workflow engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Cron expression. Default matches the upstream two-minute cadence.
    pub cron: String,

    /// IANA timezone for the cron expression.
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: "*/2 * * * *".into(),
            timezone: "UTC".into(),
        }
    }
}

/// Workflow engine knobs, passed through to the scheduler unmodified.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// SQLite file backing the engine's own state. Defaults to a
    /// platform data directory when unset.
    pub db_path: Option<PathBuf>,

    /// Maximum concurrent tasks. The DAG is effectively linear, so this
    /// defaults to single-task execution.
    pub max_concurrent_tasks: usize,

    /// Per-task execution timeout in seconds.
    pub task_timeout_secs: u64,

    /// Whole-pipeline execution timeout in seconds.
    pub pipeline_timeout_secs: u64,

    /// Attempts per task (first run + retries).
    pub retry_attempts: u32,

    /// Delay between attempts in seconds.
    pub retry_delay_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            max_concurrent_tasks: 1,
            task_timeout_secs: 300,
            pipeline_timeout_secs: 3600,
            // Matches the upstream defaults: one retry, ten minutes apart.
            retry_attempts: 2,
            retry_delay_secs: 600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
[api]
base_url = "https://example.com/transactions"
record_limit = 25
timeout_secs = 10

[storage]
csv_dir = "/var/lib/meterflow/csv"
json_dir = "/var/lib/meterflow/json"

[database]
host = "db.internal"
port = 5433
user = "etl"
password = "hunter2"
dbname = "parking"
table = "parking_data"

[schedule]
cron = "0 * * * *"
timezone = "America/Chicago"

[engine]
max_concurrent_tasks = 2
task_timeout_secs = 120
pipeline_timeout_secs = 600
retry_attempts = 3
retry_delay_secs = 30
"#;

    #[test]
    fn parse_full_config() {
        let config = MeterflowConfig::from_toml(FULL_CONFIG).unwrap();
        assert_eq!(config.api().base_url, "https://example.com/transactions");
        assert_eq!(config.api().record_limit, 25);
        assert_eq!(config.database().port, 5433);
        assert_eq!(config.schedule().cron, "0 * * * *");
        assert_eq!(config.engine().retry_attempts, 3);
        assert_eq!(
            config.storage().csv_dir,
            PathBuf::from("/var/lib/meterflow/csv")
        );
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = MeterflowConfig::from_toml("").unwrap();
        assert_eq!(config.api().record_limit, 50);
        assert_eq!(config.database().host, "localhost");
        assert_eq!(config.database().table, "parking_data");
        assert_eq!(config.schedule().cron, "*/2 * * * *");
        assert_eq!(config.engine().max_concurrent_tasks, 1);
        assert_eq!(config.engine().retry_attempts, 2);
        assert_eq!(config.engine().retry_delay_secs, 600);
    }

    #[test]
    fn partial_section_fills_defaults() {
        let config = MeterflowConfig::from_toml(
            r#"
[api]
base_url = "https://example.com"
"#,
        )
        .unwrap();
        assert_eq!(config.api().base_url, "https://example.com");
        assert_eq!(config.api().record_limit, 50);
        assert_eq!(config.api().timeout_secs, 30);
    }

    #[test]
    fn merge_replaces_present_sections() {
        let mut base = MeterflowConfig::from_toml(FULL_CONFIG).unwrap();
        let overlay = MeterflowConfig::from_toml(
            r#"
[database]
host = "override.internal"
"#,
        )
        .unwrap();
        base.merge(overlay);
        assert_eq!(base.database().host, "override.internal");
        // Replaced wholesale: unset fields in the overlay revert to defaults.
        assert_eq!(base.database().port, 5432);
        // Untouched sections survive.
        assert_eq!(base.api().record_limit, 25);
    }

    #[test]
    fn validate_requires_base_url() {
        let config = MeterflowConfig::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn validate_rejects_zero_record_limit() {
        let config = MeterflowConfig::from_toml(
            r#"
[api]
base_url = "https://example.com"
record_limit = 0
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("record_limit"));
    }

    #[test]
    fn validate_accepts_full_config() {
        let config = MeterflowConfig::from_toml(FULL_CONFIG).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn roundtrip_toml() {
        let config = MeterflowConfig::from_toml(FULL_CONFIG).unwrap();
        let serialized = config.to_toml().unwrap();
        let parsed = MeterflowConfig::from_toml(&serialized).unwrap();
        assert_eq!(parsed.api().base_url, config.api().base_url);
        assert_eq!(parsed.engine().retry_delay_secs, 30);
    }
}
