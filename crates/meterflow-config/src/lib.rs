//! Configuration system for the meterflow ETL pipeline.
//!
//! Provides TOML-based configuration with:
//! - Typed sections for the source API, intermediate storage, destination
//!   database, schedule, and workflow engine
//! - Config file layering (XDG user config + project-local overrides)
//! - Database password resolution from the environment

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    load_config, load_config_file, load_config_with_options, save_config, xdg_config_dir,
    xdg_config_path, ConfigSource, LoadedConfig,
};
pub use error::{ConfigError, Result};
pub use types::{
    ApiConfig, DatabaseConfig, EngineConfig, MeterflowConfig, ScheduleConfig, StorageConfig,
};
