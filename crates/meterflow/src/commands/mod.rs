//! CLI command handlers.

use std::path::PathBuf;

use anyhow::Result;

use meterflow_config::{ConfigSource, EngineConfig, MeterflowConfig};
use meterflow_pipeline::{EngineSettings, PipelineEngine};

pub mod check;
pub mod config;
pub mod run;
pub mod serve;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration.
    pub config: MeterflowConfig,
    /// Config layers that were checked during discovery.
    pub sources: Vec<ConfigSource>,
    /// Verbose output enabled.
    pub verbose: bool,
}

/// Resolve the engine's SQLite file: configured path or the platform data
/// directory. The parent directory is created so first runs work.
pub fn engine_db_path(config: &EngineConfig) -> Result<PathBuf> {
    let path = match &config.db_path {
        Some(path) => path.clone(),
        None => dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?
            .join("meterflow")
            .join("engine.db"),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(path)
}

/// Build a configured engine, with cron scheduling on or off.
pub async fn build_engine(config: &MeterflowConfig, cron_enabled: bool) -> Result<PipelineEngine> {
    let engine_config = config.engine();
    let db_path = engine_db_path(&engine_config)?;

    let settings = EngineSettings {
        max_concurrent_tasks: engine_config.max_concurrent_tasks,
        task_timeout_secs: engine_config.task_timeout_secs,
        pipeline_timeout_secs: engine_config.pipeline_timeout_secs,
        cron_enabled,
    };

    Ok(PipelineEngine::new(&db_path, settings).await?)
}
