//! Meterflow - Parking transaction ETL pipeline
//!
//! Main entry point for the meterflow CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{check, config, run, serve};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Meterflow - Parking transaction ETL pipeline
#[derive(Parser)]
#[command(name = "meterflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use a specific config file instead of the discovered layers
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute the pipeline once and wait for it to finish
    Run(run::RunArgs),

    /// Run the pipeline on its cron cadence until interrupted
    Serve(serve::ServeArgs),

    /// Probe the feed endpoint and the destination database
    Check(check::CheckArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "meterflow=debug,meterflow_etl=debug,meterflow_pipeline=debug,meterflow_config=debug,info"
    } else {
        "meterflow=info,meterflow_etl=info,meterflow_pipeline=info,warn"
    };
    tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let loaded = match &cli.config {
        Some(path) => meterflow_config::LoadedConfig {
            config: meterflow_config::load_config_file(path)?,
            sources: vec![meterflow_config::ConfigSource {
                path: path.clone(),
                loaded: true,
            }],
            warnings: Vec::new(),
        },
        None => meterflow_config::load_config(None)?,
    };
    for warning in &loaded.warnings {
        tracing::warn!("{warning}");
    }

    let ctx = commands::Context {
        config: loaded.config,
        sources: loaded.sources,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Run(args) => run::run(args, &ctx).await,
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Check(args) => check::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
