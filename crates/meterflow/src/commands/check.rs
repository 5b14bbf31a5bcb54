//! Check command - probe the feed endpoint and the destination database.

use anyhow::Result;
use clap::Args;

use meterflow_etl::{MeterApi, ParkingDb};

use super::Context;

/// Arguments for the check command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Only probe the feed endpoint
    #[arg(long, conflicts_with = "db_only")]
    pub api_only: bool,

    /// Only probe the destination database
    #[arg(long)]
    pub db_only: bool,
}

/// Probe both ends of the pipeline and report what is reachable.
pub async fn run(args: CheckArgs, ctx: &Context) -> Result<()> {
    ctx.config.validate()?;
    let mut failed = false;

    if !args.db_only {
        let api_config = ctx.config.api();
        match probe_api(&api_config).await {
            Ok(()) => println!("✓ feed endpoint reachable: {}", api_config.base_url),
            Err(e) => {
                eprintln!("✗ feed endpoint: {}", e);
                failed = true;
            }
        }
    }

    if !args.api_only {
        let db_config = ctx.config.database();
        match probe_db(&db_config).await {
            Ok(table) => println!(
                "✓ database reachable: {}:{}/{} (table: {})",
                db_config.host, db_config.port, db_config.dbname, table
            ),
            Err(e) => {
                eprintln!("✗ database: {}", e);
                failed = true;
            }
        }
    }

    if failed {
        anyhow::bail!("one or more probes failed");
    }
    Ok(())
}

async fn probe_api(config: &meterflow_config::ApiConfig) -> Result<()> {
    let api = MeterApi::new(config)?;
    api.is_available().await?;
    Ok(())
}

async fn probe_db(config: &meterflow_config::DatabaseConfig) -> Result<String> {
    let db = ParkingDb::connect(config).await?;
    db.validate().await?;
    Ok(db.table().to_string())
}
