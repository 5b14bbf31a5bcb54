//! Run command - execute the pipeline once.

use anyhow::Result;
use clap::Args;

use meterflow_etl::workflow;
use meterflow_pipeline::RunStatus;

use super::Context;

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {}

/// Run the pipeline once and report the outcome.
pub async fn run(_args: RunArgs, ctx: &Context) -> Result<()> {
    let engine = super::build_engine(&ctx.config, false).await?;
    meterflow_etl::register(&engine, &ctx.config).await?;

    println!("Running pipeline \"{}\"...", workflow::PIPELINE_NAME);
    let outcome = engine
        .execute(workflow::PIPELINE_NAME, meterflow_pipeline::Context::new())
        .await?;

    let failed = match &outcome.status {
        RunStatus::Completed => {
            println!("✓ Run {} completed", outcome.execution_id);
            false
        }
        RunStatus::Failed(msg) => {
            eprintln!("✗ Run {} failed: {}", outcome.execution_id, msg);
            true
        }
        RunStatus::Running => {
            eprintln!("? Run {} still reported as running", outcome.execution_id);
            true
        }
    };

    if let Some(output) = &outcome.output {
        if let Some(rows) = output[workflow::STORE_CSV]["rows"].as_u64() {
            println!("  rows this batch:  {}", rows);
        }
        if let Some(loaded) = output[workflow::LOAD]["rows_loaded"].as_u64() {
            println!("  rows in table:    {}", loaded);
        }
        if let Some(path) = output[workflow::STORE_CSV]["path"].as_str() {
            println!("  csv file:         {}", path);
        }
        if ctx.verbose {
            println!("---\nFinal context:\n{}", serde_json::to_string_pretty(output)?);
        }
    }

    engine.shutdown().await?;

    if failed {
        anyhow::bail!("pipeline run failed");
    }
    Ok(())
}
