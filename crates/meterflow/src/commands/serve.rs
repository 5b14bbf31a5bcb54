//! Serve command - run the pipeline on its cron cadence.

use anyhow::Result;
use clap::Args;
use tracing::info;

use meterflow_etl::workflow;

use super::Context;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Also execute the pipeline once immediately, before the first tick
    #[arg(long)]
    pub run_now: bool,
}

/// Register the cron schedule and block until interrupted.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let schedule = ctx.config.schedule();

    let engine = super::build_engine(&ctx.config, true).await?;
    meterflow_etl::register(&engine, &ctx.config).await?;

    engine
        .schedule_cron(workflow::PIPELINE_NAME, &schedule.cron, &schedule.timezone)
        .await?;

    println!("─────────────────────────────────────────────");
    println!(" meterflow scheduler");
    println!("─────────────────────────────────────────────");
    println!("  pipeline:  {}", workflow::PIPELINE_NAME);
    println!("  cadence:   {} ({})", schedule.cron, schedule.timezone);
    for schedule in engine.list_schedules().await? {
        println!("  schedule:  {} (enabled: {})", schedule.id, schedule.enabled);
    }
    println!();
    println!("Press Ctrl-C to stop.");

    if args.run_now {
        info!("executing initial run before the first scheduled tick");
        let outcome = engine
            .execute(workflow::PIPELINE_NAME, meterflow_pipeline::Context::new())
            .await?;
        info!(execution_id = %outcome.execution_id, status = ?outcome.status, "initial run finished");
    }

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");

    engine.shutdown().await?;
    Ok(())
}
