//! The parking transaction pipeline.
//!
//! Seven steps over a shared JSON context:
//!
//! ```text
//! check_api ─▶ create_table ─▶ extract ─▶ transform ─▶ store_csv ──▶ load
//!                                                  └─▶ store_json ─┘
//! ```
//!
//! Each step writes its output into the context under its own task id, and
//! downstream steps read it back out by that id. `store_json` is best-effort:
//! it logs and passes on failure so a broken mirror never blocks the load.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{info, warn};

use meterflow_config::{DatabaseConfig, MeterflowConfig, StorageConfig};
use meterflow_pipeline::{step_error, Context, PipelineEngine, StepTask, TaskError};

use crate::api::MeterApi;
use crate::db::ParkingDb;
use crate::error::{EtlError, Result};
use crate::record::{transform_batch, RawTransaction, TransactionRow};
use crate::store::{CsvStore, JsonStore};

/// Name the pipeline is registered and scheduled under.
pub const PIPELINE_NAME: &str = "parking_pipeline";

/// Description shown by the engine's pipeline listing.
pub const PIPELINE_DESCRIPTION: &str =
    "Poll the parking transaction feed, transform to tabular rows, load into Postgres";

/// Task ids, which double as the context keys for step outputs.
pub const CHECK_API: &str = "check_api";
pub const CREATE_TABLE: &str = "create_table";
pub const EXTRACT: &str = "extract_transactions";
pub const TRANSFORM: &str = "transform_transactions";
pub const STORE_CSV: &str = "store_csv";
pub const STORE_JSON: &str = "store_json";
pub const LOAD: &str = "load_transactions";

/// Write a step output into the context, replacing any stale value left over
/// from a seeded or retried run.
fn put(
    ctx: &mut Context<Value>,
    task_id: &str,
    value: Value,
) -> std::result::Result<(), TaskError> {
    let outcome = if ctx.get(task_id).is_some() {
        ctx.update(task_id, value)
    } else {
        ctx.insert(task_id, value)
    };
    outcome.map_err(|e| step_error(task_id, format!("context write failed: {e}")))
}

/// Read the transformed batch back out of the context.
fn rows_from_context(
    ctx: &Context<Value>,
    task_id: &str,
) -> std::result::Result<Vec<TransactionRow>, TaskError> {
    let value = ctx
        .get(TRANSFORM)
        .cloned()
        .ok_or_else(|| step_error(task_id, EtlError::MissingContext(TRANSFORM.into()).to_string()))?;
    serde_json::from_value(value)
        .map_err(|e| step_error(task_id, format!("unreadable transformed batch: {e}")))
}

/// Probe the feed endpoint. Pure gate; writes nothing to the context.
pub fn check_api_step(api: Arc<MeterApi>) -> StepTask {
    StepTask::new(
        CHECK_API,
        Arc::new(move |ctx| {
            let api = api.clone();
            Box::pin(async move {
                info!(endpoint = %api.base_url(), "probing transaction feed");
                api.is_available()
                    .await
                    .map_err(|e| step_error(CHECK_API, e.to_string()))?;
                Ok(ctx)
            })
        }),
    )
}

/// Drop and recreate the destination table.
pub fn create_table_step(database: DatabaseConfig) -> StepTask {
    StepTask::new(
        CREATE_TABLE,
        Arc::new(move |ctx| {
            let database = database.clone();
            Box::pin(async move {
                let db = ParkingDb::connect(&database)
                    .await
                    .map_err(|e| step_error(CREATE_TABLE, e.to_string()))?;
                db.ensure_table()
                    .await
                    .map_err(|e| step_error(CREATE_TABLE, e.to_string()))?;
                Ok(ctx)
            })
        }),
    )
}

/// Fetch the latest batch and hand the raw JSON downstream.
pub fn extract_step(api: Arc<MeterApi>, limit: u32) -> StepTask {
    StepTask::new(
        EXTRACT,
        Arc::new(move |mut ctx| {
            let api = api.clone();
            Box::pin(async move {
                let records = api
                    .fetch_transactions(limit)
                    .await
                    .map_err(|e| step_error(EXTRACT, e.to_string()))?;
                info!(count = records.len(), "extracted transaction batch");
                put(&mut ctx, EXTRACT, Value::Array(records))?;
                Ok(ctx)
            })
        }),
    )
}

/// Map the raw batch to destination rows. Fails on an empty batch so the
/// stores never produce an empty file.
pub fn transform_step() -> StepTask {
    StepTask::new(
        TRANSFORM,
        Arc::new(|mut ctx| {
            Box::pin(async move {
                let raw = ctx.get(EXTRACT).cloned().ok_or_else(|| {
                    step_error(TRANSFORM, EtlError::MissingContext(EXTRACT.into()).to_string())
                })?;
                let records: Vec<RawTransaction> = serde_json::from_value(raw)
                    .map_err(|e| step_error(TRANSFORM, format!("malformed batch: {e}")))?;
                if records.is_empty() {
                    return Err(step_error(TRANSFORM, EtlError::EmptyBatch.to_string()));
                }

                let rows = transform_batch(records);
                info!(rows = rows.len(), "transformed batch");

                let value = serde_json::to_value(&rows)
                    .map_err(|e| step_error(TRANSFORM, e.to_string()))?;
                put(&mut ctx, TRANSFORM, value)?;
                Ok(ctx)
            })
        }),
    )
}

/// Append the transformed rows to the accumulating CSV file.
pub fn store_csv_step(storage: StorageConfig) -> StepTask {
    StepTask::new(
        STORE_CSV,
        Arc::new(move |mut ctx| {
            let store = CsvStore::new(&storage);
            Box::pin(async move {
                let rows = rows_from_context(&ctx, STORE_CSV)?;
                let path = store
                    .append(&rows)
                    .map_err(|e| step_error(STORE_CSV, e.to_string()))?;
                info!(path = %path.display(), rows = rows.len(), "CSV batch appended");
                put(&mut ctx, STORE_CSV, json!({ "path": path, "rows": rows.len() }))?;
                Ok(ctx)
            })
        }),
    )
}

/// Write the JSON Lines mirror. Never fails the run.
pub fn store_json_step(storage: StorageConfig) -> StepTask {
    StepTask::new(
        STORE_JSON,
        Arc::new(move |mut ctx| {
            let store = JsonStore::new(&storage);
            Box::pin(async move {
                let written = rows_from_context(&ctx, STORE_JSON)
                    .map_err(|e| e.to_string())
                    .and_then(|rows| {
                        store
                            .write(&rows)
                            .map(|path| (path, rows.len()))
                            .map_err(|e| e.to_string())
                    });
                match written {
                    Ok((path, count)) => {
                        info!(path = %path.display(), rows = count, "JSON mirror written");
                        put(&mut ctx, STORE_JSON, json!({ "path": path, "rows": count }))?;
                    }
                    Err(e) => warn!("JSON mirror skipped: {e}"),
                }
                Ok(ctx)
            })
        }),
    )
}

/// Copy the accumulated CSV into the destination table.
///
/// The table was recreated earlier in the run, so loading the whole file
/// replaces its contents with everything fetched so far.
pub fn load_step(database: DatabaseConfig, storage: StorageConfig) -> StepTask {
    StepTask::new(
        LOAD,
        Arc::new(move |mut ctx| {
            let database = database.clone();
            let path = CsvStore::new(&storage).path();
            Box::pin(async move {
                let db = ParkingDb::connect(&database)
                    .await
                    .map_err(|e| step_error(LOAD, e.to_string()))?;
                let rows = db
                    .load_csv(&path)
                    .await
                    .map_err(|e| step_error(LOAD, e.to_string()))?;
                put(&mut ctx, LOAD, json!({ "rows_loaded": rows }))?;
                Ok(ctx)
            })
        }),
    )
}

/// Build the full step list from the effective config, dependencies wired and
/// the configured retry policy applied to every step.
pub fn build_steps(config: &MeterflowConfig) -> Result<Vec<StepTask>> {
    config.validate()?;

    let api_config = config.api();
    let api = Arc::new(MeterApi::new(&api_config)?);
    let storage = config.storage();
    let database = config.database();

    let engine = config.engine();
    let delay = Duration::from_secs(engine.retry_delay_secs);
    let retried = |step: StepTask| step.with_retries(engine.retry_attempts, delay);

    Ok(vec![
        retried(check_api_step(api.clone())),
        retried(create_table_step(database.clone()).depends_on(CHECK_API)),
        retried(extract_step(api, api_config.record_limit).depends_on(CREATE_TABLE)),
        retried(transform_step().depends_on(EXTRACT)),
        retried(store_csv_step(storage.clone()).depends_on(TRANSFORM)),
        retried(store_json_step(storage.clone()).depends_on(TRANSFORM)),
        retried(
            load_step(database, storage)
                .depends_on(STORE_CSV)
                .depends_on(STORE_JSON),
        ),
    ])
}

/// Register the pipeline with an engine under [`PIPELINE_NAME`].
pub async fn register(engine: &PipelineEngine, config: &MeterflowConfig) -> Result<()> {
    let steps = build_steps(config)?;
    engine
        .register_pipeline(PIPELINE_NAME, PIPELINE_DESCRIPTION, steps)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meterflow_config::ApiConfig;
    use meterflow_pipeline::Task;

    fn test_config() -> MeterflowConfig {
        MeterflowConfig {
            api: Some(ApiConfig {
                base_url: "http://localhost:9090/transactions".into(),
                record_limit: 50,
                timeout_secs: 5,
            }),
            ..MeterflowConfig::default()
        }
    }

    #[test]
    fn seven_steps_in_execution_order() {
        let steps = build_steps(&test_config()).unwrap();
        let ids: Vec<&str> = steps.iter().map(|s| s.id()).collect();
        assert_eq!(
            ids,
            vec![
                CHECK_API,
                CREATE_TABLE,
                EXTRACT,
                TRANSFORM,
                STORE_CSV,
                STORE_JSON,
                LOAD
            ]
        );
    }

    #[test]
    fn dependency_edges_match_dag() {
        let steps = build_steps(&test_config()).unwrap();
        let dep_counts: Vec<usize> = steps.iter().map(|s| s.dependencies().len()).collect();
        // check_api has none; load joins both stores.
        assert_eq!(dep_counts, vec![0, 1, 1, 1, 1, 1, 2]);

        let load = &steps[6];
        let dep_ids: Vec<&str> = load
            .dependencies()
            .iter()
            .map(|ns| ns.task_id.as_str())
            .collect();
        assert_eq!(dep_ids, vec![STORE_CSV, STORE_JSON]);
    }

    #[test]
    fn retry_policy_comes_from_engine_config() {
        let steps = build_steps(&test_config()).unwrap();
        for step in &steps {
            assert_eq!(step.retry_policy().max_attempts, 2);
            assert_eq!(
                step.retry_policy().initial_delay,
                Duration::from_secs(600)
            );
        }
    }

    #[test]
    fn missing_base_url_is_rejected() {
        let err = build_steps(&MeterflowConfig::default()).unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[tokio::test]
    async fn put_inserts_then_updates() {
        let mut ctx = Context::new();
        put(&mut ctx, "k", json!(1)).unwrap();
        assert_eq!(ctx.get("k"), Some(&json!(1)));
        put(&mut ctx, "k", json!(2)).unwrap();
        assert_eq!(ctx.get("k"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn transform_fails_without_upstream_batch() {
        let step = transform_step();
        let err = step.execute(Context::new()).await.unwrap_err();
        assert!(err.to_string().contains(EXTRACT));
    }

    #[tokio::test]
    async fn transform_rejects_empty_batch() {
        let mut ctx = Context::new();
        ctx.insert(EXTRACT, json!([])).unwrap();
        let err = transform_step().execute(ctx).await.unwrap_err();
        assert!(err.to_string().contains("no processed parking data"));
    }

    #[tokio::test]
    async fn store_json_passes_on_missing_batch() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = StorageConfig {
            csv_dir: dir.path().to_path_buf(),
            json_dir: dir.path().to_path_buf(),
        };
        let step = store_json_step(storage);
        // No transformed batch in the context; the step must still succeed.
        let ctx = step.execute(Context::new()).await.unwrap();
        assert!(ctx.get(STORE_JSON).is_none());
    }
}
