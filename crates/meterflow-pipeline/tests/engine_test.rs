//! Integration tests for PipelineEngine against a real scheduler instance.

use std::path::Path;
use std::sync::Arc;

use meterflow_pipeline::{Context, EngineSettings, PipelineEngine, RunStatus, StepTask};

/// Helper to create an engine with a temp database.
async fn test_engine(dir: &Path) -> PipelineEngine {
    let db_path = dir.join("engine_test.db");
    PipelineEngine::new(&db_path, EngineSettings::default())
        .await
        .expect("engine init failed")
}

#[tokio::test]
async fn init_and_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path()).await;

    assert!(engine.list_pipelines().await.is_empty());
    engine.shutdown().await.expect("shutdown failed");
}

#[tokio::test]
async fn execute_single_step() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path()).await;

    let step = StepTask::new(
        "count",
        Arc::new(|mut ctx| {
            Box::pin(async move {
                let n = ctx.get("batch").and_then(|v| v.as_i64()).unwrap_or(0);
                ctx.insert("seen", serde_json::json!(n)).unwrap();
                Ok(ctx)
            })
        }),
    );

    engine
        .register_pipeline("count-batch", "Counts the batch", vec![step])
        .await
        .unwrap();

    let mut ctx = Context::new();
    ctx.insert("batch", serde_json::json!(50)).unwrap();

    let outcome = engine.execute("count-batch", ctx).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);

    let output = outcome.output.expect("final context");
    assert_eq!(output["batch"], serde_json::json!(50));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn linear_chain_passes_context_downstream() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path()).await;

    let extract = StepTask::new(
        "extract",
        Arc::new(|mut ctx| {
            Box::pin(async move {
                ctx.insert("extract", serde_json::json!([{"amt": "1.25"}]))
                    .unwrap();
                Ok(ctx)
            })
        }),
    );

    let transform = StepTask::new(
        "transform",
        Arc::new(|mut ctx| {
            Box::pin(async move {
                let upstream = ctx.get("extract").cloned().unwrap_or_default();
                let rows = upstream.as_array().map(|a| a.len()).unwrap_or(0);
                ctx.insert("transform", serde_json::json!({"rows": rows}))
                    .unwrap();
                Ok(ctx)
            })
        }),
    )
    .depends_on("extract");

    engine
        .register_pipeline("chain", "extract then transform", vec![extract, transform])
        .await
        .unwrap();

    let outcome = engine.execute("chain", Context::new()).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn failing_step_fails_run() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path()).await;

    let step = StepTask::new(
        "always_fails",
        Arc::new(|_ctx| {
            Box::pin(async move {
                Err(meterflow_pipeline::step_error(
                    "always_fails",
                    "no processed parking data",
                ))
            })
        }),
    );

    engine
        .register_pipeline("doomed", "fails immediately", vec![step])
        .await
        .unwrap();

    let outcome = engine.execute("doomed", Context::new()).await.unwrap();
    assert!(matches!(outcome.status, RunStatus::Failed(_)));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn execute_unregistered_pipeline_errors() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path()).await;

    let result = engine.execute("missing", Context::new()).await;
    assert!(result.is_err());

    engine.shutdown().await.unwrap();
}
