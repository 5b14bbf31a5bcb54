//! Engine wrapper around Cloacina's `DefaultRunner`.
//!
//! Owns pipeline registration, one-shot execution, cron scheduling, and
//! graceful shutdown. The heavy lifting (task ordering, retries, persistence)
//! is the scheduler's; this wrapper only narrows the API to what the ETL
//! binary needs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use cloacina::prelude::*;
use cloacina::UniversalUuid;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::task::StepTask;

/// Configuration for the pipeline engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Maximum concurrent tasks. The ETL DAG is effectively linear.
    pub max_concurrent_tasks: usize,

    /// Per-task execution timeout in seconds.
    pub task_timeout_secs: u64,

    /// Whole-pipeline execution timeout in seconds.
    pub pipeline_timeout_secs: u64,

    /// Enable cron scheduling (off for one-shot runs and tests).
    pub cron_enabled: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 1,
            task_timeout_secs: 300,
            pipeline_timeout_secs: 3600,
            cron_enabled: false,
        }
    }
}

/// Final state of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// All tasks completed.
    Completed,
    /// A task failed after exhausting its retries.
    Failed(String),
    /// Still running (should not be seen from synchronous execution).
    Running,
}

/// Result of a one-shot pipeline run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Execution id assigned by the scheduler.
    pub execution_id: String,
    /// Final status.
    pub status: RunStatus,
    /// Final shared context, when it serialized cleanly.
    pub output: Option<serde_json::Value>,
}

/// A registered cron schedule.
#[derive(Debug, Clone)]
pub struct ScheduleInfo {
    /// Schedule identifier.
    pub id: String,
    /// Pipeline name.
    pub pipeline_name: String,
    /// Cron expression.
    pub cron_expr: String,
    /// Whether the schedule is enabled.
    pub enabled: bool,
}

/// The pipeline engine.
///
/// Wraps Cloacina's `DefaultRunner` (SQLite backend) with dynamic pipeline
/// construction from `StepTask`s and a cron surface for the fixed cadence.
pub struct PipelineEngine {
    runner: DefaultRunner,
    /// Registered pipelines by name.
    pipelines: Arc<RwLock<HashMap<String, Workflow>>>,
}

impl PipelineEngine {
    /// Initialize the engine with a SQLite database at `db_path`.
    pub async fn new(db_path: &Path, settings: EngineSettings) -> Result<Self, PipelineError> {
        let db_url = format!("sqlite://{}", db_path.display());

        let mut runner_config = DefaultRunnerConfig::default();
        runner_config.max_concurrent_tasks = settings.max_concurrent_tasks;
        runner_config.task_timeout = std::time::Duration::from_secs(settings.task_timeout_secs);
        runner_config.pipeline_timeout = Some(std::time::Duration::from_secs(
            settings.pipeline_timeout_secs,
        ));
        runner_config.enable_cron_scheduling = settings.cron_enabled;
        runner_config.enable_trigger_scheduling = false;

        let runner = DefaultRunner::with_config(&db_url, runner_config)
            .await
            .map_err(|e| PipelineError::InitFailed(e.to_string()))?;

        info!("Pipeline engine initialized with database: {}", db_url);

        Ok(Self {
            runner,
            pipelines: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Build and register a pipeline from its steps.
    ///
    /// Each step is registered in Cloacina's global task registry so the
    /// executor can find it by namespace, then the workflow is placed in the
    /// global workflow registry for the scheduler.
    pub async fn register_pipeline(
        &self,
        name: &str,
        description: &str,
        steps: Vec<StepTask>,
    ) -> Result<(), PipelineError> {
        debug!("Registering pipeline: {} ({} steps)", name, steps.len());

        let mut builder = Workflow::builder(name).description(description);

        for step in steps {
            let step = step.resolve_pipeline_name(name);
            let step = Arc::new(step);

            let namespace =
                cloacina_workflow::TaskNamespace::new("public", "embedded", name, step.id());
            let step_clone = step.clone();
            cloacina::register_task_constructor(namespace, move || step_clone.clone());

            builder = builder
                .add_task(step)
                .map_err(|e| PipelineError::InvalidPipeline(e.to_string()))?;
        }

        let workflow = builder
            .build()
            .map_err(|e| PipelineError::InvalidPipeline(e.to_string()))?;

        let wf = workflow.clone();
        cloacina::register_workflow_constructor(name.to_string(), move || wf.clone());
        self.pipelines
            .write()
            .await
            .insert(name.to_string(), workflow);

        info!("Pipeline registered: {}", name);
        Ok(())
    }

    /// Execute a registered pipeline and wait for completion.
    pub async fn execute(
        &self,
        pipeline_name: &str,
        context: Context<serde_json::Value>,
    ) -> Result<RunOutcome, PipelineError> {
        if !self.has_pipeline(pipeline_name).await {
            return Err(PipelineError::PipelineNotFound(pipeline_name.to_string()));
        }

        let result = self
            .runner
            .execute(pipeline_name, context)
            .await
            .map_err(|e| PipelineError::ExecutionFailed(e.to_string()))?;

        let status = match result.status {
            PipelineStatus::Completed => RunStatus::Completed,
            PipelineStatus::Failed => RunStatus::Failed(result.error_message.unwrap_or_default()),
            PipelineStatus::Running => RunStatus::Running,
            PipelineStatus::Cancelled => RunStatus::Failed("Cancelled".to_string()),
            _ => RunStatus::Failed("Unknown status".to_string()),
        };

        let context_data = result.final_context.into_data();
        let output = match serde_json::to_value(&context_data) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Failed to serialize run output: {e}");
                None
            }
        };

        Ok(RunOutcome {
            execution_id: result.execution_id.to_string(),
            status,
            output,
        })
    }

    /// Register the fixed cadence for a pipeline.
    ///
    /// # Arguments
    ///
    /// * `pipeline_name` - Name of the registered pipeline
    /// * `cron_expr` - Cron expression (e.g., "*/2 * * * *")
    /// * `timezone` - IANA timezone (e.g., "UTC")
    pub async fn schedule_cron(
        &self,
        pipeline_name: &str,
        cron_expr: &str,
        timezone: &str,
    ) -> Result<(), PipelineError> {
        if !self.has_pipeline(pipeline_name).await {
            return Err(PipelineError::PipelineNotFound(pipeline_name.to_string()));
        }

        self.runner
            .register_cron_workflow(pipeline_name, cron_expr, timezone)
            .await
            .map_err(|e| PipelineError::SchedulingError(e.to_string()))?;

        info!(
            "Cron schedule registered: {} ({} {})",
            pipeline_name, cron_expr, timezone
        );
        Ok(())
    }

    /// List all cron schedules known to the engine.
    pub async fn list_schedules(&self) -> Result<Vec<ScheduleInfo>, PipelineError> {
        let schedules = self
            .runner
            .list_cron_schedules(false, 100, 0)
            .await
            .map_err(|e| PipelineError::Runtime(e.to_string()))?;

        Ok(schedules
            .into_iter()
            .map(|s| ScheduleInfo {
                id: s.id.to_string(),
                pipeline_name: s.workflow_name,
                cron_expr: s.cron_expression,
                enabled: s.enabled.into(),
            })
            .collect())
    }

    /// Cancel a cron schedule by id.
    pub async fn cancel_schedule(&self, schedule_id: &str) -> Result<(), PipelineError> {
        let uuid = uuid::Uuid::parse_str(schedule_id)
            .map_err(|e| PipelineError::SchedulingError(format!("Invalid schedule ID: {}", e)))?;
        self.runner
            .delete_cron_schedule(UniversalUuid(uuid))
            .await
            .map_err(|e| PipelineError::SchedulingError(e.to_string()))?;

        info!("Cron schedule cancelled: {}", schedule_id);
        Ok(())
    }

    /// List registered pipeline names.
    pub async fn list_pipelines(&self) -> Vec<String> {
        self.pipelines.read().await.keys().cloned().collect()
    }

    /// Check whether a pipeline is registered.
    pub async fn has_pipeline(&self, name: &str) -> bool {
        self.pipelines.read().await.contains_key(name)
    }

    /// Gracefully shut down: drain running pipelines, stop background services.
    pub async fn shutdown(self) -> Result<(), PipelineError> {
        info!("Pipeline engine shutting down...");

        self.runner
            .shutdown()
            .await
            .map_err(|e| PipelineError::ShutdownFailed(e.to_string()))?;

        info!("Pipeline engine shutdown complete");
        Ok(())
    }
}
