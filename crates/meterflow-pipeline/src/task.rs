//! Runtime-constructed pipeline steps.
//!
//! `StepTask` is a concrete implementation of Cloacina's `Task` trait built at
//! runtime without macros. Each ETL stage supplies an async closure over the
//! shared context; dependencies are declared by short id and resolved to full
//! namespaces at registration time.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cloacina_workflow::context::Context;
use cloacina_workflow::error::TaskError;
use cloacina_workflow::namespace::TaskNamespace;
use cloacina_workflow::retry::RetryPolicy;
use cloacina_workflow::task::Task;

/// Async function executed by a step: owned context in, updated context out.
pub type StepFn = Arc<
    dyn Fn(
            Context<serde_json::Value>,
        ) -> Pin<
            Box<
                dyn Future<Output = std::result::Result<Context<serde_json::Value>, TaskError>>
                    + Send,
            >,
        > + Send
        + Sync,
>;

/// Build a `TaskError` for a failing step. Convenience for step closures.
pub fn step_error(task_id: &str, message: impl Into<String>) -> TaskError {
    TaskError::ExecutionFailed {
        message: message.into(),
        task_id: task_id.to_string(),
        timestamp: chrono::Utc::now(),
    }
}

/// A single stage of the pipeline, wired into the scheduler's DAG.
pub struct StepTask {
    id: String,
    dependencies: Vec<TaskNamespace>,
    retry_policy: RetryPolicy,
    execute_fn: StepFn,
}

impl StepTask {
    /// Create a new step with the given id and body.
    pub fn new(id: impl Into<String>, execute_fn: StepFn) -> Self {
        Self {
            id: id.into(),
            dependencies: Vec::new(),
            retry_policy: RetryPolicy::default(),
            execute_fn,
        }
    }

    /// Declare that this step runs after another step in the same pipeline.
    ///
    /// The pipeline name is not known yet at construction time; a placeholder
    /// namespace is recorded and resolved during registration.
    pub fn depends_on(mut self, task_id: &str) -> Self {
        self.dependencies.push(TaskNamespace::new(
            "public",
            "embedded",
            "__pending__",
            task_id,
        ));
        self
    }

    /// Set the scheduler-native retry policy: total attempts and the delay
    /// between them. Everything else stays at the scheduler's defaults.
    pub fn with_retries(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_policy = RetryPolicy {
            max_attempts: attempts as i32,
            initial_delay: delay,
            ..RetryPolicy::default()
        };
        self
    }

    /// Resolve placeholder dependency namespaces with the actual pipeline name.
    pub(crate) fn resolve_pipeline_name(mut self, pipeline_name: &str) -> Self {
        for ns in &mut self.dependencies {
            if ns.workflow_id == "__pending__" {
                ns.workflow_id = pipeline_name.to_string();
            }
        }
        self
    }
}

impl std::fmt::Debug for StepTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepTask")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

#[async_trait]
impl Task for StepTask {
    async fn execute(
        &self,
        context: Context<serde_json::Value>,
    ) -> std::result::Result<Context<serde_json::Value>, TaskError> {
        (self.execute_fn)(context).await
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[TaskNamespace] {
        &self.dependencies
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> StepFn {
        Arc::new(|ctx| Box::pin(async move { Ok(ctx) }))
    }

    #[test]
    fn step_id() {
        let step = StepTask::new("extract_transactions", noop());
        assert_eq!(step.id(), "extract_transactions");
        assert!(step.dependencies().is_empty());
    }

    #[test]
    fn depends_on_records_placeholder() {
        let step = StepTask::new("transform", noop()).depends_on("extract");
        assert_eq!(step.dependencies().len(), 1);
        assert_eq!(step.dependencies()[0].workflow_id, "__pending__");
        assert_eq!(step.dependencies()[0].task_id, "extract");
    }

    #[test]
    fn resolve_pipeline_name_fills_placeholders() {
        let step = StepTask::new("load", noop())
            .depends_on("store_csv")
            .depends_on("store_json")
            .resolve_pipeline_name("parking_pipeline");
        assert_eq!(step.dependencies().len(), 2);
        for ns in step.dependencies() {
            assert_eq!(ns.workflow_id, "parking_pipeline");
        }
    }

    #[test]
    fn with_retries_sets_policy() {
        let step =
            StepTask::new("check_api", noop()).with_retries(2, Duration::from_secs(600));
        assert_eq!(step.retry_policy().max_attempts, 2);
        assert_eq!(
            step.retry_policy().initial_delay,
            Duration::from_secs(600)
        );
    }

    #[test]
    fn default_retry_policy() {
        let step = StepTask::new("t", noop());
        assert_eq!(step.retry_policy(), RetryPolicy::default());
    }

    #[tokio::test]
    async fn execute_runs_body() {
        let step = StepTask::new(
            "counter",
            Arc::new(|mut ctx| {
                Box::pin(async move {
                    ctx.insert("rows", json!(50)).unwrap();
                    Ok(ctx)
                })
            }),
        );
        let ctx = step.execute(Context::new()).await.unwrap();
        assert_eq!(ctx.get("rows"), Some(&json!(50)));
    }

    #[tokio::test]
    async fn execute_surfaces_step_error() {
        let step = StepTask::new(
            "check_api",
            Arc::new(|_ctx| {
                Box::pin(async move { Err(step_error("check_api", "endpoint unreachable")) })
            }),
        );
        let err = step.execute(Context::new()).await.unwrap_err();
        assert!(err.to_string().contains("endpoint unreachable"));
    }

    #[test]
    fn debug_lists_id_and_deps() {
        let step = StepTask::new("transform", noop()).depends_on("extract");
        let rendered = format!("{step:?}");
        assert!(rendered.contains("transform"));
        assert!(rendered.contains("extract"));
    }
}
