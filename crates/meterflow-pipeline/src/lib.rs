//! Workflow engine wrapper for the meterflow ETL pipeline.
//!
//! Wraps Cloacina's `DefaultRunner` (SQLite backend) behind a narrow API:
//! register a pipeline built from `StepTask`s, execute it once, or hand its
//! cadence to the scheduler's cron service. Retry, ordering, and persistence
//! semantics are the scheduler's defaults throughout.

pub mod engine;
pub mod error;
pub mod task;

pub use engine::{EngineSettings, PipelineEngine, RunOutcome, RunStatus, ScheduleInfo};
pub use error::{PipelineError, Result};
pub use task::{step_error, StepFn, StepTask};

/// Re-exported so callers can seed and inspect the shared pipeline context,
/// raise task failures, and introspect steps without importing the scheduler
/// crate directly.
pub use cloacina_workflow::context::Context;
pub use cloacina_workflow::error::TaskError;
pub use cloacina_workflow::task::Task;
