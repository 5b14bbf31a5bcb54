//! Error types for the ETL stages.
//!
//! There is no recovery policy here: every variant wraps a library failure
//! (or a missing upstream output) and surfaces through the scheduler's
//! task-failure path unchanged.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for ETL operations.
pub type Result<T> = std::result::Result<T, EtlError>;

/// Errors that can occur in the extract/transform/store/load stages.
#[derive(Debug, Error)]
pub enum EtlError {
    /// Configuration rejected before pipeline construction.
    #[error(transparent)]
    Config(#[from] meterflow_config::ConfigError),

    /// HTTP request failed (connection, timeout, non-success status).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not parse as the expected JSON shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Configured endpoint is not a usable URL.
    #[error("invalid endpoint URL '{0}'")]
    InvalidUrl(String),

    /// The extracted batch was empty.
    #[error("no processed parking data")]
    EmptyBatch,

    /// Filesystem failure on an intermediate file.
    #[error("io error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Database failure (connection, DDL, COPY).
    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Destination table name is not a plain identifier.
    #[error("invalid table name: '{0}'")]
    InvalidTable(String),

    /// A step expected an upstream output that is not in the context.
    #[error("missing upstream output '{0}' in pipeline context")]
    MissingContext(String),

    /// Workflow engine error during registration or execution.
    #[error("pipeline error: {0}")]
    Pipeline(String),
}

impl From<meterflow_pipeline::PipelineError> for EtlError {
    fn from(err: meterflow_pipeline::PipelineError) -> Self {
        EtlError::Pipeline(err.to_string())
    }
}
