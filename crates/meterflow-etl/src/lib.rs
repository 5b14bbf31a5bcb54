//! Extract/transform/store/load stages for the parking transaction pipeline.
//!
//! The crate splits into the stage implementations (`api`, `record`, `store`,
//! `db`) and the `workflow` module that wires them into scheduler steps. The
//! stages are plain async functions over config sections; nothing here knows
//! about cron or retries.

pub mod api;
pub mod db;
pub mod error;
pub mod record;
pub mod store;
pub mod workflow;

pub use api::MeterApi;
pub use db::ParkingDb;
pub use error::{EtlError, Result};
pub use record::{transform_batch, RawTransaction, TransactionRow, COLUMNS};
pub use store::{CsvStore, JsonStore, CSV_FILE_NAME, JSON_FILE_NAME};
pub use workflow::{build_steps, register, PIPELINE_NAME};
