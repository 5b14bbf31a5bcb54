//! Intermediate flat-file stores.
//!
//! The transformed batch lands in two places: an append-only CSV file that
//! the load stage copies into Postgres, and a JSON Lines mirror written on a
//! best-effort basis. File names are fixed; only the directories are
//! configurable.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use meterflow_config::StorageConfig;

use crate::error::{EtlError, Result};
use crate::record::{TransactionRow, COLUMNS};

/// File the CSV batches accumulate in.
pub const CSV_FILE_NAME: &str = "processed_parking_data_00.csv";

/// File the JSON Lines mirror is written to.
pub const JSON_FILE_NAME: &str = "processed_parking_data.json";

/// Append-only CSV store for transformed rows.
#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    /// Store rooted at the configured CSV directory.
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            dir: config.csv_dir.clone(),
        }
    }

    /// Full path of the CSV file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(CSV_FILE_NAME)
    }

    /// Append a batch of rows, creating the directory and file as needed.
    ///
    /// The header is written only when the file does not exist yet, so
    /// repeated runs accumulate rows under a single header.
    pub fn append(&self, rows: &[TransactionRow]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| EtlError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        let path = self.path();
        let write_header = !path.exists();

        let io_err = |e: std::io::Error| EtlError::Io {
            path: path.clone(),
            source: e,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        let mut buf = String::new();
        if write_header {
            buf.push_str(&COLUMNS.join(","));
            buf.push('\n');
        }
        for row in rows {
            let mut first = true;
            for field in row.fields() {
                if !first {
                    buf.push(',');
                }
                first = false;
                buf.push_str(&escape_csv_field(field));
            }
            buf.push('\n');
        }

        file.write_all(buf.as_bytes()).map_err(io_err)?;
        Ok(path)
    }
}

/// JSON Lines mirror of the transformed batch. Rewritten every run.
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Store rooted at the configured JSON directory.
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            dir: config.json_dir.clone(),
        }
    }

    /// Full path of the JSON Lines file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(JSON_FILE_NAME)
    }

    /// Write the batch as one JSON object per line.
    pub fn write(&self, rows: &[TransactionRow]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| EtlError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        let path = self.path();
        let mut buf = String::new();
        for row in rows {
            let line = serde_json::to_string(row)
                .map_err(|e| EtlError::MalformedResponse(e.to_string()))?;
            buf.push_str(&line);
            buf.push('\n');
        }

        std::fs::write(&path, buf).map_err(|e| EtlError::Io {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}

/// Quote a CSV field when it contains a delimiter, quote, or line break.
fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
