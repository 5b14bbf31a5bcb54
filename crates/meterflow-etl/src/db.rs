//! Destination database: table setup and bulk load.
//!
//! One table, ten text columns, loaded by streaming the intermediate CSV
//! through `COPY ... FROM STDIN`. Connections are opened per task run, the
//! way the upstream pipeline's database hook behaves.

use std::path::Path;

use bytes::Bytes;
use futures_util::SinkExt;
use tokio_postgres::{Client, Config as PgConfig, NoTls};
use tracing::{debug, info};

use meterflow_config::DatabaseConfig;

use crate::error::{EtlError, Result};
use crate::record::COLUMNS;

/// Column DDL, in destination order. All text, as served by the feed.
const COLUMN_TYPE: &str = "TEXT NOT NULL";

/// Connected handle to the destination database.
pub struct ParkingDb {
    client: Client,
    table: String,
}

/// Full recreate statement for the destination table.
pub fn create_table_sql(table: &str) -> String {
    let column_defs = COLUMNS
        .iter()
        .map(|col| format!("    {col} {COLUMN_TYPE}"))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("DROP TABLE IF EXISTS {table};\nCREATE TABLE {table} (\n{column_defs}\n);")
}

/// COPY statement for loading the intermediate CSV, header skipped.
pub fn copy_from_csv_sql(table: &str) -> String {
    format!("COPY {table} FROM STDIN WITH (FORMAT csv, HEADER true)")
}

/// Reject table names that are not plain identifiers before they reach SQL.
fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let head_ok = chars
        .next()
        .map(|c| c.is_ascii_lowercase() || c == '_')
        .unwrap_or(false);
    if head_ok && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        Ok(())
    } else {
        Err(EtlError::InvalidTable(table.to_string()))
    }
}

impl ParkingDb {
    /// Connect using the `[database]` config section.
    ///
    /// The connection half is driven by a spawned task for the lifetime of
    /// the client, as tokio-postgres requires.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        validate_table_name(&config.table)?;

        let mut pg = PgConfig::new();
        pg.host(&config.host);
        pg.port(config.port);
        pg.user(&config.user);
        if !config.password.is_empty() {
            pg.password(&config.password);
        }
        pg.dbname(&config.dbname);

        let (client, connection) = pg.connect(NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!("postgres connection error: {e}");
            }
        });

        debug!(
            host = %config.host,
            port = config.port,
            dbname = %config.dbname,
            "connected to destination database"
        );

        Ok(Self {
            client,
            table: config.table.clone(),
        })
    }

    /// Destination table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Cheap connectivity probe.
    pub async fn validate(&self) -> Result<()> {
        self.client.query_one("SELECT 1", &[]).await?;
        Ok(())
    }

    /// Drop and recreate the destination table.
    pub async fn ensure_table(&self) -> Result<()> {
        self.client
            .batch_execute(&create_table_sql(&self.table))
            .await?;
        info!(table = %self.table, "destination table recreated");
        Ok(())
    }

    /// Stream the CSV file into the table. Returns the loaded row count.
    pub async fn load_csv(&self, path: &Path) -> Result<u64> {
        let contents = tokio::fs::read(path).await.map_err(|e| EtlError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let sink = self.client.copy_in(&copy_from_csv_sql(&self.table)).await?;
        let mut sink = Box::pin(sink);

        sink.send(Bytes::from(contents)).await?;
        let rows = sink.as_mut().finish().await?;

        info!(table = %self.table, rows, "CSV batch loaded");
        Ok(rows)
    }

    /// Total rows currently in the table.
    pub async fn row_count(&self) -> Result<i64> {
        let row = self
            .client
            .query_one(&format!("SELECT COUNT(*) FROM {}", self.table), &[])
            .await?;
        Ok(row.get(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_lists_every_column() {
        let sql = create_table_sql("parking_data");
        assert!(sql.starts_with("DROP TABLE IF EXISTS parking_data;"));
        assert!(sql.contains("CREATE TABLE parking_data"));
        for col in COLUMNS {
            assert!(sql.contains(&format!("{col} TEXT NOT NULL")), "missing {col}");
        }
        assert_eq!(sql.matches("TEXT NOT NULL").count(), COLUMNS.len());
    }

    #[test]
    fn copy_statement_skips_header() {
        let sql = copy_from_csv_sql("parking_data");
        assert_eq!(
            sql,
            "COPY parking_data FROM STDIN WITH (FORMAT csv, HEADER true)"
        );
    }

    #[test]
    fn table_names_are_validated() {
        validate_table_name("parking_data").unwrap();
        validate_table_name("_staging2").unwrap();
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2fast").is_err());
        assert!(validate_table_name("parking_data; DROP TABLE x").is_err());
        assert!(validate_table_name("Parking").is_err());
    }
}
