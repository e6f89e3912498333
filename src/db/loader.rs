use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::db::{Database, DuckDbDatabase};
use crate::ingest::builder::derive_schema;
use crate::ingest::schema::{ColumnSchema, TableSchema};
use crate::ingest::IngestError;

/// Outcome of a committed upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    pub table: String,
    /// The replace-table script that was executed.
    pub statement: String,
    pub columns: Vec<ColumnSchema>,
    /// Rows in the table after commit.
    pub rows_loaded: i64,
}

/// Creates a table from a CSV file's derived schema and bulk-loads its rows.
///
/// Each upload derives its own schema and buffer. Nothing is rolled back on failure:
/// an upload that fails after the DDL leaves the transaction open for the caller.
pub struct TableLoader<D: Database> {
    db: D,
    schema: Option<String>,
}

impl TableLoader<DuckDbDatabase> {
    pub fn from_config(config: &DatabaseConfig) -> Result<Self, IngestError> {
        let db = DuckDbDatabase::from_config(config)?;
        Ok(Self::new(db).with_schema(config.schema.clone()))
    }
}

impl<D: Database> TableLoader<D> {
    pub fn new(db: D) -> Self {
        Self { db, schema: None }
    }

    /// Create tables inside `schema` instead of the default one.
    pub fn with_schema(mut self, schema: Option<String>) -> Self {
        self.schema = schema;
        self
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn database_mut(&mut self) -> &mut D {
        &mut self.db
    }

    pub fn into_inner(self) -> D {
        self.db
    }

    fn table_schema(&self, columns: &[ColumnSchema], table: &str) -> TableSchema {
        TableSchema::new(table, columns.to_vec()).with_schema(self.schema.clone())
    }

    /// Drop and recreate `table` with the given columns, the first as primary key.
    /// Returns the statement text that was executed.
    pub fn create_table(
        &mut self,
        columns: &[ColumnSchema],
        table: &str,
    ) -> Result<String, IngestError> {
        let statement = self.table_schema(columns, table).to_create_table_sql();
        self.db.execute(&statement)?;
        info!("Created table {} with {} columns", table, columns.len());
        Ok(statement)
    }

    /// Load a CSV file into a freshly created table and commit.
    pub fn upload(
        &mut self,
        path: &Path,
        table: &str,
        index_column: Option<&str>,
        timestamp_columns: &[String],
    ) -> Result<UploadSummary, IngestError> {
        let derived = derive_schema(path, index_column, timestamp_columns)?;
        let statement = self.create_table(&derived.columns, table)?;

        let target = self.table_schema(&derived.columns, table).qualified_name();
        info!(
            "Bulk loading {} rows ({} bytes) into {}",
            derived.row_count,
            derived.buffer.len(),
            target
        );
        self.db.bulk_load(&target, &derived.buffer)?;
        self.db.commit()?;

        let rows_loaded = self.verify_upload(table)?;
        if rows_loaded != derived.row_count as i64 {
            warn!(
                "Table {} holds {} rows, file had {}",
                target, rows_loaded, derived.row_count
            );
        }

        Ok(UploadSummary {
            table: table.to_string(),
            statement,
            columns: derived.columns,
            rows_loaded,
        })
    }

    /// Count the rows of `table`.
    pub fn verify_upload(&mut self, table: &str) -> Result<i64, IngestError> {
        let target = self.table_schema(&[], table).qualified_name();
        let count = self.db.row_count(&target)?;
        info!("Verified table {} exists with {} rows", target, count);
        Ok(count)
    }
}
