pub mod connection;
pub mod loader;

use crate::ingest::IngestError;

/// The database operations an upload needs.
///
/// Table arguments are already-quoted, optionally schema-qualified references.
pub trait Database {
    /// Run one or more SQL statements inside the current transaction, opening one if needed.
    fn execute(&mut self, sql: &str) -> Result<(), IngestError>;

    /// Copy header-less CSV rows into `table` inside the current transaction.
    fn bulk_load(&mut self, table: &str, csv: &[u8]) -> Result<(), IngestError>;

    fn commit(&mut self) -> Result<(), IngestError>;

    fn rollback(&mut self) -> Result<(), IngestError>;

    fn row_count(&mut self, table: &str) -> Result<i64, IngestError>;
}

pub use connection::DuckDbDatabase;
pub use loader::{TableLoader, UploadSummary};
