//! Create a relational table from a CSV file: infer a column type for every column,
//! issue `DROP TABLE IF EXISTS` / `CREATE TABLE`, then bulk-load the rows with `COPY`.
pub mod config;
pub mod db;
pub mod ingest;
pub mod util;

pub use db::{Database, DuckDbDatabase, TableLoader, UploadSummary};
pub use ingest::{derive_schema, DerivedSchema, IngestError};
