use std::io::Write;

use csv::{ByteRecord, ReaderBuilder};
use duckdb::Connection;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::db::Database;
use crate::ingest::IngestError;

pub const IN_MEMORY: &str = ":memory:";

// DuckDB's CSV reader defaults.
const DEFAULT_MAX_LINE_SIZE: u64 = 2_000_000;
const DEFAULT_BUFFER_SIZE: u64 = 32_000_000;

/// Byte length of the longest record in a header-less CSV buffer, terminator included.
fn longest_record(csv: &[u8]) -> Result<u64, IngestError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(csv);
    let mut record = ByteRecord::new();
    let mut start = 0;
    let mut longest = 0;
    while rdr.read_byte_record(&mut record)? {
        let end = rdr.position().byte();
        longest = longest.max(end - start);
        start = end;
    }
    Ok(longest)
}

/// `COPY` options for loading `csv`, raising the reader's line and buffer limits
/// when a record is longer than the defaults allow.
fn copy_options(csv: &[u8]) -> Result<String, IngestError> {
    let mut options = String::from(
        "FORMAT CSV, HEADER false, DELIMITER ',', QUOTE '\"', ESCAPE '\"', NULL '', AUTO_DETECT false",
    );
    let max_line_size = longest_record(csv)? + 1024;
    if max_line_size > DEFAULT_MAX_LINE_SIZE {
        let buffer_size = DEFAULT_BUFFER_SIZE.max(max_line_size * 2);
        options.push_str(&format!(
            ", MAX_LINE_SIZE {}, BUFFER_SIZE {}",
            max_line_size, buffer_size
        ));
    }
    Ok(options)
}

/// DuckDB connection with driver-style implicit transactions: the first statement
/// after a commit or rollback opens a new one.
pub struct DuckDbDatabase {
    conn: Connection,
    in_transaction: bool,
}

impl DuckDbDatabase {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            in_transaction: false,
        }
    }

    /// Open a database file, or an in-memory database for `:memory:`.
    pub fn open(path: &str) -> Result<Self, IngestError> {
        let conn = if path == IN_MEMORY {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        Ok(Self::new(conn))
    }

    pub fn open_in_memory() -> Result<Self, IngestError> {
        Ok(Self::new(Connection::open_in_memory()?))
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self, IngestError> {
        Self::open(&config.path)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn ensure_transaction(&mut self) -> Result<(), IngestError> {
        if !self.in_transaction {
            self.conn.execute_batch("BEGIN TRANSACTION")?;
            self.in_transaction = true;
        }
        Ok(())
    }
}

impl Database for DuckDbDatabase {
    fn execute(&mut self, sql: &str) -> Result<(), IngestError> {
        self.ensure_transaction()?;
        debug!("Executing SQL: {}", sql);
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn bulk_load(&mut self, table: &str, csv: &[u8]) -> Result<(), IngestError> {
        self.ensure_transaction()?;
        if csv.is_empty() {
            debug!("Nothing to load into {}", table);
            return Ok(());
        }

        // COPY reads from a file, so stage the rows on disk for the statement's lifetime.
        let mut staged = tempfile::Builder::new()
            .prefix("csv-table-loader-")
            .suffix(".csv")
            .tempfile()?;
        staged.write_all(csv)?;
        staged.flush()?;

        let path = staged.path().to_string_lossy().replace('\'', "''");
        let copy_sql = format!("COPY {} FROM '{}' ({})", table, path, copy_options(csv)?);
        debug!("Executing SQL: {}", copy_sql);
        self.conn.execute_batch(&copy_sql)?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), IngestError> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), IngestError> {
        if self.in_transaction {
            self.in_transaction = false;
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn row_count(&mut self, table: &str) -> Result<i64, IngestError> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let count = self.conn.query_row(&sql, [], |row| row.get::<_, i64>(0))?;
        Ok(count)
    }
}
