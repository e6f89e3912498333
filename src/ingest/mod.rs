// CSV ingestion: read a file into a frame, infer a schema from its columns and
// re-serialize the rows for a bulk load.
pub mod builder;
pub mod frame;
pub mod schema;

use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum IngestError {
    IoError(std::io::Error),
    ParsingError(String),
    MissingColumn(String),
    UnsupportedColumnType { column: String, dtype: String },
    MalformedTimestamp { column: String, value: String },
    DatabaseError(String),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::IoError(err) => write!(f, "IO error: {}", err),
            IngestError::ParsingError(msg) => write!(f, "Parsing error: {}", msg),
            IngestError::MissingColumn(name) => write!(f, "Column not found: {}", name),
            IngestError::UnsupportedColumnType { column, dtype } => {
                write!(f, "Unsupported column type '{}' for column '{}'", dtype, column)
            }
            IngestError::MalformedTimestamp { column, value } => {
                write!(f, "Malformed timestamp '{}' in column '{}'", value, column)
            }
            IngestError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl Error for IngestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            IngestError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::IoError(err)
    }
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            if let csv::ErrorKind::Io(io) = err.into_kind() {
                return IngestError::IoError(io);
            }
            return IngestError::ParsingError("CSV I/O failure".to_string());
        }
        IngestError::ParsingError(err.to_string())
    }
}

// Database errors can quote a whole rejected row.
const MAX_DATABASE_MESSAGE: usize = 1024;

fn truncate_message(mut msg: String) -> String {
    if msg.len() > MAX_DATABASE_MESSAGE {
        let mut end = MAX_DATABASE_MESSAGE;
        while !msg.is_char_boundary(end) {
            end -= 1;
        }
        let omitted = msg.len() - end;
        msg.truncate(end);
        msg.push_str(&format!("... ({} bytes omitted)", omitted));
    }
    msg
}

impl From<duckdb::Error> for IngestError {
    fn from(err: duckdb::Error) -> Self {
        IngestError::DatabaseError(truncate_message(err.to_string()))
    }
}

pub use builder::{derive_schema, DerivedSchema};
pub use schema::{map_type, quote_identifier, ColumnSchema, StorageType, TableSchema};
