use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ingest::IngestError;

/// Column storage types the loader can emit in a `CREATE TABLE` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageType {
    #[serde(rename = "SMALLINT")]
    SmallInt,
    #[serde(rename = "INTEGER")]
    Integer,
    #[serde(rename = "BIGINT")]
    BigInt,
    #[serde(rename = "VARCHAR")]
    Varchar,
    #[serde(rename = "NUMERIC")]
    Numeric,
    #[serde(rename = "FLOAT")]
    Float,
    #[serde(rename = "DOUBLE PRECISION")]
    DoublePrecision,
    #[serde(rename = "DATE")]
    Date,
    #[serde(rename = "TIME")]
    Time,
    #[serde(rename = "TIMESTAMP")]
    Timestamp,
    #[serde(rename = "INTERVAL")]
    Interval,
    #[serde(rename = "BYTEA")]
    Bytea,
    #[serde(rename = "BOOLEAN")]
    Boolean,
    #[serde(rename = "ARRAY")]
    Array,
    #[serde(rename = "JSON")]
    Json,
}

impl StorageType {
    pub fn to_sql_type(&self) -> &'static str {
        match self {
            StorageType::SmallInt => "SMALLINT",
            StorageType::Integer => "INTEGER",
            StorageType::BigInt => "BIGINT",
            StorageType::Varchar => "VARCHAR",
            StorageType::Numeric => "NUMERIC",
            StorageType::Float => "FLOAT",
            StorageType::DoublePrecision => "DOUBLE PRECISION",
            StorageType::Date => "DATE",
            StorageType::Time => "TIME",
            StorageType::Timestamp => "TIMESTAMP",
            StorageType::Interval => "INTERVAL",
            StorageType::Bytea => "BYTEA",
            StorageType::Boolean => "BOOLEAN",
            StorageType::Array => "ARRAY",
            StorageType::Json => "JSON",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_sql_type())
    }
}

// Precision/unit suffix such as `[ns]` or `[ns, UTC]`.
static BRACKET_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.*\]$").expect("static regex is valid"));

/// Maps a detected elemental type name (`int64`, `object`, `datetime64[ns]`, ...)
/// to the storage type of the column.
///
/// Integer widths map by size, floats below double precision collapse to `FLOAT`,
/// text-like names to `VARCHAR`. Names are compared case-insensitively after the
/// bracketed suffix is removed.
///
/// # Errors
///
/// Returns `IngestError::UnsupportedColumnType` naming the column and the detected
/// type when the base name has no entry in the table.
pub fn map_type(column: &str, dtype: &str) -> Result<StorageType, IngestError> {
    let base = BRACKET_SUFFIX.replace(dtype.trim(), "").to_ascii_lowercase();

    let storage = match base.as_str() {
        "int8" | "int16" | "uint8" | "uint16" => StorageType::SmallInt,
        "int" | "int32" | "uint" | "uint32" => StorageType::Integer,
        "int64" | "uint64" => StorageType::BigInt,
        "float16" | "float32" => StorageType::Float,
        "float" | "float64" => StorageType::DoublePrecision,
        "decimal" => StorageType::Numeric,
        "object" | "str" | "string" | "unicode" | "category" => StorageType::Varchar,
        "bool" | "boolean" => StorageType::Boolean,
        "bytes" | "bytes_" | "bytearray" => StorageType::Bytea,
        "datetime64" | "date" => StorageType::Date,
        "datetime" | "timestamp" => StorageType::Timestamp,
        "time" => StorageType::Time,
        "timedelta64" | "timedelta" => StorageType::Interval,
        "list" | "tuple" => StorageType::Array,
        "dict" => StorageType::Json,
        _ => {
            return Err(IngestError::UnsupportedColumnType {
                column: column.to_string(),
                dtype: dtype.to_string(),
            });
        }
    };

    Ok(storage)
}

/// Quote an identifier for DDL: wrap in double quotes, doubling embedded quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    let escaped = name.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: StorageType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: StorageType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    pub fn to_sql_definition(&self) -> String {
        format!("{} {}", quote_identifier(&self.name), self.data_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    /// Optional schema (namespace) the table is created in.
    pub schema: Option<String>,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            columns,
        }
    }

    pub fn with_schema(mut self, schema: Option<String>) -> Self {
        self.schema = schema;
        self
    }

    /// Quoted, optionally schema-qualified table reference.
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(&self.name)),
            None => quote_identifier(&self.name),
        }
    }

    /// Render the replace-table script. The first column is the primary key.
    pub fn to_create_table_sql(&self) -> String {
        let columns_sql: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let mut def = col.to_sql_definition();
                if i == 0 {
                    def.push_str(" PRIMARY KEY");
                }
                def
            })
            .collect();

        let table = self.qualified_name();
        let mut sql = String::new();
        if let Some(schema) = &self.schema {
            sql.push_str(&format!(
                "CREATE SCHEMA IF NOT EXISTS {}; ",
                quote_identifier(schema)
            ));
        }
        sql.push_str(&format!(
            "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({});",
            columns_sql.join(", ")
        ));
        sql
    }
}
