use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};

use crate::ingest::schema::StorageType;
use crate::ingest::IngestError;

/// Header left behind by an export that wrote its row index without a name.
pub const UNNAMED_INDEX: &str = "Unnamed: 0";

/// Name of the generated row-number column.
pub const SYNTHETIC_INDEX: &str = "index";

/// Row-number column name used when the file already has an `index` column.
pub const SYNTHETIC_INDEX_FALLBACK: &str = "level_0";

// Tokens read as missing values.
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const TRUE_VALUES: &[&str] = &["True", "TRUE", "true"];
const FALSE_VALUES: &[&str] = &["False", "FALSE", "false"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%a %b %d %H:%M:%S %Y",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%b %d %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
];

/// Values of one column, typed by the elemental type detected for it.
#[derive(Debug, Clone, PartialEq)]
pub enum Series {
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Object(Vec<Option<String>>),
    Datetime(Vec<Option<NaiveDateTime>>),
}

impl Series {
    pub fn len(&self) -> usize {
        match self {
            Series::Int64(v) => v.len(),
            Series::Float64(v) => v.len(),
            Series::Bool(v) => v.len(),
            Series::Object(v) => v.len(),
            Series::Datetime(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elemental type name fed to `map_type`.
    pub fn dtype_name(&self) -> &'static str {
        match self {
            Series::Int64(_) => "int64",
            Series::Float64(_) => "float64",
            Series::Bool(_) => "bool",
            Series::Object(_) => "object",
            Series::Datetime(_) => "datetime64[ns]",
        }
    }

    /// Text form of a value, `None` for a missing one.
    pub fn raw_value(&self, row: usize) -> Option<String> {
        self.render(row, StorageType::Timestamp)
    }

    /// Text form of a value for a column stored as `storage`.
    pub fn render(&self, row: usize, storage: StorageType) -> Option<String> {
        match self {
            Series::Int64(v) => v[row].map(|x| x.to_string()),
            Series::Float64(v) => v[row].map(|x| x.to_string()),
            Series::Bool(v) => v[row].map(|x| x.to_string()),
            Series::Object(v) => v[row].clone(),
            Series::Datetime(v) => v[row].map(|ts| match storage {
                StorageType::Date => ts.format("%Y-%m-%d").to_string(),
                StorageType::Time => ts.format("%H:%M:%S%.f").to_string(),
                _ => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            }),
        }
    }

    /// True when any timestamp carries a time of day other than midnight.
    pub fn has_time_of_day(&self) -> bool {
        match self {
            Series::Datetime(v) => v
                .iter()
                .flatten()
                .any(|ts| ts.num_seconds_from_midnight() != 0 || ts.nanosecond() != 0),
            _ => false,
        }
    }

    /// Narrow a text column to the first type that holds every present value:
    /// int64, then float64, then bool. An empty column stays text, an all-missing one
    /// becomes float64. Other series are returned unchanged.
    pub fn infer_objects(self) -> Series {
        let values = match self {
            Series::Object(values) => values,
            other => return other,
        };

        if values.is_empty() {
            return Series::Object(values);
        }

        let present: Vec<&str> = values.iter().flatten().map(|s| s.trim()).collect();
        if present.is_empty() {
            return Series::Float64(vec![None; values.len()]);
        }

        if present.iter().all(|s| s.parse::<i64>().is_ok()) {
            return Series::Int64(
                values
                    .iter()
                    .map(|v| v.as_deref().and_then(|s| s.trim().parse().ok()))
                    .collect(),
            );
        }

        if present.iter().all(|s| s.parse::<f64>().is_ok()) {
            return Series::Float64(
                values
                    .iter()
                    .map(|v| v.as_deref().and_then(|s| s.trim().parse().ok()))
                    .collect(),
            );
        }

        if present.iter().all(|s| parse_bool(s).is_some()) {
            return Series::Bool(
                values
                    .iter()
                    .map(|v| v.as_deref().and_then(|s| parse_bool(s.trim())))
                    .collect(),
            );
        }

        Series::Object(values)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    if TRUE_VALUES.contains(&s) {
        Some(true)
    } else if FALSE_VALUES.contains(&s) {
        Some(false)
    } else {
        None
    }
}

fn non_missing(field: &str) -> Option<String> {
    if NA_VALUES.contains(&field) {
        None
    } else {
        Some(field.to_string())
    }
}

// `Wed May 21 00:00:00 EDT 2008` -> `Wed May 21 00:00:00 2008`
fn strip_zone_abbreviation(raw: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for token in raw.split_whitespace() {
        let after_time = kept.last().is_some_and(|prev| prev.contains(':'));
        let is_zone = (2..=5).contains(&token.len()) && token.chars().all(|c| c.is_ascii_uppercase());
        if after_time && is_zone {
            continue;
        }
        kept.push(token);
    }
    kept.join(" ")
}

/// Parse a timestamp written in one of the accepted layouts.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_local());
    }

    let cleaned = strip_zone_abbreviation(raw);
    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(&cleaned, format) {
            return Some(ts);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub series: Series,
}

/// In-memory table read from a CSV file: named columns of equal length.
/// Column names may repeat.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    columns: Vec<Column>,
    row_count: usize,
}

impl Frame {
    pub fn from_csv_path(path: &Path) -> Result<Self, IngestError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Read a headed CSV stream. Empty header cells are named `Unnamed: <position>`,
    /// short rows are padded with missing values.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, IngestError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        if headers.is_empty() {
            return Err(IngestError::ParsingError(
                "No columns to parse from file".to_string(),
            ));
        }

        let names: Vec<String> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| {
                if name.is_empty() {
                    format!("Unnamed: {}", i)
                } else {
                    name.to_string()
                }
            })
            .collect();

        let width = names.len();
        let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
        let mut row_count = 0;

        for record in rdr.records() {
            let record = record?;
            if record.len() > width {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                return Err(IngestError::ParsingError(format!(
                    "Expected {} fields in line {}, saw {}",
                    width,
                    line,
                    record.len()
                )));
            }
            for (i, column) in values.iter_mut().enumerate() {
                column.push(record.get(i).and_then(non_missing));
            }
            row_count += 1;
        }

        let columns = names
            .into_iter()
            .zip(values)
            .map(|(name, values)| Column {
                name,
                series: Series::Object(values),
            })
            .collect();

        Ok(Self { columns, row_count })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Remove every column called `name`. Returns whether anything was removed.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| c.name != name);
        self.columns.len() != before
    }

    /// Move the first column called `name` to position 0. Other columns sharing
    /// the name stay where they are.
    pub fn move_to_front(&mut self, name: &str) -> Result<(), IngestError> {
        let position = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| IngestError::MissingColumn(name.to_string()))?;
        let column = self.columns.remove(position);
        self.columns.insert(0, column);
        Ok(())
    }

    /// Prepend a zero-based row number column named `index`, or `level_0` when an
    /// `index` column already exists. Returns the name used.
    ///
    /// # Errors
    ///
    /// `ParsingError` when both names are taken.
    pub fn insert_row_index(&mut self) -> Result<&'static str, IngestError> {
        let taken = |name: &str| self.columns.iter().any(|c| c.name == name);
        let name = if !taken(SYNTHETIC_INDEX) {
            SYNTHETIC_INDEX
        } else if !taken(SYNTHETIC_INDEX_FALLBACK) {
            SYNTHETIC_INDEX_FALLBACK
        } else {
            return Err(IngestError::ParsingError(format!(
                "Cannot insert row index: columns '{}' and '{}' already exist",
                SYNTHETIC_INDEX, SYNTHETIC_INDEX_FALLBACK
            )));
        };

        let series = Series::Int64((0..self.row_count as i64).map(Some).collect());
        self.columns.insert(
            0,
            Column {
                name: name.to_string(),
                series,
            },
        );
        Ok(name)
    }

    /// Parse every column called `name` as timestamps. Missing values stay missing.
    ///
    /// # Errors
    ///
    /// `MissingColumn` when no column has that name, `MalformedTimestamp` with the
    /// first value that matches no accepted layout.
    pub fn parse_timestamps(&mut self, name: &str) -> Result<(), IngestError> {
        let mut found = false;
        for column in self.columns.iter_mut().filter(|c| c.name == name) {
            found = true;
            if matches!(column.series, Series::Datetime(_)) {
                continue;
            }

            let mut parsed = Vec::with_capacity(column.series.len());
            for row in 0..column.series.len() {
                let value = match column.series.raw_value(row) {
                    Some(raw) => Some(parse_timestamp(&raw).ok_or_else(|| {
                        IngestError::MalformedTimestamp {
                            column: column.name.clone(),
                            value: raw.clone(),
                        }
                    })?),
                    None => None,
                };
                parsed.push(value);
            }
            column.series = Series::Datetime(parsed);
        }

        if found {
            Ok(())
        } else {
            Err(IngestError::MissingColumn(name.to_string()))
        }
    }

    pub fn infer_objects(&mut self) {
        for column in &mut self.columns {
            let series = std::mem::replace(&mut column.series, Series::Object(Vec::new()));
            column.series = series.infer_objects();
        }
    }

    /// Serialize the rows, without a header, as comma-separated text. Fields holding
    /// a delimiter, quote or line break are quoted; missing values are empty fields.
    /// `storage` gives the storage type of each column, in column order.
    pub fn write_csv(&self, storage: &[StorageType]) -> Result<Vec<u8>, IngestError> {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .quote_style(QuoteStyle::Necessary)
            .from_writer(Vec::new());

        let mut record: Vec<String> = Vec::with_capacity(self.columns.len());
        for row in 0..self.row_count {
            record.clear();
            for (column, ty) in self.columns.iter().zip(storage) {
                record.push(column.series.render(row, *ty).unwrap_or_default());
            }
            writer.write_record(&record)?;
        }

        writer
            .into_inner()
            .map_err(|e| IngestError::IoError(e.into_error()))
    }
}
