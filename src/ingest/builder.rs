use std::path::Path;

use tracing::{debug, info, warn};

use crate::ingest::frame::{Frame, UNNAMED_INDEX};
use crate::ingest::schema::{map_type, ColumnSchema, StorageType};
use crate::ingest::IngestError;

/// Column descriptors for a file plus its rows, re-serialized for a bulk load.
#[derive(Debug, Clone)]
pub struct DerivedSchema {
    /// Ordered descriptors; the first is the primary key column.
    pub columns: Vec<ColumnSchema>,
    /// Header-less CSV rows in the column order of `columns`.
    pub buffer: Vec<u8>,
    pub row_count: usize,
}

/// Read a CSV file and derive its table schema.
///
/// Without `index_column` a zero-based `index` column is generated and leads the
/// table; otherwise the named column is moved to the front. Columns listed in
/// `timestamp_columns` are parsed as timestamps before types are inferred.
pub fn derive_schema(
    path: &Path,
    index_column: Option<&str>,
    timestamp_columns: &[String],
) -> Result<DerivedSchema, IngestError> {
    info!("Reading CSV file: {}", path.display());
    let frame = Frame::from_csv_path(path)?;
    derive_schema_from_frame(frame, index_column, timestamp_columns)
}

pub fn derive_schema_from_frame(
    mut frame: Frame,
    index_column: Option<&str>,
    timestamp_columns: &[String],
) -> Result<DerivedSchema, IngestError> {
    for name in timestamp_columns {
        frame.parse_timestamps(name)?;
    }

    if frame.drop_column(UNNAMED_INDEX) {
        debug!("Dropped '{}' column", UNNAMED_INDEX);
    }

    match index_column {
        Some(name) => frame.move_to_front(name)?,
        None => {
            let name = frame.insert_row_index()?;
            debug!("Generated row index column '{}'", name);
        }
    }

    frame.infer_objects();

    let mut columns = Vec::with_capacity(frame.columns().len());
    for column in frame.columns() {
        let dtype = column.series.dtype_name();
        let data_type = map_type(&column.name, dtype)?;
        debug!("Column '{}': {} -> {}", column.name, dtype, data_type);

        if data_type == StorageType::Date && column.series.has_time_of_day() {
            warn!(
                "Column '{}' has times of day that DATE storage truncates",
                column.name
            );
        }
        columns.push(ColumnSchema::new(column.name.clone(), data_type));
    }

    let storage: Vec<StorageType> = columns.iter().map(|c| c.data_type).collect();
    let buffer = frame.write_csv(&storage)?;

    info!(
        "Derived schema with {} columns for {} rows",
        columns.len(),
        frame.row_count()
    );

    Ok(DerivedSchema {
        columns,
        buffer,
        row_count: frame.row_count(),
    })
}
