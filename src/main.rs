use clap::Parser;
use tracing::{error, info};

use csv_table_loader::config::{AppConfig, CliArgs};
use csv_table_loader::db::TableLoader;
use csv_table_loader::ingest::{derive_schema, TableSchema};
use csv_table_loader::util::logging::init_tracing;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = AppConfig::new(&args)?;

    init_tracing(config.logging.format);

    let table = args.table_name();

    if args.schema_only {
        let derived = derive_schema(&args.file, args.index_col.as_deref(), &args.datetime_cols)?;
        let schema =
            TableSchema::new(table, derived.columns).with_schema(config.database.schema.clone());
        println!("{}", serde_json::to_string_pretty(&schema)?);
        println!("{}", schema.to_create_table_sql());
        return Ok(());
    }

    info!("Opening DuckDB database: {}", config.database.path);
    let mut loader = TableLoader::from_config(&config.database)?;

    match loader.upload(
        &args.file,
        &table,
        args.index_col.as_deref(),
        &args.datetime_cols,
    ) {
        Ok(summary) => {
            info!(
                "Loaded {} rows into {} ({} columns)",
                summary.rows_loaded,
                summary.table,
                summary.columns.len()
            );
            Ok(())
        }
        Err(e) => {
            error!("Upload of {} failed: {}", args.file.display(), e);
            Err(e.into())
        }
    }
}
