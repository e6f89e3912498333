use clap::{Parser, ValueEnum};
use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// DuckDB database file, or `:memory:`.
    pub path: String,
    /// Schema to create tables in; the database default when absent.
    pub schema: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Create a table from a CSV file and bulk-load its rows", long_about = None)]
pub struct CliArgs {
    /// CSV file to load
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Table to create; defaults to the file name without extension
    #[arg(short, long)]
    pub table: Option<String>,

    /// Column to use as primary key; a row-number `index` column is generated otherwise
    #[arg(short, long)]
    pub index_col: Option<String>,

    /// Columns to parse as timestamps
    #[arg(short, long, value_delimiter = ',')]
    pub datetime_cols: Vec<String>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// DuckDB database file
    #[arg(long)]
    pub database: Option<String>,

    /// Schema to create the table in
    #[arg(long)]
    pub schema: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Print the derived schema and DDL without touching the database
    #[arg(long)]
    pub schema_only: bool,
}

impl CliArgs {
    pub fn table_name(&self) -> String {
        self.table.clone().unwrap_or_else(|| {
            self.file
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("data")
                .to_string()
        })
    }
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();
        let mut config_builder = Config::builder()
            .set_default("database.path", defaults.database.path)?
            .set_default("logging.format", "text")?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/csv-table-loader/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(database) = &args.database {
            config.database.path = database.clone();
        }
        if let Some(schema) = &args.schema {
            config.database.schema = Some(schema.clone());
        }
        if let Some(format) = args.log_format {
            config.logging.format = format;
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "loader.duckdb".to_string(),
                schema: None,
            },
            logging: LoggingConfig {
                format: LogFormat::Text,
            },
        }
    }
}
