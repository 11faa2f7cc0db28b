use std::path::PathBuf;

use arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use natality_prep_core::{
    config::ConfigError, identifier::IdentifierError, prepare::PrepError, storage::StorageError,
    table_io::TableIoError,
};
use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Invalid --warehouse '{spec}': {source}"))]
    InvalidWarehouse { spec: String, source: StorageError },

    #[snafu(display("{source}"))]
    Config { source: ConfigError },

    #[snafu(display("Missing --{flag} (not given on the command line or in --config)"))]
    MissingArgument { flag: &'static str },

    #[snafu(display("{source}"))]
    Prepare {
        #[snafu(source(from(PrepError, Box::new)))]
        source: Box<PrepError>,
    },

    #[snafu(display("Invalid table id '{spec}': {source}"))]
    InvalidTable {
        spec: String,
        source: IdentifierError,
    },

    #[snafu(display("Table '{spec}' names no project; pass --project or use project.dataset.table"))]
    UnqualifiedTable { spec: String },

    #[snafu(display("Failed to open CSV file {}: {source}", path.display()))]
    OpenCsv {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to read CSV file {}: {source}", path.display()))]
    ReadCsv { path: PathBuf, source: ArrowError },

    #[snafu(display("Storage error: {source}"))]
    Storage { source: StorageError },

    #[snafu(display("Table {table} not found in the warehouse"))]
    TableNotFound { table: String },

    #[snafu(display("Table I/O failed for {table}: {source}"))]
    TableIo {
        table: String,
        #[snafu(source(from(TableIoError, Box::new)))]
        source: Box<TableIoError>,
    },

    #[snafu(display("DataFusion error: {source}"))]
    DataFusion {
        #[snafu(source(from(DataFusionError, Box::new)))]
        source: Box<DataFusionError>,
    },

    #[snafu(display("Arrow error: {source}"))]
    Arrow { source: ArrowError },

    #[snafu(display("Failed to encode outputs: {source}"))]
    EncodeOutputs { source: serde_json::Error },

    #[snafu(display("Failed to write outputs to {}: {source}", path.display()))]
    WriteOutputs { path: PathBuf, source: StorageError },
}
