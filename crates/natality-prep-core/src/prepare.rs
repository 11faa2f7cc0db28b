//! Top-level preparation entry point.

use std::path::PathBuf;

use log::{info, warn};
use serde::Serialize;
use snafu::prelude::*;

use crate::{
    config::{ConfigError, PrepConfig},
    executor::{ExecutorError, PrepExecutor, PrepRequest},
    identifier::TableId,
    record::Split,
    report::PrepReport,
    warehouse::Warehouse,
};

/// Errors from [`prepare_table`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PrepError {
    /// The configuration was rejected before touching the warehouse.
    #[snafu(display("Invalid configuration: {source}"))]
    Config {
        /// Underlying config error.
        source: ConfigError,
    },

    /// The executor failed; the destination keeps its prior state.
    #[snafu(display("Preparation with the {engine} executor failed: {source}"))]
    Execute {
        /// Executor name.
        engine: &'static str,
        /// Underlying executor error.
        #[snafu(source(from(ExecutorError, Box::new)))]
        source: Box<ExecutorError>,
    },
}

/// Outputs of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedTable {
    /// Destination relation.
    pub table_id: TableId,
    /// Artifact reference for downstream steps.
    pub uri: String,
    /// Console locator for humans.
    pub console_url: String,
    /// Local Parquet file holding the relation.
    pub path: PathBuf,
    /// Region from the config, passed through.
    pub region: String,
    /// Run statistics.
    pub report: PrepReport,
}

/// Validate `config`, run `executor`, and describe the result.
///
/// The destination `{project}.{output_dataset}.source_prepped_limit_{limit}`
/// is created or replaced atomically. Zero qualifying rows still produce an
/// (empty) relation.
pub async fn prepare_table<E>(
    warehouse: &Warehouse,
    config: &PrepConfig,
    executor: &E,
) -> Result<PreparedTable, PrepError>
where
    E: PrepExecutor + ?Sized,
{
    let validated = config.validate().context(ConfigSnafu)?;
    let request = PrepRequest {
        source: validated.source,
        destination: validated.destination,
        limit: validated.limit,
    };

    info!(
        "preparing {} from {} (limit {}, engine {})",
        request.destination,
        request.source,
        request.limit,
        executor.name()
    );

    let report = executor
        .execute(warehouse, &request)
        .await
        .context(ExecuteSnafu {
            engine: executor.name(),
        })?;

    if report.unlabeled_plurality > 0 {
        warn!(
            "{} rows in {} have a plurality outside 1..=5 and no plurality label",
            report.unlabeled_plurality, request.destination
        );
    }
    info!(
        "wrote {} rows to {} ({} {}, {} {}, {} {})",
        report.rows_written,
        request.destination,
        Split::Train,
        report.splits.train,
        Split::Validate,
        report.splits.validate,
        Split::Test,
        report.splits.test,
    );

    let table_id = request.destination;
    Ok(PreparedTable {
        uri: table_id.artifact_uri(),
        console_url: table_id.console_url(),
        path: warehouse.table_path(&table_id),
        region: validated.region,
        report,
        table_id,
    })
}
