//! Executors that materialize a prepared relation.
//!
//! An executor evaluates filter → limit → normalize → hash → assign against
//! a [`Warehouse`] and writes the destination with create-or-replace
//! semantics. [`NativeExecutor`] does the work row by row over Arrow batches;
//! query-engine backed executors live in their own crates and implement the
//! same [`PrepExecutor`] trait.

use std::error::Error as StdError;

use arrow::array::{RecordBatch, RecordBatchReader};
use arrow::error::ArrowError;
use async_trait::async_trait;
use log::{debug, info};
use parquet::errors::ParquetError;
use snafu::prelude::*;

use crate::{
    codec::{self, CodecError},
    filter::qualifies,
    identifier::TableId,
    normalize::prepare_record,
    record::PreparedRecord,
    report::PrepReport,
    storage::StorageError,
    table_io::{self, ParquetTableWriter, TableIoError},
    warehouse::Warehouse,
};

/// Default number of source rows decoded per batch.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Resolved inputs of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepRequest {
    /// Source relation.
    pub source: TableId,
    /// Destination relation, replaced wholesale.
    pub destination: TableId,
    /// Maximum number of qualifying rows to keep (> 0).
    pub limit: u64,
}

/// Errors raised while executing a preparation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ExecutorError {
    /// The source relation does not exist.
    #[snafu(display("Source table {table} not found: {source}"))]
    SourceNotFound {
        /// Source relation.
        table: TableId,
        /// Underlying storage error.
        source: StorageError,
    },

    /// The source relation exists but could not be read.
    #[snafu(display("Failed to read source table {table}: {source}"))]
    SourceRead {
        /// Source relation.
        table: TableId,
        /// Underlying read error.
        source: TableIoError,
    },

    /// The source relation lacks a required column or has an unusable type.
    #[snafu(display("Source table {table} has an unusable schema: {source}"))]
    SourceSchema {
        /// Source relation.
        table: TableId,
        /// Underlying decode error.
        source: CodecError,
    },

    /// Prepared rows could not be encoded into Arrow.
    #[snafu(display("Failed to encode prepared rows: {source}"))]
    Encode {
        /// Underlying Arrow error.
        source: ArrowError,
    },

    /// The destination relation could not be written. Any prior relation at
    /// that identifier is unchanged.
    #[snafu(display("Failed to write destination table {table}: {source}"))]
    DestinationWrite {
        /// Destination relation.
        table: TableId,
        /// Underlying write error.
        source: TableIoError,
    },

    /// A query engine failed.
    #[snafu(display("{engine} engine error: {source}"))]
    Engine {
        /// Engine name.
        engine: &'static str,
        /// Underlying engine error.
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl ExecutorError {
    /// Wrap an error raised by a query engine.
    pub fn engine(engine: &'static str, err: impl StdError + Send + Sync + 'static) -> Self {
        ExecutorError::Engine {
            engine,
            source: Box::new(err),
        }
    }

    /// Classify a failure to open the source relation.
    ///
    /// A missing file becomes [`ExecutorError::SourceNotFound`]; anything
    /// else is a read failure.
    pub fn from_source_open(table: &TableId, err: TableIoError) -> Self {
        match err {
            TableIoError::Storage {
                source: source @ StorageError::NotFound { .. },
            } => ExecutorError::SourceNotFound {
                table: table.clone(),
                source,
            },
            other => ExecutorError::SourceRead {
                table: table.clone(),
                source: other,
            },
        }
    }
}

/// Something that can materialize a prepared relation.
#[async_trait]
pub trait PrepExecutor: Send + Sync {
    /// Short engine name for reports and logs.
    fn name(&self) -> &'static str;

    /// Run the preparation described by `request` against `warehouse`.
    async fn execute(
        &self,
        warehouse: &Warehouse,
        request: &PrepRequest,
    ) -> Result<PrepReport, ExecutorError>;
}

/// Row-by-row executor over Arrow batches.
///
/// Qualifying rows are taken in source file order until the limit is
/// reached; reading stops as soon as it is.
#[derive(Debug, Clone)]
pub struct NativeExecutor {
    batch_size: usize,
}

impl Default for NativeExecutor {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl NativeExecutor {
    /// Executor decoding `batch_size` source rows at a time.
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }
}

fn tally(report: &mut PrepReport, prepared: &[PreparedRecord]) {
    for row in prepared {
        report.splits.record(row.splits);
        if row.plurality.is_none() {
            report.unlabeled_plurality += 1;
        }
    }
}

#[async_trait]
impl PrepExecutor for NativeExecutor {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn execute(
        &self,
        warehouse: &Warehouse,
        request: &PrepRequest,
    ) -> Result<PrepReport, ExecutorError> {
        let source = &request.source;
        warehouse.probe(source).await.map_err(|e| {
            ExecutorError::from_source_open(source, TableIoError::Storage { source: e })
        })?;
        let reader = table_io::open_parquet_reader(warehouse, source, self.batch_size)
            .await
            .map_err(|e| ExecutorError::from_source_open(source, e))?;

        // Reject unusable schemas even when the source has no rows.
        codec::decode_birth_records(&RecordBatch::new_empty(reader.schema()))
            .context(SourceSchemaSnafu {
                table: source.clone(),
            })?;

        let mut writer =
            ParquetTableWriter::create(warehouse, &request.destination, codec::prepared_schema())
                .await
                .context(DestinationWriteSnafu {
                    table: request.destination.clone(),
                })?;
        debug!(
            "staging {} for {}",
            warehouse.table_path(&request.destination).display(),
            request.destination
        );

        let mut report = PrepReport {
            engine: self.name().to_string(),
            ..PrepReport::default()
        };
        let mut scanned = 0u64;
        let mut remaining = request.limit;
        let source_path = warehouse.table_path(source).display().to_string();

        for batch in reader {
            if remaining == 0 {
                break;
            }
            let batch = batch
                .map_err(ParquetError::from)
                .context(table_io::ParquetSnafu {
                    path: source_path.clone(),
                })
                .context(SourceReadSnafu {
                    table: source.clone(),
                })?;
            let records = codec::decode_birth_records(&batch).context(SourceSchemaSnafu {
                table: source.clone(),
            })?;

            let mut prepared = Vec::new();
            for record in &records {
                if remaining == 0 {
                    break;
                }
                scanned += 1;
                if qualifies(record) {
                    prepared.push(prepare_record(record));
                    remaining -= 1;
                }
            }

            if prepared.is_empty() {
                continue;
            }
            tally(&mut report, &prepared);
            let out = codec::encode_prepared(&prepared).context(EncodeSnafu)?;
            writer.write(&out).context(DestinationWriteSnafu {
                table: request.destination.clone(),
            })?;
        }

        report.rows_written = writer.finish().await.context(DestinationWriteSnafu {
            table: request.destination.clone(),
        })?;
        report.rows_scanned = Some(scanned);

        info!(
            "native executor scanned {scanned} rows of {source}, wrote {} to {}",
            report.rows_written, request.destination
        );
        Ok(report)
    }
}
