use datafusion::arrow::array::RecordBatch;
use datafusion::error::DataFusionError;
use datafusion::prelude::{ParquetReadOptions, SessionConfig, SessionContext};
use futures::StreamExt;
use log::{debug, info};
use natality_prep_core::{
    codec,
    executor::{ExecutorError, PrepExecutor, PrepRequest},
    report::PrepReport,
    table_io::{ParquetTableWriter, TableIoError},
    warehouse::Warehouse,
};

use crate::{sql::render_prep_sql, udf::register_fingerprint_udfs};

const ENGINE: &str = "datafusion";

/// Name the source relation is registered under inside the session.
pub const SOURCE_TABLE_NAME: &str = "natality_source";

/// Executor that runs the preparation as one DataFusion SQL query.
///
/// A fresh [`SessionContext`] is built per run and dropped when the run ends.
/// With more than one target partition the scan runs in parallel and the
/// set of rows that survives `LIMIT` is no longer tied to file order; the
/// default of one keeps runs reproducible.
#[derive(Debug, Clone)]
pub struct DataFusionExecutor {
    target_partitions: usize,
}

impl Default for DataFusionExecutor {
    fn default() -> Self {
        Self {
            target_partitions: 1,
        }
    }
}

impl DataFusionExecutor {
    /// Executor with the given scan parallelism.
    pub fn with_target_partitions(target_partitions: usize) -> Self {
        Self {
            target_partitions: target_partitions.max(1),
        }
    }

    fn session(&self) -> SessionContext {
        let cfg = SessionConfig::new().with_target_partitions(self.target_partitions);
        let ctx = SessionContext::new_with_config(cfg);
        register_fingerprint_udfs(&ctx);
        ctx
    }
}

fn engine_err(err: DataFusionError) -> ExecutorError {
    ExecutorError::engine(ENGINE, err)
}

#[async_trait::async_trait]
impl PrepExecutor for DataFusionExecutor {
    fn name(&self) -> &'static str {
        ENGINE
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

        let ctx = self.session();
        let source_path = warehouse.table_path(source);
        ctx.register_parquet(
            SOURCE_TABLE_NAME,
            source_path.to_string_lossy().as_ref(),
            ParquetReadOptions::default(),
        )
        .await
        .map_err(engine_err)?;

        let provider = ctx.table_provider(SOURCE_TABLE_NAME).await.map_err(engine_err)?;
        codec::decode_birth_records(&RecordBatch::new_empty(provider.schema())).map_err(
            |e| ExecutorError::SourceSchema {
                table: source.clone(),
                source: e,
            },
        )?;

        let sql = render_prep_sql(SOURCE_TABLE_NAME, request.limit);
        debug!("datafusion preparation query:\n{sql}");
        let df = ctx.sql(&sql).await.map_err(engine_err)?;
        let mut stream = df.execute_stream().await.map_err(engine_err)?;

        let destination_err = |e| ExecutorError::DestinationWrite {
            table: request.destination.clone(),
            source: e,
        };
        let mut writer =
            ParquetTableWriter::create(warehouse, &request.destination, codec::prepared_schema())
                .await
                .map_err(destination_err)?;

        let mut report = PrepReport {
            engine: ENGINE.to_string(),
            ..PrepReport::default()
        };

        while let Some(item) = stream.next().await {
            let batch = item.map_err(engine_err)?;
            if batch.num_rows() == 0 {
                continue;
            }
            let batch = codec::conform_to_prepared(&batch).map_err(engine_err_from_codec)?;
            let (splits, unlabeled) =
                codec::tally_prepared(&batch).map_err(engine_err_from_codec)?;
            report.splits.merge(splits);
            report.unlabeled_plurality += unlabeled;
            writer.write(&batch).map_err(destination_err)?;
        }

        report.rows_written = writer.finish().await.map_err(destination_err)?;
        info!(
            "datafusion executor wrote {} rows from {source} to {}",
            report.rows_written, request.destination
        );
        Ok(report)
    }
}

fn engine_err_from_codec(err: codec::CodecError) -> ExecutorError {
    ExecutorError::engine(ENGINE, err)
}
