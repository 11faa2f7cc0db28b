//! Parquet reading and writing for warehouse relations.
//!
//! Reads load the whole file and stream record batches out of memory.
//! Writes stream batches into an [`OutputSink`], so a destination only
//! becomes visible once [`ParquetTableWriter::finish`] commits it.

use arrow::array::{RecordBatch, RecordBatchReader};
use arrow::datatypes::SchemaRef;
use bytes::Bytes;
use parquet::{
    arrow::{
        ArrowWriter,
        arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder},
    },
    basic::Compression,
    errors::ParquetError,
    file::properties::WriterProperties,
};
use snafu::prelude::*;

use crate::{
    identifier::TableId,
    storage::{OutputSink, StorageError, open_output_sink},
    warehouse::Warehouse,
};

/// Errors from reading or writing a relation file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TableIoError {
    /// Underlying file access failed.
    #[snafu(display("Storage error: {source}"))]
    Storage {
        /// Underlying storage error.
        source: StorageError,
    },

    /// Parquet encoding or decoding failed.
    #[snafu(display("Parquet error at {path}: {source}"))]
    Parquet {
        /// Relation file path.
        path: String,
        /// Underlying Parquet error.
        source: ParquetError,
    },
}

/// Open a relation for batch-wise reading.
pub async fn open_parquet_reader(
    warehouse: &Warehouse,
    id: &TableId,
    batch_size: usize,
) -> Result<ParquetRecordBatchReader, TableIoError> {
    let path = warehouse.table_path(id).display().to_string();
    let bytes = warehouse.read_table_bytes(id).await.context(StorageSnafu)?;

    ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))
        .and_then(|b| b.with_batch_size(batch_size.max(1)).build())
        .context(ParquetSnafu { path })
}

/// Read a whole relation into memory.
pub async fn read_table(
    warehouse: &Warehouse,
    id: &TableId,
) -> Result<(SchemaRef, Vec<RecordBatch>), TableIoError> {
    let path = warehouse.table_path(id).display().to_string();
    let reader = open_parquet_reader(warehouse, id, 8192).await?;
    let schema = reader.schema();
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(ParquetError::from)
        .context(ParquetSnafu { path })?;
    Ok((schema, batches))
}

/// Streaming writer for one destination relation.
///
/// Dropping it without calling [`finish`](Self::finish) leaves any previous
/// relation at the same identifier untouched.
pub struct ParquetTableWriter {
    path: String,
    writer: ArrowWriter<OutputSink>,
    rows: u64,
}

impl ParquetTableWriter {
    /// Start writing `id` with the given schema.
    pub async fn create(
        warehouse: &Warehouse,
        id: &TableId,
        schema: SchemaRef,
    ) -> Result<Self, TableIoError> {
        let sink = open_output_sink(warehouse.location(), &Warehouse::table_rel_path(id))
            .await
            .context(StorageSnafu)?;
        let path = sink.target().display().to_string();

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let writer = ArrowWriter::try_new(sink, schema, Some(props))
            .context(ParquetSnafu { path: path.clone() })?;

        Ok(Self {
            path,
            writer,
            rows: 0,
        })
    }

    /// Append one batch.
    pub fn write(&mut self, batch: &RecordBatch) -> Result<(), TableIoError> {
        self.writer.write(batch).context(ParquetSnafu {
            path: self.path.clone(),
        })?;
        self.rows += batch.num_rows() as u64;
        Ok(())
    }

    /// Rows written so far.
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Write the footer and atomically publish the relation.
    ///
    /// Returns the number of rows written.
    pub async fn finish(self) -> Result<u64, TableIoError> {
        let sink = self
            .writer
            .into_inner()
            .context(ParquetSnafu { path: self.path })?;
        sink.finish().await.context(StorageSnafu)?;
        Ok(self.rows)
    }
}

/// Write a complete relation from in-memory batches.
pub async fn write_table(
    warehouse: &Warehouse,
    id: &TableId,
    schema: SchemaRef,
    batches: &[RecordBatch],
) -> Result<u64, TableIoError> {
    let mut writer = ParquetTableWriter::create(warehouse, id, schema).await?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.finish().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_birth_records, encode_birth_records, source_schema};
    use crate::record::BirthRecord;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn rows(n: i64) -> Vec<BirthRecord> {
        (0..n)
            .map(|i| BirthRecord {
                weight_pounds: Some(6.0 + i as f64 / 10.0),
                year: Some(2010),
                month: Some(i % 12 + 1),
                ..BirthRecord::default()
            })
            .collect()
    }

    #[tokio::test]
    async fn written_relation_reads_back() -> TestResult {
        let tmp = TempDir::new()?;
        let wh = Warehouse::local(tmp.path());
        let id = TableId::new("p", "d", "births")?;

        let batch = encode_birth_records(&rows(5))?;
        let written = write_table(&wh, &id, source_schema(), &[batch]).await?;
        assert_eq!(written, 5);
        assert!(wh.probe(&id).await? > 8);

        let (schema, batches) = read_table(&wh, &id).await?;
        assert_eq!(schema.fields().len(), source_schema().fields().len());
        let decoded: Vec<BirthRecord> = batches
            .iter()
            .map(decode_birth_records)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(decoded, rows(5));
        Ok(())
    }

    #[tokio::test]
    async fn reader_honors_batch_size() -> TestResult {
        let tmp = TempDir::new()?;
        let wh = Warehouse::local(tmp.path());
        let id = TableId::new("p", "d", "births")?;
        write_table(&wh, &id, source_schema(), &[encode_birth_records(&rows(10))?]).await?;

        let reader = open_parquet_reader(&wh, &id, 3).await?;
        let sizes: Vec<usize> = reader
            .map(|b| b.map(|b| b.num_rows()))
            .collect::<Result<_, _>>()?;
        assert_eq!(sizes, vec![3, 3, 3, 1]);
        Ok(())
    }

    #[tokio::test]
    async fn unfinished_writer_publishes_nothing() -> TestResult {
        let tmp = TempDir::new()?;
        let wh = Warehouse::local(tmp.path());
        let id = TableId::new("p", "d", "births")?;
        {
            let mut writer = ParquetTableWriter::create(&wh, &id, source_schema()).await?;
            writer.write(&encode_birth_records(&rows(2))?)?;
            assert_eq!(writer.rows_written(), 2);
        }
        assert!(!wh.table_path(&id).exists());
        Ok(())
    }

    #[tokio::test]
    async fn reading_non_parquet_is_a_parquet_error() -> TestResult {
        let tmp = TempDir::new()?;
        let wh = Warehouse::local(tmp.path());
        let id = TableId::new("p", "d", "junk")?;
        std::fs::create_dir_all(tmp.path().join("p/d"))?;
        std::fs::write(wh.table_path(&id), b"not parquet at all")?;

        let err = read_table(&wh, &id).await.unwrap_err();
        assert!(matches!(err, TableIoError::Parquet { .. }));
        Ok(())
    }
}
