#![allow(missing_docs)]

use std::collections::BTreeMap;

use async_trait::async_trait;
use natality_prep_core::{
    codec::{
        decode_prepared, encode_birth_records, encode_prepared, prepared_schema, source_schema,
    },
    config::PrepConfig,
    executor::{ExecutorError, NativeExecutor, PrepExecutor, PrepRequest},
    identifier::TableId,
    normalize::prepare_record,
    partition::{PartitionKey, key_input},
    prepare::{PrepError, PreparedTable, prepare_table},
    record::{BirthRecord, Plurality, PreparedRecord, Split},
    report::PrepReport,
    table_io::{self, ParquetTableWriter},
    warehouse::Warehouse,
};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const PROJECT: &str = "proj";

fn scenario_row() -> BirthRecord {
    BirthRecord {
        weight_pounds: Some(7.2),
        is_male: Some(true),
        mother_age: Some(28),
        plurality: Some(1),
        gestation_weeks: Some(39),
        cigarette_use: None,
        alcohol_use: Some("false".to_string()),
        year: Some(2015),
        month: Some(3),
        wday: Some(2),
        day: None,
        state: None,
        mother_birth_state: Some("CA".to_string()),
    }
}

fn varied_rows(n: i64) -> Vec<BirthRecord> {
    const STATES: [&str; 5] = ["CA", "TX", "NY", "WA", "FL"];
    (0..n)
        .map(|i| BirthRecord {
            weight_pounds: Some(5.0 + (i % 40) as f64 / 10.0),
            is_male: Some(i % 3 == 0),
            mother_age: Some(18 + i % 25),
            plurality: Some(1 + i % 3),
            gestation_weeks: Some(30 + i % 12),
            cigarette_use: (i % 4 == 0).then(|| "true".to_string()),
            alcohol_use: (i % 5 == 0).then(|| "false".to_string()),
            year: Some(2003 + i % 6),
            month: Some(1 + i % 12),
            wday: (i % 2 == 0).then_some(1 + i % 7),
            day: Some(1 + i % 28),
            state: (i % 6 != 0).then(|| STATES[(i % 5) as usize].to_string()),
            mother_birth_state: Some(STATES[((i / 5) % 5) as usize].to_string()),
        })
        .collect()
}

fn config(source: &str, limit: i64) -> PrepConfig {
    PrepConfig {
        project: PROJECT.to_string(),
        region: "us-central1".to_string(),
        source_table: source.to_string(),
        output_dataset: "ml".to_string(),
        limit,
    }
}

async fn seed(wh: &Warehouse, table: &str, rows: &[BirthRecord]) -> TestResult {
    let id = TableId::parse(table, PROJECT)?;
    let batch = encode_birth_records(rows)?;
    table_io::write_table(wh, &id, source_schema(), &[batch]).await?;
    Ok(())
}

async fn read_prepared(wh: &Warehouse, out: &PreparedTable) -> Result<Vec<PreparedRecord>, Box<dyn std::error::Error>> {
    let (_, batches) = table_io::read_table(wh, &out.table_id).await?;
    let mut rows = Vec::new();
    for batch in &batches {
        rows.extend(decode_prepared(batch)?);
    }
    Ok(rows)
}

#[tokio::test]
async fn scenario_row_is_normalized_and_assigned() -> TestResult {
    let tmp = TempDir::new()?;
    let wh = Warehouse::local(tmp.path());
    seed(&wh, "src.natality", &[scenario_row()]).await?;

    let out = prepare_table(&wh, &config("src.natality", 1000), &NativeExecutor::default()).await?;
    assert_eq!(out.table_id.to_string(), "proj.ml.source_prepped_limit_1000");
    assert_eq!(out.uri, "bq://proj.ml.source_prepped_limit_1000");
    assert_eq!(
        out.console_url,
        "https://console.cloud.google.com/bigquery?project=proj&p=proj&d=ml&t=source_prepped_limit_1000&page=table"
    );
    assert_eq!(out.path, tmp.path().join("proj/ml/source_prepped_limit_1000.parquet"));
    assert_eq!(out.region, "us-central1");

    let key = PartitionKey::from_concatenated("201532UnknownCA");
    assert_eq!(key.0, 5852511133184547707);
    assert_eq!(key.split(), Split::Train);

    let rows = read_prepared(&wh, &out).await?;
    assert_eq!(
        rows,
        vec![PreparedRecord {
            weight_pounds: Some(7.2),
            is_male: Some("true"),
            mother_age: Some(28),
            plurality: Some(Plurality::Single),
            gestation_weeks: Some(39),
            cigarette_use: "Unknown".to_string(),
            alcohol_use: "false".to_string(),
            splits: Split::Train,
        }]
    );
    assert_eq!(out.report.splits.train, 1);
    assert_eq!(out.report.rows_written, 1);
    Ok(())
}

#[tokio::test]
async fn gestation_boundary_excludes_nineteen() -> TestResult {
    let tmp = TempDir::new()?;
    let wh = Warehouse::local(tmp.path());
    let at_19 = BirthRecord {
        gestation_weeks: Some(19),
        ..scenario_row()
    };
    let at_20 = BirthRecord {
        gestation_weeks: Some(20),
        ..scenario_row()
    };
    seed(&wh, "src.natality", &[at_19, at_20]).await?;

    let out = prepare_table(&wh, &config("src.natality", 10), &NativeExecutor::default()).await?;
    let rows = read_prepared(&wh, &out).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].gestation_weeks, Some(20));
    Ok(())
}

#[tokio::test]
async fn identical_hashed_fields_share_a_split() -> TestResult {
    let tmp = TempDir::new()?;
    let wh = Warehouse::local(tmp.path());
    // Same hashed fields four times over, with different feature values.
    let rows: Vec<BirthRecord> = (0..4)
        .flat_map(|copy| {
            varied_rows(100).into_iter().map(move |r| BirthRecord {
                weight_pounds: r.weight_pounds.map(|w| w + copy as f64),
                mother_age: r.mother_age.map(|a| a + copy),
                ..r
            })
        })
        .collect();
    seed(&wh, "src.natality", &rows).await?;

    let out = prepare_table(&wh, &config("src.natality", 400), &NativeExecutor::default()).await?;
    let prepared = read_prepared(&wh, &out).await?;
    assert_eq!(prepared.len(), rows.len());

    let mut by_key: BTreeMap<String, Split> = BTreeMap::new();
    for (source, row) in rows.iter().zip(&prepared) {
        let key = key_input(source).ok_or("row without key")?;
        let split = *by_key.entry(key).or_insert(row.splits);
        assert_eq!(split, row.splits);
    }
    assert!(by_key.len() <= 100);
    Ok(())
}

#[tokio::test]
async fn reruns_reproduce_assignments() -> TestResult {
    let tmp = TempDir::new()?;
    let wh = Warehouse::local(tmp.path());
    seed(&wh, "src.natality", &varied_rows(250)).await?;

    let cfg = config("src.natality", 100);
    let first = prepare_table(&wh, &cfg, &NativeExecutor::default()).await?;
    let first_rows = read_prepared(&wh, &first).await?;
    let second = prepare_table(&wh, &cfg, &NativeExecutor::with_batch_size(7)).await?;
    let second_rows = read_prepared(&wh, &second).await?;

    assert_eq!(first_rows.len(), 100);
    assert_eq!(first_rows, second_rows);
    assert_eq!(first.report.splits, second.report.splits);
    Ok(())
}

#[tokio::test]
async fn zero_qualifying_rows_still_creates_table() -> TestResult {
    let tmp = TempDir::new()?;
    let wh = Warehouse::local(tmp.path());
    let old = BirthRecord {
        year: Some(2002),
        ..scenario_row()
    };
    seed(&wh, "src.natality", &[old]).await?;

    let out = prepare_table(&wh, &config("src.natality", 5), &NativeExecutor::default()).await?;
    assert_eq!(out.report.rows_written, 0);
    assert!(out.path.exists());
    assert!(read_prepared(&wh, &out).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn rerun_replaces_previous_table() -> TestResult {
    let tmp = TempDir::new()?;
    let wh = Warehouse::local(tmp.path());
    seed(&wh, "src.natality", &varied_rows(50)).await?;
    let cfg = config("src.natality", 20);
    prepare_table(&wh, &cfg, &NativeExecutor::default()).await?;

    seed(&wh, "src.natality", &[scenario_row()]).await?;
    let out = prepare_table(&wh, &cfg, &NativeExecutor::default()).await?;
    let rows = read_prepared(&wh, &out).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].weight_pounds, Some(7.2));
    Ok(())
}

/// Streams part of a destination, then fails before committing it.
struct FailsMidWrite;

#[async_trait]
impl PrepExecutor for FailsMidWrite {
    fn name(&self) -> &'static str {
        "fails-mid-write"
    }

    async fn execute(
        &self,
        warehouse: &Warehouse,
        request: &PrepRequest,
    ) -> Result<PrepReport, ExecutorError> {
        let mut writer =
            ParquetTableWriter::create(warehouse, &request.destination, prepared_schema())
                .await
                .map_err(|e| ExecutorError::engine(self.name(), e))?;
        let batch = encode_prepared(&[prepare_record(&scenario_row())])
            .map_err(|e| ExecutorError::engine(self.name(), e))?;
        writer
            .write(&batch)
            .map_err(|e| ExecutorError::engine(self.name(), e))?;
        Err(ExecutorError::engine(self.name(), std::io::Error::other("disk full")))
    }
}

fn dir_len(path: &std::path::Path) -> std::io::Result<usize> {
    Ok(std::fs::read_dir(path)?.count())
}

#[tokio::test]
async fn failed_write_keeps_prior_table_bytes() -> TestResult {
    let tmp = TempDir::new()?;
    let wh = Warehouse::local(tmp.path());
    seed(&wh, "src.natality", &varied_rows(30)).await?;
    let cfg = config("src.natality", 10);
    let out = prepare_table(&wh, &cfg, &NativeExecutor::default()).await?;
    let before = std::fs::read(&out.path)?;

    let err = prepare_table(&wh, &cfg, &FailsMidWrite).await.unwrap_err();
    assert!(matches!(err, PrepError::Execute { .. }), "{err}");
    assert_eq!(std::fs::read(&out.path)?, before);
    assert_eq!(dir_len(tmp.path().join("proj/ml").as_path())?, 1);
    Ok(())
}

#[tokio::test]
async fn overlapping_writers_leave_a_complete_table() -> TestResult {
    let tmp = TempDir::new()?;
    let wh = Warehouse::local(tmp.path());
    seed(&wh, "src.natality", &varied_rows(500)).await?;
    let cfg = config("src.natality", 500);
    let destination = TableId::prepped(PROJECT, "ml", 500)?;

    // A slow writer is still streaming when a full run publishes.
    let slow_rows = vec![prepare_record(&scenario_row()); 3];
    let mut slow = ParquetTableWriter::create(&wh, &destination, prepared_schema()).await?;
    slow.write(&encode_prepared(&slow_rows[..1])?)?;

    let out = prepare_table(&wh, &cfg, &NativeExecutor::default()).await?;
    assert_eq!(read_prepared(&wh, &out).await?.len(), 500);

    slow.write(&encode_prepared(&slow_rows[1..])?)?;
    slow.finish().await?;

    assert_eq!(read_prepared(&wh, &out).await?, slow_rows);
    assert_eq!(dir_len(tmp.path().join("proj/ml").as_path())?, 1);
    Ok(())
}

#[tokio::test]
async fn row_without_partition_key_is_published_as_test() -> TestResult {
    let tmp = TempDir::new()?;
    let wh = Warehouse::local(tmp.path());
    let no_month = BirthRecord {
        month: None,
        ..scenario_row()
    };
    let no_year = BirthRecord {
        year: None,
        ..scenario_row()
    };
    assert_eq!(key_input(&no_month), None);
    seed(&wh, "src.natality", &[no_month, no_year, scenario_row()]).await?;

    let out = prepare_table(&wh, &config("src.natality", 10), &NativeExecutor::default()).await?;
    let rows = read_prepared(&wh, &out).await?;
    // A null year fails the filter; a null month survives it without a key.
    let splits: Vec<Split> = rows.iter().map(|r| r.splits).collect();
    assert_eq!(splits, vec![Split::Test, Split::Train]);
    assert_eq!(out.report.splits.test, 1);
    Ok(())
}

#[tokio::test]
async fn missing_source_writes_nothing() -> TestResult {
    let tmp = TempDir::new()?;
    let wh = Warehouse::local(tmp.path());

    let err = prepare_table(&wh, &config("src.absent", 5), &NativeExecutor::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("proj.src.absent"));
    assert!(!tmp.path().join("proj/ml").exists());
    Ok(())
}

#[tokio::test]
async fn split_distribution_is_roughly_eighty_ten_ten() -> TestResult {
    let tmp = TempDir::new()?;
    let wh = Warehouse::local(tmp.path());
    let rows: Vec<BirthRecord> = (0..3000i64)
        .map(|i| BirthRecord {
            year: Some(2003 + i % 13),
            month: Some(1 + (i / 13) % 12),
            wday: Some(1 + (i / 156) % 7),
            state: Some(format!("S{}", i % 17)),
            mother_birth_state: Some(format!("B{}", i % 23)),
            ..scenario_row()
        })
        .collect();
    seed(&wh, "src.natality", &rows).await?;

    let out = prepare_table(&wh, &config("src.natality", 3000), &NativeExecutor::default()).await?;
    let counts = out.report.splits;
    assert_eq!(counts.total(), 3000);
    let share = |n: u64| n as f64 / 3000.0;
    assert!((0.74..0.86).contains(&share(counts.train)), "{counts:?}");
    assert!((0.06..0.14).contains(&share(counts.validate)), "{counts:?}");
    assert!((0.06..0.14).contains(&share(counts.test)), "{counts:?}");
    Ok(())
}
