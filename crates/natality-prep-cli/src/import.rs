use std::{fs::File, path::Path, sync::Arc};

use arrow::datatypes::{Field, Schema};
use arrow_csv::{ReaderBuilder, reader::Format};
use natality_prep_core::{codec::source_schema, table_io::write_table};
use snafu::ResultExt;

use crate::error::{CliResult, OpenCsvSnafu, ReadCsvSnafu, TableIoSnafu};

/// Records sampled for type inference.
const INFER_MAX_RECORDS: usize = 1000;

/// Pin known birth-record columns to their canonical types; infer the rest.
///
/// Inference alone turns a column that is empty in the sample into `Utf8`,
/// which would then be rejected as a numeric source column.
fn import_schema(inferred: &Schema) -> Schema {
    let known = source_schema();
    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|f| match known.field_with_name(f.name()) {
            Ok(k) => Field::new(f.name(), k.data_type().clone(), true),
            Err(_) => f.as_ref().clone().with_nullable(true),
        })
        .collect();
    Schema::new(fields)
}

pub async fn cmd_import_csv(
    warehouse: &Path,
    table: &str,
    csv: &Path,
    project: Option<&str>,
) -> CliResult<()> {
    let warehouse = crate::open_warehouse(warehouse)?;
    let id = crate::parse_table_id(table, project)?;

    let format = Format::default().with_header(true);
    let file = File::open(csv).context(OpenCsvSnafu { path: csv })?;
    let (inferred, _) = format
        .infer_schema(file, Some(INFER_MAX_RECORDS))
        .context(ReadCsvSnafu { path: csv })?;
    let schema = Arc::new(import_schema(&inferred));

    let file = File::open(csv).context(OpenCsvSnafu { path: csv })?;
    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_format(format)
        .build(file)
        .context(ReadCsvSnafu { path: csv })?;
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .context(ReadCsvSnafu { path: csv })?;

    let rows = write_table(&warehouse, &id, schema, &batches)
        .await
        .context(TableIoSnafu {
            table: id.to_string(),
        })?;

    println!("Imported table : {id}");
    println!("Rows           : {rows}");
    println!("Local path     : {}", warehouse.table_path(&id).display());
    Ok(())
}
