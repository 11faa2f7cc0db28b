use std::path::Path;

use arrow::{
    array::RecordBatch,
    error::ArrowError,
    util::display::{ArrayFormatter, FormatOptions},
};
use datafusion::prelude::{ParquetReadOptions, SessionContext};
use natality_prep_core::{codec::SPLITS_COLUMN, storage::StorageError};
use natality_prep_datafusion::sql::quote_identifier;
use snafu::ResultExt;
use tabled::{builder::Builder, settings::Style};

use crate::error::{ArrowSnafu, CliError, CliResult, DataFusionSnafu, TableNotFoundSnafu};

const INSPECT_TABLE_NAME: &str = "t";

/// Render a header row plus string rows as a rounded table.
pub fn render_table(columns: &[String], rows: &[Vec<String>]) -> String {
    if columns.is_empty() {
        return String::new();
    }
    let mut builder = Builder::default();
    builder.push_record(columns);
    for row in rows {
        builder.push_record(row);
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

/// Format up to `max_rows` rows of `batches` as strings.
pub fn batches_to_rows(
    batches: &[RecordBatch],
    max_rows: usize,
) -> Result<Vec<Vec<String>>, ArrowError> {
    let options = FormatOptions::default().with_null("NULL");
    let mut rows = Vec::new();
    for batch in batches {
        if rows.len() >= max_rows {
            break;
        }
        let formatters = batch
            .columns()
            .iter()
            .map(|col| ArrayFormatter::try_new(col.as_ref(), &options))
            .collect::<Result<Vec<_>, ArrowError>>()?;
        let take = (max_rows - rows.len()).min(batch.num_rows());
        for row_idx in 0..take {
            let row = formatters
                .iter()
                .map(|f| f.value(row_idx).try_to_string())
                .collect::<Result<Vec<_>, ArrowError>>()?;
            rows.push(row);
        }
    }
    Ok(rows)
}

async fn collect(ctx: &SessionContext, sql: &str) -> CliResult<Vec<RecordBatch>> {
    ctx.sql(sql)
        .await
        .context(DataFusionSnafu)?
        .collect()
        .await
        .context(DataFusionSnafu)
}

pub async fn cmd_inspect(
    warehouse: &Path,
    table: &str,
    project: Option<&str>,
    max_rows: usize,
) -> CliResult<()> {
    let warehouse = crate::open_warehouse(warehouse)?;
    let id = crate::parse_table_id(table, project)?;

    match warehouse.probe(&id).await {
        Ok(_) => {}
        Err(StorageError::NotFound { .. }) => {
            return TableNotFoundSnafu {
                table: id.to_string(),
            }
            .fail();
        }
        Err(source) => return Err(CliError::Storage { source }),
    }

    let ctx = SessionContext::new();
    ctx.register_parquet(
        INSPECT_TABLE_NAME,
        warehouse.table_path(&id).to_string_lossy().as_ref(),
        ParquetReadOptions::default(),
    )
    .await
    .context(DataFusionSnafu)?;
    let quoted = quote_identifier(INSPECT_TABLE_NAME);

    let count = collect(&ctx, &format!("SELECT COUNT(*) AS row_count FROM {quoted}")).await?;
    let total = batches_to_rows(&count, 1)
        .context(ArrowSnafu)?
        .into_iter()
        .next()
        .and_then(|r| r.into_iter().next())
        .unwrap_or_else(|| "0".to_string());

    println!("Table : {id}");
    println!("Rows  : {total}");

    let preview = ctx
        .sql(&format!("SELECT * FROM {quoted} LIMIT {max_rows}"))
        .await
        .context(DataFusionSnafu)?;
    let schema = preview.schema().as_arrow().clone();
    let schema_rows: Vec<Vec<String>> = schema
        .fields()
        .iter()
        .map(|f| {
            vec![
                f.name().to_string(),
                format!("{}", f.data_type()),
                f.is_nullable().to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        render_table(
            &["column".to_string(), "type".to_string(), "nullable".to_string()],
            &schema_rows
        )
    );

    let batches = preview.collect().await.context(DataFusionSnafu)?;
    let columns: Vec<String> = schema.fields().iter().map(|f| f.name().to_string()).collect();
    let rows = batches_to_rows(&batches, max_rows).context(ArrowSnafu)?;
    if rows.is_empty() {
        println!("(no rows)");
    } else {
        println!("{}", render_table(&columns, &rows));
    }

    if schema.field_with_name(SPLITS_COLUMN).is_ok() {
        let splits = quote_identifier(SPLITS_COLUMN);
        let counts = collect(
            &ctx,
            &format!(
                "SELECT {splits} AS split, COUNT(*) AS row_count FROM {quoted} GROUP BY {splits} ORDER BY {splits}"
            ),
        )
        .await?;
        let rows = batches_to_rows(&counts, usize::MAX).context(ArrowSnafu)?;
        println!(
            "{}",
            render_table(&["split".to_string(), "rows".to_string()], &rows)
        );
    }
    Ok(())
}
