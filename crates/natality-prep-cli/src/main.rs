//! CLI tool for preparing birth-record tables for model training.

mod error;
mod import;
mod inspect;
mod logging;
mod prepare;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use natality_prep_core::{identifier::TableId, storage::StorageLocation, warehouse::Warehouse};
use snafu::ResultExt;

use crate::{
    error::{CliResult, InvalidTableSnafu, InvalidWarehouseSnafu, UnqualifiedTableSnafu},
    import::cmd_import_csv,
    inspect::cmd_inspect,
    prepare::{PrepareArgs, cmd_prepare},
};

#[derive(Debug, Subcommand)]
enum Command {
    /// Filter, normalize and split a source table into `source_prepped_limit_<N>`
    Prepare(PrepareArgs),

    /// Load a CSV file (header row required) as a warehouse table
    ImportCsv {
        #[arg(long)]
        warehouse: PathBuf,

        /// Destination table, `[project.]dataset.table`
        #[arg(long)]
        table: String,

        #[arg(long)]
        csv: PathBuf,

        /// Project for two-part table ids
        #[arg(long)]
        project: Option<String>,
    },

    /// Print schema, preview and split counts of a table via DataFusion
    Inspect {
        #[arg(long)]
        warehouse: PathBuf,

        #[arg(long)]
        table: String,

        #[arg(long)]
        project: Option<String>,

        #[arg(long, default_value_t = 10)]
        max_rows: usize,
    },
}

#[derive(Debug, Parser)]
#[command(name = "natprep", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

pub(crate) fn open_warehouse(root: &Path) -> CliResult<Warehouse> {
    let spec = root.to_string_lossy();
    let location = StorageLocation::parse(&spec).context(InvalidWarehouseSnafu {
        spec: spec.to_string(),
    })?;
    Ok(Warehouse::new(location))
}

/// Resolve a `[project.]dataset.table` argument against `--project`.
pub(crate) fn parse_table_id(spec: &str, project: Option<&str>) -> CliResult<TableId> {
    let project = match project {
        Some(p) => p,
        None if spec.trim().trim_matches('`').split('.').count() == 3 => "",
        None => return UnqualifiedTableSnafu { spec }.fail(),
    };
    TableId::parse(spec, project).context(InvalidTableSnafu { spec })
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Prepare(args) => cmd_prepare(args).await,

        Command::ImportCsv {
            warehouse,
            table,
            csv,
            project,
        } => cmd_import_csv(&warehouse, &table, &csv, project.as_deref()).await,

        Command::Inspect {
            warehouse,
            table,
            project,
            max_rows,
        } => cmd_inspect(&warehouse, &table, project.as_deref(), max_rows).await,
    }
}

#[tokio::main]
async fn main() {
    logging::init_logging();
    if let Err(e) = run().await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;

    #[test]
    fn two_part_table_needs_a_project() {
        let err = parse_table_id("raw.births", None).unwrap_err();
        assert!(matches!(err, CliError::UnqualifiedTable { .. }), "{err}");
        assert!(err.to_string().contains("--project"));
    }

    #[test]
    fn qualified_or_defaulted_tables_resolve() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!(
            parse_table_id("proj.raw.births", None)?.to_string(),
            "proj.raw.births"
        );
        assert_eq!(
            parse_table_id("raw.births", Some("proj"))?.to_string(),
            "proj.raw.births"
        );
        Ok(())
    }
}
