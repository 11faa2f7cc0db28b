use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use natality_prep_core::{
    config::PrepConfig,
    executor::{NativeExecutor, PrepExecutor},
    identifier::TableId,
    prepare::{PreparedTable, prepare_table},
    report::PrepReport,
    storage::{StorageLocation, write_atomic},
    warehouse::Warehouse,
};
use natality_prep_datafusion::DataFusionExecutor;
use serde::Serialize;
use snafu::{OptionExt, ResultExt};

use crate::error::{
    CliResult, ConfigSnafu, EncodeOutputsSnafu, MissingArgumentSnafu, PrepareSnafu,
    WriteOutputsSnafu,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineArg {
    Native,
    Datafusion,
}

impl EngineArg {
    fn executor(self) -> Box<dyn PrepExecutor> {
        match self {
            EngineArg::Native => Box::new(NativeExecutor::default()),
            EngineArg::Datafusion => Box::new(DataFusionExecutor::default()),
        }
    }
}

#[derive(Debug, Args)]
pub struct PrepareArgs {
    /// Warehouse root directory
    #[arg(long)]
    pub warehouse: PathBuf,

    /// JSON file with `project`, `region`, `source_table`, `output_dataset`, `limit`
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub project: Option<String>,

    /// Informational; passed through to the outputs
    #[arg(long)]
    pub region: Option<String>,

    /// Source table, `[project.]dataset.table`
    #[arg(long)]
    pub source: Option<String>,

    #[arg(long = "output-dataset")]
    pub output_dataset: Option<String>,

    /// Maximum number of qualifying rows
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,

    #[arg(long, value_enum, default_value_t = EngineArg::Native)]
    pub engine: EngineArg,

    /// Write the run outputs as JSON for the calling pipeline
    #[arg(long = "outputs-json")]
    pub outputs_json: Option<PathBuf>,
}

/// Merge flags over the optional config file; flags win.
pub fn resolve_config(args: &PrepareArgs) -> CliResult<PrepConfig> {
    let file = args
        .config
        .as_deref()
        .map(PrepConfig::from_json_file)
        .transpose()
        .context(ConfigSnafu)?;

    let project = args
        .project
        .clone()
        .or_else(|| file.as_ref().map(|c| c.project.clone()))
        .context(MissingArgumentSnafu { flag: "project" })?;
    let source_table = args
        .source
        .clone()
        .or_else(|| file.as_ref().map(|c| c.source_table.clone()))
        .context(MissingArgumentSnafu { flag: "source" })?;
    let output_dataset = args
        .output_dataset
        .clone()
        .or_else(|| file.as_ref().map(|c| c.output_dataset.clone()))
        .context(MissingArgumentSnafu {
            flag: "output-dataset",
        })?;
    let limit = args
        .limit
        .or_else(|| file.as_ref().map(|c| c.limit))
        .context(MissingArgumentSnafu { flag: "limit" })?;
    let region = args
        .region
        .clone()
        .or_else(|| file.as_ref().map(|c| c.region.clone()))
        .unwrap_or_default();

    Ok(PrepConfig {
        project,
        region,
        source_table,
        output_dataset,
        limit,
    })
}

/// What the calling pipeline reads back after a run.
#[derive(Debug, Serialize)]
pub struct PrepOutputs<'a> {
    pub new_bq_table_uri: &'a str,
    pub prepped_data_uri: &'a str,
    pub table_id: &'a TableId,
    pub region: &'a str,
    pub report: &'a PrepReport,
}

impl<'a> From<&'a PreparedTable> for PrepOutputs<'a> {
    fn from(out: &'a PreparedTable) -> Self {
        Self {
            new_bq_table_uri: &out.console_url,
            prepped_data_uri: &out.uri,
            table_id: &out.table_id,
            region: &out.region,
            report: &out.report,
        }
    }
}

async fn write_outputs(path: &Path, outputs: &PrepOutputs<'_>) -> CliResult<()> {
    let json = serde_json::to_vec_pretty(outputs).context(EncodeOutputsSnafu)?;
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = path.file_name().map(Path::new).unwrap_or(path);
    write_atomic(&StorageLocation::local(parent), name, &json)
        .await
        .context(WriteOutputsSnafu { path })
}

pub async fn cmd_prepare(args: PrepareArgs) -> CliResult<()> {
    let config = resolve_config(&args)?;
    let warehouse = crate::open_warehouse(&args.warehouse)?;
    let executor = args.engine.executor();

    let out = prepare_table(&warehouse, &config, executor.as_ref())
        .await
        .context(PrepareSnafu)?;

    let report = &out.report;
    println!("Prepared table : {}", out.table_id);
    println!("Artifact URI   : {}", out.uri);
    println!("Console URL    : {}", out.console_url);
    println!("Local path     : {}", out.path.display());
    println!("Engine         : {}", report.engine);
    println!("Rows written   : {}", report.rows_written);
    println!(
        "Splits         : TRAIN {} / VALIDATE {} / TEST {}",
        report.splits.train, report.splits.validate, report.splits.test
    );

    if let Some(path) = &args.outputs_json {
        write_outputs(path, &PrepOutputs::from(&out)).await?;
        println!("Outputs        : {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn args() -> PrepareArgs {
        PrepareArgs {
            warehouse: PathBuf::from("/wh"),
            config: None,
            project: None,
            region: None,
            source: None,
            output_dataset: None,
            limit: None,
            engine: EngineArg::Native,
            outputs_json: None,
        }
    }

    #[test]
    fn flags_override_config_file() -> TestResult {
        let tmp = TempDir::new()?;
        let cfg = tmp.path().join("prep.json");
        std::fs::write(
            &cfg,
            r#"{"project":"file-proj","region":"us","source_table":"a.b","output_dataset":"ml","limit":10}"#,
        )?;

        let mut args = args();
        args.config = Some(cfg);
        args.limit = Some(99);
        let resolved = resolve_config(&args)?;
        assert_eq!(resolved.project, "file-proj");
        assert_eq!(resolved.region, "us");
        assert_eq!(resolved.limit, 99);
        Ok(())
    }

    #[test]
    fn missing_flag_is_named() {
        let mut args = args();
        args.project = Some("p".to_string());
        args.source = Some("a.b".to_string());
        let err = resolve_config(&args).unwrap_err();
        assert!(err.to_string().contains("--output-dataset"), "{err}");
    }
}
