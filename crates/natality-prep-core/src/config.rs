//! Run configuration for a preparation.
//!
//! A [`PrepConfig`] is plain data: the orchestrator (or the CLI) builds it
//! from flags and/or a JSON file and passes it into
//! [`crate::prepare::prepare_table`]. [`PrepConfig::validate`] runs before any
//! store interaction so malformed inputs fail fast.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::identifier::{self, IdentifierError, TableId};

/// Configuration errors. None of these are retried.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    /// A required field is empty.
    #[snafu(display("Configuration field '{field}' must not be empty"))]
    EmptyField {
        /// Name of the empty field.
        field: &'static str,
    },

    /// The row limit is zero or negative.
    #[snafu(display("Row limit must be > 0, got {limit}"))]
    NonPositiveLimit {
        /// Limit as supplied.
        limit: i64,
    },

    /// An identifier failed validation.
    #[snafu(display("Invalid identifier: {source}"))]
    InvalidIdentifier {
        /// Underlying identifier error.
        source: IdentifierError,
    },

    /// The config file could not be read.
    #[snafu(display("Failed to read config file {}: {source}", path.display()))]
    ReadConfigFile {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`PrepConfig`].
    #[snafu(display("Failed to parse config file {}: {source}", path.display()))]
    ParseConfigFile {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// Inputs of one preparation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepConfig {
    /// Project that owns the destination (and the source when unqualified).
    pub project: String,
    /// Region; carried through for the orchestrator, not used by the algorithm.
    #[serde(default)]
    pub region: String,
    /// Source relation, `[project.]dataset.table`.
    pub source_table: String,
    /// Dataset receiving `source_prepped_limit_{limit}`.
    pub output_dataset: String,
    /// Maximum number of qualifying rows to keep.
    pub limit: i64,
}

/// A config that passed validation, with identifiers resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedConfig {
    /// Resolved source relation.
    pub source: TableId,
    /// Resolved destination relation.
    pub destination: TableId,
    /// Positive row cap.
    pub limit: u64,
    /// Informational region.
    pub region: String,
}

impl PrepConfig {
    /// Load a config from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).context(ReadConfigFileSnafu { path })?;
        serde_json::from_str(&text).context(ParseConfigFileSnafu { path })
    }

    /// Check every field and resolve the source and destination identifiers.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        ensure!(
            !self.project.trim().is_empty(),
            EmptyFieldSnafu { field: "project" }
        );
        ensure!(
            !self.source_table.trim().is_empty(),
            EmptyFieldSnafu {
                field: "source_table"
            }
        );
        ensure!(
            !self.output_dataset.trim().is_empty(),
            EmptyFieldSnafu {
                field: "output_dataset"
            }
        );
        ensure!(self.limit > 0, NonPositiveLimitSnafu { limit: self.limit });

        identifier::validate_project(&self.project).context(InvalidIdentifierSnafu)?;
        let source =
            TableId::parse(&self.source_table, &self.project).context(InvalidIdentifierSnafu)?;
        let limit = self.limit as u64;
        let destination = TableId::prepped(&self.project, &self.output_dataset, limit)
            .context(InvalidIdentifierSnafu)?;

        Ok(ValidatedConfig {
            source,
            destination,
            limit,
            region: self.region.clone(),
        })
    }
}
