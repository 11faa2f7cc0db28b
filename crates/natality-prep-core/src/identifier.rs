//! Relation identifiers.
//!
//! A relation is addressed as `project.dataset.table`. Source identifiers may
//! omit the project (`dataset.table`), in which case the configured project
//! is used. Destinations are always
//! `{project}.{output_dataset}.source_prepped_limit_{limit}`.

use std::fmt;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Prefix of every prepared table name; the row limit is appended.
pub const PREPPED_TABLE_PREFIX: &str = "source_prepped_limit_";

/// Errors raised while parsing or validating identifiers.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum IdentifierError {
    /// The identifier does not have two or three dot-separated parts.
    #[snafu(display("Malformed table identifier '{id}': expected [project.]dataset.table"))]
    Malformed {
        /// Raw identifier as supplied.
        id: String,
    },

    /// One component is empty or contains characters outside its grammar.
    #[snafu(display("Invalid {kind} id '{value}': {reason}"))]
    InvalidComponent {
        /// `project`, `dataset` or `table`.
        kind: &'static str,
        /// Offending component.
        value: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

fn check_component(
    kind: &'static str,
    value: &str,
    allow_dash: bool,
) -> Result<(), IdentifierError> {
    if value.is_empty() {
        return InvalidComponentSnafu {
            kind,
            value,
            reason: "must not be empty",
        }
        .fail();
    }
    let ok = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || (allow_dash && c == '-'));
    if !ok {
        let reason = if allow_dash {
            "only ASCII letters, digits, '-' and '_' are allowed"
        } else {
            "only ASCII letters, digits and '_' are allowed"
        };
        return InvalidComponentSnafu {
            kind,
            value,
            reason,
        }
        .fail();
    }
    Ok(())
}

/// Validate a project id.
pub fn validate_project(project: &str) -> Result<(), IdentifierError> {
    check_component("project", project, true)
}

/// Validate a dataset id.
pub fn validate_dataset(dataset: &str) -> Result<(), IdentifierError> {
    check_component("dataset", dataset, false)
}

/// Validate a table id.
pub fn validate_table(table: &str) -> Result<(), IdentifierError> {
    check_component("table", table, false)
}

/// Fully-qualified relation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId {
    /// Project the relation lives in.
    pub project: String,
    /// Dataset within the project.
    pub dataset: String,
    /// Table within the dataset.
    pub table: String,
}

impl TableId {
    /// Build and validate an identifier from its parts.
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<Self, IdentifierError> {
        let id = TableId {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        };
        validate_project(&id.project)?;
        validate_dataset(&id.dataset)?;
        validate_table(&id.table)?;
        Ok(id)
    }

    /// Parse `project.dataset.table`, or `dataset.table` using
    /// `default_project`.
    pub fn parse(spec: &str, default_project: &str) -> Result<Self, IdentifierError> {
        let trimmed = spec.trim().trim_matches('`');
        let parts: Vec<&str> = trimmed.split('.').collect();
        match parts.as_slice() {
            [project, dataset, table] => TableId::new(*project, *dataset, *table),
            [dataset, table] => TableId::new(default_project, *dataset, *table),
            _ => MalformedSnafu { id: spec }.fail(),
        }
    }

    /// Destination for a preparation run with the given row limit.
    pub fn prepped(
        project: impl Into<String>,
        output_dataset: impl Into<String>,
        limit: u64,
    ) -> Result<Self, IdentifierError> {
        TableId::new(
            project,
            output_dataset,
            format!("{PREPPED_TABLE_PREFIX}{limit}"),
        )
    }

    /// Artifact reference handed to downstream pipeline steps.
    pub fn artifact_uri(&self) -> String {
        format!("bq://{self}")
    }

    /// Human-facing console locator; string templating only.
    pub fn console_url(&self) -> String {
        let TableId {
            project,
            dataset,
            table,
        } = self;
        format!(
            "https://console.cloud.google.com/bigquery?project={project}&p={project}&d={dataset}&t={table}&page=table"
        )
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}
