//! Warehouse layout: where relations live on disk.
//!
//! Each relation `project.dataset.table` is a single Parquet file at
//! `<root>/<project>/<dataset>/<table>.parquet`. A relation either exists in
//! full or not at all; replacements go through the storage layer's
//! stage-then-rename path.

use std::path::{Path, PathBuf};

use snafu::prelude::*;

use crate::{
    identifier::TableId,
    storage::{self, FileHeadTail4, NotParquetSnafu, StorageLocation, StorageResult},
};

/// File extension of every relation.
pub const TABLE_EXT: &str = "parquet";

const PARQUET_MAGIC: &[u8; 4] = b"PAR1";

/// Handle to a warehouse root.
///
/// Cheap to clone; holds no open files. Each run passes it explicitly into
/// the executor, so there is no process-wide store state.
#[derive(Debug, Clone)]
pub struct Warehouse {
    location: StorageLocation,
}

impl Warehouse {
    /// Warehouse rooted at a local directory.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            location: StorageLocation::local(root),
        }
    }

    /// Warehouse at an already parsed location.
    pub fn new(location: StorageLocation) -> Self {
        Self { location }
    }

    /// Storage root.
    pub fn location(&self) -> &StorageLocation {
        &self.location
    }

    /// Relative path of a relation: `<project>/<dataset>/<table>.parquet`.
    pub fn table_rel_path(id: &TableId) -> PathBuf {
        Path::new(&id.project)
            .join(&id.dataset)
            .join(format!("{}.{TABLE_EXT}", id.table))
    }

    /// Absolute path of a relation.
    pub fn table_path(&self, id: &TableId) -> PathBuf {
        self.location.resolve(&Self::table_rel_path(id))
    }

    /// Check that a relation exists and is a complete Parquet file without
    /// reading it whole. Returns the file length.
    ///
    /// Returns `StorageError::NotFound` when the relation does not exist and
    /// `StorageError::NotParquet` when the magic is missing at either end.
    pub async fn probe(&self, id: &TableId) -> StorageResult<u64> {
        let rel = Self::table_rel_path(id);
        let probe = storage::read_head_tail_4(&self.location, &rel).await?;
        ensure!(
            looks_like_parquet(&probe),
            NotParquetSnafu {
                path: self.location.resolve(&rel).display().to_string(),
                len: probe.len,
            }
        );
        Ok(probe.len)
    }

    /// Read a relation's bytes.
    pub async fn read_table_bytes(&self, id: &TableId) -> StorageResult<Vec<u8>> {
        storage::read_all_bytes(&self.location, &Self::table_rel_path(id)).await
    }
}

/// Whether a probe looks like a complete Parquet file (magic at both ends).
fn looks_like_parquet(probe: &FileHeadTail4) -> bool {
    probe.len >= 8 && &probe.head == PARQUET_MAGIC && &probe.tail == PARQUET_MAGIC
}
