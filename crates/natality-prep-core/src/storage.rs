//! Filesystem access for the warehouse.
//!
//! Everything that touches bytes on disk goes through this module:
//!
//! - Resolving a relative path against a [`StorageLocation`] root.
//! - Whole-file reads used to load source relations.
//! - Atomic replacement: payloads are written to a uniquely named staging
//!   sibling, fsynced, and renamed over the target, so readers only ever see
//!   the old file or a complete new one. Staging files are removed on every
//!   error path.
//! - Streaming sinks with the same commit-on-finish semantics
//!   ([`open_output_sink`]).
//!
//! Only the local filesystem is implemented. Callers work with relative paths
//! so another backend can be slotted in behind [`StorageLocation`].

mod error;
mod output;

pub use error::{BackendError, StorageError};
pub(crate) use error::{NotFoundSnafu, NotParquetSnafu, OtherIoSnafu};
pub use output::{OutputSink, open_output_sink};

use snafu::{Backtrace, prelude::*};
use std::{
    io::{self, SeekFrom},
    path::{Path, PathBuf},
};
use tempfile::{NamedTempFile, TempPath};
use tokio::{
    fs,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};

const STAGING_SUFFIX: &str = ".tmp";

/// General result type used by storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Root of a storage backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageLocation {
    /// A directory on the local filesystem.
    Local(PathBuf),
}

impl StorageLocation {
    /// Creates a new `StorageLocation` for a local filesystem path.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        StorageLocation::Local(root.into())
    }

    /// Parse a user-facing location string.
    ///
    /// Plain paths and `file://` URLs map to the local backend. Empty specs
    /// are rejected.
    pub fn parse(spec: &str) -> StorageResult<Self> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(StorageError::OtherIo {
                path: "<empty location>".to_string(),
                source: BackendError::Local(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "storage location is empty",
                )),
                backtrace: Backtrace::capture(),
            });
        }
        let path = trimmed.strip_prefix("file://").unwrap_or(trimmed);
        Ok(StorageLocation::Local(PathBuf::from(path)))
    }

    /// Absolute (root-joined) path of `rel`.
    pub fn resolve(&self, rel: &Path) -> PathBuf {
        join_local(self, rel)
    }
}

/// Join a location with a relative path into a local path.
pub(crate) fn join_local(location: &StorageLocation, rel: &Path) -> PathBuf {
    match location {
        StorageLocation::Local(root) => root.join(rel),
    }
}

pub(crate) async fn create_parent_dir(abs: &Path) -> StorageResult<()> {
    if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: parent.display().to_string(),
            })?;
    }
    Ok(())
}

/// Create a uniquely named staging file next to `target`.
///
/// Every writer gets its own `.<name>.<random>.tmp` sibling, so overlapping
/// replaces of one relation never write into the same file. The returned
/// handle deletes the file on drop until it is persisted.
pub(crate) fn create_staging_file(target: &Path) -> StorageResult<NamedTempFile> {
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(STAGING_SUFFIX)
        .tempfile_in(dir)
        .map_err(BackendError::Local)
        .context(OtherIoSnafu {
            path: dir.display().to_string(),
        })
}

/// Rename a staging file over `target` in one step.
///
/// On failure the staging file is removed and `target` is left as it was.
pub(crate) fn persist_staging(staged: TempPath, target: &Path) -> StorageResult<()> {
    staged
        .persist(target)
        .map_err(|e| BackendError::Local(e.error))
        .context(OtherIoSnafu {
            path: target.display().to_string(),
        })
}

/// Write `contents` to `rel_path` inside `location`, replacing any existing
/// file atomically.
///
/// # Errors
///
/// Returns `StorageError::OtherIo` when any filesystem step fails. The
/// target is untouched in that case.
pub async fn write_atomic(
    location: &StorageLocation,
    rel_path: &Path,
    contents: &[u8],
) -> StorageResult<()> {
    match location {
        StorageLocation::Local(_) => {
            let abs = join_local(location, rel_path);
            create_parent_dir(&abs).await?;

            let (file, staged) = create_staging_file(&abs)?.into_parts();
            let staged_path = staged.display().to_string();

            let mut file = fs::File::from_std(file);
            file.write_all(contents)
                .await
                .map_err(BackendError::Local)
                .context(OtherIoSnafu {
                    path: staged_path.clone(),
                })?;
            file.sync_all()
                .await
                .map_err(BackendError::Local)
                .context(OtherIoSnafu { path: staged_path })?;
            drop(file);

            persist_staging(staged, &abs)
        }
    }
}

/// Read the full contents of the file at `rel_path`.
///
/// Errors:
/// - If the file does not exist this returns `StorageError::NotFound`.
/// - On any other I/O error this returns `StorageError::OtherIo`.
pub async fn read_all_bytes(location: &StorageLocation, rel_path: &Path) -> StorageResult<Vec<u8>> {
    match location {
        StorageLocation::Local(_) => {
            let abs = join_local(location, rel_path);
            let path_str = abs.display().to_string();

            match fs::read(&abs).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    Err(BackendError::Local(e)).context(NotFoundSnafu { path: path_str })
                }
                Err(e) => Err(BackendError::Local(e)).context(OtherIoSnafu { path: path_str }),
            }
        }
    }
}

/// Small probe used to recognise Parquet files without reading them whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeadTail4 {
    /// Length of the file in bytes.
    pub len: u64,
    /// First 4 bytes of the file (zero-filled if the file is shorter).
    pub head: [u8; 4],
    /// Last 4 bytes of the file (zero-filled if the file is shorter than 8).
    pub tail: [u8; 4],
}

/// Read the length, first 4 bytes, and last 4 bytes of a file.
///
/// Semantics:
/// - Missing file or non-regular file: `StorageError::NotFound`.
/// - Other I/O problems: `StorageError::OtherIo`.
pub async fn read_head_tail_4(
    location: &StorageLocation,
    rel_path: &Path,
) -> StorageResult<FileHeadTail4> {
    match location {
        StorageLocation::Local(_) => {
            let abs = join_local(location, rel_path);
            let path_str = abs.display().to_string();

            let meta = match fs::metadata(&abs).await {
                Ok(m) => m,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(BackendError::Local(e)).context(NotFoundSnafu { path: path_str });
                }
                Err(e) => {
                    return Err(BackendError::Local(e)).context(OtherIoSnafu { path: path_str });
                }
            };

            if !meta.is_file() {
                return Err(StorageError::NotFound {
                    path: path_str,
                    source: BackendError::Local(io::Error::other("not a regular file")),
                    backtrace: Backtrace::capture(),
                });
            }

            let len = meta.len();
            let mut file = fs::File::open(&abs)
                .await
                .map_err(BackendError::Local)
                .context(OtherIoSnafu {
                    path: path_str.clone(),
                })?;

            let mut head = [0u8; 4];
            let mut tail = [0u8; 4];

            if len >= 4 {
                file.read_exact(&mut head)
                    .await
                    .map_err(BackendError::Local)
                    .context(OtherIoSnafu {
                        path: path_str.clone(),
                    })?;
            }

            if len >= 8 {
                file.seek(SeekFrom::End(-4))
                    .await
                    .map_err(BackendError::Local)
                    .context(OtherIoSnafu {
                        path: path_str.clone(),
                    })?;
                file.read_exact(&mut tail)
                    .await
                    .map_err(BackendError::Local)
                    .context(OtherIoSnafu {
                        path: path_str.clone(),
                    })?;
            }
            Ok(FileHeadTail4 { len, head, tail })
        }
    }
}
