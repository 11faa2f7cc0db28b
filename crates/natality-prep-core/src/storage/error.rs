use std::{error::Error, fmt, io};

use snafu::{Backtrace, prelude::*};

/// Failure reported by the filesystem under a warehouse root.
#[derive(Debug)]
pub enum BackendError {
    /// A local filesystem I/O error.
    Local(io::Error),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Local(e) => write!(f, "local I/O error: {e}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BackendError::Local(e) => Some(e),
        }
    }
}

/// Errors from reading, probing or replacing warehouse files.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// No regular file exists at the relation path.
    #[snafu(display("Path not found: {path}"))]
    NotFound {
        /// Absolute path that was looked up.
        path: String,
        /// Backend failure behind the lookup.
        source: BackendError,
        /// Captured at the failing lookup.
        backtrace: Backtrace,
    },

    /// A relation file exists but lacks the Parquet magic at either end,
    /// e.g. a truncated file or a CSV dropped into the warehouse.
    #[snafu(display("Not a Parquet file ({len} bytes): {path}"))]
    NotParquet {
        /// Absolute path of the file.
        path: String,
        /// File length in bytes.
        len: u64,
        /// Captured at the failing probe.
        backtrace: Backtrace,
    },

    /// Any other filesystem failure: permissions, staging, rename.
    #[snafu(display("Local I/O error at {path}: {source}"))]
    OtherIo {
        /// Absolute path the failing call addressed.
        path: String,
        /// Backend failure.
        source: BackendError,
        /// Captured at the failing call.
        backtrace: Backtrace,
    },
}
