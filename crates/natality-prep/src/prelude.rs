//! Wrapper prelude.
//!
//! The `natality-prep` crate is the supported public entry point.
//! Downstream code should prefer importing from this prelude instead of
//! depending on internal core module paths.

pub use crate::partition;
pub use crate::{
    BirthRecord, ConfigError, ExecutorError, NativeExecutor, Plurality, PrepConfig, PrepError,
    PrepExecutor, PrepReport, PrepRequest, PreparedRecord, PreparedTable, Split, SplitCounts,
    StorageLocation, TableId, Warehouse, prepare_table,
};

#[cfg(feature = "datafusion")]
pub use crate::DataFusionExecutor;
