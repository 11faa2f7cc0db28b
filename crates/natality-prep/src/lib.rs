//! # natality-prep
//!
//! Turns a birth-record table into a model-ready relation with a
//! deterministic TRAIN / VALIDATE / TEST label per row.
//!
//! This crate is the supported public entry point and provides a small, stable surface.
//!
//! ## Features
//!
//! - `datafusion` (default): Enables the SQL executor built on DataFusion
//!
//! ## Example
//!
//! ```rust,ignore
//! use natality_prep::prelude::*;
//!
//! let warehouse = Warehouse::local("/data/wh");
//! let out = prepare_table(&warehouse, &config, &NativeExecutor::default()).await?;
//! println!("{}", out.uri);
//! ```

/// Convenience prelude with the stable, supported surface.
pub mod prelude;

/// Fingerprint and split assignment (wrapper-only).
pub mod partition {
    pub use natality_prep_core::fingerprint::farm_fingerprint;
    pub use natality_prep_core::partition::{PartitionKey, key_input};
}

/// DataFusion integration (enabled by default).
#[cfg(feature = "datafusion")]
pub mod datafusion {
    pub use natality_prep_datafusion::*;
}

pub use natality_prep_core::config::{ConfigError, PrepConfig};
pub use natality_prep_core::executor::{
    ExecutorError, NativeExecutor, PrepExecutor, PrepRequest,
};
pub use natality_prep_core::identifier::TableId;
pub use natality_prep_core::prepare::{PrepError, PreparedTable, prepare_table};
pub use natality_prep_core::record::{BirthRecord, Plurality, PreparedRecord, Split};
pub use natality_prep_core::report::{PrepReport, SplitCounts};
pub use natality_prep_core::storage::StorageLocation;
pub use natality_prep_core::warehouse::Warehouse;

/// SQL executor (enabled by default).
#[cfg(feature = "datafusion")]
pub use natality_prep_datafusion::DataFusionExecutor;
