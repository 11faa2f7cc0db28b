//! DataFusion integration for `natality-prep-core`.
//!
//! This crate keeps all DataFusion types out of the core crate. The main
//! entry point is [`DataFusionExecutor`], which expresses the preparation as
//! a single SQL query with the fingerprint registered as scalar functions
//! (see [`register_fingerprint_udfs`]).
#![deny(missing_docs)]

mod executor;
pub mod sql;
pub mod udf;

pub use executor::{DataFusionExecutor, SOURCE_TABLE_NAME};
pub use udf::{farm_fingerprint_udf, partition_key_udf, register_fingerprint_udfs};
