//! Core engine for deterministic train/validate/test preparation of birth
//! records.
//!
//! This crate provides the pieces behind `natality-prep`:
//!
//! - Row-level types and the pure row functions: validity filter
//!   (`filter`), field normalization (`normalize`), the FarmHash
//!   fingerprint (`fingerprint`) and hash-bucket split assignment
//!   (`partition`).
//! - Relation identifiers and run configuration (`identifier`, `config`).
//! - A local warehouse of Parquet relations with atomic create-or-replace
//!   (`storage`, `warehouse`, `table_io`) and the Arrow codec for source and
//!   prepared rows (`codec`).
//! - The `PrepExecutor` trait with a native row-by-row implementation
//!   (`executor`) and the `prepare_table` entry point (`prepare`).
//!
//! Query-engine integrations and the CLI depend on this crate rather than
//! re-implementing the row semantics.
#![deny(missing_docs)]
pub mod codec;
pub mod config;
pub mod executor;
pub mod filter;
pub mod fingerprint;
pub mod identifier;
pub mod normalize;
pub mod partition;
pub mod prepare;
pub mod record;
pub mod report;
pub mod storage;
pub mod table_io;
pub mod warehouse;
