//! Run statistics.

use serde::{Deserialize, Serialize};

use crate::record::Split;

/// Number of prepared rows per split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCounts {
    /// Rows labeled `TRAIN`.
    pub train: u64,
    /// Rows labeled `VALIDATE`.
    pub validate: u64,
    /// Rows labeled `TEST`.
    pub test: u64,
}

impl SplitCounts {
    /// Count one row.
    pub fn record(&mut self, split: Split) {
        match split {
            Split::Train => self.train += 1,
            Split::Validate => self.validate += 1,
            Split::Test => self.test += 1,
        }
    }

    /// Count for one split.
    pub fn get(&self, split: Split) -> u64 {
        match split {
            Split::Train => self.train,
            Split::Validate => self.validate,
            Split::Test => self.test,
        }
    }

    /// Add another tally into this one.
    pub fn merge(&mut self, other: SplitCounts) {
        self.train += other.train;
        self.validate += other.validate;
        self.test += other.test;
    }

    /// Rows across all splits.
    pub fn total(&self) -> u64 {
        self.train + self.validate + self.test
    }
}

/// What an executor did in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepReport {
    /// Executor that produced the table.
    pub engine: String,
    /// Source rows examined before the limit was reached, when known.
    pub rows_scanned: Option<u64>,
    /// Rows written to the destination.
    pub rows_written: u64,
    /// Split distribution of the written rows.
    pub splits: SplitCounts,
    /// Written rows whose plurality fell outside 1..=5 and has no label.
    pub unlabeled_plurality: u64,
}
