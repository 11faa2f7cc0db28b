//! Row-level types for the partitioner.
//!
//! A [`BirthRecord`] mirrors one row of the source relation. Every field is
//! optional because every source column is nullable in the store; the row
//! filter decides which rows are usable. A [`PreparedRecord`] is the
//! normalized row written to the destination relation, tagged with its
//! [`Split`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel written for absent smoking/alcohol indicators and hashed for
/// absent states.
pub const UNKNOWN: &str = "Unknown";

/// One raw source row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BirthRecord {
    /// Birth weight in pounds.
    pub weight_pounds: Option<f64>,
    /// Sex indicator.
    pub is_male: Option<bool>,
    /// Mother's age in years.
    pub mother_age: Option<i64>,
    /// Number of children delivered together (1..=5 for labeled rows).
    pub plurality: Option<i64>,
    /// Gestation duration in weeks.
    pub gestation_weeks: Option<i64>,
    /// Smoking indicator, kept as its string form.
    pub cigarette_use: Option<String>,
    /// Alcohol indicator, kept as its string form.
    pub alcohol_use: Option<String>,
    /// Year of birth.
    pub year: Option<i64>,
    /// Month of birth.
    pub month: Option<i64>,
    /// Day of week.
    pub wday: Option<i64>,
    /// Day of month.
    pub day: Option<i64>,
    /// Maternal residence state.
    pub state: Option<String>,
    /// Maternal birth state.
    pub mother_birth_state: Option<String>,
}

/// Canonical plurality labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Plurality {
    /// One child.
    Single,
    /// Two children.
    Twins,
    /// Three children.
    Triplets,
    /// Four children.
    Quadruplets,
    /// Five children.
    Quintuplets,
}

impl Plurality {
    /// All labels in count order.
    pub const ALL: [Plurality; 5] = [
        Plurality::Single,
        Plurality::Twins,
        Plurality::Triplets,
        Plurality::Quadruplets,
        Plurality::Quintuplets,
    ];

    /// Map a raw count to its label; counts outside 1..=5 have none.
    pub fn from_count(count: i64) -> Option<Self> {
        match count {
            1 => Some(Plurality::Single),
            2 => Some(Plurality::Twins),
            3 => Some(Plurality::Triplets),
            4 => Some(Plurality::Quadruplets),
            5 => Some(Plurality::Quintuplets),
            _ => None,
        }
    }

    /// Destination token, e.g. `Twins(2)`.
    pub fn label(self) -> &'static str {
        match self {
            Plurality::Single => "Single(1)",
            Plurality::Twins => "Twins(2)",
            Plurality::Triplets => "Triplets(3)",
            Plurality::Quadruplets => "Quadruplets(4)",
            Plurality::Quintuplets => "Quintuplets(5)",
        }
    }

    /// Parse a destination token back into a label.
    pub fn from_label(label: &str) -> Option<Self> {
        Plurality::ALL.into_iter().find(|p| p.label() == label)
    }
}

impl fmt::Display for Plurality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Dataset split a prepared row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Split {
    /// Training rows (buckets 0..=7).
    Train,
    /// Validation rows (bucket 8).
    Validate,
    /// Test rows (bucket 9).
    Test,
}

impl Split {
    /// All splits in label order.
    pub const ALL: [Split; 3] = [Split::Train, Split::Validate, Split::Test];

    /// Destination token for the `splits` column.
    pub fn label(self) -> &'static str {
        match self {
            Split::Train => "TRAIN",
            Split::Validate => "VALIDATE",
            Split::Test => "TEST",
        }
    }

    /// Parse a `splits` column token.
    pub fn from_label(label: &str) -> Option<Self> {
        Split::ALL.into_iter().find(|s| s.label() == label)
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One normalized destination row.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRecord {
    /// Pass-through weight.
    pub weight_pounds: Option<f64>,
    /// `"true"` / `"false"`, or null when the source is null.
    pub is_male: Option<&'static str>,
    /// Pass-through age.
    pub mother_age: Option<i64>,
    /// Canonical label; `None` for counts outside 1..=5.
    pub plurality: Option<Plurality>,
    /// Pass-through gestation duration.
    pub gestation_weeks: Option<i64>,
    /// String form of the smoking indicator or [`UNKNOWN`].
    pub cigarette_use: String,
    /// String form of the alcohol indicator or [`UNKNOWN`].
    pub alcohol_use: String,
    /// Assigned split.
    pub splits: Split,
}
