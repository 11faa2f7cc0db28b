//! Partition keys and split assignment.
//!
//! The key is `|FARM_FINGERPRINT(year ‖ month ‖ day_id ‖ state ‖ birth_state)|`
//! where `day_id` is the weekday if present, else the day of month, else `0`,
//! and absent states hash as `"Unknown"`. Rows that agree on those five
//! fields share a key and therefore a split.
//!
//! Split assignment only looks at `key % 10`: buckets `0..=7` train, `8`
//! validates and `9` tests, for an expected 80/10/10 distribution.

use std::fmt;

use crate::{
    fingerprint::farm_fingerprint,
    record::{BirthRecord, Split, UNKNOWN},
};

/// Number of modular buckets used for split assignment.
pub const BUCKETS: u64 = 10;

/// Buckets strictly below this value are assigned to [`Split::Train`].
pub const TRAIN_BUCKETS: u64 = 8;

/// Bucket assigned to [`Split::Validate`].
pub const VALIDATE_BUCKET: u64 = 8;

/// Non-negative 64-bit partition key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(pub u64);

impl PartitionKey {
    /// Hash an already concatenated key string.
    ///
    /// The absolute value uses `unsigned_abs`, so the one fingerprint equal to
    /// `i64::MIN` maps to `2^63` rather than overflowing.
    pub fn from_concatenated(input: &str) -> Self {
        PartitionKey(farm_fingerprint(input).unsigned_abs())
    }

    /// Derive the key of a source row.
    ///
    /// Returns `None` when `year` or `month` is null, matching SQL `CONCAT`
    /// null propagation.
    pub fn for_record(record: &BirthRecord) -> Option<Self> {
        key_input(record).map(|s| Self::from_concatenated(&s))
    }

    /// `key % 10`.
    pub fn bucket(self) -> u64 {
        self.0 % BUCKETS
    }

    /// Split owning this key.
    pub fn split(self) -> Split {
        assign_split(self.bucket())
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The string that gets fingerprinted for `record`.
pub fn key_input(record: &BirthRecord) -> Option<String> {
    let year = record.year?;
    let month = record.month?;
    let day_id = record.wday.or(record.day).unwrap_or(0);
    let state = record.state.as_deref().unwrap_or(UNKNOWN);
    let birth_state = record.mother_birth_state.as_deref().unwrap_or(UNKNOWN);
    Some(format!("{year}{month}{day_id}{state}{birth_state}"))
}

/// Map a bucket in `0..10` to its split. Values `>= 9` fall through to test.
pub fn assign_split(bucket: u64) -> Split {
    if bucket < TRAIN_BUCKETS {
        Split::Train
    } else if bucket == VALIDATE_BUCKET {
        Split::Validate
    } else {
        Split::Test
    }
}

/// Split for a row; rows without a key land in [`Split::Test`].
pub fn split_for_record(record: &BirthRecord) -> Split {
    PartitionKey::for_record(record)
        .map(PartitionKey::split)
        .unwrap_or(Split::Test)
}
