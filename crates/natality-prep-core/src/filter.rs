//! Data-quality gate applied before normalization.
//!
//! A row qualifies iff `year > 2002`, `weight_pounds > 0`, `mother_age > 0`,
//! `plurality > 0` and `gestation_weeks > 19`. A null in any of these columns
//! compares as unknown and therefore disqualifies the row. Rejected rows are
//! dropped silently; they are not errors.

use crate::record::BirthRecord;

/// Rows must be from a year strictly after this one.
pub const MIN_YEAR_EXCLUSIVE: i64 = 2002;

/// Rows must have a gestation strictly longer than this many weeks.
pub const MIN_GESTATION_WEEKS_EXCLUSIVE: i64 = 19;

/// Returns `true` when the row passes every quality predicate.
pub fn qualifies(record: &BirthRecord) -> bool {
    record.year.is_some_and(|y| y > MIN_YEAR_EXCLUSIVE)
        && record.weight_pounds.is_some_and(|w| w > 0.0)
        && record.mother_age.is_some_and(|a| a > 0)
        && record.plurality.is_some_and(|p| p > 0)
        && record
            .gestation_weeks
            .is_some_and(|g| g > MIN_GESTATION_WEEKS_EXCLUSIVE)
}
