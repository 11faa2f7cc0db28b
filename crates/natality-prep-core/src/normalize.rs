//! Field normalization for qualifying rows.

use crate::{
    partition::split_for_record,
    record::{BirthRecord, Plurality, PreparedRecord, UNKNOWN},
};

/// Canonical token for a boolean sex indicator.
pub fn sex_token(is_male: bool) -> &'static str {
    if is_male { "true" } else { "false" }
}

/// String form of a nullable indicator, or `"Unknown"` when absent.
pub fn indicator_token(value: Option<&str>) -> String {
    value.unwrap_or(UNKNOWN).to_string()
}

/// Normalize a row and attach its split.
///
/// The caller is expected to have applied [`crate::filter::qualifies`]
/// first. Plurality counts outside `1..=5` produce a null label.
pub fn prepare_record(record: &BirthRecord) -> PreparedRecord {
    PreparedRecord {
        weight_pounds: record.weight_pounds,
        is_male: record.is_male.map(sex_token),
        mother_age: record.mother_age,
        plurality: record.plurality.and_then(Plurality::from_count),
        gestation_weeks: record.gestation_weeks,
        cigarette_use: indicator_token(record.cigarette_use.as_deref()),
        alcohol_use: indicator_token(record.alcohol_use.as_deref()),
        splits: split_for_record(record),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Split;

    #[test]
    fn scenario_row_normalizes() {
        let raw = BirthRecord {
            weight_pounds: Some(7.2),
            is_male: Some(true),
            mother_age: Some(28),
            plurality: Some(1),
            gestation_weeks: Some(39),
            cigarette_use: None,
            alcohol_use: Some("false".to_string()),
            year: Some(2015),
            month: Some(3),
            wday: Some(2),
            day: None,
            state: None,
            mother_birth_state: Some("CA".to_string()),
        };

        let prepared = prepare_record(&raw);
        assert_eq!(
            prepared,
            PreparedRecord {
                weight_pounds: Some(7.2),
                is_male: Some("true"),
                mother_age: Some(28),
                plurality: Some(Plurality::Single),
                gestation_weeks: Some(39),
                cigarette_use: "Unknown".to_string(),
                alcohol_use: "false".to_string(),
                splits: Split::Train,
            }
        );
    }

    #[test]
    fn sex_tokens() {
        assert_eq!(sex_token(true), "true");
        assert_eq!(sex_token(false), "false");
    }

    #[test]
    fn null_indicators_become_unknown() {
        assert_eq!(indicator_token(None), "Unknown");
        assert_eq!(indicator_token(Some("true")), "true");
    }

    #[test]
    fn out_of_range_plurality_propagates_null() {
        let raw = BirthRecord {
            plurality: Some(7),
            year: Some(2010),
            month: Some(1),
            ..Default::default()
        };
        assert_eq!(prepare_record(&raw).plurality, None);
    }

    #[test]
    fn null_sex_stays_null() {
        let raw = BirthRecord::default();
        assert_eq!(prepare_record(&raw).is_male, None);
    }
}
