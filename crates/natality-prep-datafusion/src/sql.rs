//! SQL text of the preparation query.

use natality_prep_core::{
    filter::{MIN_GESTATION_WEEKS_EXCLUSIVE, MIN_YEAR_EXCLUSIVE},
    partition::{BUCKETS, TRAIN_BUCKETS, VALIDATE_BUCKET},
    record::{Plurality, Split, UNKNOWN},
};

use crate::udf::PARTITION_KEY;

/// Quote an identifier for DataFusion SQL.
pub fn quote_identifier(name: &str) -> String {
    let escaped = name.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn plurality_case() -> String {
    let arms: Vec<String> = (1..=5)
        .filter_map(Plurality::from_count)
        .enumerate()
        .map(|(i, p)| format!("WHEN plurality = {} THEN {}", i + 1, quote_literal(p.label())))
        .collect();
    format!("CASE {} END", arms.join(" "))
}

/// Render the preparation query over the relation registered as `table`.
///
/// The shape follows the classic warehouse statement: a limited CTE that
/// filters, normalizes and hashes, and an outer select that buckets the
/// hash into `splits`. A null key falls through to the `ELSE` branch.
pub fn render_prep_sql(table: &str, limit: u64) -> String {
    let unknown = quote_literal(UNKNOWN);
    format!(
        "WITH all_hash_limit AS (
    SELECT
        weight_pounds,
        CAST(is_male AS VARCHAR) AS is_male,
        mother_age,
        {plurality} AS plurality,
        gestation_weeks,
        COALESCE(CAST(cigarette_use AS VARCHAR), {unknown}) AS cigarette_use,
        COALESCE(CAST(alcohol_use AS VARCHAR), {unknown}) AS alcohol_use,
        {PARTITION_KEY}(
            CAST(year AS VARCHAR)
            || CAST(month AS VARCHAR)
            || CAST(COALESCE(wday, day, 0) AS VARCHAR)
            || COALESCE(CAST(state AS VARCHAR), {unknown})
            || COALESCE(CAST(mother_birth_state AS VARCHAR), {unknown})
        ) AS hash_values
    FROM {table}
    WHERE
        year > {min_year} AND
        weight_pounds > 0 AND
        NOT isnan(CAST(weight_pounds AS DOUBLE)) AND
        mother_age > 0 AND
        plurality > 0 AND
        gestation_weeks > {min_gestation}
    LIMIT {limit}
)
SELECT
    weight_pounds,
    is_male,
    mother_age,
    plurality,
    gestation_weeks,
    cigarette_use,
    alcohol_use,
    CASE
        WHEN hash_values % {BUCKETS} < {TRAIN_BUCKETS} THEN {train}
        WHEN hash_values % {BUCKETS} < {validate_upper} THEN {validate}
        ELSE {test}
    END AS splits
FROM all_hash_limit",
        plurality = plurality_case(),
        table = quote_identifier(table),
        min_year = MIN_YEAR_EXCLUSIVE,
        min_gestation = MIN_GESTATION_WEEKS_EXCLUSIVE,
        validate_upper = VALIDATE_BUCKET + 1,
        train = quote_literal(Split::Train.label()),
        validate = quote_literal(Split::Validate.label()),
        test = quote_literal(Split::Test.label()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_carries_filters_limit_and_buckets() {
        let sql = render_prep_sql("natality", 1000);
        assert!(sql.contains("FROM \"natality\""));
        assert!(sql.contains("LIMIT 1000"));
        assert!(sql.contains("year > 2002"));
        assert!(sql.contains("gestation_weeks > 19"));
        assert!(sql.contains("WHEN plurality = 5 THEN 'Quintuplets(5)'"));
        assert!(sql.contains("WHEN hash_values % 10 < 8 THEN 'TRAIN'"));
        assert!(sql.contains("WHEN hash_values % 10 < 9 THEN 'VALIDATE'"));
        assert!(sql.contains("ELSE 'TEST'"));
    }

    #[test]
    fn identifiers_and_literals_are_escaped() {
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }
}
