//! Arrow encoding of source and prepared relations.
//!
//! Source batches are decoded by column name, so extra columns are ignored
//! and column order does not matter. Integer columns of any width are widened
//! to `Int64`, and the smoking/alcohol indicators may be boolean or string
//! typed; both end up as their string form. Prepared batches always use
//! [`prepared_schema`], regardless of which executor produced them.

use std::sync::{Arc, OnceLock};

use arrow::array::{
    Array, ArrayRef, BooleanArray, BooleanBuilder, Float64Array, Float64Builder, Int64Array,
    Int64Builder, RecordBatch, StringArray, StringBuilder,
};
use arrow::compute::{CastOptions, cast_with_options};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use snafu::prelude::*;

use crate::record::{BirthRecord, Plurality, PreparedRecord, Split};
use crate::report::SplitCounts;

/// Source column names.
pub mod source_columns {
    /// Birth weight.
    pub const WEIGHT_POUNDS: &str = "weight_pounds";
    /// Sex indicator.
    pub const IS_MALE: &str = "is_male";
    /// Mother's age.
    pub const MOTHER_AGE: &str = "mother_age";
    /// Plurality count.
    pub const PLURALITY: &str = "plurality";
    /// Gestation weeks.
    pub const GESTATION_WEEKS: &str = "gestation_weeks";
    /// Smoking indicator.
    pub const CIGARETTE_USE: &str = "cigarette_use";
    /// Alcohol indicator.
    pub const ALCOHOL_USE: &str = "alcohol_use";
    /// Birth year.
    pub const YEAR: &str = "year";
    /// Birth month.
    pub const MONTH: &str = "month";
    /// Day of week.
    pub const WDAY: &str = "wday";
    /// Day of month.
    pub const DAY: &str = "day";
    /// Maternal residence state.
    pub const STATE: &str = "state";
    /// Maternal birth state.
    pub const MOTHER_BIRTH_STATE: &str = "mother_birth_state";
}

/// Name of the label column in prepared relations.
pub const SPLITS_COLUMN: &str = "splits";

/// Errors from decoding or conforming record batches.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CodecError {
    /// A required column is absent.
    #[snafu(display("Missing required column '{column}'"))]
    MissingColumn {
        /// Column name.
        column: String,
    },

    /// A column exists but its Arrow type cannot be interpreted.
    #[snafu(display("Column '{column}' has unsupported type {data_type:?}"))]
    UnsupportedType {
        /// Column name.
        column: String,
        /// Actual Arrow type.
        data_type: DataType,
    },

    /// A value does not fit the canonical column type, e.g. a `UInt64`
    /// above `i64::MAX`.
    #[snafu(display("Column '{column}' cannot be read as {data_type:?}: {source}"))]
    Cast {
        /// Column name.
        column: String,
        /// Canonical Arrow type.
        data_type: DataType,
        /// Underlying Arrow error.
        source: ArrowError,
    },

    /// Arrow batch construction failed.
    #[snafu(display("Arrow error: {source}"))]
    Arrow {
        /// Underlying Arrow error.
        source: ArrowError,
    },
}

/// Canonical source schema, used when seeding relations.
pub fn source_schema() -> SchemaRef {
    static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
    Arc::clone(SCHEMA.get_or_init(|| {
        use source_columns::*;
        Arc::new(Schema::new(vec![
            Field::new(WEIGHT_POUNDS, DataType::Float64, true),
            Field::new(IS_MALE, DataType::Boolean, true),
            Field::new(MOTHER_AGE, DataType::Int64, true),
            Field::new(PLURALITY, DataType::Int64, true),
            Field::new(GESTATION_WEEKS, DataType::Int64, true),
            Field::new(CIGARETTE_USE, DataType::Utf8, true),
            Field::new(ALCOHOL_USE, DataType::Utf8, true),
            Field::new(YEAR, DataType::Int64, true),
            Field::new(MONTH, DataType::Int64, true),
            Field::new(WDAY, DataType::Int64, true),
            Field::new(DAY, DataType::Int64, true),
            Field::new(STATE, DataType::Utf8, true),
            Field::new(MOTHER_BIRTH_STATE, DataType::Utf8, true),
        ]))
    }))
}

/// Schema of every prepared relation.
pub fn prepared_schema() -> SchemaRef {
    static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
    Arc::clone(SCHEMA.get_or_init(|| {
        use source_columns::*;
        Arc::new(Schema::new(vec![
            Field::new(WEIGHT_POUNDS, DataType::Float64, true),
            Field::new(IS_MALE, DataType::Utf8, true),
            Field::new(MOTHER_AGE, DataType::Int64, true),
            Field::new(PLURALITY, DataType::Utf8, true),
            Field::new(GESTATION_WEEKS, DataType::Int64, true),
            Field::new(CIGARETTE_USE, DataType::Utf8, false),
            Field::new(ALCOHOL_USE, DataType::Utf8, false),
            Field::new(SPLITS_COLUMN, DataType::Utf8, false),
        ]))
    }))
}

fn accepts(target: &DataType, actual: &DataType) -> bool {
    if matches!(actual, DataType::Null) {
        return true;
    }
    match target {
        DataType::Int64 => actual.is_integer(),
        DataType::Float64 => actual.is_integer() || actual.is_floating(),
        DataType::Boolean => matches!(actual, DataType::Boolean),
        DataType::Utf8 => matches!(
            actual,
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View | DataType::Boolean
        ),
        _ => false,
    }
}

fn column_as(batch: &RecordBatch, column: &str, target: &DataType) -> Result<ArrayRef, CodecError> {
    let col = batch
        .column_by_name(column)
        .context(MissingColumnSnafu { column })?;
    let actual = col.data_type();
    ensure!(
        accepts(target, actual),
        UnsupportedTypeSnafu {
            column,
            data_type: actual.clone(),
        }
    );
    if actual == target {
        return Ok(Arc::clone(col));
    }
    checked_cast(col, column, target)
}

/// Cast that fails on overflow instead of producing nulls.
fn checked_cast(col: &ArrayRef, column: &str, target: &DataType) -> Result<ArrayRef, CodecError> {
    let options = CastOptions {
        safe: false,
        ..CastOptions::default()
    };
    cast_with_options(col.as_ref(), target, &options).context(CastSnafu {
        column,
        data_type: target.clone(),
    })
}

fn downcast<'a, A: Array + 'static>(arr: &'a ArrayRef, column: &str) -> Result<&'a A, CodecError> {
    arr.as_any()
        .downcast_ref::<A>()
        .context(UnsupportedTypeSnafu {
            column,
            data_type: arr.data_type().clone(),
        })
}

fn opt_i64(a: &Int64Array, i: usize) -> Option<i64> {
    a.is_valid(i).then(|| a.value(i))
}

fn opt_f64(a: &Float64Array, i: usize) -> Option<f64> {
    a.is_valid(i).then(|| a.value(i))
}

fn opt_bool(a: &BooleanArray, i: usize) -> Option<bool> {
    a.is_valid(i).then(|| a.value(i))
}

fn opt_string(a: &StringArray, i: usize) -> Option<String> {
    a.is_valid(i).then(|| a.value(i).to_string())
}

/// Decode a source batch into rows.
pub fn decode_birth_records(batch: &RecordBatch) -> Result<Vec<BirthRecord>, CodecError> {
    use source_columns::*;

    let weight = column_as(batch, WEIGHT_POUNDS, &DataType::Float64)?;
    let is_male = column_as(batch, IS_MALE, &DataType::Boolean)?;
    let mother_age = column_as(batch, MOTHER_AGE, &DataType::Int64)?;
    let plurality = column_as(batch, PLURALITY, &DataType::Int64)?;
    let gestation = column_as(batch, GESTATION_WEEKS, &DataType::Int64)?;
    let cigarette = column_as(batch, CIGARETTE_USE, &DataType::Utf8)?;
    let alcohol = column_as(batch, ALCOHOL_USE, &DataType::Utf8)?;
    let year = column_as(batch, YEAR, &DataType::Int64)?;
    let month = column_as(batch, MONTH, &DataType::Int64)?;
    let wday = column_as(batch, WDAY, &DataType::Int64)?;
    let day = column_as(batch, DAY, &DataType::Int64)?;
    let state = column_as(batch, STATE, &DataType::Utf8)?;
    let birth_state = column_as(batch, MOTHER_BIRTH_STATE, &DataType::Utf8)?;

    let weight = downcast::<Float64Array>(&weight, WEIGHT_POUNDS)?;
    let is_male = downcast::<BooleanArray>(&is_male, IS_MALE)?;
    let mother_age = downcast::<Int64Array>(&mother_age, MOTHER_AGE)?;
    let plurality = downcast::<Int64Array>(&plurality, PLURALITY)?;
    let gestation = downcast::<Int64Array>(&gestation, GESTATION_WEEKS)?;
    let cigarette = downcast::<StringArray>(&cigarette, CIGARETTE_USE)?;
    let alcohol = downcast::<StringArray>(&alcohol, ALCOHOL_USE)?;
    let year = downcast::<Int64Array>(&year, YEAR)?;
    let month = downcast::<Int64Array>(&month, MONTH)?;
    let wday = downcast::<Int64Array>(&wday, WDAY)?;
    let day = downcast::<Int64Array>(&day, DAY)?;
    let state = downcast::<StringArray>(&state, STATE)?;
    let birth_state = downcast::<StringArray>(&birth_state, MOTHER_BIRTH_STATE)?;

    Ok((0..batch.num_rows())
        .map(|i| BirthRecord {
            weight_pounds: opt_f64(weight, i),
            is_male: opt_bool(is_male, i),
            mother_age: opt_i64(mother_age, i),
            plurality: opt_i64(plurality, i),
            gestation_weeks: opt_i64(gestation, i),
            cigarette_use: opt_string(cigarette, i),
            alcohol_use: opt_string(alcohol, i),
            year: opt_i64(year, i),
            month: opt_i64(month, i),
            wday: opt_i64(wday, i),
            day: opt_i64(day, i),
            state: opt_string(state, i),
            mother_birth_state: opt_string(birth_state, i),
        })
        .collect())
}

/// Encode rows with [`source_schema`].
pub fn encode_birth_records(records: &[BirthRecord]) -> Result<RecordBatch, ArrowError> {
    let n = records.len();
    let mut weight = Float64Builder::with_capacity(n);
    let mut is_male = BooleanBuilder::with_capacity(n);
    let mut mother_age = Int64Builder::with_capacity(n);
    let mut plurality = Int64Builder::with_capacity(n);
    let mut gestation = Int64Builder::with_capacity(n);
    let mut cigarette = StringBuilder::new();
    let mut alcohol = StringBuilder::new();
    let mut year = Int64Builder::with_capacity(n);
    let mut month = Int64Builder::with_capacity(n);
    let mut wday = Int64Builder::with_capacity(n);
    let mut day = Int64Builder::with_capacity(n);
    let mut state = StringBuilder::new();
    let mut birth_state = StringBuilder::new();

    for r in records {
        weight.append_option(r.weight_pounds);
        is_male.append_option(r.is_male);
        mother_age.append_option(r.mother_age);
        plurality.append_option(r.plurality);
        gestation.append_option(r.gestation_weeks);
        cigarette.append_option(r.cigarette_use.as_deref());
        alcohol.append_option(r.alcohol_use.as_deref());
        year.append_option(r.year);
        month.append_option(r.month);
        wday.append_option(r.wday);
        day.append_option(r.day);
        state.append_option(r.state.as_deref());
        birth_state.append_option(r.mother_birth_state.as_deref());
    }

    RecordBatch::try_new(
        source_schema(),
        vec![
            Arc::new(weight.finish()) as ArrayRef,
            Arc::new(is_male.finish()),
            Arc::new(mother_age.finish()),
            Arc::new(plurality.finish()),
            Arc::new(gestation.finish()),
            Arc::new(cigarette.finish()),
            Arc::new(alcohol.finish()),
            Arc::new(year.finish()),
            Arc::new(month.finish()),
            Arc::new(wday.finish()),
            Arc::new(day.finish()),
            Arc::new(state.finish()),
            Arc::new(birth_state.finish()),
        ],
    )
}

/// Encode prepared rows with [`prepared_schema`].
pub fn encode_prepared(records: &[PreparedRecord]) -> Result<RecordBatch, ArrowError> {
    let n = records.len();
    let mut weight = Float64Builder::with_capacity(n);
    let mut is_male = StringBuilder::new();
    let mut mother_age = Int64Builder::with_capacity(n);
    let mut plurality = StringBuilder::new();
    let mut gestation = Int64Builder::with_capacity(n);
    let mut cigarette = StringBuilder::new();
    let mut alcohol = StringBuilder::new();
    let mut splits = StringBuilder::new();

    for r in records {
        weight.append_option(r.weight_pounds);
        is_male.append_option(r.is_male);
        mother_age.append_option(r.mother_age);
        plurality.append_option(r.plurality.map(Plurality::label));
        gestation.append_option(r.gestation_weeks);
        cigarette.append_value(&r.cigarette_use);
        alcohol.append_value(&r.alcohol_use);
        splits.append_value(r.splits.label());
    }

    RecordBatch::try_new(
        prepared_schema(),
        vec![
            Arc::new(weight.finish()) as ArrayRef,
            Arc::new(is_male.finish()),
            Arc::new(mother_age.finish()),
            Arc::new(plurality.finish()),
            Arc::new(gestation.finish()),
            Arc::new(cigarette.finish()),
            Arc::new(alcohol.finish()),
            Arc::new(splits.finish()),
        ],
    )
}

/// Reorder and cast a batch into [`prepared_schema`].
///
/// Query engines are free to pick string encodings (for example view types)
/// and column nullability; this pins the destination to one physical layout.
pub fn conform_to_prepared(batch: &RecordBatch) -> Result<RecordBatch, CodecError> {
    let schema = prepared_schema();
    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let col = batch
                .column_by_name(field.name())
                .context(MissingColumnSnafu {
                    column: field.name(),
                })?;
            if col.data_type() == field.data_type() {
                Ok(Arc::clone(col))
            } else {
                checked_cast(col, field.name(), field.data_type())
            }
        })
        .collect::<Result<Vec<_>, CodecError>>()?;
    RecordBatch::try_new(schema, columns).context(ArrowSnafu)
}

fn sex_token_static(value: &str) -> Option<&'static str> {
    match value {
        "true" => Some("true"),
        "false" => Some("false"),
        _ => None,
    }
}

/// Decode a prepared batch (any layout [`conform_to_prepared`] accepts).
pub fn decode_prepared(batch: &RecordBatch) -> Result<Vec<PreparedRecord>, CodecError> {
    use source_columns::*;

    let batch = conform_to_prepared(batch)?;
    let weight = downcast::<Float64Array>(batch.column(0), WEIGHT_POUNDS)?;
    let is_male = downcast::<StringArray>(batch.column(1), IS_MALE)?;
    let mother_age = downcast::<Int64Array>(batch.column(2), MOTHER_AGE)?;
    let plurality = downcast::<StringArray>(batch.column(3), PLURALITY)?;
    let gestation = downcast::<Int64Array>(batch.column(4), GESTATION_WEEKS)?;
    let cigarette = downcast::<StringArray>(batch.column(5), CIGARETTE_USE)?;
    let alcohol = downcast::<StringArray>(batch.column(6), ALCOHOL_USE)?;
    let splits = downcast::<StringArray>(batch.column(7), SPLITS_COLUMN)?;

    (0..batch.num_rows())
        .map(|i| {
            let split_label = splits.value(i);
            let split = Split::from_label(split_label).context(UnsupportedTypeSnafu {
                column: SPLITS_COLUMN,
                data_type: DataType::Utf8,
            })?;
            Ok(PreparedRecord {
                weight_pounds: opt_f64(weight, i),
                is_male: opt_string(is_male, i).and_then(|s| sex_token_static(&s)),
                mother_age: opt_i64(mother_age, i),
                plurality: opt_string(plurality, i).and_then(|s| Plurality::from_label(&s)),
                gestation_weeks: opt_i64(gestation, i),
                cigarette_use: cigarette.value(i).to_string(),
                alcohol_use: alcohol.value(i).to_string(),
                splits: split,
            })
        })
        .collect()
}

/// Tally the `splits` column and count null `plurality` labels.
pub fn tally_prepared(batch: &RecordBatch) -> Result<(SplitCounts, u64), CodecError> {
    let splits = column_as(batch, SPLITS_COLUMN, &DataType::Utf8)?;
    let splits = downcast::<StringArray>(&splits, SPLITS_COLUMN)?;
    let plurality = batch
        .column_by_name(source_columns::PLURALITY)
        .context(MissingColumnSnafu {
            column: source_columns::PLURALITY,
        })?;

    let mut counts = SplitCounts::default();
    for label in splits.iter().flatten() {
        if let Some(split) = Split::from_label(label) {
            counts.record(split);
        }
    }
    Ok((counts, plurality.null_count() as u64))
}
