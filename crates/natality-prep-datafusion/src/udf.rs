//! Fingerprint scalar functions for DataFusion sessions.
//!
//! - `farm_fingerprint(s)` returns FarmHash `Fingerprint64` of the UTF-8
//!   bytes of `s` as a signed 64-bit integer.
//! - `partition_key(s)` returns its absolute value as an unsigned 64-bit
//!   integer, so `i64::MIN` maps to `2^63` instead of overflowing.
//!
//! Both accept any string encoding (`Utf8`, `LargeUtf8`, `Utf8View`) and map
//! null inputs to null outputs.

use std::any::Any;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use datafusion::arrow::array::{ArrayRef, Int64Array, StringArray, UInt64Array};
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::DataType;
use datafusion::common::cast::as_string_array;
use datafusion::error::{DataFusionError, Result as DFResult};
use datafusion::logical_expr::{
    ColumnarValue, ScalarFunctionArgs, ScalarUDF, ScalarUDFImpl, Signature, TypeSignature,
    Volatility,
};
use datafusion::prelude::SessionContext;
use natality_prep_core::{fingerprint::farm_fingerprint, partition::PartitionKey};

/// SQL name of the signed fingerprint function.
pub const FARM_FINGERPRINT: &str = "farm_fingerprint";
/// SQL name of the partition key function.
pub const PARTITION_KEY: &str = "partition_key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Output {
    Signed,
    Key,
}

#[derive(Debug, Clone)]
struct FingerprintUdf {
    name: &'static str,
    output: Output,
    signature: Signature,
}

impl FingerprintUdf {
    fn new(name: &'static str, output: Output) -> Self {
        let string_types = [DataType::Utf8, DataType::LargeUtf8, DataType::Utf8View];
        Self {
            name,
            output,
            signature: Signature::one_of(
                string_types
                    .into_iter()
                    .map(|t| TypeSignature::Exact(vec![t]))
                    .collect(),
                Volatility::Immutable,
            ),
        }
    }
}

impl PartialEq for FingerprintUdf {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.output == other.output
    }
}

impl Eq for FingerprintUdf {}

impl Hash for FingerprintUdf {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.output.hash(state);
    }
}

impl ScalarUDFImpl for FingerprintUdf {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        self.name
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn return_type(&self, _arg_types: &[DataType]) -> DFResult<DataType> {
        Ok(match self.output {
            Output::Signed => DataType::Int64,
            Output::Key => DataType::UInt64,
        })
    }

    fn invoke_with_args(&self, args: ScalarFunctionArgs) -> DFResult<ColumnarValue> {
        let arrays = ColumnarValue::values_to_arrays(&args.args)?;
        let [input] = arrays.as_slice() else {
            return Err(DataFusionError::Plan(format!(
                "{}() expects exactly one argument, got {}",
                self.name,
                arrays.len()
            )));
        };

        let input = cast(input.as_ref(), &DataType::Utf8)?;
        let strings = as_string_array(input.as_ref())?;
        let out: ArrayRef = match self.output {
            Output::Signed => Arc::new(fingerprint_array(strings)),
            Output::Key => Arc::new(partition_key_array(strings)),
        };
        Ok(ColumnarValue::Array(out))
    }
}

fn fingerprint_array(strings: &StringArray) -> Int64Array {
    strings.iter().map(|s| s.map(farm_fingerprint)).collect()
}

fn partition_key_array(strings: &StringArray) -> UInt64Array {
    strings
        .iter()
        .map(|s| s.map(|s| PartitionKey::from_concatenated(s).0))
        .collect()
}

/// `farm_fingerprint(string) -> BIGINT`.
pub fn farm_fingerprint_udf() -> ScalarUDF {
    ScalarUDF::new_from_impl(FingerprintUdf::new(FARM_FINGERPRINT, Output::Signed))
}

/// `partition_key(string) -> BIGINT UNSIGNED`.
pub fn partition_key_udf() -> ScalarUDF {
    ScalarUDF::new_from_impl(FingerprintUdf::new(PARTITION_KEY, Output::Key))
}

/// Register both functions in `ctx`.
pub fn register_fingerprint_udfs(ctx: &SessionContext) {
    ctx.register_udf(farm_fingerprint_udf());
    ctx.register_udf(partition_key_udf());
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::AsArray;
    use datafusion::arrow::datatypes::{Int64Type, UInt64Type};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[tokio::test]
    async fn farm_fingerprint_matches_reference_values() -> TestResult {
        let ctx = SessionContext::new();
        register_fingerprint_udfs(&ctx);

        let batches = ctx
            .sql(
                "SELECT farm_fingerprint(v) AS f FROM (VALUES ('1footrue'), ('2applefalse'), ('3true'), (NULL)) AS t(v)",
            )
            .await?
            .collect()
            .await?;
        let values: Vec<Option<i64>> = batches
            .iter()
            .flat_map(|b| b.column(0).as_primitive::<Int64Type>().iter().collect::<Vec<_>>())
            .collect();
        assert_eq!(
            values,
            vec![
                Some(-1541654101129638711),
                Some(2794438866806483259),
                Some(-4880158226897771312),
                None,
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn partition_key_is_absolute_fingerprint() -> TestResult {
        let ctx = SessionContext::new();
        register_fingerprint_udfs(&ctx);

        let batches = ctx
            .sql("SELECT partition_key('201532' || 'Unknown' || 'CA') AS k")
            .await?
            .collect()
            .await?;
        let key = batches[0].column(0).as_primitive::<UInt64Type>().value(0);
        assert_eq!(key, 5852511133184547707);
        assert_eq!(key % 10, 7);
        Ok(())
    }
}
