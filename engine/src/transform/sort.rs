//! Stable sort of a dataset's records by a key formula.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::state::{require, require_text, TransformerState, NO_DATASET};
use super::types::{report_type_errors_for_records, CodapLanguageType, TransformationOutput};
use crate::error::{TransformError, TransformResult};
use crate::host::{fetch_dataset, Evaluator, Host};
use crate::models::{codap_value_to_string, DataSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl FromStr for SortDirection {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ascending" => Ok(Self::Ascending),
            "descending" => Ok(Self::Descending),
            _ => Err(TransformError::validation("Please choose a sort direction")),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => f.write_str("ascending"),
            Self::Descending => f.write_str("descending"),
        }
    }
}

/// Comparison class of a key. Only keys of the same class are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyClass {
    Number,
    String,
    Boolean,
    Structured,
}

fn key_class(value: &Value) -> KeyClass {
    match value {
        Value::Number(_) => KeyClass::Number,
        Value::String(_) => KeyClass::String,
        Value::Bool(_) => KeyClass::Boolean,
        Value::Null | Value::Array(_) | Value::Object(_) => KeyClass::Structured,
    }
}

/// Order two keys of the same class.
fn compare_keys(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// All keys must share one comparison class.
fn check_key_classes(keys: &[Value]) -> TransformResult<()> {
    let Some(first) = keys.first() else {
        return Ok(());
    };
    let class = key_class(first);
    match keys.iter().find(|k| key_class(k) != class) {
        None => Ok(()),
        Some(other) => Err(TransformError::type_mismatch(format!(
            "Sort keys have incompatible types: {} and {}",
            codap_value_to_string(first),
            codap_value_to_string(other)
        ))),
    }
}

pub async fn sort(
    state: &TransformerState,
    host: &dyn Host,
) -> TransformResult<TransformationOutput<DataSet>> {
    let context_name = require(&state.context1, NO_DATASET)?;
    let expression = require_text(&state.expression1, "Please enter a non-empty key expression")?;
    let direction: SortDirection = require(&state.dropdown1, "Please choose a sort direction")?.parse()?;

    let (context, dataset) = fetch_dataset(host, context_name).await?;
    let ctxt_name = context.readable_name();

    Ok(TransformationOutput::new(
        unchecked_sort(
            &dataset,
            expression,
            state.type_contract1.output_type,
            direction,
            host.evaluator(),
        )
        .await?,
        format!("Sort({}, ...)", ctxt_name),
        format!(
            "A copy of {}, sorted by the value of the key formula: `{}`.",
            ctxt_name, expression
        ),
    ))
}

/// Evaluate the key formula once per record, then stable-sort the records.
pub async fn unchecked_sort(
    dataset: &DataSet,
    key_expression: &str,
    output_type: CodapLanguageType,
    direction: SortDirection,
    evaluator: &dyn Evaluator,
) -> TransformResult<DataSet> {
    let keys = evaluator.eval_expression(key_expression, &dataset.records).await?;
    if keys.len() != dataset.records.len() {
        return Err(TransformError::Evaluation(format!(
            "Formula `{}` produced {} values for {} cases",
            key_expression,
            keys.len(),
            dataset.records.len()
        )));
    }
    report_type_errors_for_records(&dataset.records, &keys, output_type)?;
    sort_by_keys(dataset, &keys, direction)
}

/// Stable sort of `dataset.records` by precomputed keys.
pub fn sort_by_keys(dataset: &DataSet, keys: &[Value], direction: SortDirection) -> TransformResult<DataSet> {
    check_key_classes(keys)?;

    let mut indices: Vec<usize> = (0..dataset.records.len()).collect();
    indices.sort_by(|&i, &j| match direction {
        SortDirection::Ascending => compare_keys(&keys[i], &keys[j]),
        SortDirection::Descending => compare_keys(&keys[j], &keys[i]),
    });

    let records = indices.into_iter().map(|i| dataset.records[i].clone()).collect();
    Ok(DataSet::new(dataset.collections.clone(), records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::AttributeEvaluator;
    use crate::transform::testing::host_with;
    use crate::transform::util::fixtures::flat;
    use proptest::prelude::*;
    use serde_json::json;

    fn ids(dataset: &DataSet) -> Vec<String> {
        dataset
            .records
            .iter()
            .map(|r| r["id"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_sort_is_stable() {
        let dataset = flat(&["k", "id"], vec![json!({ "k": 1, "id": "a" }), json!({ "k": 1, "id": "b" })]);
        let sorted = unchecked_sort(
            &dataset,
            "k",
            CodapLanguageType::Any,
            SortDirection::Ascending,
            &AttributeEvaluator::new(),
        )
        .await
        .unwrap();
        assert_eq!(ids(&sorted), vec!["a", "b"]);
    }

    #[test]
    fn test_sort_by_type() {
        let dataset = flat(&["id"], vec![json!({ "id": "a" }), json!({ "id": "b" }), json!({ "id": "c" })]);

        let sorted = sort_by_keys(&dataset, &[json!(3), json!(1.5), json!(2)], SortDirection::Ascending).unwrap();
        assert_eq!(ids(&sorted), vec!["b", "c", "a"]);

        let sorted = sort_by_keys(&dataset, &[json!("pear"), json!("apple"), json!("fig")], SortDirection::Descending).unwrap();
        assert_eq!(ids(&sorted), vec!["a", "c", "b"]);

        let sorted = sort_by_keys(&dataset, &[json!(true), json!(false), json!(true)], SortDirection::Ascending).unwrap();
        assert_eq!(ids(&sorted), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_mixed_key_types_are_an_error() {
        let dataset = flat(&["id"], vec![json!({ "id": "a" }), json!({ "id": "b" })]);
        let err = sort_by_keys(&dataset, &[json!(1), json!("x")], SortDirection::Ascending).unwrap_err();
        assert_eq!(err.to_string(), "Sort keys have incompatible types: 1 and \"x\"");

        let err = sort_by_keys(&dataset, &[Value::Null, json!(2)], SortDirection::Ascending).unwrap_err();
        assert!(matches!(err, TransformError::TypeMismatch(_)));
    }

    #[tokio::test]
    async fn test_checked_sort_requires_direction() {
        let host = host_with("T", flat(&["k"], vec![json!({ "k": 2 }), json!({ "k": 1 })]));
        let state = TransformerState::new().context1("T").expression1("k");
        assert!(sort(&state, &host).await.is_err());

        let output = sort(&state.dropdown1("descending"), &host).await.unwrap();
        assert_eq!(output.output_name, "Sort(T, ...)");
        assert_eq!(output.result.records[0]["k"], json!(2));
    }

    proptest! {
        #[test]
        fn prop_sort_stable_and_ordered(keys in proptest::collection::vec(0i64..4, 0..20)) {
            let rows = keys.iter().enumerate().map(|(i, _)| json!({ "id": i })).collect();
            let dataset = flat(&["id"], rows);
            let key_values: Vec<Value> = keys.iter().map(|k| json!(k)).collect();
            let sorted = sort_by_keys(&dataset, &key_values, SortDirection::Ascending).unwrap();

            let order: Vec<usize> = sorted
                .records
                .iter()
                .map(|r| r["id"].as_u64().unwrap() as usize)
                .collect();
            for pair in order.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                prop_assert!(keys[a] < keys[b] || (keys[a] == keys[b] && a < b));
            }
        }
    }
}
