//! Compare two attributes of a dataset, numerically or by category.
//!
//! A numeric comparison adds a `Difference` column (second minus first) and
//! a `Compare Status` colour column. The colour runs from grey towards green
//! for positive differences and towards red for negative ones, scaled by the
//! largest absolute difference in the dataset.
//!
//! A categorical comparison flattens the dataset and groups it by both
//! attributes under a `Comparison` collection.

use serde_json::{Number, Value};
use std::str::FromStr;

use super::colors::{color_to_rgb_string, interpolate_color, GREEN, GREY, RED};
use super::flatten::unchecked_flatten;
use super::group_by::{unchecked_group_by, GroupedAttribute};
use super::names::unique_name;
use super::state::{require, TransformerState, NO_DATASET};
use super::types::TransformationOutput;
use super::util::{all_attr_names, clone_collection, missing_report_for, shallow_copy, validate_attribute};
use crate::error::{TransformError, TransformResult};
use crate::host::{fetch_dataset, Host};
use crate::missing::MissingValueReport;
use crate::models::{cell, codap_value_to_string, is_missing, parse_number, Attribute, AttributeType, DataSet};

const COMPARE_STATUS_COLUMN_BASE: &str = "Compare Status";
const COMPARE_VALUE_COLUMN_BASE: &str = "Difference";
const COMPARISON_COLLECTION: &str = "Comparison";

const INVALID_FIRST: &str = "Invalid first attribute to compare";
const INVALID_SECOND: &str = "Invalid second attribute to compare";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareKind {
    Numeric,
    Categorical,
}

impl FromStr for CompareKind {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "numeric" => Ok(Self::Numeric),
            "categorical" => Ok(Self::Categorical),
            _ => Err(TransformError::validation("Please choose a type of comparison")),
        }
    }
}

pub async fn compare(
    state: &TransformerState,
    host: &dyn Host,
) -> TransformResult<TransformationOutput<DataSet>> {
    let context_name = require(&state.context1, NO_DATASET)?;
    let (attribute1, attribute2) = match (state.attribute1.as_deref(), state.attribute2.as_deref()) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => (a, b),
        _ => return Err(TransformError::validation("Please choose two attributes to compare")),
    };
    let kind: CompareKind = require(&state.dropdown1, "Please choose a type of comparison")?.parse()?;

    let (context, dataset) = fetch_dataset(host, context_name).await?;
    let ctxt_name = context.readable_name();

    let (result, mvr, kind_label) = match kind {
        CompareKind::Categorical => {
            let (result, mvr) = unchecked_categorical_compare(ctxt_name, &dataset, attribute1, attribute2)?;
            (result, mvr, "categorical")
        }
        CompareKind::Numeric => {
            let result = unchecked_numeric_compare(&dataset, attribute1, attribute2)?;
            let mvr = missing_report_for(&dataset, ctxt_name, &[attribute1, attribute2]);
            (result, mvr, "numeric")
        }
    };

    Ok(TransformationOutput::new(
        result,
        format!("Compare({}, ...)", ctxt_name),
        format!(
            "A {} comparison of the attributes {} and {} (from {})",
            kind_label, attribute1, attribute2, ctxt_name
        ),
    )
    .with_report(mvr))
}

/// Numeric value of a compared cell: `Ok(None)` when missing.
fn compared_value(value: &Value) -> TransformResult<Option<f64>> {
    if is_missing(value) {
        return Ok(None);
    }
    parse_number(value).map(Some).ok_or_else(|| {
        TransformError::type_mismatch(format!(
            "Expected a number to compare, instead got {}",
            codap_value_to_string(value)
        ))
    })
}

fn status_color(difference: f64, largest: f64) -> String {
    let scalar = if largest == 0.0 {
        0.0
    } else {
        (difference / largest).abs()
    };
    let color = if difference > 0.0 {
        interpolate_color(GREY, GREEN, scalar)
    } else if difference < 0.0 {
        interpolate_color(GREY, RED, scalar)
    } else {
        GREY
    };
    color_to_rgb_string(color)
}

pub fn unchecked_numeric_compare(
    dataset: &DataSet,
    attribute1: &str,
    attribute2: &str,
) -> TransformResult<DataSet> {
    validate_attribute(&dataset.collections, attribute1, Some(INVALID_FIRST))?;
    validate_attribute(&dataset.collections, attribute2, Some(INVALID_SECOND))?;

    let mut collections: Vec<_> = dataset.collections.iter().map(clone_collection).collect();
    let position = |name: &str| collections.iter().position(|c| c.attr(name).is_some());
    let target = match (position(attribute1), position(attribute2)) {
        (Some(i), Some(j)) => i.max(j),
        _ => return Err(TransformError::missing_attribute(attribute1)),
    };

    let existing = all_attr_names(dataset);
    let status_column = unique_name(COMPARE_STATUS_COLUMN_BASE, &existing);
    let value_column = unique_name(COMPARE_VALUE_COLUMN_BASE, &existing);

    let attrs = collections[target].attrs.get_or_insert_with(Vec::new);
    for (name, attr_type) in [
        (&value_column, AttributeType::Numeric),
        (&status_column, AttributeType::Categorical),
    ] {
        attrs.push(Attribute {
            description: Some(String::new()),
            editable: Some(true),
            hidden: Some(false),
            ..Attribute::new(name.as_str()).with_type(attr_type)
        });
    }

    let mut differences: Vec<Option<f64>> = Vec::with_capacity(dataset.records.len());
    for record in &dataset.records {
        let v1 = compared_value(cell(record, attribute1))?;
        let v2 = compared_value(cell(record, attribute2))?;
        differences.push(v1.zip(v2).map(|(a, b)| b - a));
    }

    let largest = differences
        .iter()
        .flatten()
        .fold(0.0_f64, |largest, &d| if d.abs() > largest.abs() { d } else { largest });

    let records = dataset
        .records
        .iter()
        .zip(&differences)
        .map(|(record, difference)| {
            let mut record = shallow_copy(record);
            let (value, status) = match difference {
                Some(d) => (
                    Number::from_f64(*d).map(Value::Number).unwrap_or(Value::Null),
                    Value::String(status_color(*d, largest)),
                ),
                None => (Value::String(String::new()), Value::String(String::new())),
            };
            record.insert(value_column.clone(), value);
            record.insert(status_column.clone(), status);
            record
        })
        .collect();

    Ok(DataSet::new(collections, records))
}

pub fn unchecked_categorical_compare(
    context_title: &str,
    dataset: &DataSet,
    attribute1: &str,
    attribute2: &str,
) -> TransformResult<(DataSet, MissingValueReport)> {
    validate_attribute(&dataset.collections, attribute1, Some(INVALID_FIRST))?;
    validate_attribute(&dataset.collections, attribute2, Some(INVALID_SECOND))?;

    let flat = unchecked_flatten(dataset);
    unchecked_group_by(
        context_title,
        &flat,
        &[
            GroupedAttribute::with_suffix(attribute1, "Category"),
            GroupedAttribute::with_suffix(attribute2, "Category"),
        ],
        COMPARISON_COLLECTION,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Collection;
    use crate::transform::testing::host_with;
    use crate::transform::util::fixtures::{flat, records};
    use serde_json::json;

    fn pairs() -> DataSet {
        flat(
            &["a", "b"],
            vec![
                json!({ "a": 1, "b": 3 }),
                json!({ "a": 5, "b": "4" }),
                json!({ "a": "", "b": 2 }),
                json!({ "a": 2, "b": 2 }),
            ],
        )
    }

    #[test]
    fn test_numeric_compare_differences_and_colors() {
        let dataset = pairs();
        let out = unchecked_numeric_compare(&dataset, "a", "b").unwrap();

        let diffs: Vec<Value> = out.records.iter().map(|r| r["Difference"].clone()).collect();
        assert_eq!(diffs, vec![json!(2.0), json!(-1.0), json!(""), json!(0.0)]);

        let colors: Vec<Value> = out.records.iter().map(|r| r["Compare Status"].clone()).collect();
        assert_eq!(colors[0], json!("rgb(0,255,0)"));
        assert_eq!(colors[1], json!("rgb(213,85,85)"));
        assert_eq!(colors[2], json!(""));
        assert_eq!(colors[3], json!("rgb(170,170,170)"));

        // input untouched
        assert!(!dataset.records[0].contains_key("Difference"));
        let names: Vec<&str> = out.collections[0].attr_names().collect();
        assert_eq!(names, vec!["a", "b", "Difference", "Compare Status"]);
    }

    #[test]
    fn test_all_zero_differences_are_grey() {
        let dataset = flat(&["a", "b"], vec![json!({ "a": 1, "b": 1 }), json!({ "a": 4, "b": 4 })]);
        let out = unchecked_numeric_compare(&dataset, "a", "b").unwrap();
        assert!(out
            .records
            .iter()
            .all(|r| r["Compare Status"] == json!("rgb(170,170,170)")));
    }

    #[test]
    fn test_numeric_compare_rejects_text() {
        let dataset = flat(&["a", "b"], vec![json!({ "a": 1, "b": "many" })]);
        let err = unchecked_numeric_compare(&dataset, "a", "b").unwrap_err();
        assert_eq!(err.to_string(), "Expected a number to compare, instead got \"many\"");

        let err = unchecked_numeric_compare(&dataset, "z", "b").unwrap_err();
        assert_eq!(err.to_string(), INVALID_FIRST);
    }

    #[test]
    fn test_columns_go_to_rightmost_collection() {
        let dataset = DataSet::new(
            vec![
                Collection::new("P", vec![Attribute::new("a")]),
                Collection::new("C", vec![Attribute::new("b")]).with_parent("P"),
            ],
            records(vec![json!({ "a": 1, "b": 2 })]),
        );
        let out = unchecked_numeric_compare(&dataset, "b", "a").unwrap();
        assert!(out.collections[1].attr("Difference").is_some());
        assert_eq!(out.records[0]["Difference"], json!(-1.0));
    }

    #[test]
    fn test_categorical_compare() {
        let dataset = flat(&["x", "y"], vec![json!({ "x": "p", "y": "q" }), json!({ "x": "p", "y": null })]);
        let (out, mvr) = unchecked_categorical_compare("T", &dataset, "x", "y").unwrap();

        assert_eq!(out.collections[0].name, "Comparison");
        let names: Vec<&str> = out.collections[0].attr_names().collect();
        assert_eq!(names, vec!["x Category", "y Category"]);
        assert_eq!(out.collections[1].parent.as_deref(), Some("Comparison"));
        assert_eq!(mvr.len(), 1);
    }

    #[tokio::test]
    async fn test_checked_compare() {
        let host = host_with("Pairs", pairs());
        let state = TransformerState::new().context1("Pairs").attribute1("a").attribute2("b");
        assert!(compare(&state, &host).await.is_err());

        let output = compare(&state.dropdown1("numeric"), &host).await.unwrap();
        assert_eq!(output.output_name, "Compare(Pairs, ...)");
        assert_eq!(
            output.output_description,
            "A numeric comparison of the attributes a and b (from Pairs)"
        );
        assert_eq!(output.missing_value_report.len(), 1);
    }
}
