//! Single-value statistics: median, mode, standard deviation, sum product.
//!
//! Missing cells are skipped and listed in the missing value report; any
//! other non-numeric value is a type error.

use std::collections::HashMap;

use super::names::{list_as_string, plural_suffix};
use super::state::{require, TransformerState, NO_DATASET};
use super::types::{SingleValue, TransformationOutput};
use super::util::{extract_attribute_as_numeric, missing_report_for, validate_attribute};
use crate::error::{TransformError, TransformResult};
use crate::host::{fetch_dataset, Host};
use crate::missing::MissingValueReport;
use crate::models::{cell, codap_value_to_string, is_missing, parse_number, DataContext, DataSet};

/// Fetch the dataset for a single-attribute statistic and validate the attribute.
async fn fetch_for_attribute<'a>(
    state: &'a TransformerState,
    host: &dyn Host,
    no_attribute: &str,
) -> TransformResult<(DataContext, DataSet, &'a str)> {
    let context_name = require(&state.context1, NO_DATASET)?;
    let attribute = require(&state.attribute1, no_attribute)?;
    let (context, dataset) = fetch_dataset(host, context_name).await?;
    validate_attribute(&dataset.collections, attribute, None)?;
    Ok((context, dataset, attribute))
}

fn ignored_report(dataset: &DataSet, context: &str, attributes: &[&str]) -> MissingValueReport {
    let mut mvr = missing_report_for(dataset, context, attributes);
    let count = mvr.len();
    mvr.set_extra_info(format!("{} missing values were ignored in this computation.", count));
    mvr
}

// =============================================================================
// Median
// =============================================================================

pub async fn median(
    state: &TransformerState,
    host: &dyn Host,
) -> TransformResult<TransformationOutput<SingleValue>> {
    let (context, dataset, attribute) =
        fetch_for_attribute(state, host, "Please choose an attribute to find the median of.").await?;
    let ctxt_name = context.readable_name();

    Ok(TransformationOutput::new(
        SingleValue::Number(unchecked_median(&dataset, attribute)?),
        format!("Median({}, {})", ctxt_name, attribute),
        format!("The median value of the {} attribute in the {} dataset.", attribute, ctxt_name),
    )
    .with_report(ignored_report(&dataset, ctxt_name, &[attribute])))
}

pub fn unchecked_median(dataset: &DataSet, attribute: &str) -> TransformResult<f64> {
    validate_attribute(&dataset.collections, attribute, None)?;
    let values = extract_attribute_as_numeric(dataset, attribute)?;
    median_of(values).ok_or_else(|| TransformError::validation("Cannot find median of no numeric values"))
}

/// Middle value, or the mean of the two middle values.
pub fn median_of(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

// =============================================================================
// Mode
// =============================================================================

pub async fn mode(
    state: &TransformerState,
    host: &dyn Host,
) -> TransformResult<TransformationOutput<SingleValue>> {
    let (context, dataset, attribute) =
        fetch_for_attribute(state, host, "Please choose an attribute to find the mode of.").await?;
    let ctxt_name = context.readable_name();

    Ok(TransformationOutput::new(
        SingleValue::List(unchecked_mode(&dataset, attribute)?),
        format!("Mode({}, {})", ctxt_name, attribute),
        format!("The mode value of the {} attribute in the {} dataset.", attribute, ctxt_name),
    )
    .with_report(ignored_report(&dataset, ctxt_name, &[attribute])))
}

pub fn unchecked_mode(dataset: &DataSet, attribute: &str) -> TransformResult<Vec<f64>> {
    validate_attribute(&dataset.collections, attribute, None)?;
    let values = extract_attribute_as_numeric(dataset, attribute)?;
    let modes = modes_of(&values);
    if modes.is_empty() {
        return Err(TransformError::validation("Cannot find mode of no numeric values"));
    }
    Ok(modes)
}

/// Every value tied for the highest frequency, ascending.
pub fn modes_of(values: &[f64]) -> Vec<f64> {
    let mut frequency: HashMap<u64, (f64, usize)> = HashMap::new();
    for &value in values {
        // -0.0 and 0.0 count as the same value
        let value = if value == 0.0 { 0.0 } else { value };
        frequency.entry(value.to_bits()).or_insert((value, 0)).1 += 1;
    }
    let Some(max) = frequency.values().map(|(_, n)| *n).max() else {
        return Vec::new();
    };
    let mut modes: Vec<f64> = frequency
        .into_values()
        .filter(|(_, n)| *n == max)
        .map(|(v, _)| v)
        .collect();
    modes.sort_by(|a, b| a.total_cmp(b));
    modes
}

// =============================================================================
// Standard Deviation
// =============================================================================

pub async fn standard_deviation(
    state: &TransformerState,
    host: &dyn Host,
) -> TransformResult<TransformationOutput<SingleValue>> {
    let (context, dataset, attribute) = fetch_for_attribute(
        state,
        host,
        "Please choose an attribute to find the standard deviation of.",
    )
    .await?;
    let ctxt_name = context.readable_name();

    Ok(TransformationOutput::new(
        SingleValue::Number(unchecked_standard_deviation(&dataset, attribute)?),
        format!("StandardDeviation({}, {})", ctxt_name, attribute),
        format!(
            "The standard deviation of the {} attribute in the {} dataset.",
            attribute, ctxt_name
        ),
    )
    .with_report(ignored_report(&dataset, ctxt_name, &[attribute])))
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn unchecked_standard_deviation(dataset: &DataSet, attribute: &str) -> TransformResult<f64> {
    validate_attribute(&dataset.collections, attribute, None)?;
    let values = extract_attribute_as_numeric(dataset, attribute)?;
    if values.is_empty() {
        return Err(TransformError::validation(
            "Cannot find standard deviation of no numeric values",
        ));
    }

    let population_mean = mean(&values);
    let squared_deviations: Vec<f64> = values.iter().map(|v| (v - population_mean).powi(2)).collect();
    Ok(mean(&squared_deviations).sqrt())
}

// =============================================================================
// Sum Product
// =============================================================================

pub async fn sum_product(
    state: &TransformerState,
    host: &dyn Host,
) -> TransformResult<TransformationOutput<SingleValue>> {
    let context_name = require(&state.context1, NO_DATASET)?;
    let attributes = &state.attribute_set1;
    if attributes.is_empty() {
        return Err(TransformError::validation(
            "Please choose at least one attribute to take the sum product of.",
        ));
    }

    let (context, dataset) = fetch_dataset(host, context_name).await?;
    let ctxt_name = context.readable_name();
    let attribute_names = list_as_string(attributes);
    let attrs: Vec<&str> = attributes.iter().map(String::as_str).collect();

    let (sum, excluded) = unchecked_sum_product(&dataset, &attrs)?;
    let mvr = missing_report_for(&dataset, ctxt_name, &attrs).with_extra_info(format!(
        "{} cases containing missing values were excluded from the sum product.",
        excluded
    ));

    Ok(TransformationOutput::new(
        SingleValue::Number(sum),
        format!("SumProduct({}, [{}])", ctxt_name, attributes.join(", ")),
        format!(
            "The sum across all cases in {} of the product of the {} {}.",
            ctxt_name,
            plural_suffix("attribute", attributes),
            attribute_names
        ),
    )
    .with_report(mvr))
}

/// Sum over records of the product of `attributes`. Records with any
/// missing value are left out; the second result counts them.
pub fn unchecked_sum_product(dataset: &DataSet, attributes: &[&str]) -> TransformResult<(f64, usize)> {
    if attributes.is_empty() {
        return Err(TransformError::validation(
            "Sum product requires at least one attribute",
        ));
    }
    for attribute in attributes {
        validate_attribute(&dataset.collections, attribute, None)?;
    }

    let mut sum = 0.0;
    let mut excluded = 0;
    'rows: for record in &dataset.records {
        let mut product = 1.0;
        for attribute in attributes {
            let value = cell(record, attribute);
            if is_missing(value) {
                excluded += 1;
                continue 'rows;
            }
            product *= parse_number(value).ok_or_else(|| {
                TransformError::type_mismatch(format!(
                    "Invalid value in attribute {}: expected a number, instead got {}",
                    attribute,
                    codap_value_to_string(value)
                ))
            })?;
        }
        sum += product;
    }
    Ok((sum, excluded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::testing::host_with;
    use crate::transform::util::fixtures::{flat, states_and_cities};
    use proptest::prelude::*;
    use serde_json::json;

    fn column(xs: &[f64]) -> DataSet {
        flat(&["x"], xs.iter().map(|x| json!({ "x": x })).collect())
    }

    #[test]
    fn test_median_closed_form() {
        assert_eq!(unchecked_median(&column(&[3.0, 1.0, 2.0]), "x").unwrap(), 2.0);
        assert_eq!(unchecked_median(&column(&[1.0, 2.0, 3.0, 4.0]), "x").unwrap(), 2.5);
        assert!(unchecked_median(&flat(&["x"], vec![json!({ "x": "" })]), "x").is_err());
    }

    #[test]
    fn test_mode_returns_all_ties() {
        let modes = unchecked_mode(&column(&[1.0, 1.0, 2.0, 2.0, 3.0]), "x").unwrap();
        assert_eq!(modes, vec![1.0, 2.0]);
        assert_eq!(modes_of(&[5.0]), vec![5.0]);
        assert!(modes_of(&[]).is_empty());
    }

    #[test]
    fn test_standard_deviation_population() {
        let sd = unchecked_standard_deviation(&column(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), "x").unwrap();
        assert!((sd - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_sum_product_excludes_rows_with_missing() {
        let dataset = flat(
            &["X", "Y"],
            vec![
                json!({ "X": 2, "Y": 3 }),
                json!({ "X": "", "Y": 5 }),
                json!({ "X": 4, "Y": null }),
            ],
        );
        let (sum, excluded) = unchecked_sum_product(&dataset, &["X", "Y"]).unwrap();
        assert_eq!(sum, 6.0);
        assert_eq!(excluded, 2);

        let bad = flat(&["X"], vec![json!({ "X": "lots" })]);
        assert!(matches!(
            unchecked_sum_product(&bad, &["X"]),
            Err(TransformError::TypeMismatch(_))
        ));
    }

    #[tokio::test]
    async fn test_checked_statistics() {
        let host = host_with("Census", states_and_cities());
        let state = TransformerState::new().context1("Census").attribute1("Population");

        let output = median(&state, &host).await.unwrap();
        assert_eq!(output.result, SingleValue::Number(137.0));
        assert_eq!(output.output_name, "Median(Census, Population)");
        assert_eq!(output.missing_value_report.len(), 1);

        let output = mode(&state, &host).await.unwrap();
        assert_eq!(output.result, SingleValue::List(vec![67.0, 137.0, 190.0]));

        let state = TransformerState::new()
            .context1("Census")
            .attribute_set1(["Population"]);
        let output = sum_product(&state, &host).await.unwrap();
        assert_eq!(output.output_name, "SumProduct(Census, [Population])");
        assert_eq!(output.result, SingleValue::Number(394.0));
        assert_eq!(
            output.missing_value_report.extra_info(),
            Some("1 cases containing missing values were excluded from the sum product.")
        );

        let err = median(&TransformerState::new().context1("Census").attribute1("Mayor"), &host)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid attribute name: Mayor");
    }

    proptest! {
        #[test]
        fn prop_median_permutation_invariant(
            mut values in proptest::collection::vec(-1000i32..1000, 1..30),
            seed in any::<u64>(),
        ) {
            let floats: Vec<f64> = values.iter().map(|v| *v as f64).collect();
            let expected = median_of(floats).unwrap();

            // deterministic shuffle
            let len = values.len();
            let mut state = seed;
            for i in (1..len).rev() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                values.swap(i, (state >> 33) as usize % (i + 1));
            }
            let shuffled: Vec<f64> = values.iter().map(|v| *v as f64).collect();
            prop_assert_eq!(median_of(shuffled), Some(expected));
        }
    }
}
