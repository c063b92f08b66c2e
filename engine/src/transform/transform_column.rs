//! Replace an attribute's values with the result of a formula.

use super::state::{require, require_text, TransformerState, NO_DATASET};
use super::types::{report_type_errors_for_records, CodapLanguageType, TransformationOutput};
use super::util::{clone_collection, shallow_copy, validate_attribute};
use crate::error::{TransformError, TransformResult};
use crate::host::{fetch_dataset, Evaluator, Host};
use crate::missing::MissingValueReport;
use crate::models::{is_missing, DataSet};

pub async fn transform_column(
    state: &TransformerState,
    host: &dyn Host,
) -> TransformResult<TransformationOutput<DataSet>> {
    let context_name = require(&state.context1, NO_DATASET)?;
    let attribute = require(&state.attribute1, "Please select an attribute to transform")?;
    let expression = require_text(&state.expression1, "Please enter a non-empty expression to transform with")?;
    let output_type = state.type_contract1.output_type;

    let (context, dataset) = fetch_dataset(host, context_name).await?;
    let ctxt_name = context.readable_name();

    let (transformed, mut mvr) =
        unchecked_transform_column(&dataset, attribute, expression, output_type, host.evaluator()).await?;
    mvr.set_extra_info(format!(
        "The formula for the transformed column evaluated to a missing value for {} rows.",
        mvr.len()
    ));

    Ok(TransformationOutput::new(
        transformed,
        format!("TransformColumn({}, ...)", ctxt_name),
        format!(
            "A copy of {}, with the {} attribute's values determined by the formula `{}`.",
            ctxt_name, attribute, expression
        ),
    )
    .with_report(mvr))
}

/// Evaluate `expression` for every record and write the results into
/// `attribute`. The attribute loses its formula.
pub async fn unchecked_transform_column(
    dataset: &DataSet,
    attribute: &str,
    expression: &str,
    output_type: CodapLanguageType,
    evaluator: &dyn Evaluator,
) -> TransformResult<(DataSet, MissingValueReport)> {
    let message = format!("Invalid attribute to transform: {}", attribute);
    validate_attribute(&dataset.collections, attribute, Some(&message))?;

    let mut records: Vec<_> = dataset.records.iter().map(shallow_copy).collect();
    let values = evaluator.eval_expression(expression, &records).await?;
    if values.len() != records.len() {
        return Err(TransformError::Evaluation(format!(
            "Formula `{}` produced {} values for {} cases",
            expression,
            values.len(),
            records.len()
        )));
    }
    report_type_errors_for_records(&records, &values, output_type)?;

    let mut mvr = MissingValueReport::formula();
    for (i, (record, value)) in records.iter_mut().zip(values).enumerate() {
        if is_missing(&value) {
            mvr.push_formula_row(i + 1);
        }
        record.insert(attribute.to_string(), value);
    }

    let mut collections: Vec<_> = dataset.collections.iter().map(clone_collection).collect();
    if let Some(attr) = collections.iter_mut().find_map(|c| c.attr_mut(attribute)) {
        attr.formula = None;
        attr.description = Some(format!(
            "The {} attribute, transformed by the formula `{}`",
            attribute, expression
        ));
    }

    Ok((DataSet::new(collections, records), mvr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::host::{FnEvaluator, MemoryHost};
    use crate::models::DataContext;
    use crate::transform::types::TypeContract;
    use crate::transform::util::fixtures::states_and_cities;
    use serde_json::{json, Value};

    fn doubling_host() -> MemoryHost {
        let host = MemoryHost::new(FnEvaluator::new(|expr, record| match expr {
            "Population * 2" => Ok(record
                .get("Population")
                .and_then(Value::as_f64)
                .map(|p| json!(p * 2.0))
                .unwrap_or(Value::Null)),
            "City" => Ok(record["City"].clone()),
            other => Err(HostError::Evaluation(format!("cannot evaluate {}", other))),
        }));
        host.insert_context(DataContext::new("Census"), states_and_cities());
        host
    }

    #[tokio::test]
    async fn test_transform_column_overwrites_and_reports_missing() {
        let host = doubling_host();
        let state = TransformerState::new()
            .context1("Census")
            .attribute1("Population")
            .expression1("Population * 2")
            .type_contract1(TypeContract {
                output_type: CodapLanguageType::Number,
                ..Default::default()
            });
        let output = transform_column(&state, &host).await.unwrap();

        assert_eq!(output.result.records[0]["Population"], json!(380.0));
        assert_eq!(output.result.records[2]["Population"], Value::Null);
        let attr = output.result.collections[1].attr("Population").unwrap();
        assert_eq!(attr.formula, None);
        assert_eq!(
            attr.description.as_deref(),
            Some("The Population attribute, transformed by the formula `Population * 2`")
        );
        assert_eq!(
            output.missing_value_report,
            MissingValueReport::Formula {
                missing_values: vec![3],
                extra_info: Some(
                    "The formula for the transformed column evaluated to a missing value for 1 rows.".into()
                ),
            }
        );
        assert_eq!(output.output_name, "TransformColumn(Census, ...)");
    }

    #[tokio::test]
    async fn test_transform_column_type_error_names_case() {
        let host = doubling_host();
        let dataset = states_and_cities();
        let err = unchecked_transform_column(
            &dataset,
            "Population",
            "City",
            CodapLanguageType::Number,
            host.evaluator(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransformError::TypeMismatch(_)));
        assert!(err.to_string().contains("City: \"Akron\""));
    }

    #[tokio::test]
    async fn test_transform_column_unknown_attribute() {
        let host = doubling_host();
        let err = unchecked_transform_column(
            &states_and_cities(),
            "Mayor",
            "City",
            CodapLanguageType::Any,
            host.evaluator(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid attribute to transform: Mayor");
    }
}
