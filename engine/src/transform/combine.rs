//! Stack the cases of two datasets that share the same attributes.

use std::collections::BTreeSet;

use super::state::{require, TransformerState};
use super::types::TransformationOutput;
use super::util::{all_attr_names, shallow_copy};
use crate::error::{TransformError, TransformResult};
use crate::host::{fetch_dataset, Host};
use crate::models::DataSet;

pub async fn combine_cases(
    state: &TransformerState,
    host: &dyn Host,
) -> TransformResult<TransformationOutput<DataSet>> {
    let base_name = require(&state.context1, "Please choose a base dataset.")?;
    let combining_name = require(&state.context2, "Please choose a dataset to combine with the base.")?;

    let (base_context, base) = fetch_dataset(host, base_name).await?;
    let (combining_context, combining) = fetch_dataset(host, combining_name).await?;
    let base_title = base_context.readable_name();
    let combining_title = combining_context.readable_name();

    Ok(TransformationOutput::new(
        unchecked_combine_cases(&base, &combining)?,
        format!("CombineCases({}, {})", base_title, combining_title),
        format!(
            "A copy of {} containing all of its cases followed by all of the cases of {}.",
            base_title, combining_title
        ),
    ))
}

/// Base records followed by combining records, in base's structure.
pub fn unchecked_combine_cases(base: &DataSet, combining: &DataSet) -> TransformResult<DataSet> {
    let base_attrs: BTreeSet<String> = all_attr_names(base).into_iter().collect();
    let combining_attrs: BTreeSet<String> = all_attr_names(combining).into_iter().collect();
    if base_attrs != combining_attrs {
        return Err(TransformError::validation(
            "Base and combining datasets must have the same attribute names",
        ));
    }

    let records = base
        .records
        .iter()
        .chain(&combining.records)
        .map(shallow_copy)
        .collect();
    Ok(DataSet::new(base.collections.clone(), records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::testing::host_with;
    use crate::transform::util::fixtures::flat;
    use crate::models::DataContext;
    use serde_json::json;

    #[test]
    fn test_combine_stacks_records() {
        let a = flat(&["x", "y"], vec![json!({ "x": 1, "y": 2 })]);
        let b = flat(&["y", "x"], vec![json!({ "x": 3, "y": 4 })]);
        let combined = unchecked_combine_cases(&a, &b).unwrap();
        assert_eq!(combined.records.len(), 2);
        assert_eq!(combined.records[1]["x"], json!(3));
        assert_eq!(combined.collections, a.collections);
    }

    #[test]
    fn test_combine_rejects_different_attributes() {
        let a = flat(&["x"], vec![]);
        let b = flat(&["z"], vec![]);
        assert!(matches!(
            unchecked_combine_cases(&a, &b),
            Err(TransformError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_checked_combine() {
        let host = host_with("A", flat(&["x"], vec![json!({ "x": 1 })]));
        host.insert_context(DataContext::new("B"), flat(&["x"], vec![json!({ "x": 2 })]));
        let mut state = TransformerState::new().context1("A");

        assert!(combine_cases(&state, &host).await.is_err());

        state = state.context2("B");
        let output = combine_cases(&state, &host).await.unwrap();
        assert_eq!(output.output_name, "CombineCases(A, B)");
        assert_eq!(output.result.records.len(), 2);
    }
}
