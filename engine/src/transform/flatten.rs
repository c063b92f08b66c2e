//! Merge a hierarchy into a single collection.

use super::state::{require, TransformerState, NO_DATASET};
use super::types::TransformationOutput;
use crate::error::TransformResult;
use crate::host::{fetch_dataset, Host};
use crate::models::{hierarchy_order, Attribute, Collection, DataSet};

const FLAT_COLLECTION_NAME: &str = "Cases";

pub async fn flatten(
    state: &TransformerState,
    host: &dyn Host,
) -> TransformResult<TransformationOutput<DataSet>> {
    let context_name = require(&state.context1, NO_DATASET)?;
    let (context, dataset) = fetch_dataset(host, context_name).await?;
    let ctxt_name = context.readable_name();

    Ok(TransformationOutput::new(
        unchecked_flatten(&dataset),
        format!("Flatten({})", ctxt_name),
        format!(
            "A copy of {} in which all collections have been flattened into a single collection.",
            ctxt_name
        ),
    ))
}

/// One collection holding every attribute, parents before children.
pub fn unchecked_flatten(dataset: &DataSet) -> DataSet {
    let attrs: Vec<Attribute> = hierarchy_order(&dataset.collections)
        .into_iter()
        .flat_map(|c| c.attrs.iter().flatten().cloned())
        .collect();

    DataSet::new(
        vec![Collection::new(FLAT_COLLECTION_NAME, attrs)],
        dataset.records.clone(),
    )
}
