//! Copy a dataset, with or without its cases.

use super::state::{require, TransformerState, NO_DATASET};
use super::types::TransformationOutput;
use crate::error::TransformResult;
use crate::host::{fetch_dataset, Host};
use crate::models::DataSet;

pub async fn copy(
    state: &TransformerState,
    host: &dyn Host,
) -> TransformResult<TransformationOutput<DataSet>> {
    let context_name = require(&state.context1, NO_DATASET)?;
    let (context, dataset) = fetch_dataset(host, context_name).await?;
    let ctxt_name = context.readable_name();

    Ok(TransformationOutput::new(
        unchecked_copy(&dataset),
        format!("Copy({})", ctxt_name),
        format!("A copy of the {} dataset.", ctxt_name),
    ))
}

pub fn unchecked_copy(dataset: &DataSet) -> DataSet {
    DataSet::new(dataset.collections.clone(), dataset.records.clone())
}

/// Produces a dataset with the same collections and attributes as the input
/// but no records.
pub async fn copy_structure(
    state: &TransformerState,
    host: &dyn Host,
) -> TransformResult<TransformationOutput<DataSet>> {
    let context_name = require(&state.context1, NO_DATASET)?;
    let (context, dataset) = fetch_dataset(host, context_name).await?;
    let ctxt_name = context.readable_name();

    Ok(TransformationOutput::new(
        unchecked_copy_structure(&dataset),
        format!("CopyStructure({})", ctxt_name),
        format!(
            "A copy of the collections and attributes of the {} dataset, but with no cases.",
            ctxt_name
        ),
    ))
}

pub fn unchecked_copy_structure(dataset: &DataSet) -> DataSet {
    DataSet::new(dataset.collections.clone(), Vec::new())
}
