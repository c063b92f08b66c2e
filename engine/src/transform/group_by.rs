//! Group a dataset by copying attributes into a new parent collection.
//!
//! ```text
//! People (Name, State)            Grouped by State (State Group)
//!                          →        └── People (Name, State)
//! ```
//!
//! The host groups cases with equal parent values, so the operator only has
//! to restructure the hierarchy and copy the values.

use super::names::{list_as_string, plural_suffix, unique_name};
use super::state::{require, TransformerState, NO_DATASET};
use super::types::TransformationOutput;
use super::util::{
    add_to_mvr, all_attr_names, all_collection_names, clone_collection, remove_empty_collections,
    shallow_copy, validate_attribute,
};
use crate::error::{TransformError, TransformResult};
use crate::host::{fetch_dataset, Host};
use crate::missing::MissingValueReport;
use crate::models::{cell, is_missing, Attribute, Collection, DataSet};

/// An attribute to group by and the preferred name of its copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedAttribute {
    pub attr_name: String,
    pub grouped_name: String,
}

impl GroupedAttribute {
    /// Copy named `"{attr} {suffix}"`.
    pub fn with_suffix(attr_name: &str, suffix: &str) -> Self {
        Self {
            attr_name: attr_name.to_string(),
            grouped_name: format!("{} {}", attr_name, suffix),
        }
    }
}

pub async fn group_by(
    state: &TransformerState,
    host: &dyn Host,
) -> TransformResult<TransformationOutput<DataSet>> {
    let context_name = require(&state.context1, NO_DATASET)?;
    let attributes = &state.attribute_set1;
    if attributes.is_empty() {
        return Err(TransformError::validation(
            "Please choose at least one attribute to group by",
        ));
    }

    let (context, dataset) = fetch_dataset(host, context_name).await?;
    let attribute_names = list_as_string(attributes);
    let parent_name = unique_name(
        &format!("Grouped by {}", attribute_names),
        &all_collection_names(&dataset),
    );
    let ctxt_name = context.readable_name();
    let grouped: Vec<GroupedAttribute> = attributes
        .iter()
        .map(|a| GroupedAttribute::with_suffix(a, "Group"))
        .collect();

    let (result, mut mvr) = unchecked_group_by(ctxt_name, &dataset, &grouped, &parent_name)?;
    mvr.set_extra_info(format!(
        "{} missing values were encountered in the grouped attributes.",
        mvr.len()
    ));

    Ok(TransformationOutput::new(
        result,
        format!("GroupBy({}, ...)", ctxt_name),
        format!(
            "A copy of {} with a new parent collection added which contains a copy of the {} {}.",
            ctxt_name,
            plural_suffix("attribute", attributes),
            attribute_names
        ),
    )
    .with_report(mvr))
}

/// Copy `attrs` into a new top-level collection named `new_parent_name`.
///
/// Copies keep the source title. Formulas are not copied; the copies hold
/// the values the formulas produced. Missing values in grouped attributes go into the report.
pub fn unchecked_group_by(
    context_title: &str,
    dataset: &DataSet,
    attrs: &[GroupedAttribute],
    new_parent_name: &str,
) -> TransformResult<(DataSet, MissingValueReport)> {
    let mut taken = all_attr_names(dataset);
    let mut grouped_attrs: Vec<Attribute> = Vec::with_capacity(attrs.len());
    let mut copies: Vec<(&str, String)> = Vec::with_capacity(attrs.len());

    for grouped in attrs {
        let (_, attr) = validate_attribute(&dataset.collections, &grouped.attr_name, None)?;
        let name = unique_name(&grouped.grouped_name, &taken);
        taken.push(name.clone());

        grouped_attrs.push(Attribute {
            name: name.clone(),
            formula: None,
            description: Some(format!(
                "All values of the {} attribute that appear in distinct tuples.",
                grouped.attr_name
            )),
            ..attr.clone()
        });
        copies.push((grouped.attr_name.as_str(), name));
    }

    let collections: Vec<Collection> = dataset
        .collections
        .iter()
        .map(|c| {
            let mut c = clone_collection(c);
            if c.parent.is_none() {
                c.parent = Some(new_parent_name.to_string());
            }
            c
        })
        .collect();
    let collections = remove_empty_collections(collections);

    let mut mvr = MissingValueReport::input();
    let records = dataset
        .records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let mut copy = shallow_copy(record);
            for (attr_name, grouped_name) in &copies {
                let value = cell(record, attr_name);
                if is_missing(value) {
                    add_to_mvr(&mut mvr, dataset, context_title, attr_name, i);
                }
                copy.insert(grouped_name.clone(), value.clone());
            }
            copy
        })
        .collect();

    let parent = Collection::new(new_parent_name, grouped_attrs);
    let mut all_collections = Vec::with_capacity(collections.len() + 1);
    all_collections.push(parent);
    all_collections.extend(collections);

    Ok((DataSet::new(all_collections, records), mvr))
}
