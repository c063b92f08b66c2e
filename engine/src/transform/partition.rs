//! Split a dataset into one output context per distinct attribute value.
//!
//! Partition is a full-override transformer: it creates and owns several
//! outputs, and its update procedure reconciles them against the current
//! input instead of recomputing a single result.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::state::{require, TransformerState, NO_DATASET};
use super::util::{make_dataset_immutable, shallow_copy, validate_attribute};
use crate::error::{HostError, TransformResult};
use crate::host::{fetch_dataset, Host};
use crate::logs::{log_info_indent, log_warning};
use crate::models::{cell, DataSet};

/// Saved state of an active partition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSaveState {
    pub input_data_context: String,
    pub attribute_name: String,
    /// Distinct value (as displayed) to the name of its output context.
    pub value_to_context: BTreeMap<String, String>,
}

impl PartitionSaveState {
    /// Merge a patch, field by field.
    pub fn merge(&mut self, patch: PartitionStatePatch) {
        if let Some(input) = patch.input_data_context {
            self.input_data_context = input;
        }
        if let Some(attribute) = patch.attribute_name {
            self.attribute_name = attribute;
        }
        if let Some(map) = patch.value_to_context {
            self.value_to_context = map;
        }
    }

    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.value_to_context.values().map(String::as_str)
    }
}

/// Partial update of a [`PartitionSaveState`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionStatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_data_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_to_context: Option<BTreeMap<String, String>>,
}

/// One slice of a partitioned dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionDataset {
    pub dataset: DataSet,
    pub distinct_value: Value,
    pub distinct_value_as_str: String,
}

fn value_key(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn partition_title(context: &str, attribute: &str, value: &str) -> String {
    format!("Partition({}, {} = {})", context, attribute, value)
}

fn partition_description(context: &str, attribute: &str, value: &str) -> String {
    format!(
        "A partition of the {} dataset containing the cases whose {} attribute is {}.",
        context, attribute, value
    )
}

/// Group records by the value of `attribute`, in order of first appearance.
pub fn unchecked_partition(dataset: &DataSet, attribute: &str) -> TransformResult<Vec<PartitionDataset>> {
    validate_attribute(&dataset.collections, attribute, None)?;

    let mut slices: Vec<PartitionDataset> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();
    for record in &dataset.records {
        let value = cell(record, attribute);
        let key = value_key(value);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            slices.push(PartitionDataset {
                dataset: DataSet::new(dataset.collections.clone(), Vec::new()),
                distinct_value: value.clone(),
                distinct_value_as_str: key,
            });
            slices.len() - 1
        });
        slices[slot].dataset.records.push(shallow_copy(record));
    }
    Ok(slices)
}

/// Create one output context per distinct value and return the save state.
pub async fn partition(state: &TransformerState, host: &dyn Host) -> TransformResult<PartitionSaveState> {
    let context_name = require(&state.context1, NO_DATASET)?;
    let attribute = require(&state.attribute1, "Please choose an attribute to partition by.")?;

    let (context, dataset) = fetch_dataset(host, context_name).await?;
    let ctxt_name = context.readable_name();
    let slices = unchecked_partition(&dataset, attribute)?;

    let mut value_to_context = BTreeMap::new();
    for slice in slices {
        let value = &slice.distinct_value_as_str;
        let name = host
            .create_context_with_dataset(
                &make_dataset_immutable(slice.dataset),
                &partition_title(ctxt_name, attribute, value),
                &partition_description(ctxt_name, attribute, value),
            )
            .await?;
        value_to_context.insert(slice.distinct_value_as_str, name);
    }

    Ok(PartitionSaveState {
        input_data_context: context_name.to_string(),
        attribute_name: attribute.to_string(),
        value_to_context,
    })
}

/// Reconcile the outputs of a partition with its current input.
///
/// Surviving values update their context (keeping the title of outputs in
/// `edited_outputs`), new values get a new context and vanished values have
/// their context deleted. Returns the patch to merge into the saved state.
pub async fn update_partition(
    state: &PartitionSaveState,
    host: &dyn Host,
    edited_outputs: &BTreeSet<String>,
) -> TransformResult<PartitionStatePatch> {
    let (context, dataset) = fetch_dataset(host, &state.input_data_context).await?;
    let ctxt_name = context.readable_name();
    let attribute = state.attribute_name.as_str();
    let slices = unchecked_partition(&dataset, attribute)?;

    let mut value_to_context = BTreeMap::new();
    for slice in slices {
        let value = slice.distinct_value_as_str.clone();
        let title = partition_title(ctxt_name, attribute, &value);
        let description = partition_description(ctxt_name, attribute, &value);
        let dataset = make_dataset_immutable(slice.dataset);

        let existing = match state.value_to_context.get(&value) {
            Some(name) => host.get_data_context(name).await.ok().map(|c| c.name),
            None => None,
        };
        let name = match existing {
            Some(name) => {
                let keep_title = edited_outputs.contains(&name);
                host.update_context_with_dataset(
                    &name,
                    &dataset,
                    (!keep_title).then_some(title.as_str()),
                    (!keep_title).then_some(description.as_str()),
                )
                .await?;
                name
            }
            None => {
                let name = host.create_context_with_dataset(&dataset, &title, &description).await?;
                log_info_indent(format!("Created partition output {}", name), 1);
                name
            }
        };
        value_to_context.insert(value, name);
    }

    for (value, name) in &state.value_to_context {
        if value_to_context.contains_key(value) {
            continue;
        }
        match host.delete_data_context(name).await {
            Ok(()) | Err(HostError::ContextNotFound(_)) => {}
            Err(e) => log_warning(format!("Could not delete partition output {}: {}", name, e)),
        }
    }

    Ok(PartitionStatePatch {
        value_to_context: Some(value_to_context),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::transform::testing::host_with;
    use crate::transform::util::fixtures::{flat, states_and_cities};
    use serde_json::json;

    #[test]
    fn test_partition_in_first_appearance_order() {
        let slices = unchecked_partition(&states_and_cities(), "State").unwrap();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].distinct_value_as_str, "Ohio");
        assert_eq!(slices[0].dataset.records.len(), 2);
        assert_eq!(slices[1].distinct_value, json!("Iowa"));
    }

    #[test]
    fn test_partition_unknown_attribute() {
        assert!(unchecked_partition(&states_and_cities(), "Mayor").is_err());
    }

    #[test]
    fn test_merge_patch() {
        let mut state = PartitionSaveState {
            input_data_context: "A".into(),
            attribute_name: "x".into(),
            value_to_context: BTreeMap::new(),
        };
        state.merge(PartitionStatePatch {
            attribute_name: Some("y".into()),
            ..Default::default()
        });
        assert_eq!(state.input_data_context, "A");
        assert_eq!(state.attribute_name, "y");
    }

    async fn create(host: &MemoryHost) -> PartitionSaveState {
        let state = TransformerState::new().context1("Census").attribute1("State");
        partition(&state, host).await.unwrap()
    }

    #[tokio::test]
    async fn test_partition_creates_outputs() {
        let host = host_with("Census", states_and_cities());
        let saved = create(&host).await;

        assert_eq!(saved.value_to_context.len(), 2);
        let ohio = host.context(&saved.value_to_context["Ohio"]).unwrap();
        assert_eq!(ohio.dataset.records.len(), 2);
        assert_eq!(ohio.dataset.editable, Some(false));
        assert_eq!(ohio.context.title.as_deref(), Some("Partition(Census, State = Ohio)"));
    }

    #[tokio::test]
    async fn test_update_creates_updates_and_deletes() {
        let host = host_with("Census", states_and_cities());
        let saved = create(&host).await;
        let iowa = saved.value_to_context["Iowa"].clone();
        let ohio = saved.value_to_context["Ohio"].clone();
        host.set_title(&ohio, "My Ohio").unwrap();

        let mut updated = states_and_cities();
        updated.records.retain(|r| r["State"] != json!("Iowa"));
        updated.records.push(
            json!({ "State": "Utah", "City": "Provo", "Population": 115 })
                .as_object()
                .unwrap()
                .clone(),
        );
        host.set_dataset("Census", updated).unwrap();

        let edited: BTreeSet<String> = [ohio.clone()].into_iter().collect();
        let patch = update_partition(&saved, &host, &edited).await.unwrap();
        let map = patch.value_to_context.unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map["Ohio"], ohio);
        assert!(map.contains_key("Utah"));
        assert!(host.context(&iowa).is_none());
        assert_eq!(host.context(&ohio).unwrap().context.title.as_deref(), Some("My Ohio"));
    }

    #[tokio::test]
    async fn test_missing_values_form_their_own_partition() {
        let host = host_with("F", flat(&["k"], vec![json!({ "k": 1 }), json!({ "k": null }), json!({})]));
        let state = TransformerState::new().context1("F").attribute1("k");
        let saved = partition(&state, &host).await.unwrap();
        assert_eq!(saved.value_to_context.len(), 2);
        assert!(saved.value_to_context.contains_key(""));
    }
}
