//! Dataset utilities shared by the operators.
//!
//! Operators never mutate their input: collections and records are cloned
//! before being written to.

use serde_json::Value;

use crate::error::{TransformError, TransformResult};
use crate::missing::{MissingValueLocation, MissingValueReport};
use crate::models::{
    cell, codap_value_to_string, hierarchy_order, is_missing, parse_number, Attribute,
    Collection, DataSet, Record,
};

pub fn clone_collection(collection: &Collection) -> Collection {
    collection.clone()
}

pub fn shallow_copy(record: &Record) -> Record {
    record.clone()
}

/// Find the collection and attribute definition for `name`.
///
/// Fails with a missing-attribute error, using `message` when given.
pub fn validate_attribute<'a>(
    collections: &'a [Collection],
    name: &str,
    message: Option<&str>,
) -> TransformResult<(&'a Collection, &'a Attribute)> {
    collections
        .iter()
        .find_map(|c| c.attr(name).map(|a| (c, a)))
        .ok_or_else(|| match message {
            Some(message) => TransformError::MissingAttribute {
                name: name.to_string(),
                message: message.to_string(),
            },
            None => TransformError::missing_attribute(name),
        })
}

pub fn all_attr_names(dataset: &DataSet) -> Vec<String> {
    dataset
        .collections
        .iter()
        .flat_map(|c| c.attr_names().map(str::to_string))
        .collect()
}

pub fn all_collection_names(dataset: &DataSet) -> Vec<String> {
    dataset.collections.iter().map(|c| c.name.clone()).collect()
}

/// Re-link the children of `removed` to its parent.
pub fn reparent(collections: &mut [Collection], removed: &Collection) {
    for collection in collections.iter_mut() {
        if collection.parent.as_deref() == Some(removed.name.as_str()) {
            collection.parent = removed.parent.clone();
        }
    }
}

/// Drop collections that have an explicit empty attribute list, re-linking
/// their children to keep the hierarchy connected.
pub fn remove_empty_collections(collections: Vec<Collection>) -> Vec<Collection> {
    let (empty, mut kept): (Vec<_>, Vec<_>) = collections
        .into_iter()
        .partition(|c| matches!(&c.attrs, Some(attrs) if attrs.is_empty()));
    for removed in &empty {
        reparent(&mut kept, removed);
    }
    kept
}

/// Append `attr` to the most-child collection.
pub fn insert_column_in_last_collection(
    collections: &[Collection],
    attr: Attribute,
) -> Vec<Collection> {
    let last = hierarchy_order(collections).last().map(|c| c.name.clone());
    let mut collections: Vec<Collection> = collections.iter().map(clone_collection).collect();
    if let Some(target) = last.and_then(|name| collections.iter_mut().find(|c| c.name == name)) {
        target.attrs.get_or_insert_with(Vec::new).push(attr);
    }
    collections
}

/// Copy of `record` with one extra value.
pub fn insert_in_row(record: &Record, name: &str, value: Value) -> Record {
    let mut copy = shallow_copy(record);
    copy.insert(name.to_string(), value);
    copy
}

/// Every present value of an attribute as a number, skipping missing cells.
pub fn extract_attribute_as_numeric(dataset: &DataSet, attr_name: &str) -> TransformResult<Vec<f64>> {
    let mut values = Vec::with_capacity(dataset.records.len());
    for record in &dataset.records {
        let value = cell(record, attr_name);
        if is_missing(value) {
            continue;
        }
        match parse_number(value) {
            Some(n) => values.push(n),
            None => {
                return Err(TransformError::type_mismatch(format!(
                    "Expected a number in the {} attribute, instead got {}",
                    attr_name,
                    codap_value_to_string(value)
                )))
            }
        }
    }
    Ok(values)
}

/// Add the location of a missing cell at record `row` (0-based) to `mvr`.
pub fn add_to_mvr(
    mvr: &mut MissingValueReport,
    dataset: &DataSet,
    context_title: &str,
    attr_name: &str,
    row: usize,
) {
    let (collection, attribute) = match dataset.collection_of(attr_name) {
        Some(c) => (c.display_title().to_string(), c.attr(attr_name).map(|a| a.display_title().to_string())),
        None => (String::new(), None),
    };
    mvr.add_input_location(MissingValueLocation {
        context: context_title.to_string(),
        collection,
        attribute: attribute.unwrap_or_else(|| attr_name.to_string()),
        item_index: row + 1,
    });
}

/// Input report listing every missing cell of the given attributes.
pub fn missing_report_for(dataset: &DataSet, context_title: &str, attr_names: &[&str]) -> MissingValueReport {
    let mut mvr = MissingValueReport::input();
    for (i, record) in dataset.records.iter().enumerate() {
        for name in attr_names {
            if is_missing(cell(record, name)) {
                add_to_mvr(&mut mvr, dataset, context_title, name, i);
            }
        }
    }
    mvr
}

/// Mark a dataset and all of its attributes as not editable.
pub fn make_dataset_immutable(dataset: DataSet) -> DataSet {
    let collections = dataset
        .collections
        .into_iter()
        .map(|mut c| {
            if let Some(attrs) = c.attrs.as_mut() {
                for attr in attrs {
                    attr.editable = Some(false);
                }
            }
            c
        })
        .collect();
    DataSet {
        collections,
        records: dataset.records,
        editable: Some(false),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::models::AttributeType;
    use serde_json::json;

    pub fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    pub fn records(values: Vec<Value>) -> Vec<Record> {
        values.into_iter().map(record).collect()
    }

    /// A flat dataset with one "Cases" collection.
    pub fn flat(attrs: &[&str], rows: Vec<Value>) -> DataSet {
        DataSet::new(
            vec![Collection::new(
                "Cases",
                attrs.iter().map(|a| Attribute::new(*a)).collect(),
            )],
            records(rows),
        )
    }

    /// States (State) > Cities (City, Population).
    pub fn states_and_cities() -> DataSet {
        DataSet::new(
            vec![
                Collection::new("States", vec![Attribute::new("State")]),
                Collection::new(
                    "Cities",
                    vec![
                        Attribute::new("City"),
                        Attribute::new("Population")
                            .with_type(AttributeType::Numeric)
                            .with_formula("round(Population)"),
                    ],
                )
                .with_parent("States"),
            ],
            records(vec![
                json!({ "State": "Ohio", "City": "Akron", "Population": 190 }),
                json!({ "State": "Ohio", "City": "Dayton", "Population": 137 }),
                json!({ "State": "Iowa", "City": "Ames", "Population": "" }),
                json!({ "State": "Iowa", "City": "Ankeny", "Population": 67 }),
            ]),
        )
    }
}
