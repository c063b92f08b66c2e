//! Domain models for hierarchical datasets.
//!
//! This module contains the data structures every operator works on:
//!
//! - [`DataSet`] - collections plus flat records
//! - [`Collection`] - one level of the parent/child hierarchy
//! - [`Attribute`] - a typed column definition
//! - [`Record`] - one case, values keyed by attribute name
//! - [`DataContext`] - host metadata for a dataset instance
//!
//! Collections are stored as a flat list with parent-by-name references.
//! Lookups that need the tree build an index on demand (see
//! [`collection_index`]) instead of keeping back-pointers.

pub mod value;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub use value::{
    boundary_name, cell, codap_value_to_string, is_boundary, is_missing, is_whitespace,
    parse_number, pretty_print_case,
};

/// One case of a dataset: attribute name to scalar value.
///
/// `Value::Null` (or an absent key) is the missing-value marker. Boundaries
/// are JSON objects carrying a `jsonBoundaryObject`.
pub type Record = Map<String, Value>;

// =============================================================================
// Dataset
// =============================================================================

/// A dataset snapshot: the collection hierarchy and all of its records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSet {
    pub collections: Vec<Collection>,
    pub records: Vec<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
}

impl DataSet {
    pub fn new(collections: Vec<Collection>, records: Vec<Record>) -> Self {
        Self {
            collections,
            records,
            editable: None,
        }
    }

    /// Find the collection owning an attribute.
    pub fn collection_of(&self, attr_name: &str) -> Option<&Collection> {
        self.collections
            .iter()
            .find(|c| c.attr(attr_name).is_some())
    }
}

// =============================================================================
// Collection
// =============================================================================

/// Display labels of a collection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionLabels {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_case: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural_case: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_case_with_article: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_of_cases: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_of_cases_with_article: Option<String>,
}

/// A named level of the parent/child hierarchy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<CollectionLabels>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Vec<Attribute>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Collection {
    pub fn new(name: impl Into<String>, attrs: Vec<Attribute>) -> Self {
        Self {
            name: name.into(),
            attrs: Some(attrs),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs.as_ref()?.iter().find(|a| a.name == name)
    }

    pub fn attr_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attrs.as_mut()?.iter_mut().find(|a| a.name == name)
    }

    pub fn attr_names(&self) -> impl Iterator<Item = &str> {
        self.attrs.iter().flatten().map(|a| a.name.as_str())
    }

    /// User-facing name: the title if present, the name otherwise.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

// =============================================================================
// Attribute
// =============================================================================

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    Numeric,
    Categorical,
    Date,
    Qualitative,
    Boundary,
    Checkbox,
    Color,
}

/// A named, typed column definition within a collection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub attr_type: Option<AttributeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colormap: Option<Value>,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, attr_type: AttributeType) -> Self {
        self.attr_type = Some(attr_type);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

// =============================================================================
// Data Context
// =============================================================================

/// Host metadata describing a dataset instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataContext {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DataContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Title if set and non-empty, otherwise the name.
    pub fn readable_name(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.is_empty() => title,
            _ => &self.name,
        }
    }
}

// =============================================================================
// Normalization
// =============================================================================

/// Fill in the defaults the host would report for a collection.
///
/// Applied once when a dataset is read from the host; operators can then
/// rely on titles and flags being present.
pub fn fill_collection_with_defaults(collection: Collection) -> Collection {
    Collection {
        title: Some(collection.title.unwrap_or_else(|| collection.name.clone())),
        attrs: collection
            .attrs
            .map(|attrs| attrs.into_iter().map(fill_attr_with_defaults).collect()),
        ..collection
    }
}

/// Fill in the defaults the host would report for an attribute.
pub fn fill_attr_with_defaults(attr: Attribute) -> Attribute {
    let mut filled = Attribute {
        title: Some(attr.title.unwrap_or_else(|| attr.name.clone())),
        editable: Some(attr.editable.unwrap_or(true)),
        hidden: Some(attr.hidden.unwrap_or(false)),
        description: Some(attr.description.unwrap_or_default()),
        ..attr
    };
    if filled.attr_type == Some(AttributeType::Numeric) && filled.precision.is_none() {
        filled.precision = Some(2);
        filled.unit = None;
    }
    filled
}

/// Normalize every collection of a dataset read from the host.
pub fn normalize_dataset(dataset: DataSet) -> DataSet {
    DataSet {
        collections: dataset
            .collections
            .into_iter()
            .map(fill_collection_with_defaults)
            .collect(),
        ..dataset
    }
}

/// Compare two collection lists the way the host does: by name, title,
/// description, labels and attributes. Parent links are not compared.
pub fn collections_equal(a: &[Collection], b: &[Collection]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(c1, c2)| {
            c1.name == c2.name
                && c1.title == c2.title
                && c1.description == c2.description
                && c1.labels == c2.labels
                && c1.attrs == c2.attrs
        })
}

/// Map collection name to its position in the list.
pub fn collection_index(collections: &[Collection]) -> HashMap<&str, usize> {
    collections
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.as_str(), i))
        .collect()
}

/// Order collections from the root down, following parent links.
///
/// Collections whose parent cannot be resolved are treated as roots.
pub fn hierarchy_order(collections: &[Collection]) -> Vec<&Collection> {
    let index = collection_index(collections);
    let mut children: HashMap<Option<usize>, Vec<usize>> = HashMap::new();
    for (i, c) in collections.iter().enumerate() {
        let parent = c.parent.as_deref().and_then(|p| index.get(p).copied());
        children.entry(parent).or_default().push(i);
    }

    let mut ordered = Vec::with_capacity(collections.len());
    let mut visited = vec![false; collections.len()];
    let mut queue: std::collections::VecDeque<usize> =
        children.get(&None).cloned().unwrap_or_default().into();
    while let Some(i) = queue.pop_front() {
        if std::mem::replace(&mut visited[i], true) {
            continue;
        }
        ordered.push(&collections[i]);
        if let Some(kids) = children.get(&Some(i)) {
            queue.extend(kids.iter().copied());
        }
    }

    // Cycles are unreachable from a root; keep them in list order.
    for (i, c) in collections.iter().enumerate() {
        if !visited[i] {
            ordered.push(c);
        }
    }
    ordered
}
