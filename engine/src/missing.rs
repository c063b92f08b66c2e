//! Missing value reports.
//!
//! Every operator returns a [`MissingValueReport`] next to its primary
//! output. Missing values never abort a transform; they are collected here
//! and surfaced as information.

use serde::{Deserialize, Serialize};

/// Where a missing input value was found.
///
/// Names are user-recognisable titles, and `item_index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingValueLocation {
    pub context: String,
    pub collection: String,
    pub attribute: String,
    pub item_index: usize,
}

/// Account of missing values seen while running a transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MissingValueReport {
    /// Missing cells in the input dataset.
    Input {
        #[serde(rename = "missingValues")]
        missing_values: Vec<MissingValueLocation>,
        #[serde(rename = "extraInfo", default, skip_serializing_if = "Option::is_none")]
        extra_info: Option<String>,
    },
    /// 1-based rows for which a formula evaluated to missing.
    Formula {
        #[serde(rename = "missingValues")]
        missing_values: Vec<usize>,
        #[serde(rename = "extraInfo", default, skip_serializing_if = "Option::is_none")]
        extra_info: Option<String>,
    },
}

impl Default for MissingValueReport {
    fn default() -> Self {
        Self::input()
    }
}

impl MissingValueReport {
    /// An empty report of kind `input`.
    pub fn input() -> Self {
        Self::Input {
            missing_values: Vec::new(),
            extra_info: None,
        }
    }

    /// An empty report of kind `formula`.
    pub fn formula() -> Self {
        Self::Formula {
            missing_values: Vec::new(),
            extra_info: None,
        }
    }

    /// Record a missing input cell. Ignored on formula reports.
    pub fn add_input_location(&mut self, location: MissingValueLocation) {
        if let Self::Input { missing_values, .. } = self {
            missing_values.push(location);
        }
    }

    /// Record a 1-based row whose formula result was missing. Ignored on
    /// input reports.
    pub fn push_formula_row(&mut self, row: usize) {
        if let Self::Formula { missing_values, .. } = self {
            missing_values.push(row);
        }
    }

    pub fn set_extra_info(&mut self, info: impl Into<String>) {
        match self {
            Self::Input { extra_info, .. } | Self::Formula { extra_info, .. } => {
                *extra_info = Some(info.into());
            }
        }
    }

    pub fn with_extra_info(mut self, info: impl Into<String>) -> Self {
        self.set_extra_info(info);
        self
    }

    pub fn extra_info(&self) -> Option<&str> {
        match self {
            Self::Input { extra_info, .. } | Self::Formula { extra_info, .. } => {
                extra_info.as_deref()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Input { missing_values, .. } => missing_values.len(),
            Self::Formula { missing_values, .. } => missing_values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_report_shape() {
        let mut mvr = MissingValueReport::input();
        mvr.add_input_location(MissingValueLocation {
            context: "Census".into(),
            collection: "People".into(),
            attribute: "Age".into(),
            item_index: 3,
        });
        mvr.set_extra_info("1 missing values were encountered.");

        let value = serde_json::to_value(&mvr).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "input",
                "missingValues": [
                    { "context": "Census", "collection": "People", "attribute": "Age", "itemIndex": 3 }
                ],
                "extraInfo": "1 missing values were encountered."
            })
        );
    }

    #[test]
    fn test_kind_mismatch_is_ignored() {
        let mut mvr = MissingValueReport::formula();
        mvr.push_formula_row(2);
        mvr.add_input_location(MissingValueLocation {
            context: "c".into(),
            collection: "c".into(),
            attribute: "a".into(),
            item_index: 1,
        });
        assert_eq!(mvr.len(), 1);
        assert_eq!(
            serde_json::to_value(&mvr).unwrap(),
            json!({ "kind": "formula", "missingValues": [2] })
        );
    }

    #[test]
    fn test_default_is_empty_input() {
        let mvr = MissingValueReport::default();
        assert!(mvr.is_empty());
        assert!(matches!(mvr, MissingValueReport::Input { .. }));
        assert_eq!(mvr.extra_info(), None);
    }
}
