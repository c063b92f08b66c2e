//! Descriptions of active transformations.
//!
//! A description holds everything needed to re-run a transformer later: the
//! transformer, its saved state, the contexts it reads and where its output
//! went.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transform::{PartitionSaveState, PartitionStatePatch, TransformationOutputType, Transformer, TransformerState};

/// A transformer that is a pure function of its saved state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetCreatorDescription {
    pub id: Uuid,
    pub transformer: Transformer,
    pub state: TransformerState,
    pub inputs: Vec<String>,
    #[serde(default)]
    pub extra_dependencies: Vec<String>,
    /// Name of the context or text output kept up to date.
    pub output: String,
    pub output_type: TransformationOutputType,
}

/// A transformer that owns its outputs and its update procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullOverrideDescription {
    pub id: Uuid,
    pub transformer: Transformer,
    pub state: PartitionSaveState,
    pub inputs: Vec<String>,
    /// Contexts the transformer created. Deleting one of them stops the
    /// transformation.
    #[serde(default)]
    pub extra_dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TransformationDescription {
    DatasetCreator(DatasetCreatorDescription),
    FullOverride(FullOverrideDescription),
}

impl TransformationDescription {
    pub fn id(&self) -> Uuid {
        match self {
            Self::DatasetCreator(d) => d.id,
            Self::FullOverride(d) => d.id,
        }
    }

    pub fn transformer(&self) -> Transformer {
        match self {
            Self::DatasetCreator(d) => d.transformer,
            Self::FullOverride(d) => d.transformer,
        }
    }

    pub fn inputs(&self) -> &[String] {
        match self {
            Self::DatasetCreator(d) => &d.inputs,
            Self::FullOverride(d) => &d.inputs,
        }
    }

    pub fn extra_dependencies(&self) -> &[String] {
        match self {
            Self::DatasetCreator(d) => &d.extra_dependencies,
            Self::FullOverride(d) => &d.extra_dependencies,
        }
    }

    /// True if `context` is an input or an extra dependency.
    pub fn depends_on(&self, context: &str) -> bool {
        self.inputs().iter().chain(self.extra_dependencies()).any(|c| c == context)
    }

    /// Contexts and texts written by this transformation.
    pub fn outputs(&self) -> Vec<&str> {
        match self {
            Self::DatasetCreator(d) => vec![d.output.as_str()],
            Self::FullOverride(d) => d.state.outputs().collect(),
        }
    }

    /// Name used in log lines and error messages.
    pub fn label(&self) -> String {
        match self {
            Self::DatasetCreator(d) => d.output.clone(),
            Self::FullOverride(d) => format!("{} of {}", d.transformer, d.state.input_data_context),
        }
    }
}

/// Patch for a full-override description. Each field replaces or merges
/// independently.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullOverridePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_dependencies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PartitionStatePatch>,
}

impl FullOverrideDescription {
    /// Copy with `patch` merged in. `inputs` follows the input context of
    /// the merged state.
    pub fn patched(&self, patch: FullOverridePatch) -> Self {
        let mut next = self.clone();
        if let Some(extra) = patch.extra_dependencies {
            next.extra_dependencies = extra;
        }
        if let Some(state) = patch.state {
            next.state.merge(state);
            next.inputs = vec![next.state.input_data_context.clone()];
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn partition_description() -> FullOverrideDescription {
        FullOverrideDescription {
            id: Uuid::new_v4(),
            transformer: Transformer::Partition,
            state: PartitionSaveState {
                input_data_context: "People".into(),
                attribute_name: "State".into(),
                value_to_context: BTreeMap::from([("Ohio".to_string(), "P1".to_string())]),
            },
            inputs: vec!["People".into()],
            extra_dependencies: vec!["P1".into()],
        }
    }

    #[test]
    fn test_serialized_shape() {
        let description = TransformationDescription::DatasetCreator(DatasetCreatorDescription {
            id: Uuid::nil(),
            transformer: Transformer::RunningSum,
            state: TransformerState::new().context1("A"),
            inputs: vec!["A".into()],
            extra_dependencies: vec![],
            output: "RunningSum(A, ...)".into(),
            output_type: TransformationOutputType::Context,
        });
        let value = serde_json::to_value(&description).unwrap();
        assert_eq!(value["kind"], json!("datasetCreator"));
        assert_eq!(value["transformer"], json!("Running Sum"));
        assert_eq!(value["outputType"], json!("context"));
        assert_eq!(value["state"]["context1"], json!("A"));

        let back: TransformationDescription = serde_json::from_value(value).unwrap();
        assert_eq!(back, description);
    }

    #[test]
    fn test_patch_merges_fields_independently() {
        let description = partition_description();

        let only_deps = description.patched(FullOverridePatch {
            extra_dependencies: Some(vec!["P2".into()]),
            state: None,
        });
        assert_eq!(only_deps.extra_dependencies, vec!["P2"]);
        assert_eq!(only_deps.state, description.state);

        let only_state = description.patched(FullOverridePatch {
            extra_dependencies: None,
            state: Some(PartitionStatePatch {
                input_data_context: Some("Folks".into()),
                ..Default::default()
            }),
        });
        assert_eq!(only_state.extra_dependencies, vec!["P1"]);
        assert_eq!(only_state.state.attribute_name, "State");
        assert_eq!(only_state.inputs, vec!["Folks"]);
    }

    #[test]
    fn test_depends_on_inputs_and_extras() {
        let description = TransformationDescription::FullOverride(partition_description());
        assert!(description.depends_on("People"));
        assert!(description.depends_on("P1"));
        assert!(!description.depends_on("Other"));
        assert_eq!(description.outputs(), vec!["P1"]);
        assert_eq!(description.label(), "Partition of People");
    }
}
