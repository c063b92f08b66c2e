//! Re-running a single description against the host.

use std::collections::BTreeSet;

use super::description::{DatasetCreatorDescription, FullOverrideDescription, FullOverridePatch, TransformationDescription};
use crate::error::{RegistryError, RegistryResult};
use crate::host::Host;
use crate::transform::util::make_dataset_immutable;
use crate::transform::{update_partition, OutputValue, TransformationOutputType, Transformer};

/// Recompute one description and push its outputs.
///
/// Outputs listed in `edited_outputs` keep their current title. A
/// full-override transformation returns the patch to merge into its
/// description.
pub async fn update_from_description(
    description: &TransformationDescription,
    host: &dyn Host,
    edited_outputs: &BTreeSet<String>,
) -> RegistryResult<Option<FullOverridePatch>> {
    match description {
        TransformationDescription::DatasetCreator(d) => {
            update_dataset_creator(d, host, edited_outputs).await?;
            Ok(None)
        }
        TransformationDescription::FullOverride(d) => update_full_override(d, host, edited_outputs).await.map(Some),
    }
}

async fn update_dataset_creator(
    description: &DatasetCreatorDescription,
    host: &dyn Host,
    edited_outputs: &BTreeSet<String>,
) -> RegistryResult<()> {
    let output = description.transformer.run(&description.state, host).await?;
    let keep_title = edited_outputs.contains(&description.output);
    let title = (!keep_title).then_some(output.output_name.as_str());

    match (description.output_type, output.result) {
        (TransformationOutputType::Context, OutputValue::DataSet(dataset)) => {
            host.update_context_with_dataset(
                &description.output,
                &make_dataset_immutable(dataset),
                title,
                Some(output.output_description.as_str()),
            )
            .await?;
        }
        (TransformationOutputType::Text, OutputValue::SingleValue(value)) => {
            host.update_text(&description.output, &value.display(), title).await?;
        }
        (expected, _) => {
            return Err(RegistryError::OutputMismatch(format!(
                "{} produced an output that cannot be written to a {} output",
                description.transformer,
                match expected {
                    TransformationOutputType::Context => "dataset",
                    TransformationOutputType::Text => "text",
                }
            )))
        }
    }
    Ok(())
}

async fn update_full_override(
    description: &FullOverrideDescription,
    host: &dyn Host,
    edited_outputs: &BTreeSet<String>,
) -> RegistryResult<FullOverridePatch> {
    match description.transformer {
        Transformer::Partition => {
            let state_patch = update_partition(&description.state, host, edited_outputs).await?;
            let extra_dependencies = state_patch
                .value_to_context
                .as_ref()
                .map(|map| map.values().cloned().collect());
            Ok(FullOverridePatch {
                extra_dependencies,
                state: Some(state_patch),
            })
        }
        other => Err(RegistryError::OutputMismatch(format!(
            "{} does not manage its own outputs",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::transform::testing::host_with;
    use crate::transform::util::fixtures::flat;
    use crate::transform::TransformerState;
    use serde_json::json;
    use uuid::Uuid;

    fn median_description(output: &str) -> TransformationDescription {
        TransformationDescription::DatasetCreator(DatasetCreatorDescription {
            id: Uuid::new_v4(),
            transformer: Transformer::Median,
            state: TransformerState::new().context1("T").attribute1("x"),
            inputs: vec!["T".into()],
            extra_dependencies: vec![],
            output: output.into(),
            output_type: TransformationOutputType::Text,
        })
    }

    async fn host_with_text() -> (MemoryHost, String) {
        let host = host_with("T", flat(&["x"], vec![json!({ "x": 1 }), json!({ "x": 5 })]));
        let name = host.create_text("Median(T, x)", "0").await.unwrap();
        (host, name)
    }

    #[tokio::test]
    async fn test_text_output_is_refreshed() {
        let (host, name) = host_with_text().await;
        let patch = update_from_description(&median_description(&name), &host, &BTreeSet::new())
            .await
            .unwrap();
        assert_eq!(patch, None);
        assert_eq!(host.text(&name).unwrap().content, "3");
    }

    #[tokio::test]
    async fn test_edited_title_is_kept() {
        let (host, name) = host_with_text().await;
        host.update_text(&name, "0", Some("My median")).await.unwrap();

        let edited = BTreeSet::from([name.clone()]);
        update_from_description(&median_description(&name), &host, &edited)
            .await
            .unwrap();
        let text = host.text(&name).unwrap();
        assert_eq!(text.title, "My median");
        assert_eq!(text.content, "3");
    }

    #[tokio::test]
    async fn test_dataset_output_is_read_only() {
        let host = host_with("T", flat(&["x"], vec![json!({ "x": 1 })]));
        let name = host
            .create_context_with_dataset(&flat(&["x"], vec![]), "Copy of T", "")
            .await
            .unwrap();
        let description = TransformationDescription::DatasetCreator(DatasetCreatorDescription {
            id: Uuid::new_v4(),
            transformer: Transformer::Copy,
            state: TransformerState::new().context1("T"),
            inputs: vec!["T".into()],
            extra_dependencies: vec![],
            output: name.clone(),
            output_type: TransformationOutputType::Context,
        });
        update_from_description(&description, &host, &BTreeSet::new())
            .await
            .unwrap();

        let stored = host.context(&name).unwrap();
        assert_eq!(stored.dataset.editable, Some(false));
        assert_eq!(stored.dataset.records.len(), 1);
        for collection in &stored.dataset.collections {
            for attr in collection.attrs.iter().flatten() {
                assert_eq!(attr.editable, Some(false), "{} is editable", attr.name);
            }
        }
    }

    #[tokio::test]
    async fn test_output_type_mismatch() {
        let (host, name) = host_with_text().await;
        let description = TransformationDescription::DatasetCreator(DatasetCreatorDescription {
            transformer: Transformer::Copy,
            output_type: TransformationOutputType::Text,
            output: name,
            ..match median_description("unused") {
                TransformationDescription::DatasetCreator(d) => d,
                TransformationDescription::FullOverride(_) => unreachable!(),
            }
        });
        let err = update_from_description(&description, &host, &BTreeSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::OutputMismatch(_)));
    }
}
