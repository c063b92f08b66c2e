//! Catalog of every transformer the engine knows.
//!
//! Dispatch from a saved [`TransformerState`] to the operator happens here,
//! through an exhaustive match on [`Transformer`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::compare::compare;
use super::combine::combine_cases;
use super::copy::{copy, copy_structure};
use super::flatten::flatten;
use super::fold::{difference_from, generic_fold, numeric_fold, NumericFold};
use super::group_by::group_by;
use super::sort::sort;
use super::state::TransformerState;
use super::stats::{median, mode, standard_deviation, sum_product};
use super::transform_column::transform_column;
use super::types::{OutputValue, TransformationOutput};
use crate::error::{TransformError, TransformResult};
use crate::host::Host;

/// Where the primary result of a dataset creator goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformationOutputType {
    /// A new data context.
    Context,
    /// A text output showing a single value.
    Text,
}

/// How a transformer is run and kept up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformFunction {
    /// Pure function of its saved state, re-run on every input update.
    DatasetCreator(TransformationOutputType),
    /// Manages its own outputs and update procedure.
    FullOverride,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Transformer {
    #[serde(rename = "Running Sum")]
    RunningSum,
    #[serde(rename = "Running Mean")]
    RunningMean,
    #[serde(rename = "Running Min")]
    RunningMin,
    #[serde(rename = "Running Max")]
    RunningMax,
    #[serde(rename = "Difference")]
    Difference,
    #[serde(rename = "Difference From")]
    DifferenceFrom,
    #[serde(rename = "Reduce")]
    Reduce,
    #[serde(rename = "Group By")]
    GroupBy,
    #[serde(rename = "Flatten")]
    Flatten,
    #[serde(rename = "Partition")]
    Partition,
    #[serde(rename = "Copy")]
    Copy,
    #[serde(rename = "Copy Structure")]
    CopyStructure,
    #[serde(rename = "Combine Cases")]
    CombineCases,
    #[serde(rename = "Compare")]
    Compare,
    #[serde(rename = "Sort")]
    Sort,
    #[serde(rename = "Transform Column")]
    TransformColumn,
    #[serde(rename = "Median")]
    Median,
    #[serde(rename = "Mode")]
    Mode,
    #[serde(rename = "Standard Deviation")]
    StandardDeviation,
    #[serde(rename = "Sum Product")]
    SumProduct,
}

impl Transformer {
    pub const ALL: [Transformer; 20] = [
        Self::RunningSum,
        Self::RunningMean,
        Self::RunningMin,
        Self::RunningMax,
        Self::Difference,
        Self::DifferenceFrom,
        Self::Reduce,
        Self::GroupBy,
        Self::Flatten,
        Self::Partition,
        Self::Copy,
        Self::CopyStructure,
        Self::CombineCases,
        Self::Compare,
        Self::Sort,
        Self::TransformColumn,
        Self::Median,
        Self::Mode,
        Self::StandardDeviation,
        Self::SumProduct,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::RunningSum => "Running Sum",
            Self::RunningMean => "Running Mean",
            Self::RunningMin => "Running Min",
            Self::RunningMax => "Running Max",
            Self::Difference => "Difference",
            Self::DifferenceFrom => "Difference From",
            Self::Reduce => "Reduce",
            Self::GroupBy => "Group By",
            Self::Flatten => "Flatten",
            Self::Partition => "Partition",
            Self::Copy => "Copy",
            Self::CopyStructure => "Copy Structure",
            Self::CombineCases => "Combine Cases",
            Self::Compare => "Compare",
            Self::Sort => "Sort",
            Self::TransformColumn => "Transform Column",
            Self::Median => "Median",
            Self::Mode => "Mode",
            Self::StandardDeviation => "Standard Deviation",
            Self::SumProduct => "Sum Product",
        }
    }

    /// One-line summary with the state fields the transformer reads.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::RunningSum => "Running total of attribute1",
            Self::RunningMean => "Running mean of attribute1",
            Self::RunningMin => "Running minimum of attribute1",
            Self::RunningMax => "Running maximum of attribute1",
            Self::Difference => "Difference of attribute1 with the case above",
            Self::DifferenceFrom => "Difference of attribute1 with the case above, starting from textInput2",
            Self::Reduce => "Fold expression2 over the cases, accumulator textInput2 seeded by expression1",
            Self::GroupBy => "Copy attributeSet1 into a new parent collection",
            Self::Flatten => "Merge every collection into one",
            Self::Partition => "One output per distinct value of attribute1",
            Self::Copy => "Copy of the dataset",
            Self::CopyStructure => "Collections and attributes only, no cases",
            Self::CombineCases => "Cases of context1 followed by the cases of context2",
            Self::Compare => "Compare attribute1 with attribute2 (dropdown1: numeric or categorical)",
            Self::Sort => "Sort by expression1 (dropdown1: ascending or descending)",
            Self::TransformColumn => "Replace attribute1 with the values of expression1",
            Self::Median => "Median of attribute1",
            Self::Mode => "Most frequent values of attribute1",
            Self::StandardDeviation => "Population standard deviation of attribute1",
            Self::SumProduct => "Sum over cases of the product of attributeSet1",
        }
    }

    pub fn function(&self) -> TransformFunction {
        match self {
            Self::Partition => TransformFunction::FullOverride,
            Self::Median | Self::Mode | Self::StandardDeviation | Self::SumProduct => {
                TransformFunction::DatasetCreator(TransformationOutputType::Text)
            }
            _ => TransformFunction::DatasetCreator(TransformationOutputType::Context),
        }
    }

    /// Contexts the output depends on, in declaration order.
    pub fn inputs(&self, state: &TransformerState) -> Vec<String> {
        match self {
            Self::CombineCases => state.contexts(),
            _ => state.context1.iter().cloned().collect(),
        }
    }

    /// Run a dataset creator. Partition has its own entry points in
    /// [`super::partition`].
    pub async fn run(
        &self,
        state: &TransformerState,
        host: &dyn Host,
    ) -> TransformResult<TransformationOutput<OutputValue>> {
        let to_dataset = |o: TransformationOutput<_>| o.map(OutputValue::DataSet);
        let to_single = |o: TransformationOutput<_>| o.map(OutputValue::SingleValue);

        match self {
            Self::RunningSum => numeric_fold(NumericFold::RunningSum, state, host).await.map(to_dataset),
            Self::RunningMean => numeric_fold(NumericFold::RunningMean, state, host).await.map(to_dataset),
            Self::RunningMin => numeric_fold(NumericFold::RunningMin, state, host).await.map(to_dataset),
            Self::RunningMax => numeric_fold(NumericFold::RunningMax, state, host).await.map(to_dataset),
            Self::Difference => numeric_fold(NumericFold::Difference, state, host).await.map(to_dataset),
            Self::DifferenceFrom => difference_from(state, host).await.map(to_dataset),
            Self::Reduce => generic_fold(state, host).await.map(to_dataset),
            Self::GroupBy => group_by(state, host).await.map(to_dataset),
            Self::Flatten => flatten(state, host).await.map(to_dataset),
            Self::Partition => Err(TransformError::validation(
                "Partition manages its own outputs and cannot be run as a dataset creator",
            )),
            Self::Copy => copy(state, host).await.map(to_dataset),
            Self::CopyStructure => copy_structure(state, host).await.map(to_dataset),
            Self::CombineCases => combine_cases(state, host).await.map(to_dataset),
            Self::Compare => compare(state, host).await.map(to_dataset),
            Self::Sort => sort(state, host).await.map(to_dataset),
            Self::TransformColumn => transform_column(state, host).await.map(to_dataset),
            Self::Median => median(state, host).await.map(to_single),
            Self::Mode => mode(state, host).await.map(to_single),
            Self::StandardDeviation => standard_deviation(state, host).await.map(to_single),
            Self::SumProduct => sum_product(state, host).await.map(to_single),
        }
    }
}

impl fmt::Display for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Transformer {
    type Err = TransformError;

    /// Accepts the display name in any case, with spaces, dashes or
    /// underscores between words (`"Running Sum"`, `"running-sum"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalize = |name: &str| -> String {
            name.chars()
                .filter(|&c| !matches!(c, ' ' | '-' | '_'))
                .flat_map(char::to_lowercase)
                .collect()
        };
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|t| normalize(t.name()) == wanted)
            .ok_or_else(|| TransformError::validation(format!("Unknown transformer: {}", s)))
    }
}

/// Markdown table of the catalog, for `tabflow transformers`.
pub fn catalog_description() -> String {
    let mut out = String::from("| Transformer | Output | Description |\n|---|---|---|\n");
    for transformer in Transformer::ALL {
        let output = match transformer.function() {
            TransformFunction::DatasetCreator(TransformationOutputType::Context) => "dataset",
            TransformFunction::DatasetCreator(TransformationOutputType::Text) => "text",
            TransformFunction::FullOverride => "datasets (managed)",
        };
        out.push_str(&format!("| {} | {} | {} |\n", transformer, output, transformer.summary()));
    }
    out
}
