//! Transformation module.
//!
//! This module holds every dataset operator:
//! - Structural: group by, flatten, partition, copy, copy structure, combine cases
//! - Computational: folds, transform column, sort, compare
//! - Single value: median, mode, standard deviation, sum product
//!
//! Each operator comes in two layers. The checked wrapper reads a
//! [`TransformerState`], validates it, fetches its input from a
//! [`crate::host::Host`] and builds the output name and description. The
//! `unchecked_*` function does the actual work on a [`crate::models::DataSet`]
//! and never touches the host.

pub mod catalog;
pub mod colors;
pub mod combine;
pub mod compare;
pub mod copy;
pub mod flatten;
pub mod fold;
pub mod group_by;
pub mod names;
pub mod partition;
pub mod sort;
pub mod state;
pub mod stats;
pub mod transform_column;
pub mod types;
pub mod util;

pub use catalog::{catalog_description, TransformFunction, TransformationOutputType, Transformer};
pub use partition::{partition, update_partition, PartitionSaveState, PartitionStatePatch};
pub use state::TransformerState;
pub use types::{CodapLanguageType, OutputValue, SingleValue, TransformationOutput, TypeContract};

#[cfg(test)]
pub(crate) mod testing {
    use crate::host::{AttributeEvaluator, MemoryHost};
    use crate::models::{DataContext, DataSet};

    /// Host evaluating attribute references, holding one context.
    pub fn host_with(name: &str, dataset: DataSet) -> MemoryHost {
        let host = MemoryHost::new(AttributeEvaluator::new());
        host.insert_context(DataContext::new(name), dataset);
        host
    }
}
