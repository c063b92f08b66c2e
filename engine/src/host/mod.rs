//! Host platform interface.
//!
//! The engine never talks to a concrete data platform. Operators and the
//! registry go through the [`Host`] trait for reading and writing datasets
//! and text outputs, and through an [`Evaluator`] for formulas.
//!
//! - [`MemoryHost`] - in-process host used by the CLI and by tests
//! - [`AttributeEvaluator`] - minimal evaluator for attribute references and literals
//! - [`FnEvaluator`] - closure-backed evaluator for embedding and tests

pub mod evaluator;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::HostResult;
use crate::models::{normalize_dataset, DataContext, DataSet, Record};

pub use evaluator::AttributeEvaluator;
pub use memory::MemoryHost;

/// Evaluates a formula once per record environment.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Evaluate `expr` against each record. The result has one value per
    /// record, in order.
    async fn eval_expression(&self, expr: &str, records: &[Record]) -> HostResult<Vec<Value>>;
}

/// Connection to the data platform holding contexts and text outputs.
#[async_trait]
pub trait Host: Send + Sync {
    fn evaluator(&self) -> &dyn Evaluator;

    /// Metadata of a context.
    async fn get_data_context(&self, name: &str) -> HostResult<DataContext>;

    /// Metadata and a snapshot of the dataset of a context.
    async fn get_context_and_dataset(&self, name: &str) -> HostResult<(DataContext, DataSet)>;

    /// Create a new context and return its name.
    async fn create_context_with_dataset(
        &self,
        dataset: &DataSet,
        title: &str,
        description: &str,
    ) -> HostResult<String>;

    /// Replace the dataset of a context. `title` and `description` are left
    /// alone when `None`.
    async fn update_context_with_dataset(
        &self,
        name: &str,
        dataset: &DataSet,
        title: Option<&str>,
        description: Option<&str>,
    ) -> HostResult<()>;

    async fn delete_data_context(&self, name: &str) -> HostResult<()>;

    /// Create a text output and return its name.
    async fn create_text(&self, title: &str, content: &str) -> HostResult<String>;

    async fn update_text(&self, name: &str, content: &str, title: Option<&str>) -> HostResult<()>;

    async fn eval_expression(&self, expr: &str, records: &[Record]) -> HostResult<Vec<Value>> {
        self.evaluator().eval_expression(expr, records).await
    }
}

/// Fetch a context and its dataset with attribute defaults filled in.
pub async fn fetch_dataset(host: &dyn Host, name: &str) -> HostResult<(DataContext, DataSet)> {
    let (context, dataset) = host.get_context_and_dataset(name).await?;
    Ok((context, normalize_dataset(dataset)))
}

type RecordFn = dyn Fn(&str, &Record) -> HostResult<Value> + Send + Sync;

/// Evaluator backed by a closure called once per record.
pub struct FnEvaluator {
    func: Box<RecordFn>,
}

impl FnEvaluator {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&str, &Record) -> HostResult<Value> + Send + Sync + 'static,
    {
        Self { func: Box::new(func) }
    }
}

#[async_trait]
impl Evaluator for FnEvaluator {
    async fn eval_expression(&self, expr: &str, records: &[Record]) -> HostResult<Vec<Value>> {
        records.iter().map(|r| (self.func)(expr, r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_evaluator_runs_per_record() {
        let evaluator = FnEvaluator::new(|expr, record| {
            record
                .get(expr)
                .cloned()
                .ok_or_else(|| HostError::Evaluation(format!("unknown {}", expr)))
        });
        let records: Vec<Record> = vec![
            json!({ "a": 1 }).as_object().unwrap().clone(),
            json!({ "a": 2 }).as_object().unwrap().clone(),
        ];

        let values = evaluator.eval_expression("a", &records).await.unwrap();
        assert_eq!(values, vec![json!(1), json!(2)]);
        assert!(evaluator.eval_expression("b", &records).await.is_err());
    }
}
