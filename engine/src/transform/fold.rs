//! Running folds over one attribute, plus a formula-driven reduce.
//!
//! Every numeric fold walks the records in order, threads an accumulator and
//! appends the running result as a new numeric attribute in the most-child
//! collection. What a fold writes for a missing cell depends on its
//! [`MissingBehavior`].

use serde_json::{Number, Value};

use super::names::{parenthesize_name, unique_name};
use super::state::{require, require_text, TransformerState, NO_DATASET};
use super::types::TransformationOutput;
use super::util::{all_attr_names, insert_column_in_last_collection, insert_in_row, validate_attribute};
use crate::error::{TransformError, TransformResult};
use crate::host::{fetch_dataset, Evaluator, Host};
use crate::models::{cell, codap_value_to_string, is_whitespace, Attribute, AttributeType, DataSet, Record};

/// What to write when the input cell is missing or blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingBehavior {
    /// Repeat the previous result (blank if there is none yet).
    UseLast,
    /// Leave the result cell blank.
    LeaveBlank,
}

/// A numeric fold built from a seed and a step function.
pub struct NumFold<A, F> {
    name: &'static str,
    base: A,
    step: F,
    missing: MissingBehavior,
}

pub fn make_num_fold<A, F>(name: &'static str, base: A, step: F, missing: MissingBehavior) -> NumFold<A, F>
where
    A: Clone,
    F: Fn(&A, f64) -> (A, f64),
{
    NumFold { name, base, step, missing }
}

/// Numeric reading of a fold input. Booleans count as 1 and 0.
fn fold_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn number_value(n: f64) -> Value {
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

fn blank() -> Value {
    Value::String(String::new())
}

impl<A, F> NumFold<A, F>
where
    A: Clone,
    F: Fn(&A, f64) -> (A, f64),
{
    pub fn apply(
        &self,
        dataset: &DataSet,
        input_column: &str,
        result_column: &str,
        result_description: &str,
    ) -> TransformResult<DataSet> {
        validate_attribute(&dataset.collections, input_column, None)?;
        let result_column = unique_name(result_column, &all_attr_names(dataset));

        let mut acc = self.base.clone();
        let mut last = blank();
        let mut records = Vec::with_capacity(dataset.records.len());
        for row in &dataset.records {
            let value = cell(row, input_column);
            if is_whitespace(value) {
                let filler = match self.missing {
                    MissingBehavior::UseLast => last.clone(),
                    MissingBehavior::LeaveBlank => blank(),
                };
                records.push(insert_in_row(row, &result_column, filler));
                continue;
            }

            let number = fold_number(value).ok_or_else(|| {
                TransformError::type_mismatch(format!(
                    "{}: expected a number, instead got {}",
                    self.name,
                    codap_value_to_string(value)
                ))
            })?;
            let (next, result) = (self.step)(&acc, number);
            acc = next;
            last = number_value(result);
            records.push(insert_in_row(row, &result_column, last.clone()));
        }

        let collections = insert_column_in_last_collection(
            &dataset.collections,
            Attribute::new(result_column)
                .with_type(AttributeType::Numeric)
                .with_description(result_description),
        );
        Ok(DataSet::new(collections, records))
    }
}

/// The built-in running folds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericFold {
    RunningSum,
    RunningMean,
    RunningMin,
    RunningMax,
    Difference,
}

impl NumericFold {
    pub fn label(&self) -> &'static str {
        match self {
            Self::RunningSum => "Running Sum",
            Self::RunningMean => "Running Mean",
            Self::RunningMin => "Running Min",
            Self::RunningMax => "Running Max",
            Self::Difference => "Difference",
        }
    }

    /// Run the fold without any input validation beyond the attribute lookup.
    pub fn apply(
        &self,
        dataset: &DataSet,
        input_column: &str,
        result_column: &str,
        result_description: &str,
    ) -> TransformResult<DataSet> {
        let name = self.label();
        match self {
            Self::RunningSum => make_num_fold(name, 0.0, |sum: &f64, x| (sum + x, sum + x), MissingBehavior::UseLast)
                .apply(dataset, input_column, result_column, result_description),
            Self::RunningMean => make_num_fold(
                name,
                (0.0, 0usize),
                |(sum, count): &(f64, usize), x| {
                    let next = (sum + x, count + 1);
                    (next, next.0 / next.1 as f64)
                },
                MissingBehavior::UseLast,
            )
            .apply(dataset, input_column, result_column, result_description),
            Self::RunningMin => make_num_fold(
                name,
                None::<f64>,
                |min: &Option<f64>, x| match min {
                    Some(m) if *m <= x => (Some(*m), *m),
                    _ => (Some(x), x),
                },
                MissingBehavior::UseLast,
            )
            .apply(dataset, input_column, result_column, result_description),
            Self::RunningMax => make_num_fold(
                name,
                None::<f64>,
                |max: &Option<f64>, x| match max {
                    Some(m) if *m >= x => (Some(*m), *m),
                    _ => (Some(x), x),
                },
                MissingBehavior::UseLast,
            )
            .apply(dataset, input_column, result_column, result_description),
            Self::Difference => unchecked_difference_from(dataset, input_column, result_column, result_description, None),
        }
    }

    fn descriptions(&self, attribute: &str, context: &str) -> (String, String) {
        match self {
            Self::Difference => (
                format!(
                    "The difference of each case with the case above it (from the {} attribute in the {} dataset).",
                    attribute, context
                ),
                format!(
                    "A copy of {ctx} with a new column whose values are the difference between \
                     the value of {attr} in the current case and the value of {attr} \
                     in the case above. The first case subtracts 0 from itself.",
                    ctx = context,
                    attr = attribute
                ),
            ),
            _ => (
                format!("A {} of the {} attribute from the {} dataset.", self.label(), attribute, context),
                format!(
                    "A copy of the {} dataset with a new attribute added which contains a {} of the {} attribute.",
                    context,
                    self.label(),
                    attribute
                ),
            ),
        }
    }
}

/// Checked wrapper shared by the running folds.
pub async fn numeric_fold(
    fold: NumericFold,
    state: &TransformerState,
    host: &dyn Host,
) -> TransformResult<TransformationOutput<DataSet>> {
    let context_name = require(&state.context1, NO_DATASET)?;
    let attribute = require(&state.attribute1, "Please choose an attribute to fold over.")?;

    let (context, dataset) = fetch_dataset(host, context_name).await?;
    let label = fold.label();
    let result_name = unique_name(
        &format!("{} of {}", label, parenthesize_name(attribute)),
        &all_attr_names(&dataset),
    );
    let ctxt_name = context.readable_name();
    let (attribute_description, dataset_description) = fold.descriptions(attribute, ctxt_name);

    Ok(TransformationOutput::new(
        fold.apply(&dataset, attribute, &result_name, &attribute_description)?,
        format!("{}({}, ...)", label.split_whitespace().collect::<String>(), ctxt_name),
        dataset_description,
    ))
}

/// Difference with the case above, the first case taking `start` as the
/// value above it. Without a start value the first result is the first
/// value itself.
pub fn unchecked_difference_from(
    dataset: &DataSet,
    input_column: &str,
    result_column: &str,
    result_description: &str,
    start: Option<f64>,
) -> TransformResult<DataSet> {
    make_num_fold(
        if start.is_some() { "Difference From" } else { "Difference" },
        start,
        |above: &Option<f64>, x| match above {
            Some(above) => (Some(x), x - above),
            None => (Some(x), x),
        },
        MissingBehavior::LeaveBlank,
    )
    .apply(dataset, input_column, result_column, result_description)
}

pub async fn difference_from(
    state: &TransformerState,
    host: &dyn Host,
) -> TransformResult<TransformationOutput<DataSet>> {
    let context_name = require(&state.context1, NO_DATASET)?;
    let attribute = require(
        &state.attribute1,
        "Please choose an attribute to take the difference from",
    )?;
    let starting_value = require_text(
        &state.text_input2,
        "Please provide a starting value for the difference.",
    )?
    .trim();
    let start = starting_value
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| {
            TransformError::validation(format!(
                "Expected numeric starting value, instead got {}",
                starting_value
            ))
        })?;

    let (context, dataset) = fetch_dataset(host, context_name).await?;
    let ctxt_name = context.readable_name();
    let result_name = unique_name(
        &format!("Difference From of {}", attribute),
        &all_attr_names(&dataset),
    );

    Ok(TransformationOutput::new(
        unchecked_difference_from(
            &dataset,
            attribute,
            &result_name,
            &format!(
                "The difference of each case with the case above it (from the {} attribute in the {} dataset). {} is subtracted from the first case.",
                attribute, ctxt_name, starting_value
            ),
            Some(start),
        )?,
        format!("DifferenceFrom({}, ...)", ctxt_name),
        format!(
            "A copy of {ctx} with a new column whose values are the difference between \
             the value of {attr} in the current case and the value of {attr} \
             in the case above. The first case subtracts {start} from itself.",
            ctx = ctxt_name,
            attr = attribute,
            start = starting_value
        ),
    ))
}

/// Reduce with an arbitrary formula: `textInput1` is the result attribute,
/// `expression1` the starting value, `textInput2` the accumulator name and
/// `expression2` the step formula.
pub async fn generic_fold(
    state: &TransformerState,
    host: &dyn Host,
) -> TransformResult<TransformationOutput<DataSet>> {
    let context_name = require(&state.context1, NO_DATASET)?;
    let result_name = require_text(&state.text_input1, "Please enter a name for the new attribute")?;
    let expression = require_text(&state.expression2, "Please enter a non-empty expression")?;
    let base = require_text(&state.expression1, "Please enter a starting value for the accumulator.")?;
    let accumulator = require_text(&state.text_input2, "Please enter a name for the accumulator.")?;

    let (context, dataset) = fetch_dataset(host, context_name).await?;
    let ctxt_name = context.readable_name();

    Ok(TransformationOutput::new(
        unchecked_generic_fold(
            &dataset,
            base,
            expression,
            result_name,
            accumulator,
            &format!("A reduce of the {} dataset.", ctxt_name),
            host.evaluator(),
        )
        .await?,
        format!("Reduce({}, ...)", ctxt_name),
        format!(
            "A reduce of the {} dataset, with an attribute {} whose values are determined by the formula `{}`. \
             The accumulator is named {} and its initial value is `{}`.",
            ctxt_name, result_name, expression, accumulator, base
        ),
    ))
}

async fn eval_one(evaluator: &dyn Evaluator, expr: &str, record: Record) -> TransformResult<Value> {
    evaluator
        .eval_expression(expr, &[record])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| TransformError::Evaluation(format!("Formula `{}` produced no value", expr)))
}

/// Evaluate `expression` once per row with the accumulator bound under
/// `accumulator_name`, one row at a time.
pub async fn unchecked_generic_fold(
    dataset: &DataSet,
    base: &str,
    expression: &str,
    result_column: &str,
    accumulator_name: &str,
    result_description: &str,
    evaluator: &dyn Evaluator,
) -> TransformResult<DataSet> {
    let result_column = unique_name(result_column, &all_attr_names(dataset));
    let mut acc = eval_one(evaluator, base, Record::new()).await?;

    let mut records = Vec::with_capacity(dataset.records.len());
    for row in &dataset.records {
        if row.contains_key(accumulator_name) {
            return Err(TransformError::validation(format!(
                "The accumulator name {} is already the name of an attribute.",
                accumulator_name
            )));
        }
        let mut environment = row.clone();
        environment.insert(accumulator_name.to_string(), acc);
        acc = eval_one(evaluator, expression, environment).await?;
        records.push(insert_in_row(row, &result_column, acc.clone()));
    }

    let collections = insert_column_in_last_collection(
        &dataset.collections,
        Attribute::new(result_column).with_description(result_description),
    );
    Ok(DataSet::new(collections, records))
}
