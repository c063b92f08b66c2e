//! A minimal expression evaluator for attribute references and literals.
//!
//! Supported forms:
//!
//! - empty expression: missing value
//! - `true` / `false`
//! - numbers: `3`, `-2.5`, `1e3`
//! - quoted strings: `"text"` or `'text'`
//! - attribute references: `Age` or `` `Birth Year` ``
//!
//! Anything else is an evaluation error. A full formula engine plugs in
//! through the [`Evaluator`] trait instead.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};

use super::Evaluator;
use crate::error::{HostError, HostResult};
use crate::models::Record;

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?$").expect("valid number regex")
});
static QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^(?:"([^"]*)"|'([^']*)')$"#).expect("valid string regex"));
static BACKTICK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^`([^`]+)`$").expect("valid name regex"));

/// Parsed form of a supported expression.
#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Attribute(String),
}

fn parse(expr: &str) -> HostResult<Expr> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Ok(Expr::Literal(Value::Null));
    }
    match expr {
        "true" => return Ok(Expr::Literal(Value::Bool(true))),
        "false" => return Ok(Expr::Literal(Value::Bool(false))),
        _ => {}
    }
    if NUMBER.is_match(expr) {
        let number = expr
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .ok_or_else(|| HostError::Evaluation(format!("Invalid number: {}", expr)))?;
        return Ok(Expr::Literal(Value::Number(number)));
    }
    if let Some(caps) = QUOTED.captures(expr) {
        let text = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        return Ok(Expr::Literal(Value::String(text.to_string())));
    }
    if let Some(caps) = BACKTICK.captures(expr) {
        return Ok(Expr::Attribute(caps[1].to_string()));
    }
    Ok(Expr::Attribute(expr.to_string()))
}

/// Evaluator resolving literals and attribute names only.
#[derive(Debug, Default, Clone, Copy)]
pub struct AttributeEvaluator;

impl AttributeEvaluator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Evaluator for AttributeEvaluator {
    async fn eval_expression(&self, expr: &str, records: &[Record]) -> HostResult<Vec<Value>> {
        match parse(expr)? {
            Expr::Literal(value) => Ok(vec![value; records.len()]),
            Expr::Attribute(name) => records
                .iter()
                .map(|record| {
                    record.get(&name).cloned().ok_or_else(|| {
                        HostError::Evaluation(format!("Unable to evaluate formula: {}", expr.trim()))
                    })
                })
                .collect(),
        }
    }
}
