//! Shared operator types: output tuple, scalar results and type contracts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{TransformError, TransformResult};
use crate::missing::MissingValueReport;
use crate::models::{is_boundary, is_missing, pretty_print_case, DataSet, Record};

/// Output type contract for expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodapLanguageType {
    #[default]
    #[serde(alias = "Any")]
    Any,
    #[serde(alias = "String")]
    String,
    #[serde(alias = "Number")]
    Number,
    #[serde(alias = "Boolean")]
    Boolean,
    #[serde(alias = "Boundary")]
    Boundary,
}

impl CodapLanguageType {
    pub const ALL: [CodapLanguageType; 5] = [
        Self::Any,
        Self::String,
        Self::Number,
        Self::Boolean,
        Self::Boundary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "Any",
            Self::String => "String",
            Self::Number => "Number",
            Self::Boolean => "Boolean",
            Self::Boundary => "Boundary",
        }
    }

    /// Whether a single value satisfies this contract.
    ///
    /// Missing values always pass; they are reported separately.
    pub fn accepts(&self, value: &Value) -> bool {
        if is_missing(value) {
            return true;
        }
        match self {
            Self::Any => true,
            Self::Number => match value {
                Value::Number(_) => true,
                Value::String(s) => s.trim().parse::<f64>().is_ok_and(|n| n.is_finite()),
                _ => false,
            },
            Self::String => !is_boundary(value),
            Self::Boolean => match value {
                Value::Bool(_) => true,
                Value::String(s) => s == "true" || s == "false",
                _ => false,
            },
            Self::Boundary => is_boundary(value),
        }
    }
}

impl fmt::Display for CodapLanguageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodapLanguageType {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TransformError::validation(format!("Unknown output type: {}", s)))
    }
}

/// Input and output type contract attached to an expression field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeContract {
    #[serde(default)]
    pub input_type: CodapLanguageType,
    #[serde(default)]
    pub output_type: CodapLanguageType,
}

/// Indices of values that do not satisfy `ty`.
pub fn find_type_errors(values: &[Value], ty: CodapLanguageType) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !ty.accepts(v))
        .map(|(i, _)| i)
        .collect()
}

/// Fail on the first value not matching `ty`, naming its record.
pub fn report_type_errors_for_records(
    records: &[Record],
    values: &[Value],
    ty: CodapLanguageType,
) -> TransformResult<()> {
    match find_type_errors(values, ty).first() {
        None => Ok(()),
        Some(&i) => {
            let case = records
                .get(i)
                .map(pretty_print_case)
                .unwrap_or_else(|| format!("#{}", i + 1));
            Err(TransformError::type_mismatch(format!(
                "Formula did not evaluate to {} for case {}",
                ty, case
            )))
        }
    }
}

/// Result of a single-value transformer such as median or mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SingleValue {
    Number(f64),
    List(Vec<f64>),
}

impl SingleValue {
    /// Text shown in a text output: lists are joined with `, `.
    pub fn display(&self) -> String {
        match self {
            Self::Number(n) => format_number(*n),
            Self::List(ns) => ns
                .iter()
                .map(|n| format_number(*n))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl fmt::Display for SingleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Primary result of a transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputValue {
    DataSet(DataSet),
    SingleValue(SingleValue),
}

/// The four-part output every checked operator returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationOutput<T> {
    pub result: T,
    pub output_name: String,
    pub output_description: String,
    pub missing_value_report: MissingValueReport,
}

impl<T> TransformationOutput<T> {
    pub fn new(result: T, output_name: impl Into<String>, output_description: impl Into<String>) -> Self {
        Self {
            result,
            output_name: output_name.into(),
            output_description: output_description.into(),
            missing_value_report: MissingValueReport::default(),
        }
    }

    pub fn with_report(mut self, report: MissingValueReport) -> Self {
        self.missing_value_report = report;
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TransformationOutput<U> {
        TransformationOutput {
            result: f(self.result),
            output_name: self.output_name,
            output_description: self.output_description,
            missing_value_report: self.missing_value_report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_passes_every_contract() {
        for ty in CodapLanguageType::ALL {
            assert!(ty.accepts(&Value::Null));
            assert!(ty.accepts(&json!("")));
        }
    }

    #[test]
    fn test_find_type_errors() {
        let values = vec![json!(1), json!("2"), json!("abc"), json!(true)];
        assert_eq!(find_type_errors(&values, CodapLanguageType::Number), vec![2, 3]);
        assert_eq!(find_type_errors(&values, CodapLanguageType::Boolean), vec![0, 1, 2]);
        assert!(find_type_errors(&values, CodapLanguageType::Any).is_empty());
        assert!(find_type_errors(&values, CodapLanguageType::String).is_empty());
    }

    #[test]
    fn test_number_contract_rejects_non_finite_strings() {
        let values = vec![json!("NaN"), json!("inf"), json!(" 2.5 "), json!("Infinity")];
        assert_eq!(find_type_errors(&values, CodapLanguageType::Number), vec![0, 1, 3]);
    }

    #[test]
    fn test_report_names_first_failing_case() {
        let records: Vec<Record> = vec![
            json!({ "id": 1 }).as_object().unwrap().clone(),
            json!({ "id": 2 }).as_object().unwrap().clone(),
        ];
        let values = vec![json!(5), json!("five")];
        let err = report_type_errors_for_records(&records, &values, CodapLanguageType::Number)
            .unwrap_err();
        assert_eq!(err.to_string(), "Formula did not evaluate to Number for case (id: 2)");
    }

    #[test]
    fn test_parse_language_type() {
        assert_eq!("number".parse::<CodapLanguageType>().unwrap(), CodapLanguageType::Number);
        assert_eq!("Boundary".parse::<CodapLanguageType>().unwrap(), CodapLanguageType::Boundary);
        assert!("date".parse::<CodapLanguageType>().is_err());

        let contract: TypeContract =
            serde_json::from_value(json!({ "inputType": "Any", "outputType": "number" })).unwrap();
        assert_eq!(contract.output_type, CodapLanguageType::Number);
    }

    #[test]
    fn test_single_value_display() {
        assert_eq!(SingleValue::Number(2.0).display(), "2");
        assert_eq!(SingleValue::Number(2.5).display(), "2.5");
        assert_eq!(SingleValue::List(vec![1.0, 2.0]).display(), "1, 2");
    }
}
