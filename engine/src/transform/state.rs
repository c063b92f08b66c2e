//! Saved parameter state of a transformer.
//!
//! One generic shape serves every transformer; each operator reads the
//! fields it needs (for example group-by reads `context1` and
//! `attributeSet1`). The state is stored in transformation descriptions so
//! a transformer can be re-run later.

use serde::{Deserialize, Serialize};

use super::types::TypeContract;
use crate::error::{TransformError, TransformResult};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformerState {
    pub context1: Option<String>,
    pub context2: Option<String>,
    pub collection1: Option<String>,
    pub collection2: Option<String>,
    pub attribute1: Option<String>,
    pub attribute2: Option<String>,
    pub attribute_set1: Vec<String>,
    pub attribute_set2: Vec<String>,
    pub text_input1: String,
    pub text_input2: String,
    pub dropdown1: Option<String>,
    pub dropdown2: Option<String>,
    pub expression1: String,
    pub expression2: String,
    pub type_contract1: TypeContract,
    pub type_contract2: TypeContract,
}

impl TransformerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context1(mut self, name: impl Into<String>) -> Self {
        self.context1 = Some(name.into());
        self
    }

    pub fn context2(mut self, name: impl Into<String>) -> Self {
        self.context2 = Some(name.into());
        self
    }

    pub fn attribute1(mut self, name: impl Into<String>) -> Self {
        self.attribute1 = Some(name.into());
        self
    }

    pub fn attribute2(mut self, name: impl Into<String>) -> Self {
        self.attribute2 = Some(name.into());
        self
    }

    pub fn attribute_set1<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.attribute_set1 = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn text_input1(mut self, text: impl Into<String>) -> Self {
        self.text_input1 = text.into();
        self
    }

    pub fn text_input2(mut self, text: impl Into<String>) -> Self {
        self.text_input2 = text.into();
        self
    }

    pub fn dropdown1(mut self, choice: impl Into<String>) -> Self {
        self.dropdown1 = Some(choice.into());
        self
    }

    pub fn expression1(mut self, expr: impl Into<String>) -> Self {
        self.expression1 = expr.into();
        self
    }

    pub fn expression2(mut self, expr: impl Into<String>) -> Self {
        self.expression2 = expr.into();
        self
    }

    pub fn type_contract1(mut self, contract: TypeContract) -> Self {
        self.type_contract1 = contract;
        self
    }

    /// Context names this state reads from, first context first.
    pub fn contexts(&self) -> Vec<String> {
        self.context1.iter().chain(self.context2.iter()).cloned().collect()
    }
}

/// Selected value or a validation error.
pub(crate) fn require<'a>(value: &'a Option<String>, message: &str) -> TransformResult<&'a str> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(TransformError::validation(message)),
    }
}

/// Non-blank text or a validation error.
pub(crate) fn require_text<'a>(value: &'a str, message: &str) -> TransformResult<&'a str> {
    if value.trim().is_empty() {
        Err(TransformError::validation(message))
    } else {
        Ok(value)
    }
}

pub(crate) const NO_DATASET: &str = "Please choose a valid dataset to transform.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::types::CodapLanguageType;
    use serde_json::json;

    #[test]
    fn test_deserialize_partial_state() {
        let state: TransformerState = serde_json::from_value(json!({
            "context1": "People",
            "attributeSet1": ["Age", "Name"],
            "typeContract1": { "inputType": "any", "outputType": "number" }
        }))
        .unwrap();

        assert_eq!(state.context1.as_deref(), Some("People"));
        assert_eq!(state.attribute_set1, vec!["Age", "Name"]);
        assert_eq!(state.type_contract1.output_type, CodapLanguageType::Number);
        assert_eq!(state.expression1, "");
        assert_eq!(state.contexts(), vec!["People"]);
    }

    #[test]
    fn test_require_helpers() {
        assert!(require(&None, NO_DATASET).is_err());
        assert!(require(&Some(String::new()), NO_DATASET).is_err());
        assert_eq!(require(&Some("A".into()), NO_DATASET).unwrap(), "A");
        assert!(require_text("   ", "empty").is_err());
    }
}
