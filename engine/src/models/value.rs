//! Helpers for scalar cell values.
//!
//! Cells are `serde_json::Value`s. `Null` and the empty string are missing,
//! objects carrying a `jsonBoundaryObject` are boundaries.

use serde_json::Value;

use super::Record;

static NULL: Value = Value::Null;

/// Read a cell, treating absent keys as missing.
pub fn cell<'a>(record: &'a Record, attr_name: &str) -> &'a Value {
    record.get(attr_name).unwrap_or(&NULL)
}

/// Whether a value is the missing-value marker.
pub fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Whether a value is missing or a string holding only whitespace.
pub fn is_whitespace(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Parse a value as a finite number.
///
/// Accepts JSON numbers and strings whose trimmed form parses as `f64`.
/// Everything else yields `None`.
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

pub fn is_boundary(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.contains_key("jsonBoundaryObject"))
}

/// The `NAME` property of a boundary, if present.
pub fn boundary_name(value: &Value) -> Option<&str> {
    value
        .get("jsonBoundaryObject")?
        .get("properties")?
        .get("NAME")?
        .as_str()
}

/// Format a value for use inside an error message.
pub fn codap_value_to_string(value: &Value) -> String {
    match value {
        Value::Null => "a missing value".to_string(),
        Value::String(s) if s.is_empty() => "a missing value".to_string(),
        Value::String(s) => format!("\"{}\"", s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(_) if is_boundary(value) => match boundary_name(value) {
            Some(name) => format!("a boundary ({})", name),
            None => "a boundary".to_string(),
        },
        other => other.to_string(),
    }
}

/// Render a record as `(attr: value, ...)` for error messages.
pub fn pretty_print_case(record: &Record) -> String {
    let fields: Vec<String> = record
        .iter()
        .map(|(name, value)| format!("{}: {}", name, codap_value_to_string(value)))
        .collect();
    format!("({})", fields.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_missing() {
        assert!(is_missing(&Value::Null));
        assert!(is_missing(&json!("")));
        assert!(!is_missing(&json!(" ")));
        assert!(!is_missing(&json!(0)));
        assert!(!is_missing(&json!(false)));
        assert!(is_whitespace(&json!("  \t")));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(&json!(3)), Some(3.0));
        assert_eq!(parse_number(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(parse_number(&json!("abc")), None);
        assert_eq!(parse_number(&json!(true)), None);
        assert_eq!(parse_number(&Value::Null), None);
    }

    #[test]
    fn test_boundary_display() {
        let boundary = json!({ "jsonBoundaryObject": { "properties": { "NAME": "Maine" } } });
        assert!(is_boundary(&boundary));
        assert_eq!(boundary_name(&boundary), Some("Maine"));
        assert_eq!(codap_value_to_string(&boundary), "a boundary (Maine)");
        assert!(!is_boundary(&json!({ "x": 1 })));
    }

    #[test]
    fn test_pretty_print_case() {
        let record = json!({ "Name": "Ada", "Age": 36 });
        let record = record.as_object().unwrap();
        let printed = pretty_print_case(record);
        assert!(printed.contains("Name: \"Ada\""));
        assert!(printed.contains("Age: 36"));
        assert!(printed.starts_with('(') && printed.ends_with(')'));
    }

    #[test]
    fn test_cell_defaults_to_null() {
        let record = Record::new();
        assert_eq!(cell(&record, "missing"), &Value::Null);
    }
}
