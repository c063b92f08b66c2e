//! CSV import with encoding and delimiter auto-detection.
//!
//! A CSV file becomes a flat dataset: one collection, one attribute per
//! header, one record per row. Cells that read as numbers are stored as
//! numbers, empty cells as missing values.

use serde_json::{Number, Value};
use std::path::Path;

use crate::models::{is_missing, Attribute, AttributeType, Collection, DataSet, Record};

/// CSV parsing error with context
#[derive(Debug, Clone, PartialEq)]
pub struct CsvError {
    pub line: usize,
    pub column: Option<String>,
    pub value: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.column, &self.value) {
            (Some(col), Some(val)) => {
                write!(f, "Line {}, column '{}' (value '{}'): {}", self.line, col, val, self.message)
            }
            (Some(col), None) => write!(f, "Line {}, column '{}': {}", self.line, col, self.message),
            _ => write!(f, "Line {}: {}", self.line, self.message),
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            value: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub records: Vec<Record>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    pub headers: Vec<String>,
}

impl ParseResult {
    /// Flat dataset with a single collection named `collection`. Columns
    /// whose present values are all numbers become numeric attributes.
    pub fn into_dataset(self, collection: &str) -> DataSet {
        let attrs = self
            .headers
            .iter()
            .map(|header| {
                let mut present = self
                    .records
                    .iter()
                    .map(|r| r.get(header).unwrap_or(&Value::Null))
                    .filter(|v| !is_missing(v))
                    .peekable();
                let numeric = present.peek().is_some() && present.all(Value::is_number);
                let attr_type = if numeric {
                    AttributeType::Numeric
                } else {
                    AttributeType::Categorical
                };
                Attribute::new(header.as_str()).with_type(attr_type)
            })
            .collect();
        DataSet::new(vec![Collection::new(collection, attrs)], self.records)
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = ',';
    let mut best_count = 0;
    for sep in [',', ';', '\t', '|'] {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }
    best_sep
}

/// Cell text as a dataset value: numbers become numbers, empty text stays
/// an empty (missing) string.
fn cell_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() && !trimmed.is_empty() => {
            Number::from_f64(n).map(Value::Number).unwrap_or_else(|| Value::String(trimmed.to_string()))
        }
        _ => Value::String(trimmed.to_string()),
    }
}

/// Parse CSV text with an explicit delimiter.
pub fn parse_string_with_metadata(content: &str, delimiter: char, encoding: String) -> Result<ParseResult, CsvError> {
    let delimiter_byte = u8::try_from(delimiter)
        .map_err(|_| CsvError::new(0, format!("Unsupported delimiter '{}'", delimiter)))?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CsvError::new(1, format!("Cannot read header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(CsvError::new(1, "Empty CSV file"));
    }
    if let Some(duplicate) = headers.iter().enumerate().find_map(|(i, h)| headers[..i].contains(h).then_some(h)) {
        return Err(CsvError::new(1, "Duplicate column name").with_column(duplicate.as_str()));
    }

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let line = idx + 2;
        let row = row.map_err(|e| CsvError::new(line, format!("Cannot read line: {}", e)))?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if row.len() > headers.len() {
            let extra = row.get(headers.len()).unwrap_or_default();
            return Err(CsvError::new(line, "More cells than columns").with_value(extra));
        }
        let record: Record = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.clone(), cell_value(row.get(i).unwrap_or(""))))
            .collect();
        records.push(record);
    }

    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> Result<ParseResult, CsvError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    parse_string_with_metadata(&content, delimiter, encoding)
}

/// Parse a CSV file with auto-detection, optionally forcing the delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P, delimiter: Option<char>) -> Result<ParseResult, CsvError> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| CsvError::new(0, format!("Cannot read file '{}': {}", path.as_ref().display(), e)))?;
    match delimiter {
        None => parse_bytes_auto(&bytes),
        Some(delimiter) => {
            let encoding = detect_encoding(&bytes);
            let content = decode_content(&bytes, &encoding);
            parse_string_with_metadata(&content, delimiter, encoding)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(csv: &str, delimiter: char) -> ParseResult {
        parse_string_with_metadata(csv, delimiter, "utf-8".into()).unwrap()
    }

    #[test]
    fn test_simple_csv() {
        let result = parse("name;age\nAlice;30\nBob;25", ';');
        assert_eq!(result.headers, vec!["name", "age"]);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0]["name"], json!("Alice"));
        assert_eq!(result.records[0]["age"], json!(30.0));
    }

    #[test]
    fn test_quoted_values_and_missing_cells() {
        let result = parse("a,b,c\n\"x, y\",,3\n", ',');
        assert_eq!(result.records[0]["a"], json!("x, y"));
        assert_eq!(result.records[0]["b"], json!(""));
        assert_eq!(result.records[0]["c"], json!(3.0));
    }

    #[test]
    fn test_blank_lines_skipped() {
        let result = parse("a;b\n1;2\n;\n3;4\n", ';');
        assert_eq!(result.records.len(), 2);
    }

    #[test]
    fn test_extra_cells_are_an_error() {
        let err = parse_string_with_metadata("a;b\n1;2;3", ';', "utf-8".into()).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.value.as_deref(), Some("3"));
        assert_eq!(err.to_string(), "Line 2: More cells than columns");
    }

    #[test]
    fn test_duplicate_header() {
        let err = parse_string_with_metadata("a,a\n1,2", ',', "utf-8".into()).unwrap_err();
        assert_eq!(err.to_string(), "Line 1, column 'a': Duplicate column name");
    }

    #[test]
    fn test_empty_csv_error() {
        let err = parse_string_with_metadata("", ',', "utf-8".into()).unwrap_err();
        assert!(err.message.contains("Empty"));
    }

    #[test]
    fn test_error_message_format() {
        let err = CsvError::new(5, "Invalid value").with_column("age").with_value("abc");
        assert_eq!(err.to_string(), "Line 5, column 'age' (value 'abc'): Invalid value");
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_auto_parse_into_dataset() {
        let result = parse_bytes_auto("city;pop\nAkron;190\nAmes;\n".as_bytes()).unwrap();
        assert_eq!(result.delimiter, ';');

        let dataset = result.into_dataset("Cities");
        let collection = &dataset.collections[0];
        assert_eq!(collection.name, "Cities");
        assert_eq!(collection.attr("pop").unwrap().attr_type, Some(AttributeType::Numeric));
        assert_eq!(collection.attr("city").unwrap().attr_type, Some(AttributeType::Categorical));
        assert_eq!(dataset.records[1]["pop"], json!(""));
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "Société");
    }
}
