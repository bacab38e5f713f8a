//! CSV rendering of record-shaped trees

use docmap_tree::Value;
use tracing::debug;

use crate::{Error, Rendered, Result};

/// Writer for CSV output.
///
/// Expects a list of flat object records, or an object wrapping a single
/// such list. Quoting of fields that contain the delimiter, quotes or
/// line breaks is handled by the csv crate.
pub struct CsvSerializer {
    delimiter: u8,
    has_header: bool,
}

impl CsvSerializer {
    /// Create a writer with comma delimiter and a header row.
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
        }
    }

    /// Set the delimiter character.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter as u8;
        self
    }

    /// Configure header writing.
    pub fn has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Render records to CSV text.
    ///
    /// Headers are the union of record keys in first-appearance order;
    /// missing fields render empty, nested values flatten to compact
    /// JSON with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shape`] when the tree is not record-shaped and
    /// [`Error::Csv`] when writing fails.
    pub fn serialize(&self, tree: &Value) -> Result<Rendered> {
        let records = record_list(tree)?;
        let mut warnings = Vec::new();

        let mut headers: Vec<&str> = Vec::new();
        for record in &records {
            let map = record
                .as_object()
                .ok_or_else(|| Error::shape("CSV records must be objects"))?;
            for key in map.keys() {
                if !headers.contains(&key.as_str()) {
                    headers.push(key);
                }
            }
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(Vec::new());

        if self.has_header {
            writer.write_record(&headers)?;
        }
        for record in &records {
            let row: Vec<String> = headers
                .iter()
                .map(|&header| cell_text(record.field(header), header, &mut warnings))
                .collect();
            writer.write_record(&row)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|err| Error::shape(err.to_string()))?;
        debug!(record_count = records.len(), "rendered CSV output");
        Ok(Rendered {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            warnings,
        })
    }
}

impl Default for CsvSerializer {
    fn default() -> Self {
        Self::new()
    }
}

fn record_list(tree: &Value) -> Result<Vec<&Value>> {
    match tree {
        Value::List(items) => Ok(items.iter().collect()),
        Value::Object(map) => {
            // a single wrapped list counts as the record set
            if map.len() == 1 {
                if let Some(Value::List(items)) = map.values().next() {
                    return Ok(items.iter().collect());
                }
            }
            Ok(vec![tree])
        }
        _ => Err(Error::shape("CSV output requires a list of records")),
    }
}

fn cell_text(value: Option<&Value>, header: &str, warnings: &mut Vec<String>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(container @ (Value::List(_) | Value::Object(_))) => {
            warnings.push(format!("nested value under '{header}' flattened to JSON"));
            serde_json::to_string(container).unwrap_or_default()
        }
        Some(scalar) => scalar.as_string().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(json: serde_json::Value) -> Value {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_writes_header_and_rows() {
        let input = tree(json!([
            {"name": "Rossi", "amount": 100.5},
            {"name": "Bianchi", "amount": 7}
        ]));

        let rendered = CsvSerializer::new().serialize(&input).unwrap();
        assert!(rendered.warnings.is_empty());
        assert_eq!(rendered.text, "name,amount\nRossi,100.5\nBianchi,7\n");
    }

    #[test]
    fn test_quotes_fields_containing_delimiter() {
        let input = tree(json!([{"desc": "bolts, assorted", "qty": 3}]));
        let rendered = CsvSerializer::new().serialize(&input).unwrap();
        assert!(rendered.text.contains("\"bolts, assorted\""));
    }

    #[test]
    fn test_union_headers_and_missing_fields() {
        let input = tree(json!([
            {"a": "1"},
            {"a": "2", "b": "x"}
        ]));

        let rendered = CsvSerializer::new().serialize(&input).unwrap();
        assert_eq!(rendered.text, "a,b\n1,\n2,x\n");
    }

    #[test]
    fn test_wrapped_list_and_custom_delimiter() {
        let input = tree(json!({"rows": [{"a": "1", "b": "2"}]}));
        let rendered = CsvSerializer::new()
            .with_delimiter(';')
            .has_header(false)
            .serialize(&input)
            .unwrap();
        assert_eq!(rendered.text, "1;2\n");
    }

    #[test]
    fn test_nested_values_flatten_with_warning() {
        let input = tree(json!([{"a": {"deep": true}}]));
        let rendered = CsvSerializer::new().serialize(&input).unwrap();
        assert_eq!(rendered.warnings.len(), 1);
        assert!(rendered.text.contains("deep"));
    }

    #[test]
    fn test_rejects_scalar_input() {
        assert!(CsvSerializer::new().serialize(&Value::string("x")).is_err());
    }
}
