//! Fixed-width flat-file rendering
//!
//! SAP IDOC style: one record per line, a fixed-width record type id
//! first, then each field padded to its declared column width. The
//! layout mirrors the positional definitions the IDOC adapter parses
//! with, so a parsed document can be re-emitted byte-compatible.

use docmap_tree::Value;
use indexmap::IndexMap;
use tracing::debug;

use crate::{Error, Rendered, Result};

/// One fixed-width column.
#[derive(Debug, Clone)]
pub struct FlatColumn {
    pub name: String,
    pub width: usize,
}

impl FlatColumn {
    pub fn new(name: impl Into<String>, width: usize) -> Self {
        Self {
            name: name.into(),
            width,
        }
    }
}

/// Column layout per record type.
#[derive(Debug, Clone)]
pub struct FlatLayout {
    pub name: String,
    /// Width of the leading record type id column.
    pub id_width: usize,
    pub records: IndexMap<String, Vec<FlatColumn>>,
}

impl FlatLayout {
    /// Create an empty layout with an 8-character id column.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_width: 8,
            records: IndexMap::new(),
        }
    }

    /// Set the record id column width.
    #[must_use]
    pub fn with_id_width(mut self, width: usize) -> Self {
        self.id_width = width;
        self
    }

    /// Add a record type with its columns.
    #[must_use]
    pub fn record(mut self, id: impl Into<String>, columns: Vec<FlatColumn>) -> Self {
        self.records.insert(id.into(), columns);
        self
    }
}

/// Writer for fixed-width output.
pub struct FlatSerializer<'a> {
    layout: &'a FlatLayout,
}

impl<'a> FlatSerializer<'a> {
    pub fn new(layout: &'a FlatLayout) -> Self {
        Self { layout }
    }

    /// Render a list of records to fixed-width lines.
    ///
    /// Each record is an object with a `record_type` field selecting the
    /// layout entry. Unknown record types are skipped with a warning,
    /// missing fields pad with spaces, overlong values truncate with a
    /// warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shape`] when the tree is not a list of typed
    /// records.
    pub fn serialize(&self, tree: &Value) -> Result<Rendered> {
        let records = tree
            .as_list()
            .ok_or_else(|| Error::shape("fixed-width output requires a list of records"))?;

        let mut warnings = Vec::new();
        let mut lines = Vec::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            let map = record
                .as_object()
                .ok_or_else(|| Error::shape("fixed-width records must be objects"))?;
            let Some(record_type) = map.get("record_type").and_then(Value::as_string) else {
                return Err(Error::shape(format!(
                    "record {index} is missing its 'record_type' field"
                )));
            };
            let Some(columns) = self.layout.records.get(&record_type) else {
                warnings.push(format!(
                    "record {index}: unknown record type '{record_type}', line skipped"
                ));
                continue;
            };

            let mut line = pad(&record_type, self.layout.id_width, &mut warnings, "record id");
            for column in columns {
                let text = map
                    .get(&column.name)
                    .and_then(Value::as_string)
                    .unwrap_or_default();
                line.push_str(&pad(&text, column.width, &mut warnings, &column.name));
            }
            lines.push(line);
        }

        debug!(
            layout = %self.layout.name,
            line_count = lines.len(),
            "rendered fixed-width output"
        );
        let mut text = lines.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        Ok(Rendered { text, warnings })
    }
}

fn pad(text: &str, width: usize, warnings: &mut Vec<String>, what: &str) -> String {
    let count = text.chars().count();
    if count > width {
        warnings.push(format!(
            "value for '{what}' exceeds its column width of {width}, truncated"
        ));
        return text.chars().take(width).collect();
    }
    let mut out = String::with_capacity(width);
    out.push_str(text);
    out.extend(std::iter::repeat_n(' ', width - count));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(json: serde_json::Value) -> Value {
        serde_json::from_value(json).unwrap()
    }

    fn invoice_layout() -> FlatLayout {
        FlatLayout::new("INVOIC02")
            .record(
                "E1EDK01",
                vec![FlatColumn::new("currency", 3), FlatColumn::new("docnum", 10)],
            )
            .record("E1EDP01", vec![FlatColumn::new("menge", 6)])
    }

    #[test]
    fn test_pads_fields_to_column_width() {
        let layout = invoice_layout();
        let input = tree(json!([
            {"record_type": "E1EDK01", "currency": "EUR", "docnum": "42"},
            {"record_type": "E1EDP01", "menge": "5"}
        ]));

        let rendered = FlatSerializer::new(&layout).serialize(&input).unwrap();
        assert_eq!(rendered.text, "E1EDK01 EUR42        \nE1EDP01 5     \n");
        assert!(rendered.warnings.is_empty());
    }

    #[test]
    fn test_missing_fields_pad_with_spaces() {
        let layout = invoice_layout();
        let input = tree(json!([{"record_type": "E1EDP01"}]));

        let rendered = FlatSerializer::new(&layout).serialize(&input).unwrap();
        assert_eq!(rendered.text, "E1EDP01       \n");
    }

    #[test]
    fn test_overlong_values_truncate_with_warning() {
        let layout = invoice_layout();
        let input = tree(json!([{"record_type": "E1EDP01", "menge": "1234567"}]));

        let rendered = FlatSerializer::new(&layout).serialize(&input).unwrap();
        assert_eq!(rendered.text, "E1EDP01 123456\n");
        assert_eq!(rendered.warnings.len(), 1);
        assert!(rendered.warnings[0].contains("menge"));
    }

    #[test]
    fn test_unknown_record_type_skipped() {
        let layout = invoice_layout();
        let input = tree(json!([
            {"record_type": "E9XXX", "menge": "1"},
            {"record_type": "E1EDP01", "menge": "2"}
        ]));

        let rendered = FlatSerializer::new(&layout).serialize(&input).unwrap();
        assert_eq!(rendered.text, "E1EDP01 2     \n");
        assert_eq!(rendered.warnings.len(), 1);
    }

    #[test]
    fn test_rejects_untyped_records() {
        let layout = invoice_layout();
        let serializer = FlatSerializer::new(&layout);
        assert!(serializer.serialize(&tree(json!([{"menge": "1"}]))).is_err());
        assert!(serializer.serialize(&Value::string("flat")).is_err());
    }
}
