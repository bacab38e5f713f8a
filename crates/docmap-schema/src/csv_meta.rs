//! CSV-with-business-metadata schema parser
//!
//! Analysts describe document schemas as spreadsheets: one row per field
//! with a dotted path, business term, description, required flag and
//! cardinality. Both comma and pipe delimited files occur in the wild,
//! so the delimiter is auto-detected from the header line.
//!
//! Intermediate object fields (a row `Invoice.Line.Amount` without rows
//! for `Invoice` or `Invoice.Line`) are created implicitly so the
//! resulting schema always forms a connected tree.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::model::{Cardinality, FieldType, Schema, SchemaField};
use crate::{Error, Result};

/// One metadata row. Unknown columns are ignored; missing ones default
/// to empty.
#[derive(Debug, Deserialize)]
struct MetaRow {
    #[serde(default)]
    field: String,
    #[serde(default)]
    business_term: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    required: String,
    #[serde(default)]
    cardinality: String,
}

/// Parse a metadata CSV file.
///
/// # Errors
///
/// Returns an error when the file cannot be read or a row is malformed.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Schema> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|source| Error::io(path.display().to_string(), source))?;
    let name = path
        .file_stem()
        .map_or_else(|| "Schema".to_string(), |s| s.to_string_lossy().into_owned());
    parse_str(&content, &name)
}

/// Parse metadata CSV content.
///
/// # Errors
///
/// Returns an error when a row cannot be deserialized or the resulting
/// schema is empty.
pub fn parse_str(content: &str, name: &str) -> Result<Schema> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let delimiter = detect_delimiter(content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut schema = Schema::new(name);
    for row in reader.deserialize() {
        let row: MetaRow = row?;
        if row.field.is_empty() {
            continue;
        }
        ensure_parents(&mut schema, &row.field);

        let cardinality = parse_cardinality(&row.cardinality, &row.required);
        let field_type = infer_type(&row);
        let id = crate::model::path_to_id(&row.field);

        // a row may describe a field already created as an implicit parent;
        // fill in its metadata without disturbing the wired children
        if let Some(existing) = schema.fields.get_mut(&id) {
            existing.cardinality = cardinality;
            existing.description = row.description;
            if !row.business_term.is_empty() {
                existing.business_term = Some(row.business_term);
            }
        } else {
            let mut field =
                SchemaField::new(row.field.clone(), field_type).with_cardinality(cardinality);
            field.description = row.description;
            if !row.business_term.is_empty() {
                field.business_term = Some(row.business_term);
            }
            field.parent = parent_path(&row.field).map(str::to_owned);
            schema.attach(field);
        }
    }

    if schema.is_empty() {
        return Err(Error::malformed("metadata CSV contains no field rows"));
    }
    schema.validate()?;
    Ok(schema)
}

/// Pick the delimiter with more occurrences in the header line.
fn detect_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or("");
    let commas = header.matches(',').count();
    let pipes = header.matches('|').count();
    if pipes > commas { b'|' } else { b',' }
}

fn parent_path(path: &str) -> Option<&str> {
    path.rsplit_once('.').map(|(parent, _)| parent)
}

/// Create missing ancestor fields as optional objects, outermost first.
fn ensure_parents(schema: &mut Schema, path: &str) {
    let mut prefix_end = 0;
    while let Some(dot) = path[prefix_end..].find('.') {
        prefix_end += dot;
        let ancestor = &path[..prefix_end];
        if schema.field_by_path(ancestor).is_none() {
            let mut field = SchemaField::new(ancestor, FieldType::Object)
                .with_cardinality(Cardinality::OPTIONAL);
            field.parent = parent_path(ancestor).map(str::to_owned);
            schema.attach(field);
        }
        prefix_end += 1;
    }
}

fn parse_cardinality(text: &str, required: &str) -> Cardinality {
    if let Ok(cardinality) = text.parse::<Cardinality>() {
        return cardinality;
    }
    if is_affirmative(required) {
        Cardinality::ONE
    } else {
        Cardinality::OPTIONAL
    }
}

fn is_affirmative(text: &str) -> bool {
    matches!(
        text.to_uppercase().as_str(),
        "SI" | "YES" | "Y" | "TRUE" | "1"
    )
}

/// Guess the type from the business term and field name, the way the
/// metadata sheets use them (mixed English/Italian/German terms).
fn infer_type(row: &MetaRow) -> FieldType {
    let haystack = format!("{} {}", row.business_term, row.field).to_lowercase();
    let contains_any = |words: &[&str]| words.iter().any(|w| haystack.contains(w));

    if contains_any(&["date", "data", "datum"]) {
        FieldType::Date
    } else if contains_any(&[
        "amount", "total", "price", "quantity", "percent", "rate", "importo", "prezzo",
        "quantità", "aliquota", "menge", "preis",
    ]) {
        FieldType::Number
    } else {
        FieldType::String
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comma_delimited_with_hierarchy() {
        let schema = parse_str(
            "field,business_term,description,required,cardinality\n\
             Invoice,Invoice,Root element,SI,1..1\n\
             Invoice.ID,Invoice number,Unique id,SI,1..1\n\
             Invoice.Line.Amount,Line amount,Net amount,NO,0..N\n",
            "invoice-meta",
        )
        .unwrap();

        assert_eq!(schema.root_fields, ["Invoice"]);
        // Invoice.Line was created implicitly
        let line = schema.field_by_path("Invoice.Line").unwrap();
        assert_eq!(line.field_type, FieldType::Object);
        assert_eq!(
            schema.declared_children("Invoice").unwrap(),
            ["ID", "Line"]
        );

        let amount = schema.field_by_path("Invoice.Line.Amount").unwrap();
        assert_eq!(amount.field_type, FieldType::Number);
        assert!(amount.cardinality.is_repeating());
        assert_eq!(amount.business_term.as_deref(), Some("Line amount"));
    }

    #[test]
    fn test_pipe_delimiter_detection() {
        let schema = parse_str(
            "field|business_term|description|required|cardinality\n\
             Order|Order|Root|SI|1..1\n\
             Order.IssueDate|Document date||NO|\n",
            "order-meta",
        )
        .unwrap();

        let date = schema.field_by_path("Order.IssueDate").unwrap();
        assert_eq!(date.field_type, FieldType::Date);
        // no cardinality column value, falls back to the required flag
        assert_eq!(date.cardinality, Cardinality::OPTIONAL);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(parse_str("field,required\n", "empty").is_err());
    }
}
