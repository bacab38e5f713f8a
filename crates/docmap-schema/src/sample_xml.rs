//! Schema inference from a sample XML instance
//!
//! Used when no XSD is available: element structure becomes the field
//! tree, leaf types are guessed from the text content, and a tag seen
//! more than once under the same parent is marked repeating.

use regex::Regex;
use std::sync::OnceLock;

use crate::dom::{self, XmlElem};
use crate::model::{Cardinality, FieldType, Schema, SchemaField};
use crate::Result;

/// Infer a schema from a sample document.
///
/// # Errors
///
/// Returns an error when the XML is malformed.
pub fn parse_str(xml: &str, name: &str) -> Result<Schema> {
    let root = dom::parse(xml)?;
    let mut schema = Schema::new(name);
    infer_element(&mut schema, &root, None);
    schema.validate()?;
    Ok(schema)
}

fn infer_element(schema: &mut Schema, element: &XmlElem, parent_path: Option<&str>) {
    let tag = element.name.as_str();
    let path = match parent_path {
        Some(parent) => format!("{parent}.{tag}"),
        None => tag.to_string(),
    };

    if let Some(existing) = schema.fields.get_mut(&crate::model::path_to_id(&path)) {
        // second sibling with the same tag: now we know it repeats
        existing.cardinality.max = None;
    } else {
        let field_type = if element.children.is_empty() {
            infer_type(element.text.trim())
        } else {
            FieldType::Object
        };
        let mut field = SchemaField::new(path.clone(), field_type)
            .with_cardinality(Cardinality::ONE);
        field.parent = parent_path.map(str::to_owned);
        schema.attach(field);
    }

    for child in &element.children {
        infer_element(schema, child, Some(&path));
    }
}

fn infer_type(text: &str) -> FieldType {
    if text.is_empty() {
        return FieldType::String;
    }
    if text.chars().all(|c| c.is_ascii_digit()) {
        return FieldType::Number;
    }
    if text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false") {
        return FieldType::Boolean;
    }
    if looks_like_date(text) {
        return FieldType::Date;
    }
    FieldType::String
}

fn looks_like_date(text: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{4}-\d{2}-\d{2}|\d{2}/\d{2}/\d{4})").unwrap()
    });
    pattern.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infers_types_and_repetition() {
        let schema = parse_str(
            r"<Invoice>
                <ID>INV-001</ID>
                <IssueDate>2024-03-15</IssueDate>
                <Paid>true</Paid>
                <Line><Qty>2</Qty></Line>
                <Line><Qty>5</Qty></Line>
              </Invoice>",
            "Sample",
        )
        .unwrap();

        assert_eq!(schema.root_fields, ["Invoice"]);
        assert_eq!(
            schema.field_by_path("Invoice").unwrap().field_type,
            FieldType::Object
        );
        assert_eq!(
            schema.field_by_path("Invoice.ID").unwrap().field_type,
            FieldType::String
        );
        assert_eq!(
            schema.field_by_path("Invoice.IssueDate").unwrap().field_type,
            FieldType::Date
        );
        assert_eq!(
            schema.field_by_path("Invoice.Paid").unwrap().field_type,
            FieldType::Boolean
        );
        assert_eq!(
            schema.field_by_path("Invoice.Line.Qty").unwrap().field_type,
            FieldType::Number
        );
        assert!(schema
            .field_by_path("Invoice.Line")
            .unwrap()
            .cardinality
            .is_repeating());
        assert_eq!(
            schema.declared_children("Invoice").unwrap(),
            ["ID", "IssueDate", "Paid", "Line"]
        );
    }

    #[test]
    fn test_date_heuristic() {
        assert!(looks_like_date("2024-01-31"));
        assert!(looks_like_date("31/01/2024"));
        assert!(!looks_like_date("INV-2024"));
        assert!(!looks_like_date("20240131"));
    }
}
