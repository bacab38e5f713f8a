//! JSON Schema parser
//!
//! Walks `properties`/`required`/`items` and produces the unified model.
//! Only the structural subset matters here; validation keywords other than
//! `required` are ignored.

use serde_json::Value as Json;

use crate::model::{Cardinality, FieldType, Schema, SchemaField};
use crate::{Error, Result};

/// Parse a JSON Schema document.
///
/// # Errors
///
/// Returns an error when the text is not valid JSON or the schema has no
/// `properties` object.
pub fn parse_str(json: &str, name: &str) -> Result<Schema> {
    let doc: Json = serde_json::from_str(json)?;
    parse_value(&doc, name)
}

/// Parse an already-deserialized JSON Schema.
///
/// # Errors
///
/// Returns an error when the schema has no `properties` object.
pub fn parse_value(doc: &Json, name: &str) -> Result<Schema> {
    let properties = doc
        .get("properties")
        .and_then(Json::as_object)
        .ok_or_else(|| Error::malformed("JSON Schema has no 'properties' object"))?;

    let mut schema = Schema::new(name);
    let required = required_names(doc);
    for (prop_name, prop) in properties {
        walk_property(&mut schema, prop_name, prop, None, &required);
    }
    schema.validate()?;
    Ok(schema)
}

fn required_names(node: &Json) -> Vec<String> {
    node.get("required")
        .and_then(Json::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Json::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn walk_property(
    schema: &mut Schema,
    name: &str,
    prop: &Json,
    parent_path: Option<&str>,
    required: &[String],
) {
    let path = match parent_path {
        Some(parent) => format!("{parent}.{name}"),
        None => name.to_string(),
    };
    let is_required = required.iter().any(|r| r == name);
    let declared = prop.get("type").and_then(Json::as_str).unwrap_or("string");

    let (field_type, cardinality, item_node) = if declared == "array" {
        let min = u32::from(is_required);
        (
            FieldType::Array,
            Cardinality { min, max: None },
            prop.get("items"),
        )
    } else {
        let cardinality = if is_required {
            Cardinality::ONE
        } else {
            Cardinality::OPTIONAL
        };
        (map_json_type(declared, prop), cardinality, None)
    };

    let mut field = SchemaField::new(path.clone(), field_type).with_cardinality(cardinality);
    field.parent = parent_path.map(str::to_owned);
    if let Some(description) = prop.get("description").and_then(Json::as_str) {
        field.description = description.to_string();
    }
    schema.attach(field);

    // nested object properties live on the property itself or on array items
    let nested = prop
        .get("properties")
        .and_then(Json::as_object)
        .map(|props| (props, required_names(prop)))
        .or_else(|| {
            let items = item_node?;
            let props = items.get("properties")?.as_object()?;
            Some((props, required_names(items)))
        });
    if let Some((props, nested_required)) = nested {
        for (child_name, child_prop) in props {
            walk_property(schema, child_name, child_prop, Some(&path), &nested_required);
        }
    }
}

fn map_json_type(declared: &str, prop: &Json) -> FieldType {
    if let Some(format) = prop.get("format").and_then(Json::as_str) {
        match format {
            "date" => return FieldType::Date,
            "date-time" => return FieldType::DateTime,
            _ => {}
        }
    }
    match declared {
        "number" | "integer" => FieldType::Number,
        "boolean" => FieldType::Boolean,
        "object" => FieldType::Object,
        _ => FieldType::String,
    }
}
