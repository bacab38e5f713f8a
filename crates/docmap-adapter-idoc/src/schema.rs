//! Definition to schema conversion
//!
//! Exposes an IDOC definition as a schema tree the mapping engine can
//! address: root node named after the IDOC type, segments nested along
//! their parent links, fields as leaves with mapped types.

use docmap_schema::model::{Cardinality, FieldType, Schema, SchemaField};

use crate::definition::{IdocDefinition, IdocFieldType, IdocSegment};
use crate::{Error, Result};

/// Build a schema tree from an IDOC definition.
///
/// # Errors
///
/// Returns an error when the parent links contain a cycle.
pub fn to_schema(definition: &IdocDefinition) -> Result<Schema> {
    let mut schema = Schema::new(definition.idoc_type.clone());
    schema.attach(SchemaField::new(
        definition.idoc_type.clone(),
        FieldType::Object,
    ));

    for segment in definition.segments.values() {
        let path = segment_path(definition, segment)?;

        // parents may appear later in the definition than their children
        attach_ancestors(&mut schema, definition, segment)?;
        if schema.field_by_path(&path).is_none() {
            attach_segment(&mut schema, segment, &path);
        }
    }

    Ok(schema)
}

fn attach_ancestors(
    schema: &mut Schema,
    definition: &IdocDefinition,
    segment: &IdocSegment,
) -> Result<()> {
    if let Some(parent_id) = &segment.parent {
        if let Some(parent) = definition.segment(parent_id) {
            attach_ancestors(schema, definition, parent)?;
            let path = segment_path(definition, parent)?;
            if schema.field_by_path(&path).is_none() {
                attach_segment(schema, parent, &path);
            }
        }
    }
    Ok(())
}

fn attach_segment(schema: &mut Schema, segment: &IdocSegment, path: &str) {
    let mut field = SchemaField::new(path, FieldType::Object)
        .with_cardinality(segment_cardinality(segment));
    field.description = segment.technical_name.clone();
    schema.attach(field);

    for idoc_field in &segment.fields {
        let mut leaf = SchemaField::new(
            format!("{path}.{}", idoc_field.name),
            map_field_type(idoc_field.field_type),
        );
        leaf.description.clone_from(&idoc_field.description);
        schema.attach(leaf);
    }
}

fn segment_path(definition: &IdocDefinition, segment: &IdocSegment) -> Result<String> {
    let mut parts = vec![segment.segment_id.clone()];
    let mut current = segment;
    while let Some(parent_id) = &current.parent {
        if parts.contains(parent_id) {
            return Err(Error::definition(format!(
                "segment hierarchy cycle through '{parent_id}'"
            )));
        }
        match definition.segment(parent_id) {
            Some(parent) => {
                parts.push(parent.segment_id.clone());
                current = parent;
            }
            None => break,
        }
    }
    parts.push(definition.idoc_type.clone());
    parts.reverse();
    Ok(parts.join("."))
}

fn segment_cardinality(segment: &IdocSegment) -> Cardinality {
    Cardinality {
        min: segment.min_occurs,
        max: if segment.max_occurs >= 999_999 {
            None
        } else {
            Some(segment.max_occurs)
        },
    }
}

fn map_field_type(field_type: IdocFieldType) -> FieldType {
    match field_type {
        IdocFieldType::Char | IdocFieldType::Time => FieldType::String,
        IdocFieldType::Num => FieldType::Number,
        IdocFieldType::Date => FieldType::Date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_nest_along_parent_links() {
        let schema = to_schema(&IdocDefinition::invoic02()).unwrap();
        schema.validate().unwrap();

        assert_eq!(schema.name, "INVOIC02");
        let items = schema
            .field_by_path("INVOIC02.EDI_DC40.E1EDK01.E1EDP01")
            .unwrap();
        assert!(items.cardinality.is_repeating());
        assert_eq!(items.description, "ITEM_DATA");

        let quantity = schema
            .field_by_path("INVOIC02.EDI_DC40.E1EDK01.E1EDP01.MENGE")
            .unwrap();
        assert_eq!(quantity.field_type, FieldType::Number);
    }

    #[test]
    fn test_declared_children_follow_field_order() {
        let schema = to_schema(&IdocDefinition::invoic02()).unwrap();
        let children = schema
            .declared_children("INVOIC02.EDI_DC40.E1EDK01")
            .unwrap();
        assert_eq!(children, ["BELNR", "DATUM", "WKURS", "E1EDP01"]);
    }

    #[test]
    fn test_cycle_in_parents_rejected() {
        let mut definition = IdocDefinition::new("X");
        definition.add_segment(IdocSegment::new("A", "A").child_of("B"));
        definition.add_segment(IdocSegment::new("B", "B").child_of("A"));
        assert!(to_schema(&definition).is_err());
    }
}
