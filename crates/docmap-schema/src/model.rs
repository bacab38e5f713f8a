//! Unified schema model
//!
//! Every format parser (XSD, JSON Schema, sample XML, CSV metadata, IDOC
//! definitions) produces this one representation, so the mapping engine and
//! the serializers never care where a schema came from.

use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Universal field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    Boolean,
    Object,
    Array,
}

/// Declared occurrence bounds, textual form `m..n` or `m..N`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality {
    pub min: u32,
    /// `None` means unbounded
    pub max: Option<u32>,
}

impl Cardinality {
    /// Exactly one occurrence
    pub const ONE: Cardinality = Cardinality {
        min: 1,
        max: Some(1),
    };

    /// Optional single occurrence
    pub const OPTIONAL: Cardinality = Cardinality {
        min: 0,
        max: Some(1),
    };

    /// Zero or more occurrences
    pub const MANY: Cardinality = Cardinality { min: 0, max: None };

    /// Whether more than one occurrence is allowed
    pub fn is_repeating(&self) -> bool {
        self.max.is_none_or(|max| max > 1)
    }

    /// Whether at least one occurrence is required
    pub fn is_required(&self) -> bool {
        self.min >= 1
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}..{}", self.min, max),
            None => write!(f, "{}..N", self.min),
        }
    }
}

impl FromStr for Cardinality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (min_str, max_str) = s
            .split_once("..")
            .ok_or_else(|| Error::malformed(format!("invalid cardinality '{s}'")))?;
        let min = min_str
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::malformed(format!("invalid cardinality minimum '{min_str}'")))?;
        let max = match max_str.trim() {
            "N" | "n" | "*" | "unbounded" => None,
            other => Some(other.parse::<u32>().map_err(|_| {
                Error::malformed(format!("invalid cardinality maximum '{other}'"))
            })?),
        };
        Ok(Cardinality { min, max })
    }
}

impl Serialize for Cardinality {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Cardinality {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// One hierarchical field in a schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaField {
    /// Stable identifier derived from the path
    pub id: String,

    /// Local field name (may carry a namespace prefix, e.g. `cbc:ID`)
    pub name: String,

    /// Fully-qualified dotted path from the document root
    pub path: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    pub cardinality: Cardinality,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_term: Option<String>,

    /// Namespace prefix for XML serialization (e.g. `cbc`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Path of the enclosing field, `None` for roots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Child field ids, in source-schema declaration order
    #[serde(default)]
    pub children: Vec<String>,
}

impl SchemaField {
    /// Create a field at a path with defaults suitable for a leaf
    pub fn new(path: impl Into<String>, field_type: FieldType) -> Self {
        let path = path.into();
        let name = path.rsplit('.').next().unwrap_or(&path).to_string();
        Self {
            id: path_to_id(&path),
            name,
            path,
            field_type,
            cardinality: Cardinality::ONE,
            description: String::new(),
            business_term: None,
            namespace: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Set the cardinality (builder style)
    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Local name without any namespace prefix
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }
}

/// Stable field id for a path
pub fn path_to_id(path: &str) -> String {
    path.replace('.', "_")
}

/// A complete parsed schema
///
/// Immutable after construction by a parser; owned by whichever caller
/// triggered the parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,

    /// Ids of top-level fields, in declaration order
    pub root_fields: Vec<String>,

    /// All fields keyed by id
    pub fields: IndexMap<String, SchemaField>,

    /// Namespace prefix -> URI, for XSD-derived schemas
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub namespaces: IndexMap<String, String>,
}

impl Schema {
    /// Create an empty schema
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root_fields: Vec::new(),
            fields: IndexMap::new(),
            namespaces: IndexMap::new(),
        }
    }

    /// Look up a field by id
    pub fn field(&self, id: &str) -> Option<&SchemaField> {
        self.fields.get(id)
    }

    /// Look up a field by dotted path
    pub fn field_by_path(&self, path: &str) -> Option<&SchemaField> {
        self.fields.get(&path_to_id(path))
    }

    /// Number of fields in the schema
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Attach a field, wiring it to its parent's ordered child list
    ///
    /// Fields must be attached parents-first. When `parent` is unset it is
    /// inferred from the path: a field at `Invoice.ID` attaches under an
    /// already-present `Invoice`. A field whose parent is neither set nor
    /// inferable becomes a root.
    pub fn attach(&mut self, mut field: SchemaField) {
        if field.parent.is_none() {
            if let Some((prefix, _)) = field.path.rsplit_once('.') {
                if self.fields.contains_key(&path_to_id(prefix)) {
                    field.parent = Some(prefix.to_string());
                }
            }
        }
        let id = field.id.clone();
        let parent_id = field.parent.as_deref().map(path_to_id);
        self.fields.insert(id.clone(), field);

        match parent_id.and_then(|pid| self.fields.get_mut(&pid)) {
            Some(parent) => {
                if !parent.children.contains(&id) {
                    parent.children.push(id);
                }
            }
            None => {
                if !self.root_fields.contains(&id) {
                    self.root_fields.push(id);
                }
            }
        }
    }

    /// Declared child names (in order) for the field at a path
    ///
    /// Returns `None` when the path is unknown or the field declares no
    /// children; the serializer then falls back to value-tree order.
    pub fn declared_children(&self, path: &str) -> Option<Vec<&str>> {
        let field = self.field_by_path(path)?;
        if field.children.is_empty() {
            return None;
        }
        Some(
            field
                .children
                .iter()
                .filter_map(|child_id| self.fields.get(child_id))
                .map(|child| child.name.as_str())
                .collect(),
        )
    }

    /// Check structural invariants
    ///
    /// Every non-root path must equal `parent.path + "." + name` and every
    /// child id must resolve.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        for field in self.fields.values() {
            if let Some(parent_path) = &field.parent {
                let expected = format!("{parent_path}.{}", field.name);
                if field.path != expected {
                    return Err(Error::Invariant(format!(
                        "field '{}' path '{}' does not match parent '{parent_path}'",
                        field.id, field.path
                    )));
                }
            }
            for child_id in &field.children {
                if !self.fields.contains_key(child_id) {
                    return Err(Error::Invariant(format!(
                        "field '{}' references unknown child '{child_id}'",
                        field.id
                    )));
                }
            }
        }
        for root_id in &self.root_fields {
            if !self.fields.contains_key(root_id) {
                return Err(Error::Invariant(format!("unknown root field '{root_id}'")));
            }
        }
        Ok(())
    }

    /// Parse a schema from its JSON representation
    ///
    /// # Errors
    ///
    /// Returns an error when the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the schema to JSON
    ///
    /// # Errors
    ///
    /// Returns an error when serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinality_parse_and_display() {
        let c: Cardinality = "0..N".parse().unwrap();
        assert_eq!(c, Cardinality::MANY);
        assert_eq!(c.to_string(), "0..N");

        let c: Cardinality = "1..1".parse().unwrap();
        assert_eq!(c, Cardinality::ONE);
        assert!(!c.is_repeating());
        assert!(c.is_required());

        let c: Cardinality = "0..3".parse().unwrap();
        assert!(c.is_repeating());
        assert!(!c.is_required());

        assert!("garbage".parse::<Cardinality>().is_err());
    }

    #[test]
    fn test_attach_wires_parent_children() {
        let mut schema = Schema::new("Test");
        let mut root = SchemaField::new("Invoice", FieldType::Object);
        root.cardinality = Cardinality::ONE;
        schema.attach(root);

        let mut id_field = SchemaField::new("Invoice.ID", FieldType::String);
        id_field.parent = Some("Invoice".to_string());
        schema.attach(id_field);

        let mut date_field = SchemaField::new("Invoice.IssueDate", FieldType::Date);
        date_field.parent = Some("Invoice".to_string());
        schema.attach(date_field);

        assert_eq!(schema.root_fields, ["Invoice"]);
        assert_eq!(
            schema.field("Invoice").unwrap().children,
            ["Invoice_ID", "Invoice_IssueDate"]
        );
        assert_eq!(
            schema.declared_children("Invoice").unwrap(),
            ["ID", "IssueDate"]
        );
        schema.validate().unwrap();
    }

    #[test]
    fn test_attach_infers_parent_from_path() {
        let mut schema = Schema::new("Test");
        schema.attach(SchemaField::new("Invoice", FieldType::Object));
        schema.attach(SchemaField::new("Invoice.cbc:ID", FieldType::String));
        schema.attach(SchemaField::new("Invoice.cbc:Note", FieldType::String));
        // no parent attached under this path yet, so it roots itself
        schema.attach(SchemaField::new("Order.ID", FieldType::String));

        assert_eq!(
            schema.field("Invoice").unwrap().children,
            ["Invoice_cbc:ID", "Invoice_cbc:Note"]
        );
        assert_eq!(
            schema.declared_children("Invoice").unwrap(),
            ["cbc:ID", "cbc:Note"]
        );
        assert_eq!(schema.root_fields, ["Invoice", "Order_ID"]);
        schema.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_parent_path() {
        let mut schema = Schema::new("Test");
        schema.attach(SchemaField::new("A", FieldType::Object));
        let mut bad = SchemaField::new("B.C", FieldType::String);
        bad.parent = Some("A".to_string());
        schema.attach(bad);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_schema_json_roundtrip() {
        let mut schema = Schema::new("Test");
        schema.attach(SchemaField::new("Invoice", FieldType::Object));
        let mut child = SchemaField::new("Invoice.ID", FieldType::String);
        child.parent = Some("Invoice".to_string());
        child.namespace = Some("cbc".to_string());
        schema.attach(child);
        schema
            .namespaces
            .insert("cbc".to_string(), "urn:example:cbc".to_string());

        let json = schema.to_json().unwrap();
        let back = Schema::from_json(&json).unwrap();
        assert_eq!(back.name, "Test");
        assert_eq!(back.len(), 2);
        assert_eq!(
            back.field_by_path("Invoice.ID").unwrap().namespace.as_deref(),
            Some("cbc")
        );
        back.validate().unwrap();
    }
}
