//! XSD schema parser
//!
//! Turns an XSD (plus any schemas it imports or includes) into the unified
//! [`Schema`] model. Child order inside `xs:sequence` is preserved exactly
//! as declared; that order later drives XML element reordering on output.
//!
//! Element references (`<xs:element ref="cbc:ID"/>`, the UBL style) keep
//! the prefix in the field name and record it in [`SchemaField::namespace`],
//! so the serializer can emit the same prefix and declare it once at the
//! document root.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::dom::{self, XmlElem};
use crate::model::{path_to_id, Cardinality, FieldType, Schema, SchemaField};
use crate::{Error, Result};

/// Nesting deeper than this is treated as a definition cycle.
const MAX_DEPTH: usize = 64;

/// Parse an XSD file, following `xs:import` and `xs:include` locations
/// relative to the file's directory.
///
/// # Errors
///
/// Returns an error when the file cannot be read or the XML is malformed.
/// Missing imported files are skipped with a warning, matching the
/// tolerant behavior expected of real-world UBL schema sets.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Schema> {
    let path = path.as_ref();
    let name = path
        .file_stem()
        .map_or_else(|| "Schema".to_string(), |s| s.to_string_lossy().into_owned());

    let mut docs = Vec::new();
    let mut visited = HashSet::new();
    load_recursive(path, &mut docs, &mut visited)?;
    build_schema(&docs, &name)
}

/// Parse a single XSD document from a string. Imports are not followed.
///
/// # Errors
///
/// Returns an error when the XML is malformed.
pub fn parse_str(xml: &str, name: &str) -> Result<Schema> {
    let root = dom::parse(xml)?;
    build_schema(&[root], name)
}

fn load_recursive(
    path: &Path,
    docs: &mut Vec<XmlElem>,
    visited: &mut HashSet<PathBuf>,
) -> Result<()> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Ok(());
    }

    let xml = fs::read_to_string(path)
        .map_err(|source| Error::io(path.display().to_string(), source))?;
    let root = dom::parse(&xml)?;

    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let locations: Vec<String> = root
        .children
        .iter()
        .filter(|c| c.name == "import" || c.name == "include")
        .filter_map(|c| c.attr("schemaLocation"))
        .map(str::to_owned)
        .collect();

    docs.push(root);

    for location in locations {
        let import_path = base_dir.join(&location);
        if import_path.is_file() {
            debug!(location, "following schema import");
            load_recursive(&import_path, docs, visited)?;
        } else {
            warn!(location, "imported schema not found, skipping");
        }
    }
    Ok(())
}

/// Everything the element walker needs to resolve names across documents.
struct SchemaSet<'a> {
    docs: &'a [XmlElem],
}

impl SchemaSet<'_> {
    /// Named `xs:complexType` definition, searched across every loaded
    /// document (prefix on the type reference is ignored).
    fn complex_type(&self, type_name: &str) -> Option<&XmlElem> {
        let local = dom::local_of(type_name);
        self.docs.iter().find_map(|doc| {
            doc.children
                .iter()
                .filter(|c| c.name == "complexType")
                .find(|c| c.attr("name") == Some(local))
        })
    }

    /// Global `xs:element` declaration by local name.
    fn global_element(&self, name: &str) -> Option<&XmlElem> {
        self.docs.iter().find_map(|doc| {
            doc.children
                .iter()
                .filter(|c| c.name == "element")
                .find(|c| c.attr("name") == Some(name))
        })
    }
}

fn build_schema(docs: &[XmlElem], name: &str) -> Result<Schema> {
    let mut schema = Schema::new(name);
    let set = SchemaSet { docs };

    for doc in docs {
        for (key, value) in &doc.attrs {
            if let Some(prefix) = key.strip_prefix("xmlns:") {
                if prefix != "xs" && prefix != "xsd" {
                    schema
                        .namespaces
                        .entry(prefix.to_string())
                        .or_insert_with(|| value.clone());
                }
            }
        }
    }

    let main = docs
        .first()
        .ok_or_else(|| Error::malformed("no schema documents loaded"))?;
    let mut walker = Walker {
        set: &set,
        schema: &mut schema,
        type_stack: Vec::new(),
    };
    for element in main.children.iter().filter(|c| c.name == "element") {
        walker.walk_element(element, None, 0)?;
    }

    if schema.is_empty() {
        return Err(Error::malformed(
            "schema declares no global elements".to_string(),
        ));
    }
    schema.validate()?;
    Ok(schema)
}

struct Walker<'a> {
    set: &'a SchemaSet<'a>,
    schema: &'a mut Schema,
    /// Named types currently being expanded, to cut definition cycles.
    type_stack: Vec<String>,
}

impl Walker<'_> {
    fn walk_element(
        &mut self,
        element: &XmlElem,
        parent_path: Option<&str>,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(Error::malformed("element nesting exceeds maximum depth"));
        }
        let set = self.set;

        // A referenced element keeps its prefixed name; its declaration
        // (and thus its type) lives in one of the imported schemas.
        let (name, namespace, declaration) = if let Some(name) = element.attr("name") {
            (name.to_string(), None, Some(element))
        } else if let Some(reference) = element.attr("ref") {
            let namespace = reference
                .split_once(':')
                .map(|(prefix, _)| prefix.to_string());
            let declaration = set.global_element(dom::local_of(reference));
            (reference.to_string(), namespace, declaration)
        } else {
            return Ok(());
        };

        let path = match parent_path {
            Some(parent) => format!("{parent}.{name}"),
            None => name.clone(),
        };
        if self.schema.fields.contains_key(&path_to_id(&path)) {
            return Ok(());
        }

        let cardinality = cardinality_of(element);
        let type_attr = declaration.and_then(|d| d.attr("type"));
        let inline_type = declaration.and_then(|d| d.child("complexType"));

        let named_type = type_attr.and_then(|t| set.complex_type(t));
        let complex = inline_type.or(named_type);

        let field_type = if complex.is_some() {
            FieldType::Object
        } else {
            map_xsd_type(type_attr.unwrap_or("string"))
        };

        let mut field = SchemaField::new(path.clone(), field_type).with_cardinality(cardinality);
        field.namespace = namespace;
        field.parent = parent_path.map(str::to_owned);
        if let Some(doc) = declaration.and_then(documentation_of) {
            field.description = doc;
        }
        self.schema.attach(field);

        if let Some(complex_type) = complex {
            let guard = type_attr.map(|t| dom::local_of(t).to_string());
            if let Some(type_name) = &guard {
                if self.type_stack.contains(type_name) {
                    debug!(type_name, "recursive type, stopping expansion");
                    return Ok(());
                }
                self.type_stack.push(type_name.clone());
            }
            self.walk_particles(complex_type, &path, depth + 1)?;
            if guard.is_some() {
                self.type_stack.pop();
            }
        }
        Ok(())
    }

    /// Recurse through `sequence`, `all`, `choice` and nested groups,
    /// visiting child `element` declarations in document order.
    fn walk_particles(&mut self, node: &XmlElem, parent_path: &str, depth: usize) -> Result<()> {
        for child in &node.children {
            match child.name.as_str() {
                "element" => self.walk_element(child, Some(parent_path), depth)?,
                "sequence" | "all" | "choice" | "complexContent" | "simpleContent"
                | "extension" => {
                    self.walk_particles(child, parent_path, depth)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn cardinality_of(element: &XmlElem) -> Cardinality {
    let min = element
        .attr("minOccurs")
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(1);
    let max = match element.attr("maxOccurs") {
        Some("unbounded") => None,
        Some(v) => v.parse::<u32>().ok().or(Some(1)),
        None => Some(1),
    };
    Cardinality { min, max }
}

fn documentation_of(element: &XmlElem) -> Option<String> {
    let doc = element.child("annotation")?.child("documentation")?;
    let text = doc.text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Map an XSD type name onto the universal type set.
fn map_xsd_type(xsd_type: &str) -> FieldType {
    let lower = xsd_type.to_lowercase();
    if lower.contains("datetime") {
        FieldType::DateTime
    } else if lower.contains("date") {
        FieldType::Date
    } else if lower.contains("bool") {
        FieldType::Boolean
    } else if ["int", "decimal", "double", "float", "amount", "quantity"]
        .iter()
        .any(|t| lower.contains(t))
    {
        FieldType::Number
    } else {
        FieldType::String
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVOICE_XSD: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Invoice">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="ID" type="xs:string"/>
        <xs:element name="IssueDate" type="xs:date"/>
        <xs:element name="Note" type="xs:string" minOccurs="0"/>
        <xs:element name="InvoiceLine" minOccurs="1" maxOccurs="unbounded">
          <xs:complexType>
            <xs:sequence>
              <xs:element name="Quantity" type="xs:decimal"/>
              <xs:element name="Amount" type="xs:decimal"/>
            </xs:sequence>
          </xs:complexType>
        </xs:element>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    #[test]
    fn test_inline_complex_types() {
        let schema = parse_str(INVOICE_XSD, "Invoice").unwrap();
        assert_eq!(schema.root_fields, ["Invoice"]);

        let invoice = schema.field_by_path("Invoice").unwrap();
        assert_eq!(invoice.field_type, FieldType::Object);
        assert_eq!(
            schema.declared_children("Invoice").unwrap(),
            ["ID", "IssueDate", "Note", "InvoiceLine"]
        );

        let note = schema.field_by_path("Invoice.Note").unwrap();
        assert_eq!(note.cardinality, Cardinality::OPTIONAL);

        let line = schema.field_by_path("Invoice.InvoiceLine").unwrap();
        assert!(line.cardinality.is_repeating());
        assert_eq!(
            schema.field_by_path("Invoice.InvoiceLine.Amount").unwrap().field_type,
            FieldType::Number
        );
    }

    #[test]
    fn test_named_types_and_refs() {
        let xsd = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:cbc="urn:test:cbc">
  <xs:element name="Order" type="OrderType"/>
  <xs:element name="ID" type="xs:string"/>
  <xs:complexType name="OrderType">
    <xs:sequence>
      <xs:element ref="cbc:ID"/>
      <xs:element name="Total" type="xs:decimal"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;
        let schema = parse_str(xsd, "Order").unwrap();

        assert_eq!(schema.namespaces.get("cbc").map(String::as_str), Some("urn:test:cbc"));
        assert_eq!(
            schema.declared_children("Order").unwrap(),
            ["cbc:ID", "Total"]
        );

        let id = schema.field_by_path("Order.cbc:ID").unwrap();
        assert_eq!(id.namespace.as_deref(), Some("cbc"));
        assert_eq!(id.local_name(), "ID");
        assert_eq!(id.field_type, FieldType::String);
    }

    #[test]
    fn test_recursive_type_stops() {
        let xsd = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Node" type="NodeType"/>
  <xs:complexType name="NodeType">
    <xs:sequence>
      <xs:element name="Label" type="xs:string"/>
      <xs:element name="Child" type="NodeType" minOccurs="0"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;
        let schema = parse_str(xsd, "Node").unwrap();
        assert!(schema.field_by_path("Node.Child").is_some());
        // expansion stopped at the recursive edge
        assert!(schema.field_by_path("Node.Child.Child.Child").is_none());
        schema.validate().unwrap();
    }

    #[test]
    fn test_type_mapping() {
        assert_eq!(map_xsd_type("xs:dateTime"), FieldType::DateTime);
        assert_eq!(map_xsd_type("xs:date"), FieldType::Date);
        assert_eq!(map_xsd_type("xs:integer"), FieldType::Number);
        assert_eq!(map_xsd_type("udt:AmountType"), FieldType::Number);
        assert_eq!(map_xsd_type("xs:boolean"), FieldType::Boolean);
        assert_eq!(map_xsd_type("anything-else"), FieldType::String);
    }

    #[test]
    fn test_no_global_elements_is_an_error() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"/>"#;
        assert!(parse_str(xsd, "Empty").is_err());
    }
}
