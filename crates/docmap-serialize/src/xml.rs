//! XML reading and schema-ordered writing
//!
//! Reading produces a value tree: repeated sibling tags collapse into a
//! list, attributes become `@`-prefixed keys, mixed content lands under
//! `#text`. Writing goes the other way, after [`crate::order::reorder`]
//! has arranged every object node into the target schema's declared
//! child order, and prunes elements that carry no data at all.

use docmap_schema::Schema;
use docmap_schema::model::FieldType;
use docmap_tree::Value;
use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use crate::{order, Error, Rendered, Result};

/// Schema-driven XML writer.
///
/// Without a schema the writer still produces well-formed XML in
/// value-tree order, with a warning that ordering is not validated.
pub struct XmlSerializer<'a> {
    schema: Option<&'a Schema>,
    declaration: bool,
    indent: bool,
}

impl<'a> XmlSerializer<'a> {
    /// Create a writer with no target schema.
    pub fn new() -> Self {
        Self {
            schema: None,
            declaration: true,
            indent: true,
        }
    }

    /// Order output against a target schema.
    pub fn with_schema(mut self, schema: &'a Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Skip the `<?xml ...?>` declaration.
    pub fn without_declaration(mut self) -> Self {
        self.declaration = false;
        self
    }

    /// Emit everything on one line.
    pub fn compact(mut self) -> Self {
        self.indent = false;
        self
    }

    /// Serialize a value tree to XML text.
    ///
    /// The tree must contain exactly one root element key; attribute
    /// (`@`) keys on the root are allowed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shape`] when the tree is not XML-shaped and
    /// [`Error::Xml`] when the writer fails.
    pub fn serialize(&self, tree: &Value) -> Result<Rendered> {
        let mut warnings = Vec::new();
        let ordered = match self.schema {
            Some(schema) => {
                let (ordered, order_warnings) = order::reorder(tree, schema);
                warnings.extend(order_warnings);
                ordered
            }
            None => {
                warnings.push(
                    "no target schema supplied, element order follows the value tree and is not schema-validated"
                        .to_string(),
                );
                tree.clone()
            }
        };

        let map = ordered
            .as_object()
            .ok_or_else(|| Error::shape("XML output requires an object root"))?;
        let mut roots = map.iter().filter(|(key, _)| !key.starts_with('@'));
        let (root_name, root_value) = roots
            .next()
            .ok_or_else(|| Error::shape("XML output requires a root element"))?;
        if roots.next().is_some() {
            return Err(Error::shape("XML output requires a single root element"));
        }

        let mut writer = if self.indent {
            Writer::new_with_indent(Vec::new(), b' ', 2)
        } else {
            Writer::new(Vec::new())
        };
        if self.declaration {
            writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        }
        self.write_root(&mut writer, root_name, root_value)?;

        debug!(root = %root_name, warning_count = warnings.len(), "serialized XML document");
        Ok(Rendered {
            text: String::from_utf8_lossy(&writer.into_inner()).into_owned(),
            warnings,
        })
    }

    fn write_root(
        &self,
        writer: &mut Writer<Vec<u8>>,
        name: &str,
        value: &Value,
    ) -> Result<()> {
        // namespaces declare once, on the root element
        let mut start = BytesStart::new(name);
        if let Some(schema) = self.schema {
            for (prefix, uri) in &schema.namespaces {
                let key = format!("xmlns:{prefix}");
                start.push_attribute((key.as_str(), uri.as_str()));
            }
        }
        if let Some(map) = value.as_object() {
            push_attributes(&mut start, map);
            writer.write_event(Event::Start(start))?;
            if let Some(text) = map.get("#text") {
                self.write_text(writer, text, name)?;
            }
            self.write_children(writer, map, name)?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
            Ok(())
        } else {
            writer.write_event(Event::Start(start))?;
            self.write_text(writer, value, name)?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
            Ok(())
        }
    }

    fn write_element(
        &self,
        writer: &mut Writer<Vec<u8>>,
        name: &str,
        value: &Value,
        path: &str,
    ) -> Result<()> {
        match value {
            Value::List(items) => {
                for item in items {
                    self.write_element(writer, name, item, path)?;
                }
                Ok(())
            }
            Value::Object(map) => {
                if !has_content(value) {
                    return Ok(());
                }
                let mut start = BytesStart::new(name);
                push_attributes(&mut start, map);
                writer.write_event(Event::Start(start))?;
                if let Some(text) = map.get("#text") {
                    self.write_text(writer, text, path)?;
                }
                self.write_children(writer, map, path)?;
                writer.write_event(Event::End(BytesEnd::new(name)))?;
                Ok(())
            }
            scalar => {
                if scalar.is_empty() {
                    return Ok(());
                }
                writer.write_event(Event::Start(BytesStart::new(name)))?;
                self.write_text(writer, scalar, path)?;
                writer.write_event(Event::End(BytesEnd::new(name)))?;
                Ok(())
            }
        }
    }

    fn write_children(
        &self,
        writer: &mut Writer<Vec<u8>>,
        map: &IndexMap<String, Value>,
        path: &str,
    ) -> Result<()> {
        for (key, child) in map {
            if key.starts_with('@') || key == "#text" {
                continue;
            }
            self.write_element(writer, key, child, &format!("{path}.{key}"))?;
        }
        Ok(())
    }

    fn write_text(
        &self,
        writer: &mut Writer<Vec<u8>>,
        value: &Value,
        path: &str,
    ) -> Result<()> {
        let mut text = value.as_string().unwrap_or_default();
        // date-typed fields carry no time part on the wire
        if self.field_type(path) == Some(FieldType::Date) {
            if let Some(t) = text.find('T') {
                text.truncate(t);
            }
        }
        writer.write_event(Event::Text(BytesText::new(&text)))?;
        Ok(())
    }

    fn field_type(&self, path: &str) -> Option<FieldType> {
        self.schema
            .and_then(|schema| schema.field_by_path(path))
            .map(|field| field.field_type)
    }
}

impl Default for XmlSerializer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// True when a node carries any data worth emitting.
fn has_content(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(key, child)| key.starts_with('@') || has_content(child)),
        Value::List(items) => items.iter().any(has_content),
        scalar => !scalar.is_empty(),
    }
}

fn push_attributes(start: &mut BytesStart<'_>, map: &IndexMap<String, Value>) {
    for (key, value) in map {
        if let Some(name) = key.strip_prefix('@') {
            let text = value.as_string().unwrap_or_default();
            start.push_attribute((name, text.as_str()));
        }
    }
}

/// Parse XML text into a value tree.
///
/// Repeated sibling tags become a list, attributes become `@`-prefixed
/// keys and elements with both attributes and text keep the text under
/// `#text`. Tag names are kept as written, prefixes included; path
/// resolution in the tree crate is namespace-lenient so lookups by
/// local name still work.
///
/// # Errors
///
/// Returns an error when the document is not well-formed.
pub fn from_xml(xml: &str) -> Result<Value> {
    struct Frame {
        name: String,
        map: IndexMap<String, Value>,
        text: String,
    }

    fn frame_from_start(e: &BytesStart<'_>) -> Result<Frame> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut map = IndexMap::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| Error::shape(format!("bad attribute: {err}")))?;
            let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
            let value = attr
                .unescape_value()
                .map_err(|err| Error::shape(format!("bad attribute value: {err}")))?
                .into_owned();
            map.insert(key, Value::String(value));
        }
        Ok(Frame {
            name,
            map,
            text: String::new(),
        })
    }

    fn close(frame: Frame) -> (String, Value) {
        let Frame { name, mut map, text } = frame;
        let value = if map.is_empty() {
            if text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            }
        } else {
            if !text.is_empty() {
                map.insert("#text".to_string(), Value::String(text));
            }
            Value::Object(map)
        };
        (name, value)
    }

    fn attach(map: &mut IndexMap<String, Value>, name: String, value: Value) {
        match map.get_mut(&name) {
            Some(Value::List(items)) => items.push(value),
            Some(existing) => {
                let first = std::mem::replace(existing, Value::Null);
                *existing = Value::List(vec![first, value]);
            }
            None => {
                map.insert(name, value);
            }
        }
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => stack.push(frame_from_start(e)?),
            Event::Empty(ref e) => {
                let (name, value) = close(frame_from_start(e)?);
                match stack.last_mut() {
                    Some(parent) => attach(&mut parent.map, name, value),
                    None if root.is_none() => root = Some((name, value)),
                    None => return Err(Error::shape("multiple root elements")),
                }
            }
            Event::Text(ref e) => {
                if let Some(top) = stack.last_mut() {
                    let text = e
                        .xml_content()
                        .map_err(|err| Error::shape(format!("bad character data: {err}")))?;
                    top.text.push_str(&text);
                }
            }
            Event::GeneralRef(ref e) => {
                if let Some(top) = stack.last_mut() {
                    if let Some(ch) = e
                        .resolve_char_ref()
                        .map_err(|err| Error::shape(format!("bad character reference: {err}")))?
                    {
                        top.text.push(ch);
                    } else {
                        let name = e
                            .decode()
                            .map_err(|err| Error::shape(format!("bad entity reference: {err}")))?;
                        let expanded = quick_xml::escape::resolve_predefined_entity(&name)
                            .ok_or_else(|| {
                                Error::shape(format!("unknown entity reference '&{name};'"))
                            })?;
                        top.text.push_str(expanded);
                    }
                }
            }
            Event::CData(ref e) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| Error::shape("unbalanced closing tag"))?;
                let (name, value) = close(frame);
                match stack.last_mut() {
                    Some(parent) => attach(&mut parent.map, name, value),
                    None if root.is_none() => root = Some((name, value)),
                    None => return Err(Error::shape("multiple root elements")),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Error::shape("document ended inside an open element"));
    }
    let (name, value) = root.ok_or_else(|| Error::shape("document has no root element"))?;
    Ok(Value::Object([(name, value)].into()))
}
