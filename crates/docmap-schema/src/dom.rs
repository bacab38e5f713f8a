//! Small in-memory XML tree used by the XSD and sample-document parsers.
//!
//! The schema walkers need random access to children (lookups by local
//! name, repeated passes over `xs:sequence` contents), which is awkward
//! against a streaming reader. This module buffers a document into a
//! plain element tree once and lets the walkers recurse over it.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::{Error, Result};

/// One XML element: local name, raw attributes, child elements and
/// accumulated character data.
#[derive(Debug, Clone, Default)]
pub(crate) struct XmlElem {
    /// Tag name with any namespace prefix stripped.
    pub name: String,
    /// Attributes in document order, keys as written (prefix included).
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlElem>,
    pub text: String,
}

impl XmlElem {
    /// Attribute value by exact key.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First child element with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlElem> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Strip a namespace prefix from a qualified name.
pub(crate) fn local_of(raw: &str) -> &str {
    raw.rsplit(':').next().unwrap_or(raw)
}

/// Parse a complete document into its root element.
pub(crate) fn parse(xml: &str) -> Result<XmlElem> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElem> = Vec::new();
    let mut root: Option<XmlElem> = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                stack.push(elem_from_start(e)?);
            }
            Event::Empty(ref e) => {
                let elem = elem_from_start(e)?;
                attach(&mut stack, &mut root, elem)?;
            }
            Event::Text(ref e) => {
                if let Some(top) = stack.last_mut() {
                    let text = e
                        .xml_content()
                        .map_err(|err| Error::malformed(format!("bad character data: {err}")))?;
                    top.text.push_str(&text);
                }
            }
            Event::GeneralRef(ref e) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&resolve_reference(e)?);
                }
            }
            Event::CData(ref e) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::End(_) => {
                let elem = stack
                    .pop()
                    .ok_or_else(|| Error::malformed("unbalanced closing tag"))?;
                attach(&mut stack, &mut root, elem)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Error::malformed("document ended inside an open element"));
    }
    root.ok_or_else(|| Error::malformed("document has no root element"))
}

/// Expand a character or predefined entity reference (`&#x41;`, `&amp;`).
fn resolve_reference(e: &quick_xml::events::BytesRef<'_>) -> Result<String> {
    if let Some(ch) = e
        .resolve_char_ref()
        .map_err(|err| Error::malformed(format!("bad character reference: {err}")))?
    {
        return Ok(ch.to_string());
    }
    let name = e
        .decode()
        .map_err(|err| Error::malformed(format!("bad entity reference: {err}")))?;
    quick_xml::escape::resolve_predefined_entity(&name)
        .map(str::to_owned)
        .ok_or_else(|| Error::malformed(format!("unknown entity reference '&{name};'")))
}

fn elem_from_start(e: &quick_xml::events::BytesStart<'_>) -> Result<XmlElem> {
    let raw_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let name = local_of(&raw_name).to_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::malformed(format!("bad attribute: {err}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| Error::malformed(format!("bad attribute value: {err}")))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(XmlElem {
        name,
        attrs,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(stack: &mut [XmlElem], root: &mut Option<XmlElem>, elem: XmlElem) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(elem);
    } else if root.is_some() {
        return Err(Error::malformed("multiple root elements"));
    } else {
        *root = Some(elem);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements() {
        let doc = parse(r#"<a x="1"><b>hi</b><b>there</b><c/></a>"#).unwrap();
        assert_eq!(doc.name, "a");
        assert_eq!(doc.attr("x"), Some("1"));
        assert_eq!(doc.children.iter().filter(|c| c.name == "b").count(), 2);
        assert_eq!(doc.child("b").unwrap().text, "hi");
        assert!(doc.child("c").unwrap().children.is_empty());
    }

    #[test]
    fn expands_entity_references_in_text() {
        let doc = parse("<a>R&amp;D&#x21;&lt;x&gt;</a>").unwrap();
        assert_eq!(doc.text, "R&D!<x>");
        assert!(parse("<a>&nosuch;</a>").is_err());
    }

    #[test]
    fn strips_namespace_prefixes_from_names_only() {
        let doc = parse(r#"<xs:schema xmlns:xs="u"><xs:element name="ID"/></xs:schema>"#).unwrap();
        assert_eq!(doc.name, "schema");
        assert_eq!(doc.child("element").unwrap().attr("name"), Some("ID"));
        assert_eq!(doc.attr("xmlns:xs"), Some("u"));
    }

    #[test]
    fn rejects_unbalanced_markup() {
        assert!(parse("<a><b></a>").is_err());
        assert!(parse("").is_err());
    }
}
