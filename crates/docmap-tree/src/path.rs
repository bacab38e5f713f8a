//! Path resolution and path-addressed writes over value trees
//!
//! Paths use dotted form (`invoice.number`) or slash form
//! (`/Invoice/cbc:ID`); the separator is inferred per path. Attribute
//! segments (`@currencyID`) are ignored. Numeric segments address list
//! indices. Traversing a list with a field segment fans out: the segment is
//! projected across every element and the result is a list.

use crate::value::Value;
use crate::{Error, Result};
use indexmap::IndexMap;
use tracing::trace;

/// Split a path into its traversal segments
///
/// Empty segments and attribute segments are dropped; each segment is
/// trimmed. Mapping definitions routinely carry stray whitespace around
/// paths pasted from schema views, so trimming happens here, once.
pub fn split_path(path: &str) -> Vec<String> {
    let path = path.trim();
    let separator = if path.contains('/') { '/' } else { '.' };
    path.split(separator)
        .map(str::trim)
        .filter(|part| !part.is_empty() && !part.starts_with('@'))
        .map(ToString::to_string)
        .collect()
}

/// Resolve a path against a value tree
///
/// Returns [`Value::Null`] when any segment fails to resolve; resolution
/// never errors. Object lookup is namespace-lenient: `cbc:ID` matches a key
/// `ID` and vice versa.
pub fn resolve(root: &Value, path: &str) -> Value {
    let parts = split_path(path);
    if parts.is_empty() {
        return Value::Null;
    }

    let mut current = root.clone();

    // Documents parsed from XML wrap everything in a single root element;
    // enter it automatically when the first segment names something below it.
    if let Value::Object(fields) = &current {
        if lookup_key(fields, &parts[0]).is_none() && fields.len() == 1 {
            let (root_key, inner) = fields.iter().next().expect("len checked");
            trace!(root = %root_key, "entering single document root");
            current = inner.clone();
        }
    }

    for part in &parts {
        current = step(&current, part);
        if current.is_null() {
            trace!(%path, segment = %part, "path segment not found");
            return Value::Null;
        }
    }

    current
}

/// Resolve one segment against a node
fn step(current: &Value, part: &str) -> Value {
    match current {
        Value::Object(fields) => match lookup_key(fields, part) {
            Some(key) => fields[key].clone(),
            None => Value::Null,
        },
        Value::List(items) => {
            if let Ok(index) = part.parse::<usize>() {
                items.get(index).cloned().unwrap_or(Value::Null)
            } else {
                // Fan-out: project the segment across every element.
                let projected: Vec<Value> = items
                    .iter()
                    .filter_map(|item| match item {
                        Value::Object(fields) => Some(
                            lookup_key(fields, part)
                                .map_or(Value::Null, |key| fields[key].clone()),
                        ),
                        _ => None,
                    })
                    .collect();
                Value::List(projected)
            }
        }
        _ => Value::Null,
    }
}

/// Find the stored key matching a segment, tolerating namespace prefixes
fn lookup_key<'a>(fields: &'a IndexMap<String, Value>, part: &str) -> Option<&'a String> {
    if let Some((key, _)) = fields.get_key_value(part) {
        return Some(key);
    }
    let local = local_name(part);
    fields.keys().find(|key| local_name(key) == local)
}

/// Local name of a possibly namespace-prefixed segment
pub fn local_name(segment: &str) -> &str {
    segment.rsplit(':').next().unwrap_or(segment)
}

/// Write a value at a path, creating intermediate nodes as needed
///
/// Intermediate object nodes are created on demand; a numeric segment
/// creates or extends a list, padding with nulls. Writing over an existing
/// value replaces it (the last rule to write a target wins). Writing through
/// an existing scalar demotes it to an object's `#text` field rather than
/// discarding it.
///
/// # Errors
///
/// Returns an error when the path has no usable segments.
pub fn set(root: &mut Value, path: &str, value: Value) -> Result<()> {
    let parts = split_path(path);
    if parts.is_empty() {
        return Err(Error::invalid_path(path, "no path segments"));
    }
    if root.is_null() {
        *root = Value::object();
    }
    set_parts(root, &parts, value);
    Ok(())
}

fn set_parts(current: &mut Value, parts: &[String], value: Value) {
    let part = &parts[0];
    let last = parts.len() == 1;

    if let Ok(index) = part.parse::<usize>() {
        let items = ensure_list(current);
        while items.len() <= index {
            items.push(Value::Null);
        }
        if last {
            items[index] = value;
        } else {
            set_parts(&mut items[index], &parts[1..], value);
        }
        return;
    }

    let fields = ensure_object(current);
    if last {
        fields.insert(part.clone(), value);
    } else {
        // Pre-create the right container so a following numeric segment
        // lands in a list rather than an object keyed "0".
        let next_numeric = parts[1].parse::<usize>().is_ok();
        let child = fields.entry(part.clone()).or_insert_with(|| {
            if next_numeric {
                Value::List(Vec::new())
            } else {
                Value::object()
            }
        });
        set_parts(child, &parts[1..], value);
    }
}

/// View a node as an object, demoting an existing scalar into `#text`
fn ensure_object(current: &mut Value) -> &mut IndexMap<String, Value> {
    let needs_replace = !matches!(current, Value::Object(_));
    if needs_replace {
        let mut fields = IndexMap::new();
        if let Some(text) = current.as_string() {
            fields.insert("#text".to_string(), Value::String(text));
        }
        *current = Value::Object(fields);
    }
    match current {
        Value::Object(fields) => fields,
        _ => unreachable!("just replaced"),
    }
}

/// View a node as a list, replacing any non-list content
fn ensure_list(current: &mut Value) -> &mut Vec<Value> {
    if !matches!(current, Value::List(_)) {
        *current = Value::List(Vec::new());
    }
    match current {
        Value::List(items) => items,
        _ => unreachable!("just replaced"),
    }
}
