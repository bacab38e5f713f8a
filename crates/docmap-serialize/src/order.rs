//! Schema-ordered reordering
//!
//! Rewrites object nodes so their keys follow the declared child order of
//! the target schema. The result is a plain value tree; the writers then
//! emit it front to back without any ordering logic of their own.

use docmap_schema::Schema;
use docmap_tree::Value;
use indexmap::IndexMap;
use tracing::trace;

/// Reorder every object node in `tree` against `schema`.
///
/// Keys matching a declared child come first, in declared order; keys the
/// schema does not know about are kept last, in their original relative
/// order, and reported in the returned warnings (data is never dropped).
/// Attribute (`@`) and text (`#text`) keys always sort before element keys.
/// An object node with several element children but no declared ordering
/// in the schema also raises a warning, since its sibling order cannot be
/// enforced.
#[must_use]
pub fn reorder(tree: &Value, schema: &Schema) -> (Value, Vec<String>) {
    let mut warnings = Vec::new();
    let reordered = reorder_node(tree, "", schema, &mut warnings);
    (reordered, warnings)
}

fn reorder_node(value: &Value, path: &str, schema: &Schema, warnings: &mut Vec<String>) -> Value {
    match value {
        Value::Object(map) => Value::Object(reorder_object(map, path, schema, warnings)),
        Value::List(items) => Value::List(
            items
                .iter()
                .map(|item| reorder_node(item, path, schema, warnings))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}

fn reorder_object(
    map: &IndexMap<String, Value>,
    path: &str,
    schema: &Schema,
    warnings: &mut Vec<String>,
) -> IndexMap<String, Value> {
    let mut out = IndexMap::with_capacity(map.len());

    // attributes and direct text content are not ordered by the schema
    for (key, child) in map {
        if key.starts_with('@') || key == "#text" {
            out.insert(key.clone(), child.clone());
        }
    }

    for (key, child) in map {
        if out.contains_key(key) {
            continue;
        }
        let child_path = join(path, key);
        match schema.declared_children(&child_path) {
            Some(declared) => {
                trace!(path = %child_path, "reordering against declared children");
                out.insert(
                    key.clone(),
                    ordered_children(child, &child_path, &declared, schema, warnings),
                );
            }
            None => {
                if needs_ordering(child) {
                    warnings.push(format!(
                        "no declared ordering for '{child_path}', element order follows the value tree"
                    ));
                }
                out.insert(key.clone(), reorder_node(child, &child_path, schema, warnings));
            }
        }
    }
    out
}

fn ordered_children(
    value: &Value,
    path: &str,
    declared: &[&str],
    schema: &Schema,
    warnings: &mut Vec<String>,
) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = IndexMap::with_capacity(map.len());
            for (key, child) in map {
                if key.starts_with('@') || key == "#text" {
                    out.insert(key.clone(), child.clone());
                }
            }
            for name in declared {
                if let Some((key, child)) = lookup(map, name) {
                    let child_path = join(path, name);
                    out.insert(key.to_string(), reorder_node(child, &child_path, schema, warnings));
                }
            }
            for (key, child) in map {
                if out.contains_key(key) || key.starts_with('@') || key == "#text" {
                    continue;
                }
                warnings.push(format!(
                    "field '{key}' is not declared by the schema under '{path}', emitted last"
                ));
                out.insert(key.clone(), reorder_node(child, &join(path, key), schema, warnings));
            }
            Value::Object(out)
        }
        Value::List(items) => Value::List(
            items
                .iter()
                .map(|item| ordered_children(item, path, declared, schema, warnings))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}

/// True when a node has more than one element child, so sibling order
/// actually matters and silence would hide an unresolved path.
fn needs_ordering(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.keys()
                .filter(|key| !key.starts_with('@') && *key != "#text")
                .count()
                > 1
        }
        Value::List(items) => items.iter().any(needs_ordering),
        _ => false,
    }
}

/// Find a key by exact name, falling back to namespace-local comparison.
fn lookup<'a>(map: &'a IndexMap<String, Value>, name: &str) -> Option<(&'a str, &'a Value)> {
    if let Some((key, value)) = map.get_key_value(name) {
        return Some((key.as_str(), value));
    }
    let wanted = local(name);
    map.iter()
        .find(|(key, _)| local(key) == wanted)
        .map(|(key, value)| (key.as_str(), value))
}

fn local(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}
