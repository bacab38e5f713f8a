//! JSON rendering
//!
//! The value tree serializes through serde untagged, so JSON output is a
//! direct projection. Ordering is cosmetic for JSON consumers, but the
//! schema-ordered variant keeps output diffable against XML renditions
//! of the same document.

use docmap_schema::Schema;
use docmap_tree::Value;

use crate::{order, Rendered, Result};

/// Render a value tree as compact JSON.
///
/// # Errors
///
/// Returns an error when serde fails, which for this tree type means a
/// non-finite number.
pub fn to_json(tree: &Value) -> Result<String> {
    Ok(serde_json::to_string(tree)?)
}

/// Render a value tree as pretty-printed JSON.
///
/// # Errors
///
/// Same failure modes as [`to_json`].
pub fn to_json_pretty(tree: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(tree)?)
}

/// Render pretty JSON with object keys in schema-declared order.
///
/// # Errors
///
/// Same failure modes as [`to_json`].
pub fn to_json_ordered(tree: &Value, schema: &Schema) -> Result<Rendered> {
    let (ordered, warnings) = order::reorder(tree, schema);
    Ok(Rendered {
        text: serde_json::to_string_pretty(&ordered)?,
        warnings,
    })
}

/// Parse JSON text into a value tree.
///
/// # Errors
///
/// Returns an error when the text is not valid JSON.
pub fn from_json(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(text)?)
}
