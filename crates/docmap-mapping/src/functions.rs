//! Transformation function library
//!
//! Built-in functions plus an open, name-keyed registry so callers can
//! register their own. Every function is pure: one resolved value in, one
//! value out, no I/O. Recoverable oddities (unparseable dates, divide by
//! zero) degrade to a warning instead of failing the rule.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use docmap_tree::Value;
use regex::Regex;

use crate::rules::{LookupTables, Params};
use crate::{Error, Result};

/// Execution context handed to every function call.
pub struct Context<'a> {
    /// Named lookup tables from the mapping definition.
    pub lookup_tables: &'a LookupTables,
    /// Warning sink; entries end up in `TransformationResult.warnings`.
    pub warnings: &'a mut Vec<String>,
}

/// A registered transformation function.
pub type TransformFn = Arc<dyn Fn(&Value, &Params, &mut Context<'_>) -> Result<Value> + Send + Sync>;

/// Name-keyed function registry
///
/// [`FunctionRegistry::default`] carries the built-in library; custom
/// functions can be added or built-ins replaced by name.
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, TransformFn>,
}

impl FunctionRegistry {
    /// Empty registry with no functions at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in library.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("concat", concat);
        registry.register("substring", substring);
        registry.register("format_date", format_date);
        registry.register("lookup", lookup);
        registry.register("default", default_value);
        registry.register("upper", upper);
        registry.register("lower", lower);
        registry.register("trim", trim);
        registry.register("replace", replace);
        registry.register("split", split);
        registry.register("regex_extract", regex_extract);
        registry.register("math_operation", math_operation);
        registry.register("conditional", conditional);
        registry
    }

    /// Register or replace a function under a name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        function: impl Fn(&Value, &Params, &mut Context<'_>) -> Result<Value> + Send + Sync + 'static,
    ) {
        self.functions.insert(name.into(), Arc::new(function));
    }

    /// Look up a function by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TransformFn> {
        self.functions.get(name)
    }

    /// Whether a function is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Stringify a value for text-oriented functions. Containers render as
/// compact JSON so nothing silently disappears.
pub(crate) fn text(value: &Value) -> String {
    match value {
        Value::List(_) | Value::Object(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
        other => other.as_string().unwrap_or_default(),
    }
}

fn str_param(params: &Params, key: &str) -> Option<String> {
    params.get(key).and_then(Value::as_string)
}

fn require_str(params: &Params, key: &str, function: &str) -> Result<String> {
    str_param(params, key)
        .ok_or_else(|| Error::Transform(format!("{function} requires a '{key}' parameter")))
}

fn usize_param(params: &Params, key: &str) -> Option<usize> {
    let n = params.get(key)?.as_f64()?;
    if n < 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(n as usize)
}

/// Join non-null, non-empty inputs with a separator (default none).
fn concat(value: &Value, params: &Params, _ctx: &mut Context<'_>) -> Result<Value> {
    let separator = str_param(params, "separator").unwrap_or_default();
    let parts: Vec<String> = match value {
        Value::List(items) => items
            .iter()
            .filter(|item| !item.is_empty())
            .map(text)
            .collect(),
        other if other.is_empty() => Vec::new(),
        other => vec![text(other)],
    };
    Ok(Value::String(parts.join(&separator)))
}

/// Character substring with clipping; absent `length` takes the suffix.
fn substring(value: &Value, params: &Params, _ctx: &mut Context<'_>) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let input = text(value);
    let start = usize_param(params, "start").unwrap_or(0);
    let taken: String = match usize_param(params, "length") {
        Some(length) => input.chars().skip(start).take(length).collect(),
        None => input.chars().skip(start).collect(),
    };
    Ok(Value::String(taken))
}

/// Reformat a date between strftime patterns. Parse failure keeps the
/// original value and records a warning.
fn format_date(value: &Value, params: &Params, ctx: &mut Context<'_>) -> Result<Value> {
    if value.is_empty() {
        return Ok(value.clone());
    }
    let from = str_param(params, "from_format").unwrap_or_else(|| "%Y-%m-%d".to_string());
    let to = str_param(params, "to_format").unwrap_or_else(|| "%Y-%m-%d".to_string());
    let input = text(value);

    let parsed = NaiveDateTime::parse_from_str(&input, &from).ok().or_else(|| {
        NaiveDate::parse_from_str(&input, &from)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    });

    match parsed.and_then(|dt| render_date(dt, &to)) {
        Some(out) => Ok(Value::String(out)),
        None => {
            ctx.warnings
                .push(format!("format_date: '{input}' does not match '{from}', kept as-is"));
            Ok(value.clone())
        }
    }
}

/// Render through `write!` so an output pattern the naive datetime cannot
/// satisfy becomes a fallback instead of a panic.
fn render_date(dt: NaiveDateTime, to: &str) -> Option<String> {
    use std::fmt::Write as _;
    let mut out = String::new();
    write!(out, "{}", dt.format(to)).ok()?;
    Some(out)
}

/// Map through a named lookup table; unmatched keys pass through.
fn lookup(value: &Value, params: &Params, ctx: &mut Context<'_>) -> Result<Value> {
    let table_name = require_str(params, "table", "lookup")?;
    let table = ctx
        .lookup_tables
        .get(&table_name)
        .ok_or_else(|| Error::Transform(format!("unknown lookup table '{table_name}'")))?;
    let key = text(value);
    match table.get(&key) {
        Some(mapped) => Ok(Value::String(mapped.clone())),
        None => Ok(value.clone()),
    }
}

/// Fallback for null or empty-string values; `0` and `false` are kept.
fn default_value(value: &Value, params: &Params, _ctx: &mut Context<'_>) -> Result<Value> {
    let fallback = params
        .get("value")
        .cloned()
        .ok_or_else(|| Error::Transform("default requires a 'value' parameter".to_string()))?;
    if value.is_empty() {
        Ok(fallback)
    } else {
        Ok(value.clone())
    }
}

fn upper(value: &Value, _params: &Params, _ctx: &mut Context<'_>) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::String(text(value).to_uppercase()))
}

fn lower(value: &Value, _params: &Params, _ctx: &mut Context<'_>) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::String(text(value).to_lowercase()))
}

fn trim(value: &Value, _params: &Params, _ctx: &mut Context<'_>) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::String(text(value).trim().to_string()))
}

fn replace(value: &Value, params: &Params, _ctx: &mut Context<'_>) -> Result<Value> {
    let old = require_str(params, "old", "replace")?;
    let new = str_param(params, "new").unwrap_or_default();
    Ok(Value::String(text(value).replace(&old, &new)))
}

/// Split into a list of strings; the only list-producing builtin.
fn split(value: &Value, params: &Params, _ctx: &mut Context<'_>) -> Result<Value> {
    let delimiter = require_str(params, "delimiter", "split")?;
    if delimiter.is_empty() {
        return Err(Error::Transform("split delimiter must be non-empty".to_string()));
    }
    let parts = text(value)
        .split(&delimiter)
        .map(|part| Value::String(part.to_string()))
        .collect();
    Ok(Value::List(parts))
}

/// First regex match, selecting a capture group (default whole match).
/// No match yields null.
fn regex_extract(value: &Value, params: &Params, _ctx: &mut Context<'_>) -> Result<Value> {
    let pattern = require_str(params, "pattern", "regex_extract")?;
    let group = usize_param(params, "group").unwrap_or(0);
    let re = Regex::new(&pattern)
        .map_err(|e| Error::Transform(format!("invalid regex pattern: {e}")))?;
    let input = text(value);
    Ok(re
        .captures(&input)
        .and_then(|caps| caps.get(group))
        .map_or(Value::Null, |m| Value::String(m.as_str().to_string())))
}

/// Arithmetic with a literal operand. Divide by zero and non-numeric
/// input both yield null plus a warning.
fn math_operation(value: &Value, params: &Params, ctx: &mut Context<'_>) -> Result<Value> {
    let operation = require_str(params, "operation", "math_operation")?;
    let operand = params
        .get("operand")
        .and_then(Value::as_f64)
        .ok_or_else(|| Error::Transform("math_operation requires a numeric 'operand'".to_string()))?;

    let Some(number) = value.as_f64() else {
        ctx.warnings.push(format!(
            "math_operation: non-numeric input '{}' yields null",
            text(value)
        ));
        return Ok(Value::Null);
    };

    let result = match operation.as_str() {
        "add" => Some(number + operand),
        "subtract" => Some(number - operand),
        "multiply" => Some(number * operand),
        "divide" => {
            if operand == 0.0 {
                ctx.warnings
                    .push("math_operation: divide by zero yields null".to_string());
                None
            } else {
                Some(number / operand)
            }
        }
        other => {
            return Err(Error::Transform(format!("unknown math operation '{other}'")));
        }
    };
    Ok(result.map_or(Value::Null, Value::Number))
}

/// Two-way branch on a tiny condition spec: `is_empty`, `is_not_empty`,
/// `equals:X`, `contains:X`. Unrecognized specs take the false branch.
fn conditional(value: &Value, params: &Params, _ctx: &mut Context<'_>) -> Result<Value> {
    let condition = require_str(params, "condition", "conditional")?;
    let true_value = params.get("true_value").cloned().unwrap_or(Value::Null);
    let false_value = params.get("false_value").cloned().unwrap_or(Value::Null);

    let holds = if condition == "is_empty" {
        value.is_empty()
    } else if condition == "is_not_empty" {
        !value.is_empty()
    } else if let Some(expected) = condition.strip_prefix("equals:") {
        text(value) == expected
    } else if let Some(needle) = condition.strip_prefix("contains:") {
        text(value).contains(needle)
    } else {
        false
    };

    Ok(if holds { true_value } else { false_value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn call(name: &str, value: Value, params: &[(&str, Value)]) -> (Result<Value>, Vec<String>) {
        let registry = FunctionRegistry::with_builtins();
        let mut tables: LookupTables = IndexMap::new();
        tables.insert(
            "units".to_string(),
            [("PCE".to_string(), "EA".to_string())].into(),
        );
        let mut warnings = Vec::new();
        let params: Params = params
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        let result = {
            let mut ctx = Context {
                lookup_tables: &tables,
                warnings: &mut warnings,
            };
            registry.get(name).expect("builtin")(&value, &params, &mut ctx)
        };
        (result, warnings)
    }

    #[test]
    fn test_concat_skips_empty_inputs() {
        let value = Value::List(vec![
            Value::string("INV"),
            Value::Null,
            Value::String(String::new()),
            Value::string("001"),
        ]);
        let (result, _) = call("concat", value, &[("separator", Value::string("-"))]);
        assert_eq!(result.unwrap(), Value::string("INV-001"));
    }

    #[test]
    fn test_substring_clips_out_of_range() {
        let (result, _) = call(
            "substring",
            Value::string("INVOICE"),
            &[("start", Value::Number(3.0)), ("length", Value::Number(50.0))],
        );
        assert_eq!(result.unwrap(), Value::string("OICE"));

        let (result, _) = call(
            "substring",
            Value::string("ab"),
            &[("start", Value::Number(10.0))],
        );
        assert_eq!(result.unwrap(), Value::string(""));
    }

    #[test]
    fn test_format_date_converts_and_falls_back() {
        let (result, warnings) = call(
            "format_date",
            Value::string("18/01/2024"),
            &[
                ("from_format", Value::string("%d/%m/%Y")),
                ("to_format", Value::string("%Y-%m-%d")),
            ],
        );
        assert_eq!(result.unwrap(), Value::string("2024-01-18"));
        assert!(warnings.is_empty());

        let (result, warnings) = call(
            "format_date",
            Value::string("not a date"),
            &[("from_format", Value::string("%Y-%m-%d"))],
        );
        assert_eq!(result.unwrap(), Value::string("not a date"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_lookup_passes_unmatched_through() {
        let (result, _) = call(
            "lookup",
            Value::string("PCE"),
            &[("table", Value::string("units"))],
        );
        assert_eq!(result.unwrap(), Value::string("EA"));

        let (result, _) = call(
            "lookup",
            Value::string("KGM"),
            &[("table", Value::string("units"))],
        );
        assert_eq!(result.unwrap(), Value::string("KGM"));
    }

    #[test]
    fn test_default_keeps_zero_and_false() {
        let fallback = [("value", Value::string("N/A"))];
        let (result, _) = call("default", Value::Null, &fallback);
        assert_eq!(result.unwrap(), Value::string("N/A"));

        let (result, _) = call("default", Value::Number(0.0), &fallback);
        assert_eq!(result.unwrap(), Value::Number(0.0));

        let (result, _) = call("default", Value::Bool(false), &fallback);
        assert_eq!(result.unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_math_operations() {
        let (result, _) = call(
            "math_operation",
            Value::Number(10.0),
            &[
                ("operation", Value::string("multiply")),
                ("operand", Value::Number(2.5)),
            ],
        );
        assert_eq!(result.unwrap(), Value::Number(25.0));

        let (result, warnings) = call(
            "math_operation",
            Value::Number(10.0),
            &[
                ("operation", Value::string("divide")),
                ("operand", Value::Number(0.0)),
            ],
        );
        assert_eq!(result.unwrap(), Value::Null);
        assert_eq!(warnings.len(), 1);

        let (result, warnings) = call(
            "math_operation",
            Value::string("abc"),
            &[
                ("operation", Value::string("add")),
                ("operand", Value::Number(1.0)),
            ],
        );
        assert_eq!(result.unwrap(), Value::Null);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_regex_extract_group() {
        let (result, _) = call(
            "regex_extract",
            Value::string("INV-2024-001"),
            &[
                ("pattern", Value::string(r"INV-(\d{4})")),
                ("group", Value::Number(1.0)),
            ],
        );
        assert_eq!(result.unwrap(), Value::string("2024"));

        let (result, _) = call(
            "regex_extract",
            Value::string("no match here"),
            &[("pattern", Value::string(r"\d{8}"))],
        );
        assert_eq!(result.unwrap(), Value::Null);
    }

    #[test]
    fn test_split_and_case_and_trim() {
        let (result, _) = call(
            "split",
            Value::string("a,b,c"),
            &[("delimiter", Value::string(","))],
        );
        assert_eq!(
            result.unwrap(),
            Value::List(vec![
                Value::string("a"),
                Value::string("b"),
                Value::string("c")
            ])
        );

        let (result, _) = call("upper", Value::string("inv"), &[]);
        assert_eq!(result.unwrap(), Value::string("INV"));

        let (result, _) = call("trim", Value::string("  x  "), &[]);
        assert_eq!(result.unwrap(), Value::string("x"));
    }

    #[test]
    fn test_conditional_specs() {
        let branches = [
            ("condition", Value::string("equals:IT")),
            ("true_value", Value::string("domestic")),
            ("false_value", Value::string("foreign")),
        ];
        let (result, _) = call("conditional", Value::string("IT"), &branches);
        assert_eq!(result.unwrap(), Value::string("domestic"));

        let (result, _) = call("conditional", Value::string("DE"), &branches);
        assert_eq!(result.unwrap(), Value::string("foreign"));

        let unrecognized = [
            ("condition", Value::string("weird_spec")),
            ("true_value", Value::string("t")),
            ("false_value", Value::string("f")),
        ];
        let (result, _) = call("conditional", Value::string("x"), &unrecognized);
        assert_eq!(result.unwrap(), Value::string("f"));
    }

    #[test]
    fn test_missing_required_param_is_an_error() {
        let (result, _) = call("lookup", Value::string("x"), &[]);
        assert!(matches!(result, Err(Error::Transform(_))));
    }
}
