//! Mapping rule model
//!
//! A [`MappingDefinition`] is an ordered list of [`MappingRule`]s plus the
//! named lookup tables they may reference. Rule order is application
//! order; when two rules write the same target path the later rule wins.
//!
//! Definitions load from JSON or YAML. Neither the model nor the engine
//! performs file I/O; callers hand in already-read text.

use docmap_tree::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Parameter bag passed to transformation functions.
pub type Params = IndexMap<String, Value>;

/// Named string-to-string lookup tables.
pub type LookupTables = IndexMap<String, IndexMap<String, String>>;

/// Where a rule reads from
///
/// A bare string is always a path; a non-string literal is a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceSpec {
    /// Single source path.
    Path(String),
    /// Ordered list of source paths for multi-source rules.
    Paths(Vec<String>),
    /// Constant literal used as the resolved value.
    Constant(Value),
}

/// Where a rule writes to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetSpec {
    /// Single target path.
    Path(String),
    /// Multiple target paths (1:N split, zipped or broadcast).
    Paths(Vec<String>),
}

impl TargetSpec {
    /// All target paths in declaration order.
    pub fn paths(&self) -> &[String] {
        match self {
            TargetSpec::Path(path) => std::slice::from_ref(path),
            TargetSpec::Paths(paths) => paths,
        }
    }
}

/// How a resolved source value becomes the target value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transformation {
    /// Pass the resolved value through unchanged.
    Direct,
    /// Apply a named function from the registry.
    Function {
        function: String,
        #[serde(default)]
        params: Params,
    },
    /// Substitute the value into a `{value}` placeholder pattern.
    Template { pattern: String },
    /// Ignore the source and produce a fixed value.
    Constant { value: Value },
    /// Evaluate a constrained expression over `value`.
    Script { body: String },
}

impl Default for Transformation {
    fn default() -> Self {
        Transformation::Direct
    }
}

/// Optional per-rule guard; a false condition skips the rule silently
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Value is present and not the empty string.
    Exists,
    /// Stringified value equals the given text.
    Equals { value: String },
    /// Stringified value contains the given text.
    Contains { value: String },
    /// Numeric value is strictly greater; non-numeric input is false.
    GreaterThan { value: f64 },
    /// Stringified value matches the pattern (anchored at the start).
    Regex { pattern: String },
    /// Constrained expression over `value` (see [`crate::expr`]).
    Custom { expression: String },
}

/// Policy for reconciling a list-shaped value with a scalar target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardinalityPolicy {
    #[default]
    Direct,
    First,
    Last,
    /// Join elements with `,`.
    Join,
    /// Sum numeric elements; non-numeric elements are skipped.
    Sum,
    /// Element count.
    Count,
}

/// Single declarative mapping rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRule {
    pub id: String,

    pub source: SourceSpec,

    pub target: TargetSpec,

    #[serde(default)]
    pub transformation: Transformation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,

    #[serde(default)]
    pub cardinality_handling: CardinalityPolicy,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl MappingRule {
    /// Direct rule from a source path to a target path.
    pub fn direct(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: SourceSpec::Path(source.into()),
            target: TargetSpec::Path(target.into()),
            transformation: Transformation::Direct,
            condition: None,
            cardinality_handling: CardinalityPolicy::Direct,
            enabled: true,
        }
    }
}

/// A complete mapping definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingDefinition {
    pub name: String,

    /// Name of the input schema (reference, not an embedded copy).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<String>,

    /// Name of the output schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<String>,

    /// Rules in application order.
    pub rules: Vec<MappingRule>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub lookup_tables: LookupTables,
}

impl MappingDefinition {
    /// Empty definition with a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_schema: None,
            output_schema: None,
            rules: Vec::new(),
            lookup_tables: IndexMap::new(),
        }
    }

    /// Parse a definition from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Parse(e.to_string()))
    }

    /// Parse a definition from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when the YAML is malformed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Parse(e.to_string()))
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Parse(e.to_string()))
    }

    /// Serialize to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_definition() {
        let json = r#"{
          "name": "invoice_mapping",
          "input_schema": "SupplierInvoice",
          "output_schema": "UBL-Invoice",
          "rules": [
            {
              "id": "rule_001",
              "source": "invoice.number",
              "target": "Invoice.ID"
            },
            {
              "id": "rule_002",
              "source": "invoice.date",
              "target": "Invoice.IssueDate",
              "transformation": {
                "type": "function",
                "function": "format_date",
                "params": {"from_format": "%d/%m/%Y", "to_format": "%Y-%m-%d"}
              }
            },
            {
              "id": "rule_003",
              "source": ["first", "last"],
              "target": "FullName",
              "transformation": {"type": "function", "function": "concat",
                                "params": {"separator": " "}},
              "condition": {"type": "exists"},
              "cardinality_handling": "join",
              "enabled": false
            }
          ]
        }"#;

        let mapping = MappingDefinition::from_json(json).unwrap();
        assert_eq!(mapping.name, "invoice_mapping");
        assert_eq!(mapping.rules.len(), 3);

        let first = &mapping.rules[0];
        assert_eq!(first.source, SourceSpec::Path("invoice.number".into()));
        assert_eq!(first.transformation, Transformation::Direct);
        assert!(first.enabled);

        match &mapping.rules[1].transformation {
            Transformation::Function { function, params } => {
                assert_eq!(function, "format_date");
                assert_eq!(
                    params.get("to_format"),
                    Some(&Value::String("%Y-%m-%d".into()))
                );
            }
            other => panic!("expected function transformation, got {other:?}"),
        }

        let third = &mapping.rules[2];
        assert_eq!(
            third.source,
            SourceSpec::Paths(vec!["first".into(), "last".into()])
        );
        assert_eq!(third.condition, Some(Condition::Exists));
        assert_eq!(third.cardinality_handling, CardinalityPolicy::Join);
        assert!(!third.enabled);
    }

    #[test]
    fn test_parse_yaml_definition() {
        let yaml = r"
name: orders
rules:
  - id: r1
    source: order.ref
    target: Order.ID
  - id: r2
    source: 42
    target: Order.Version
    transformation:
      type: template
      pattern: 'v{value}'
";
        let mapping = MappingDefinition::from_yaml(yaml).unwrap();
        assert_eq!(mapping.rules.len(), 2);
        assert_eq!(
            mapping.rules[1].source,
            SourceSpec::Constant(Value::Number(42.0))
        );
        assert_eq!(
            mapping.rules[1].transformation,
            Transformation::Template {
                pattern: "v{value}".into()
            }
        );
    }

    #[test]
    fn test_json_roundtrip_preserves_rule_order() {
        let mut mapping = MappingDefinition::new("roundtrip");
        mapping.rules.push(MappingRule::direct("b", "x", "Y"));
        mapping.rules.push(MappingRule::direct("a", "y", "Z"));
        mapping
            .lookup_tables
            .insert("units".into(), [("PCE".to_string(), "EA".to_string())].into());

        let json = mapping.to_json().unwrap();
        let back = MappingDefinition::from_json(&json).unwrap();
        assert_eq!(back, mapping);
        assert_eq!(back.rules[0].id, "b");
    }

    #[test]
    fn test_bad_input_is_a_parse_error() {
        assert!(matches!(
            MappingDefinition::from_json("{"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            MappingDefinition::from_yaml(": :"),
            Err(Error::Parse(_))
        ));
    }
}
