//! Mapping execution engine
//!
//! Applies a [`MappingDefinition`] to an input value tree and produces a
//! [`TransformationResult`]. Rules run in declared order; a failing rule
//! is recorded and skipped, never fatal. Later rules overwrite earlier
//! writes to the same target path.

use docmap_tree::{resolve, set, Value};
use tracing::debug;

use crate::expr;
use crate::functions::{text, Context, FunctionRegistry};
use crate::rules::{
    CardinalityPolicy, Condition, MappingDefinition, MappingRule, SourceSpec, Transformation,
};
use crate::{Error, Result};

/// A recorded per-rule failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleError {
    pub rule_id: String,
    pub message: String,
}

/// Outcome of one mapping execution
///
/// `errors` and `warnings` accompany a possibly partial `output_tree`;
/// callers are expected to surface them, not swallow them.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformationResult {
    pub output_tree: Value,
    pub errors: Vec<RuleError>,
    pub warnings: Vec<String>,
}

impl TransformationResult {
    /// Whether every enabled rule applied cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Engine bound to a function registry
///
/// The engine holds no per-execution state; one instance may serve any
/// number of concurrent `execute` calls.
pub struct Engine {
    registry: FunctionRegistry,
}

impl Engine {
    /// Engine with the built-in function library.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: FunctionRegistry::with_builtins(),
        }
    }

    /// Engine with a caller-supplied registry.
    #[must_use]
    pub fn with_registry(registry: FunctionRegistry) -> Self {
        Self { registry }
    }

    /// Execute a mapping against an input tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Definition`] only for structural failures: a null
    /// input tree or a definition with no rules. Per-rule failures land
    /// in [`TransformationResult::errors`].
    pub fn execute(
        &self,
        input: &Value,
        mapping: &MappingDefinition,
    ) -> Result<TransformationResult> {
        if input.is_null() {
            return Err(Error::Definition("input tree is missing".to_string()));
        }
        if mapping.rules.is_empty() {
            return Err(Error::Definition(format!(
                "mapping '{}' has no rules",
                mapping.name
            )));
        }

        let mut output = Value::object();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for rule in &mapping.rules {
            if !rule.enabled {
                debug!(rule = %rule.id, "rule disabled, skipping");
                continue;
            }
            if let Err(error) = self.apply_rule(input, &mut output, rule, mapping, &mut warnings) {
                debug!(rule = %rule.id, %error, "rule failed");
                errors.push(RuleError {
                    rule_id: rule.id.clone(),
                    message: error.to_string(),
                });
            }
        }

        Ok(TransformationResult {
            output_tree: output,
            errors,
            warnings,
        })
    }

    fn apply_rule(
        &self,
        input: &Value,
        output: &mut Value,
        rule: &MappingRule,
        mapping: &MappingDefinition,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        let resolved = resolve_source(input, &rule.source);

        if let Some(condition) = &rule.condition {
            if !evaluate_condition(condition, &resolved)? {
                debug!(rule = %rule.id, "condition false, skipping");
                return Ok(());
            }
        }

        let transformed = self.apply_transformation(&resolved, rule, mapping, warnings)?;
        let reduced = reconcile_cardinality(transformed, rule.cardinality_handling);
        write_targets(output, rule, reduced)
    }

    fn apply_transformation(
        &self,
        value: &Value,
        rule: &MappingRule,
        mapping: &MappingDefinition,
        warnings: &mut Vec<String>,
    ) -> Result<Value> {
        match &rule.transformation {
            Transformation::Direct => Ok(value.clone()),
            Transformation::Function { function, params } => {
                let handler = self
                    .registry
                    .get(function)
                    .ok_or_else(|| Error::Transform(format!("unknown function '{function}'")))?;
                let mut ctx = Context {
                    lookup_tables: &mapping.lookup_tables,
                    warnings,
                };
                handler(value, params, &mut ctx)
            }
            Transformation::Template { pattern } => {
                Ok(Value::String(pattern.replace("{value}", &text(value))))
            }
            Transformation::Constant { value: constant } => Ok(constant.clone()),
            Transformation::Script { body } => expr::eval(body, value),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Execute a mapping with the built-in function library.
///
/// # Errors
///
/// See [`Engine::execute`].
pub fn execute(input: &Value, mapping: &MappingDefinition) -> Result<TransformationResult> {
    Engine::new().execute(input, mapping)
}

fn resolve_source(input: &Value, source: &SourceSpec) -> Value {
    match source {
        SourceSpec::Path(path) => resolve(input, path),
        SourceSpec::Paths(paths) => {
            Value::List(paths.iter().map(|path| resolve(input, path)).collect())
        }
        SourceSpec::Constant(constant) => constant.clone(),
    }
}

fn evaluate_condition(condition: &Condition, value: &Value) -> Result<bool> {
    match condition {
        Condition::Exists => Ok(!value.is_empty()),
        Condition::Equals { value: expected } => Ok(text(value) == *expected),
        Condition::Contains { value: needle } => Ok(text(value).contains(needle.as_str())),
        Condition::GreaterThan { value: threshold } => {
            Ok(value.as_f64().is_some_and(|n| n > *threshold))
        }
        Condition::Regex { pattern } => {
            let anchored = if pattern.starts_with('^') {
                pattern.clone()
            } else {
                format!("^{pattern}")
            };
            let re = regex::Regex::new(&anchored)
                .map_err(|e| Error::Transform(format!("invalid condition pattern: {e}")))?;
            Ok(re.is_match(&text(value)))
        }
        Condition::Custom { expression } => expr::eval_bool(expression, value),
    }
}

/// Reduce a list-shaped value per the rule's policy. Non-list values
/// pass through untouched under every policy.
fn reconcile_cardinality(value: Value, policy: CardinalityPolicy) -> Value {
    let Value::List(items) = value else {
        return value;
    };
    match policy {
        CardinalityPolicy::Direct => Value::List(items),
        CardinalityPolicy::First => items.into_iter().next().unwrap_or(Value::Null),
        CardinalityPolicy::Last => items.into_iter().next_back().unwrap_or(Value::Null),
        CardinalityPolicy::Join => {
            let joined = items.iter().map(text).collect::<Vec<_>>().join(",");
            Value::String(joined)
        }
        CardinalityPolicy::Sum => {
            let total = items.iter().filter_map(Value::as_f64).sum();
            Value::Number(total)
        }
        CardinalityPolicy::Count => {
            #[allow(clippy::cast_precision_loss)]
            Value::Number(items.len() as f64)
        }
    }
}

fn write_targets(output: &mut Value, rule: &MappingRule, value: Value) -> Result<()> {
    let targets = rule.target.paths();
    let write = |output: &mut Value, path: &str, value: Value| {
        set(output, path, value).map_err(|e| Error::Transform(e.to_string()))
    };

    if targets.len() == 1 {
        return write(output, &targets[0], value);
    }

    match value {
        Value::List(items) if items.len() == targets.len() => {
            for (path, item) in targets.iter().zip(items) {
                write(output, path, item)?;
            }
            Ok(())
        }
        Value::List(items) => Err(Error::Transform(format!(
            "cannot distribute {} values across {} targets",
            items.len(),
            targets.len()
        ))),
        scalar => {
            for path in targets {
                write(output, path, scalar.clone())?;
            }
            Ok(())
        }
    }
}
