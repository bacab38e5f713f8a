//! Mapping inverter
//!
//! Produces the reverse mapping of a definition: schemas swapped,
//! every rule's source and target swapped, and each transformation
//! replaced by its inverse where one exists. Classification is a fixed
//! table, not inferred: anything that discards information downgrades
//! to `Direct` with a warning naming the lossy rule. The inverter never
//! fails; the worst case is an all-`Direct` mapping with full warnings.

use docmap_tree::Value;
use tracing::debug;

use crate::rules::{
    MappingDefinition, MappingRule, Params, SourceSpec, TargetSpec, Transformation,
};

/// One lossy-inversion notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InversionWarning {
    pub rule_id: String,
    pub source: String,
    pub target: String,
    pub reason: String,
}

/// Invert a mapping definition.
#[must_use]
pub fn invert(mapping: &MappingDefinition) -> (MappingDefinition, Vec<InversionWarning>) {
    let mut warnings = Vec::new();
    let mut inverted = MappingDefinition::new(format!("{}_reversed", mapping.name));
    inverted.input_schema = mapping.output_schema.clone();
    inverted.output_schema = mapping.input_schema.clone();
    inverted.lookup_tables = mapping.lookup_tables.clone();

    for rule in &mapping.rules {
        match invert_rule(rule, &mut warnings) {
            Some(reversed) => inverted.rules.push(reversed),
            None => debug!(rule = %rule.id, "rule dropped during inversion"),
        }
    }

    (inverted, warnings)
}

fn invert_rule(rule: &MappingRule, warnings: &mut Vec<InversionWarning>) -> Option<MappingRule> {
    let new_source = match &rule.target {
        TargetSpec::Path(path) => SourceSpec::Path(path.clone()),
        TargetSpec::Paths(paths) => SourceSpec::Paths(paths.clone()),
    };
    let new_target = match &rule.source {
        SourceSpec::Path(path) => TargetSpec::Path(path.clone()),
        SourceSpec::Paths(paths) => TargetSpec::Paths(paths.clone()),
        SourceSpec::Constant(_) => {
            warn_lossy(warnings, rule, "constant source has no inverse, rule dropped");
            return None;
        }
    };

    let transformation = invert_transformation(rule, warnings);

    Some(MappingRule {
        id: format!("{}_rev", rule.id),
        source: new_source,
        target: new_target,
        transformation,
        // conditions guard on source values; after the swap they apply to
        // the former target, which is the value now being read
        condition: rule.condition.clone(),
        cardinality_handling: rule.cardinality_handling,
        enabled: rule.enabled,
    })
}

fn invert_transformation(
    rule: &MappingRule,
    warnings: &mut Vec<InversionWarning>,
) -> Transformation {
    match &rule.transformation {
        Transformation::Direct => Transformation::Direct,
        Transformation::Function { function, params } => {
            invert_function(rule, function, params, warnings)
        }
        Transformation::Template { .. } => {
            warn_lossy(warnings, rule, "template substitution is not invertible");
            Transformation::Direct
        }
        Transformation::Constant { .. } => {
            warn_lossy(warnings, rule, "constant transformation is not invertible");
            Transformation::Direct
        }
        Transformation::Script { .. } => {
            warn_lossy(warnings, rule, "script transformation is not invertible");
            Transformation::Direct
        }
    }
}

fn invert_function(
    rule: &MappingRule,
    function: &str,
    params: &Params,
    warnings: &mut Vec<InversionWarning>,
) -> Transformation {
    match function {
        "concat" => {
            let separator = params
                .get("separator")
                .and_then(Value::as_string)
                .unwrap_or_default();
            if separator.is_empty() {
                warn_lossy(
                    warnings,
                    rule,
                    "concat without a separator cannot be split back",
                );
                return Transformation::Direct;
            }
            Transformation::Function {
                function: "split".to_string(),
                params: [("delimiter".to_string(), Value::String(separator))].into(),
            }
        }
        "format_date" => {
            let from = params.get("from_format").cloned();
            let to = params.get("to_format").cloned();
            let mut swapped = Params::new();
            if let Some(to) = to {
                swapped.insert("from_format".to_string(), to);
            }
            if let Some(from) = from {
                swapped.insert("to_format".to_string(), from);
            }
            Transformation::Function {
                function: "format_date".to_string(),
                params: swapped,
            }
        }
        "math_operation" => {
            let operation = params
                .get("operation")
                .and_then(Value::as_string)
                .unwrap_or_default();
            let operand = params.get("operand").and_then(Value::as_f64);

            let inverse = match (operation.as_str(), operand) {
                ("add", Some(_)) => Some("subtract"),
                ("subtract", Some(_)) => Some("add"),
                ("multiply", Some(n)) if n != 0.0 => Some("divide"),
                ("divide", Some(n)) if n != 0.0 => Some("multiply"),
                _ => None,
            };
            match (inverse, operand) {
                (Some(inverse), Some(operand)) => Transformation::Function {
                    function: "math_operation".to_string(),
                    params: [
                        ("operation".to_string(), Value::string(inverse)),
                        ("operand".to_string(), Value::Number(operand)),
                    ]
                    .into(),
                },
                _ => {
                    warn_lossy(
                        warnings,
                        rule,
                        "math operation has no algebraic inverse for its operand",
                    );
                    Transformation::Direct
                }
            }
        }
        lossy @ ("trim" | "upper" | "lower" | "substring" | "lookup" | "default" | "replace"
        | "split" | "regex_extract" | "conditional") => {
            warn_lossy(
                warnings,
                rule,
                &format!("'{lossy}' discards information and cannot be inverted"),
            );
            Transformation::Direct
        }
        unknown => {
            warn_lossy(
                warnings,
                rule,
                &format!("unknown function '{unknown}' cannot be inverted"),
            );
            Transformation::Direct
        }
    }
}

fn warn_lossy(warnings: &mut Vec<InversionWarning>, rule: &MappingRule, reason: &str) {
    warnings.push(InversionWarning {
        rule_id: rule.id.clone(),
        source: describe(&rule.source),
        target: rule.target.paths().join(", "),
        reason: reason.to_string(),
    });
}

fn describe(source: &SourceSpec) -> String {
    match source {
        SourceSpec::Path(path) => path.clone(),
        SourceSpec::Paths(paths) => paths.join(", "),
        SourceSpec::Constant(value) => format!("constant {value:?}"),
    }
}
