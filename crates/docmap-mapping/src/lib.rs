#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # docmap-mapping
//!
//! Declarative field-level mapping between document value trees: the rule
//! model, the transformation function library, the execution engine and
//! the mapping inverter.
//!
//! Execution follows partial-failure semantics: a broken rule is recorded
//! in [`TransformationResult::errors`](engine::TransformationResult) and
//! the remaining rules still run. Only a malformed definition or a missing
//! input tree aborts the whole call.

pub mod engine;
pub mod expr;
pub mod functions;
pub mod invert;
pub mod rules;

pub use engine::{execute, TransformationResult};
pub use functions::FunctionRegistry;
pub use invert::invert;
pub use rules::{MappingDefinition, MappingRule, Transformation};

use thiserror::Error;

/// Errors that can occur during mapping
#[derive(Error, Debug)]
pub enum Error {
    /// The definition itself is unusable (fatal for the whole run).
    #[error("Invalid mapping definition: {0}")]
    Definition(String),

    /// Definition text could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A transformation function rejected its input (per-rule).
    #[error("Transform error: {0}")]
    Transform(String),

    /// A custom expression failed to parse or evaluate (per-rule).
    #[error("Expression error: {0}")]
    Expression(String),
}

pub type Result<T> = std::result::Result<T, Error>;
