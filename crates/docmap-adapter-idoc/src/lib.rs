#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # docmap-adapter-idoc
//!
//! SAP IDOC adapter. Parses positional IDOC flat files against a segment
//! definition (or an auto-detected one), producing a document value tree
//! nested by segment hierarchy, and exports the definition as a schema
//! the mapping engine can target.

/// Segment and field definitions, JSON persistence.
pub mod definition;
/// Positional line parser with hierarchy tracking and auto-detection.
pub mod parser;
/// Definition to schema-tree conversion.
pub mod schema;

pub use definition::{IdocDefinition, IdocField, IdocFieldType, IdocSegment};
pub use parser::{IdocParser, ParsedIdoc};
pub use schema::to_schema;

use thiserror::Error;

/// Errors that can occur when working with IDOC files
#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error reading '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid IDOC definition: {0}")]
    Definition(String),
}

impl Error {
    /// Build an IO error carrying the offending path.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a definition error.
    pub fn definition(message: impl Into<String>) -> Self {
        Self::Definition(message.into())
    }
}

/// Crate-local result type for IDOC operations.
pub type Result<T> = std::result::Result<T, Error>;
