#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # docmap-schema
//!
//! Unified schema model shared by every format parser, plus the parsers
//! that produce it from XSD, JSON Schema, sample XML instances, and CSV
//! metadata files.
//!
//! A [`Schema`] is built once per parse and is immutable afterwards; there
//! is no process-wide schema cache. Child-field order inside a
//! [`SchemaField`] is the order declared by the source schema. For
//! XSD-derived schemas that order drives XML serialization and must never
//! be rearranged.

/// CSV-with-business-metadata schema parser.
pub mod csv_meta;
/// JSON Schema parser.
pub mod json_schema;
/// Unified schema model types.
pub mod model;
/// Schema inference from a sample XML instance.
pub mod sample_xml;
/// XSD parser with import resolution and declared-order extraction.
pub mod xsd;

mod dom;

pub use model::{Cardinality, FieldType, Schema, SchemaField};

use thiserror::Error;

/// Errors that can occur while parsing schema sources
#[derive(Error, Debug)]
pub enum Error {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Malformed schema source: {0}")]
    Malformed(String),

    #[error("Schema invariant violated: {0}")]
    Invariant(String),
}

impl Error {
    /// Build a malformed-source error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Build an I/O error with path context.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Crate-local result type for schema operations.
pub type Result<T> = std::result::Result<T, Error>;
