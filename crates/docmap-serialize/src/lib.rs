#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # docmap-serialize
//!
//! Schema-driven serializers for the document value tree.
//!
//! The XML serializer is the reason this crate exists: strict
//! XML-Schema-validated formats (UBL, FatturaPA) reject documents whose
//! sibling elements appear out of declared order, so object nodes are
//! reordered against the target [`Schema`](docmap_schema::Schema) before
//! a single bottom-up writer pass emits the bytes. JSON, CSV and
//! fixed-width writers share the same tree input.

/// Schema-ordered reordering of object nodes.
pub mod order;
/// XML reader and schema-ordered writer.
pub mod xml;
/// JSON rendering of value trees.
pub mod json;
/// CSV rendering of record-shaped trees.
pub mod csv;
/// Fixed-width flat-file rendering (IDOC style).
pub mod flat;

pub use order::reorder;
pub use xml::{from_xml, XmlSerializer};

use thiserror::Error;

/// Serializer output: the rendered text plus non-fatal warnings.
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub text: String,
    pub warnings: Vec<String>,
}

/// Errors that can occur during serialization
#[derive(Error, Debug)]
pub enum Error {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("write error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot serialize: {0}")]
    Shape(String),
}

impl Error {
    /// Build a shape error for tree structures the format cannot express.
    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }
}

/// Crate-local result type for serializer operations.
pub type Result<T> = std::result::Result<T, Error>;
