#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # docmap-tree
//!
//! Document Value Tree: the runtime data instance of one parsed document,
//! independent of any schema.
//!
//! A node is either a scalar (string, number, bool, null), an ordered list
//! of nodes, or an object mapping field names to nodes. Nodes are addressed
//! by dotted (`invoice.number`) or slash (`/Invoice/cbc:ID`) paths shared
//! with the schema model. Path resolution is lenient: an unresolved path
//! yields null, never an error.

/// Path grammar, resolution, and path-addressed writes.
pub mod path;
/// The value tree node type and scalar coercions.
pub mod value;

pub use path::{resolve, set, split_path};
pub use value::Value;

use thiserror::Error;

/// Errors that can occur when working with value trees
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

impl Error {
    /// Build an invalid-path error with input path and reason.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Crate-local result type for value tree operations.
pub type Result<T> = std::result::Result<T, Error>;
