//! Error type for the translation core

use thiserror::Error;

/// Errors raised while compiling filter or connect inputs.
///
/// Every error aborts the whole compilation; callers never receive a
/// partially built clause.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A node, relationship or field named in the input is not in the schema.
    #[error("unknown {kind} '{name}'")]
    SchemaReference { kind: &'static str, name: String },

    /// An aggregate filter was applied to something that is not a relationship.
    #[error("aggregate filters must be on relationship fields (got '{field}')")]
    SchemaMisuse { field: String },

    /// A value had the wrong shape for the key it was supplied under.
    #[error("'{field}' expects {expected}")]
    ArgumentShape { field: String, expected: &'static str },

    /// A filter key did not match the key grammar.
    #[error("invalid filter key '{key}'")]
    InvalidKey { key: String },

    /// Input nesting went deeper than the configured limit.
    #[error("input nesting exceeds depth limit of {limit}")]
    DepthLimitExceeded { limit: usize },

    /// Schema description could not be loaded or failed validation.
    #[error("schema error: {0}")]
    Schema(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn unknown_node(name: &str) -> Self {
        Error::SchemaReference {
            kind: "node",
            name: name.to_string(),
        }
    }

    pub(crate) fn unknown_relationship(name: &str) -> Self {
        Error::SchemaReference {
            kind: "relationship",
            name: name.to_string(),
        }
    }

    pub(crate) fn unknown_field(name: &str) -> Self {
        Error::SchemaReference {
            kind: "field",
            name: name.to_string(),
        }
    }

    pub(crate) fn shape(field: &str, expected: &'static str) -> Self {
        Error::ArgumentShape {
            field: field.to_string(),
            expected,
        }
    }
}
