//! Schema module - the entity graph model filters are compiled against

mod types;
pub mod loader;
mod validator;

pub use types::*;
pub use loader::{load_schema, parse_schema, create_default_schema};
pub use validator::{validate_schema, Severity, ValidationError};
