//! Parser module - filter key grammar and operator table

pub mod operators;
mod field_key;

pub use field_key::{parse_field_key, FieldKey};
pub use operators::Operator;
