//! Compiles GraphQL-style filter and connect inputs into parameterized Cypher

pub mod config;
pub mod error;
pub mod parser;
pub mod schema;
pub mod translate;

pub use error::{Error, Result};
pub use schema::Schema;
pub use translate::{ConnectArgs, ConnectBuilder, Context, Params, WhereCompiler};
