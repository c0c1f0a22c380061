pub mod ast;
mod binder;
pub mod plan;
mod rql_parser;

pub use binder::{bind_unit, compile_rql, BindError, BindOutcome};
pub use rql_parser::{parse_rql, SyntaxError};
