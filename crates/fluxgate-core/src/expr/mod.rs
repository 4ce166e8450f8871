//! The embedded expression language
//!
//! Expressions are compiled once, at configuration-load time, into
//! [`Program`]s; templates with `${...}` markers are compiled into
//! [`Template`]s. Both are immutable and safe to evaluate concurrently.

mod parser;
mod program;

pub use parser::ExpressionParser;
pub use program::{Program, Template, TemplateSegment, DEFAULT_SCOPES, QUERY_SCOPES};
