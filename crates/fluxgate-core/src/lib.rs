//! Core types and definitions for the Fluxgate request-processing engine.
//!
//! This crate carries everything the runtime compiles against at
//! configuration-load time:
//!
//! - [`types::Value`]: the JSON-like runtime value model
//! - [`ast`]: expression AST nodes and operators
//! - [`expr`]: the expression parser, compiled [`expr::Program`]s and
//!   `${...}` interpolation [`expr::Template`]s
//! - [`config`]: the serde data model for a declarative service definition
//!
//! Evaluation of compiled programs lives in `fluxgate-runtime`; this crate is
//! deliberately free of async and I/O concerns.

pub mod ast;
pub mod config;
pub mod error;
pub mod expr;
pub mod types;

pub use error::{CompileError, Result};
pub use expr::{Program, Template, TemplateSegment, DEFAULT_SCOPES, QUERY_SCOPES};
pub use types::Value;
