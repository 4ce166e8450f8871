//! Compile-time error types

use thiserror::Error;

/// Errors surfaced while parsing or compiling expressions and templates.
///
/// All of these are configuration-time failures: they are reported when a
/// service definition is loaded (or reloaded), never during request
/// processing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Expression could not be parsed
    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    /// Unrecognized operator token
    #[error("invalid operator: {0}")]
    InvalidOperator(String),

    /// Expression references a variable outside the declared scope set
    #[error("unknown variable '{variable}' in expression '{expression}'")]
    UnknownVariable {
        variable: String,
        expression: String,
    },

    /// A `${` marker without a matching `}` in an interpolated template
    #[error("unclosed expression marker in template: {0}")]
    UnclosedMarker(String),
}

/// Result type for compile-time operations
pub type Result<T> = std::result::Result<T, CompileError>;
