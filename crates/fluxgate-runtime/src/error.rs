//! Runtime error types

use thiserror::Error;

/// Errors raised while evaluating compiled programs or calling adapters
/// during a request.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Type error
    #[error("type error: {0}")]
    TypeError(String),

    /// Field not found
    #[error("field not found: {0}")]
    FieldNotFound(String),

    /// Invalid operation
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Division by zero
    #[error("division by zero")]
    DivisionByZero,

    /// External call failed
    #[error("external call failed: {0}")]
    ExternalCallFailed(String),

    /// Credential not available
    #[error("credential unavailable: {0}")]
    CredentialUnavailable(String),

    /// Generic runtime error
    #[error("runtime error: {0}")]
    RuntimeError(String),
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Request-level error taxonomy.
///
/// Everything the pipeline can fail with maps onto one of these variants,
/// and each variant owns its wire status code and caller-visible message.
/// Internal detail is logged, never echoed.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed request body
    #[error("invalid request body")]
    BadRequest,

    /// A validation rule evaluated to false; code and message come from the
    /// rule's configuration
    #[error("{msg}")]
    RuleFailure { code: u16, msg: String },

    /// Expression evaluation or response-build failure at request time
    #[error("internal error: {0}")]
    Internal(String),

    /// Auth token unavailable or another required dependency failed
    #[error("dependency error: {0}")]
    Dependency(String),

    /// Downstream forward failed
    #[error("downstream forward failed: {0}")]
    Gateway(String),

    /// Configuration could not be loaded or compiled (boot/reload only)
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Status code returned to the caller
    pub fn status(&self) -> u16 {
        match self {
            EngineError::BadRequest => 400,
            EngineError::RuleFailure { code, .. } => *code,
            EngineError::Internal(_) | EngineError::Dependency(_) | EngineError::Config(_) => 500,
            EngineError::Gateway(_) => 502,
        }
    }

    /// Message echoed to the caller. Rule failures carry their configured
    /// message; everything else is generic.
    pub fn public_message(&self) -> String {
        match self {
            EngineError::BadRequest => "invalid request body".to_string(),
            EngineError::RuleFailure { msg, .. } => msg.clone(),
            EngineError::Gateway(_) => "bad gateway".to_string(),
            _ => "internal server error".to_string(),
        }
    }
}

impl From<RuntimeError> for EngineError {
    fn from(e: RuntimeError) -> Self {
        EngineError::Internal(e.to_string())
    }
}

impl From<fluxgate_core::CompileError> for EngineError {
    fn from(e: fluxgate_core::CompileError) -> Self {
        EngineError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(EngineError::BadRequest.status(), 400);
        assert_eq!(
            EngineError::RuleFailure {
                code: 422,
                msg: "nope".to_string()
            }
            .status(),
            422
        );
        assert_eq!(EngineError::Internal("boom".to_string()).status(), 500);
        assert_eq!(EngineError::Gateway("down".to_string()).status(), 502);
    }

    #[test]
    fn test_internal_detail_is_not_echoed() {
        let err = EngineError::Internal("secret detail".to_string());
        assert_eq!(err.public_message(), "internal server error");

        let err = EngineError::Gateway("10.0.0.3 refused".to_string());
        assert_eq!(err.public_message(), "bad gateway");
    }

    #[test]
    fn test_rule_failure_message_passthrough() {
        let err = EngineError::RuleFailure {
            code: 400,
            msg: "Invalid amount".to_string(),
        };
        assert_eq!(err.public_message(), "Invalid amount");
    }
}
