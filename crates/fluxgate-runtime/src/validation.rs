//! Validation rules
//!
//! A validation rule is a boolean expression with a configured failure
//! response. A false result always yields exactly the configured code and
//! message, independent of any other rule; an evaluation error is an
//! internal error instead.

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::eval;
use fluxgate_core::config::ValidationRuleConfig;
use fluxgate_core::{CompileError, Program};

/// A validation rule compiled into a snapshot
#[derive(Debug, Clone)]
pub struct CompiledValidation {
    pub id: String,
    program: Program,
    code: u16,
    msg: String,
}

impl CompiledValidation {
    /// Compile a configured rule against the default scope set
    pub fn compile(config: &ValidationRuleConfig, scopes: &[&str]) -> Result<Self, CompileError> {
        Ok(Self {
            id: config.id.clone(),
            program: Program::compile(&config.expression, scopes)?,
            code: config.on_fail.code,
            msg: config.on_fail.msg.clone(),
        })
    }

    /// Evaluate the rule; returns the configured failure when the expression
    /// is false.
    pub fn check(&self, ctx: &ExecutionContext) -> Result<(), EngineError> {
        let passed = eval::evaluate_bool(&self.program, ctx).map_err(|e| {
            tracing::error!(rule = %self.id, error = %e, "validation expression failed to evaluate");
            EngineError::Internal(format!("validation '{}': {}", self.id, e))
        })?;

        if passed {
            Ok(())
        } else {
            tracing::debug!(rule = %self.id, code = self.code, "validation rejected request");
            Err(EngineError::RuleFailure {
                code: self.code,
                msg: self.msg.clone(),
            })
        }
    }
}

/// Run a validation phase; the first failing rule short-circuits
pub fn run_validations(
    rules: &[CompiledValidation],
    ctx: &ExecutionContext,
) -> Result<(), EngineError> {
    for rule in rules {
        rule.check(ctx)?;
    }
    Ok(())
}
