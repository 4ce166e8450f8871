//! Transformation rules
//!
//! A transformation evaluates a condition and writes a computed value into
//! the request's `vars` scope. Exactly one of `value`/`else_value` is
//! evaluated per invocation; a false condition with no else leaves `vars`
//! untouched.

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::eval;
use fluxgate_core::config::TransformationRuleConfig;
use fluxgate_core::{CompileError, Program, Value};

/// Outcome of evaluating one transformation rule
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    /// False when the condition failed and no else branch exists
    pub applied: bool,
    /// Key inside `vars` to write to
    pub target: String,
    /// The computed value (only meaningful when `applied`)
    pub value: Value,
}

/// A transformation rule compiled into a snapshot
#[derive(Debug, Clone)]
pub struct CompiledTransformation {
    pub name: String,
    condition: Program,
    value: Program,
    else_value: Option<Program>,
    target: String,
}

impl CompiledTransformation {
    /// Compile a configured rule; the target must live under `vars.`
    pub fn compile(
        config: &TransformationRuleConfig,
        scopes: &[&str],
    ) -> std::result::Result<Self, CompileError> {
        let target = config
            .target
            .strip_prefix("vars.")
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| {
                CompileError::InvalidExpression(format!(
                    "transformation '{}' target must be vars.<name>, got '{}'",
                    config.name, config.target
                ))
            })?;

        Ok(Self {
            name: config.name.clone(),
            condition: Program::compile(&config.condition, scopes)?,
            value: Program::compile(&config.value, scopes)?,
            else_value: config
                .else_value
                .as_deref()
                .map(|e| Program::compile(e, scopes))
                .transpose()?,
            target: target.to_string(),
        })
    }

    /// Evaluate the rule against the context. Does not write to `vars`; the
    /// pipeline applies the outcome so the context stays borrow-free here.
    pub fn execute(&self, ctx: &ExecutionContext) -> Result<TransformOutcome> {
        let matched = eval::evaluate_bool(&self.condition, ctx)?;

        let program = if matched {
            Some(&self.value)
        } else {
            self.else_value.as_ref()
        };

        match program {
            Some(p) => Ok(TransformOutcome {
                applied: true,
                target: self.target.clone(),
                value: eval::evaluate_value(p, ctx)?,
            }),
            None => Ok(TransformOutcome {
                applied: false,
                target: self.target.clone(),
                value: Value::Null,
            }),
        }
    }
}

/// Run all transformations in declared order, writing applied values into
/// `vars`
pub fn run_transformations(
    rules: &[CompiledTransformation],
    ctx: &mut ExecutionContext,
) -> Result<()> {
    for rule in rules {
        let outcome = rule.execute(ctx)?;
        if outcome.applied {
            tracing::debug!(rule = %rule.name, target = %outcome.target, "transformation applied");
            ctx.vars.insert(outcome.target, outcome.value);
        } else {
            tracing::debug!(rule = %rule.name, "transformation skipped");
        }
    }
    Ok(())
}
