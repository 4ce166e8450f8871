//! Expression evaluation
//!
//! Evaluates compiled [`Program`]s and [`Template`]s against an
//! [`ExecutionContext`]. Evaluation is a pure function of the program and
//! the context: it never mutates the context and is safe to run from any
//! number of concurrent requests.

mod functions;
mod operators;

use crate::context::ExecutionContext;
use crate::error::{Result, RuntimeError};
use fluxgate_core::ast::{Expression, Operator};
use fluxgate_core::{Program, Template, TemplateSegment, Value};

/// Evaluate a program to a value. The empty program yields `Null`.
pub fn evaluate_value(program: &Program, ctx: &ExecutionContext) -> Result<Value> {
    match program.expr() {
        Some(expr) => eval_expr(expr, ctx),
        None => Ok(Value::Null),
    }
}

/// Evaluate a program to a boolean. The empty program yields `true`; any
/// non-boolean result is a type error.
pub fn evaluate_bool(program: &Program, ctx: &ExecutionContext) -> Result<bool> {
    let Some(expr) = program.expr() else {
        return Ok(true);
    };

    match eval_expr(expr, ctx)? {
        Value::Bool(b) => Ok(b),
        other => Err(RuntimeError::TypeError(format!(
            "expression '{}' evaluated to {}, expected bool",
            program.source(),
            other.type_name()
        ))),
    }
}

/// Evaluate a template to a value.
///
/// A literal template passes through as a string; a template that is exactly
/// one `${expr}` preserves the expression's type; mixed templates render to
/// a concatenated string.
pub fn render_template(template: &Template, ctx: &ExecutionContext) -> Result<Value> {
    if let Some(program) = template.single_expression() {
        return evaluate_value(program, ctx);
    }

    Ok(Value::String(template_to_string(template, ctx)?))
}

/// Render a template to a string, concatenating all segments
pub fn template_to_string(template: &Template, ctx: &ExecutionContext) -> Result<String> {
    let mut out = String::new();
    for segment in template.segments() {
        match segment {
            TemplateSegment::Literal(s) => out.push_str(s),
            TemplateSegment::Expr(p) => out.push_str(&evaluate_value(p, ctx)?.render()),
        }
    }
    Ok(out)
}

fn eval_expr(expr: &Expression, ctx: &ExecutionContext) -> Result<Value> {
    match expr {
        Expression::Literal(value) => Ok(value.clone()),

        Expression::FieldAccess(path) => ctx.load_field(path),

        Expression::Binary { left, op, right } => match op {
            // Logical operators short-circuit; Null propagates
            Operator::And => match eval_expr(left, ctx)? {
                Value::Null => Ok(Value::Null),
                Value::Bool(false) => Ok(Value::Bool(false)),
                Value::Bool(true) => operators::execute_binary_op(
                    &Value::Bool(true),
                    op,
                    &eval_expr(right, ctx)?,
                ),
                other => Err(RuntimeError::TypeError(format!(
                    "left operand of && is {}, expected bool",
                    other.type_name()
                ))),
            },
            Operator::Or => match eval_expr(left, ctx)? {
                Value::Null => Ok(Value::Null),
                Value::Bool(true) => Ok(Value::Bool(true)),
                Value::Bool(false) => operators::execute_binary_op(
                    &Value::Bool(false),
                    op,
                    &eval_expr(right, ctx)?,
                ),
                other => Err(RuntimeError::TypeError(format!(
                    "left operand of || is {}, expected bool",
                    other.type_name()
                ))),
            },
            _ => {
                let l = eval_expr(left, ctx)?;
                let r = eval_expr(right, ctx)?;
                operators::execute_binary_op(&l, op, &r)
            }
        },

        Expression::Unary { op, operand } => {
            let value = eval_expr(operand, ctx)?;
            operators::execute_unary_op(*op, &value)
        }

        Expression::FunctionCall { name, args } => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(eval_expr(arg, ctx)?);
            }
            functions::call(name, &evaluated)
        }

        Expression::Ternary {
            condition,
            true_expr,
            false_expr,
        } => match eval_expr(condition, ctx)? {
            Value::Bool(true) => eval_expr(true_expr, ctx),
            Value::Bool(false) => eval_expr(false_expr, ctx),
            other => Err(RuntimeError::TypeError(format!(
                "ternary condition evaluated to {}, expected bool",
                other.type_name()
            ))),
        },
    }
}
