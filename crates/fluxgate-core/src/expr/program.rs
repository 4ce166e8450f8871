//! Compiled programs and interpolation templates
//!
//! A [`Program`] is the result of compiling one textual expression against a
//! fixed declared-scope set. A [`Template`] is a string with zero or more
//! `${...}` markers, each compiled into a `Program`. Both are immutable and
//! evaluated concurrently by many requests.

use super::parser::ExpressionParser;
use crate::ast::Expression;
use crate::error::{CompileError, Result};

/// Scope names available to every pipeline expression.
///
/// These names are part of the configuration contract; renaming any of them
/// breaks existing service definitions.
pub const DEFAULT_SCOPES: &[&str] = &["input", "vars", "env", "detection", "auth", "header"];

/// Scope names for the schema-query collaborator, which additionally binds
/// `args` and `source`.
pub const QUERY_SCOPES: &[&str] = &[
    "input",
    "vars",
    "env",
    "detection",
    "auth",
    "header",
    "args",
    "source",
];

/// A compiled expression, ready for repeated evaluation.
///
/// An empty source string compiles into a no-op program: boolean evaluation
/// yields `true` and value evaluation yields `Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    source: String,
    expr: Option<Expression>,
}

impl Program {
    /// Compile an expression against a declared scope set.
    ///
    /// Unknown top-level variables fail compilation; nested fields below a
    /// known scope are only checked at evaluation time.
    pub fn compile(source: &str, scopes: &[&str]) -> Result<Self> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Ok(Self {
                source: String::new(),
                expr: None,
            });
        }

        let expr = ExpressionParser::parse(trimmed)?;
        check_scopes(&expr, scopes, trimmed)?;

        Ok(Self {
            source: trimmed.to_string(),
            expr: Some(expr),
        })
    }

    /// The original expression text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// True for the no-op program compiled from an empty expression
    pub fn is_empty(&self) -> bool {
        self.expr.is_none()
    }

    /// The compiled AST, if any
    pub fn expr(&self) -> Option<&Expression> {
        self.expr.as_ref()
    }
}

/// One segment of an interpolated template
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSegment {
    /// Literal text, passed through unchanged
    Literal(String),
    /// A compiled `${...}` expression
    Expr(Program),
}

/// A compiled interpolation template.
///
/// Strings without `${` markers pass through as literals. A template that is
/// exactly one `${expr}` preserves the expression's value type; mixed
/// templates render each segment to a string and concatenate.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    segments: Vec<TemplateSegment>,
}

impl Template {
    /// Compile a template string against a declared scope set
    pub fn compile(source: &str, scopes: &[&str]) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("${") {
            if start > 0 {
                segments.push(TemplateSegment::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| CompileError::UnclosedMarker(source.to_string()))?;
            let program = Program::compile(&after[..end], scopes)?;
            segments.push(TemplateSegment::Expr(program));
            rest = &after[end + 1..];
        }

        if !rest.is_empty() {
            segments.push(TemplateSegment::Literal(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// True if the string contains interpolation markers
    pub fn has_markers(source: &str) -> bool {
        source.contains("${")
    }

    /// The original template text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The compiled segments
    pub fn segments(&self) -> &[TemplateSegment] {
        &self.segments
    }

    /// True if the template contains no expressions
    pub fn is_literal(&self) -> bool {
        !self
            .segments
            .iter()
            .any(|s| matches!(s, TemplateSegment::Expr(_)))
    }

    /// Returns the single program when the whole template is one `${expr}`
    pub fn single_expression(&self) -> Option<&Program> {
        match self.segments.as_slice() {
            [TemplateSegment::Expr(p)] => Some(p),
            _ => None,
        }
    }
}

/// Reject expressions whose top-level variables are not declared
fn check_scopes(expr: &Expression, scopes: &[&str], source: &str) -> Result<()> {
    match expr {
        Expression::Literal(_) => Ok(()),
        Expression::FieldAccess(path) => {
            let root = path.first().map(String::as_str).unwrap_or("");
            if scopes.contains(&root) {
                Ok(())
            } else {
                Err(CompileError::UnknownVariable {
                    variable: root.to_string(),
                    expression: source.to_string(),
                })
            }
        }
        Expression::Binary { left, right, .. } => {
            check_scopes(left, scopes, source)?;
            check_scopes(right, scopes, source)
        }
        Expression::Unary { operand, .. } => check_scopes(operand, scopes, source),
        Expression::FunctionCall { args, .. } => {
            for arg in args {
                check_scopes(arg, scopes, source)?;
            }
            Ok(())
        }
        Expression::Ternary {
            condition,
            true_expr,
            false_expr,
        } => {
            check_scopes(condition, scopes, source)?;
            check_scopes(true_expr, scopes, source)?;
            check_scopes(false_expr, scopes, source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_empty_is_noop() {
        let program = Program::compile("", DEFAULT_SCOPES).unwrap();
        assert!(program.is_empty());
        assert!(program.expr().is_none());

        let program = Program::compile("   ", DEFAULT_SCOPES).unwrap();
        assert!(program.is_empty());
    }

    #[test]
    fn test_compile_known_scope() {
        let program = Program::compile("input.amount > 0", DEFAULT_SCOPES).unwrap();
        assert!(!program.is_empty());
        assert_eq!(program.source(), "input.amount > 0");
    }

    #[test]
    fn test_compile_unknown_scope_fails() {
        let err = Program::compile("payload.amount > 0", DEFAULT_SCOPES).unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnknownVariable { ref variable, .. } if variable == "payload"
        ));
    }

    #[test]
    fn test_compile_unknown_scope_in_function_args() {
        let err = Program::compile("len(bogus.items)", DEFAULT_SCOPES).unwrap_err();
        assert!(matches!(err, CompileError::UnknownVariable { .. }));
    }

    #[test]
    fn test_query_scopes_allow_args_and_source() {
        assert!(Program::compile("args.limit > 0", QUERY_SCOPES).is_ok());
        assert!(Program::compile("source.rows", QUERY_SCOPES).is_ok());
        assert!(Program::compile("args.limit > 0", DEFAULT_SCOPES).is_err());
    }

    #[test]
    fn test_template_literal_passthrough() {
        let t = Template::compile("plain text", DEFAULT_SCOPES).unwrap();
        assert!(t.is_literal());
        assert_eq!(
            t.segments(),
            &[TemplateSegment::Literal("plain text".to_string())]
        );
    }

    #[test]
    fn test_template_single_expression() {
        let t = Template::compile("${vars.doubled}", DEFAULT_SCOPES).unwrap();
        assert!(!t.is_literal());
        assert!(t.single_expression().is_some());
    }

    #[test]
    fn test_template_mixed_segments() {
        let t = Template::compile("user ${input.id} from ${header.host}", DEFAULT_SCOPES).unwrap();
        assert_eq!(t.segments().len(), 4);
        assert!(t.single_expression().is_none());
    }

    #[test]
    fn test_template_unclosed_marker() {
        let err = Template::compile("${input.id", DEFAULT_SCOPES).unwrap_err();
        assert!(matches!(err, CompileError::UnclosedMarker(_)));
    }

    #[test]
    fn test_template_unknown_scope() {
        assert!(Template::compile("${nope.id}", DEFAULT_SCOPES).is_err());
    }
}
