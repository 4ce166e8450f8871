//! Expression parser
//!
//! Parses string expressions into Expression AST nodes.
//!
//! Supported syntax:
//! - Field access: `input.amount`, `detection.geo.country`
//! - Literals: `42`, `3.14`, `"string"`, `true`, `false`, `null`
//! - Binary operators: `>`, `<`, `>=`, `<=`, `==`, `!=`, `+`, `-`, `*`, `/`, `%`, `&&`, `||`
//! - Keyword operators: `contains`, `in`, `not_in`, `starts_with`, `ends_with`
//! - Unary operators: `!`, `-`
//! - Function calls: `len(input.items)`, `coalesce(vars.a, "fallback")`
//! - Ternary conditional: `cond ? a : b`
//! - Parentheses for grouping: `(a + b) * c`

use crate::ast::{Expression, Operator, UnaryOperator};
use crate::error::{CompileError, Result};
use crate::types::Value;

/// Expression parser
pub struct ExpressionParser;

impl ExpressionParser {
    /// Parse an expression from a string
    pub fn parse(input: &str) -> Result<Expression> {
        let input = input.trim();

        if input.is_empty() {
            return Err(CompileError::InvalidExpression(
                "empty expression".to_string(),
            ));
        }

        Self::parse_expression(input)
    }

    /// Parse a complete expression (handles binary operators with precedence)
    fn parse_expression(input: &str) -> Result<Expression> {
        let input = input.trim();

        // Ternary has the lowest precedence
        if let Some((cond, true_branch, false_branch)) = Self::split_ternary(input) {
            return Ok(Expression::ternary(
                Self::parse_expression(cond)?,
                Self::parse_expression(true_branch)?,
                Self::parse_expression(false_branch)?,
            ));
        }

        // Logical operators (lowest binary precedence)
        if let Some((left, op, right)) = Self::split_by_operator(input, &["||", "&&"]) {
            let op = Self::parse_operator(op)?;
            return Ok(Expression::binary(
                Self::parse_expression(left)?,
                op,
                Self::parse_expression(right)?,
            ));
        }

        // Keyword operators (contains, in, not_in, etc.)
        if let Some((left, op, right)) = Self::split_by_keyword_operator(
            input,
            &["contains", "not_in", "in", "starts_with", "ends_with"],
        ) {
            let op = Self::parse_operator(op)?;
            return Ok(Expression::binary(
                Self::parse_expression(left)?,
                op,
                Self::parse_expression(right)?,
            ));
        }

        // Comparison operators
        if let Some((left, op, right)) =
            Self::split_by_operator(input, &["==", "!=", "<=", ">=", "<", ">"])
        {
            let op = Self::parse_operator(op)?;
            return Ok(Expression::binary(
                Self::parse_expression(left)?,
                op,
                Self::parse_expression(right)?,
            ));
        }

        // Additive operators
        if let Some((left, op, right)) = Self::split_by_operator(input, &["+", "-"]) {
            let op = Self::parse_operator(op)?;
            return Ok(Expression::binary(
                Self::parse_expression(left)?,
                op,
                Self::parse_expression(right)?,
            ));
        }

        // Multiplicative operators
        if let Some((left, op, right)) = Self::split_by_operator(input, &["*", "/", "%"]) {
            let op = Self::parse_operator(op)?;
            return Ok(Expression::binary(
                Self::parse_expression(left)?,
                op,
                Self::parse_expression(right)?,
            ));
        }

        Self::parse_primary(input)
    }

    /// Parse a primary expression
    fn parse_primary(input: &str) -> Result<Expression> {
        let input = input.trim();

        if input.is_empty() {
            return Err(CompileError::InvalidExpression(
                "empty expression".to_string(),
            ));
        }

        // Unary operators
        if let Some(rest) = input.strip_prefix('!') {
            return Ok(Expression::unary(
                UnaryOperator::Not,
                Self::parse_primary(rest.trim())?,
            ));
        }

        if input.starts_with('-') && !input[1..].trim().starts_with(|c: char| c.is_ascii_digit()) {
            return Ok(Expression::unary(
                UnaryOperator::Negate,
                Self::parse_primary(input[1..].trim())?,
            ));
        }

        // Parentheses
        if input.starts_with('(') && input.ends_with(')') {
            return Self::parse_expression(&input[1..input.len() - 1]);
        }

        // String literals
        if input.len() >= 2 && input.starts_with('"') && input.ends_with('"') {
            let s = &input[1..input.len() - 1];
            return Ok(Expression::literal(Value::String(s.to_string())));
        }

        // Boolean and null literals
        if input == "true" {
            return Ok(Expression::literal(Value::Bool(true)));
        }
        if input == "false" {
            return Ok(Expression::literal(Value::Bool(false)));
        }
        if input == "null" {
            return Ok(Expression::literal(Value::Null));
        }

        // Number literals
        if let Ok(num) = input.parse::<f64>() {
            return Ok(Expression::literal(Value::Number(num)));
        }

        // Function calls
        if let Some(paren_pos) = input.find('(') {
            if input.ends_with(')') && paren_pos > 0 {
                let func_name = input[..paren_pos].trim();
                if func_name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    let args_str = &input[paren_pos + 1..input.len() - 1];
                    let args = if args_str.trim().is_empty() {
                        Vec::new()
                    } else {
                        Self::parse_function_args(args_str)?
                    };
                    return Ok(Expression::function_call(func_name.to_string(), args));
                }
            }
        }

        // Dotted field access
        if input.contains('.') {
            let parts: Vec<String> = input.split('.').map(|s| s.trim().to_string()).collect();
            if parts
                .iter()
                .all(|p| !p.is_empty() && p.chars().all(|c| c.is_alphanumeric() || c == '_'))
            {
                return Ok(Expression::field_access(parts));
            }
        }

        // Single identifier is also field access
        if input.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Ok(Expression::field_access(vec![input.to_string()]));
        }

        Err(CompileError::InvalidExpression(format!(
            "cannot parse: {}",
            input
        )))
    }

    /// Split a top-level ternary into (condition, true branch, false branch)
    fn split_ternary(input: &str) -> Option<(&str, &str, &str)> {
        let bytes = input.as_bytes();
        let mut paren_depth = 0i32;
        let mut in_string = false;
        let mut question_pos = None;

        for (i, &b) in bytes.iter().enumerate() {
            match b as char {
                '"' => in_string = !in_string,
                '(' if !in_string => paren_depth += 1,
                ')' if !in_string => paren_depth -= 1,
                '?' if !in_string && paren_depth == 0 => {
                    question_pos = Some(i);
                    break;
                }
                _ => {}
            }
        }

        let q = question_pos?;

        // Find the matching ':' for the first '?', accounting for nested ternaries
        let mut nesting = 0i32;
        paren_depth = 0;
        in_string = false;
        for (i, &b) in bytes.iter().enumerate().skip(q + 1) {
            match b as char {
                '"' => in_string = !in_string,
                '(' if !in_string => paren_depth += 1,
                ')' if !in_string => paren_depth -= 1,
                '?' if !in_string && paren_depth == 0 => nesting += 1,
                ':' if !in_string && paren_depth == 0 => {
                    if nesting == 0 {
                        let cond = input[..q].trim();
                        let true_branch = input[q + 1..i].trim();
                        let false_branch = input[i + 1..].trim();
                        if cond.is_empty() || true_branch.is_empty() || false_branch.is_empty() {
                            return None;
                        }
                        return Some((cond, true_branch, false_branch));
                    }
                    nesting -= 1;
                }
                _ => {}
            }
        }

        None
    }

    /// Split input by binary operator (respecting parentheses and strings)
    fn split_by_operator<'a>(
        input: &'a str,
        operators: &[&str],
    ) -> Option<(&'a str, &'a str, &'a str)> {
        let bytes = input.as_bytes();
        let string_mask = Self::string_mask(input);
        let mut paren_depth = 0i32;

        // Scan from right to left to handle left-to-right associativity.
        // Operators are ASCII, so non-ASCII bytes (multibyte identifiers)
        // can never start a match and are skipped without slicing.
        for i in (0..input.len()).rev() {
            if string_mask[i] || !bytes[i].is_ascii() {
                continue;
            }
            let c = bytes[i] as char;

            if c == ')' {
                paren_depth += 1;
            } else if c == '(' {
                paren_depth -= 1;
            }

            if paren_depth == 0 {
                for &op in operators {
                    if i + op.len() <= input.len() && &bytes[i..i + op.len()] == op.as_bytes() {
                        // Make sure it's not part of another operator and has
                        // a non-empty left side (leading '-' is unary)
                        let is_valid = i > 0
                            && !input[..i].trim().is_empty()
                            && !Self::is_operator_char(bytes[i - 1] as char)
                            && (i + op.len() >= input.len()
                                || !Self::is_operator_char(bytes[i + op.len()] as char));

                        if is_valid {
                            return Some((
                                input[..i].trim(),
                                &input[i..i + op.len()],
                                input[i + op.len()..].trim(),
                            ));
                        }
                    }
                }
            }
        }

        None
    }

    /// Split input by keyword operator (respecting parentheses, strings and
    /// word boundaries)
    fn split_by_keyword_operator<'a>(
        input: &'a str,
        operators: &[&str],
    ) -> Option<(&'a str, &'a str, &'a str)> {
        let bytes = input.as_bytes();
        let string_mask = Self::string_mask(input);
        let mut paren_depth = 0i32;

        for i in (0..input.len()).rev() {
            if string_mask[i] || !bytes[i].is_ascii() {
                continue;
            }
            let c = bytes[i] as char;

            if c == ')' {
                paren_depth += 1;
            } else if c == '(' {
                paren_depth -= 1;
            }

            if paren_depth == 0 {
                for &op in operators {
                    if i + op.len() <= input.len() && &bytes[i..i + op.len()] == op.as_bytes() {
                        let has_space_before = i > 0 && bytes[i - 1].is_ascii_whitespace();
                        let has_space_after = i + op.len() < input.len()
                            && bytes[i + op.len()].is_ascii_whitespace();

                        if has_space_before && has_space_after {
                            return Some((
                                input[..i].trim(),
                                &input[i..i + op.len()],
                                input[i + op.len()..].trim(),
                            ));
                        }
                    }
                }
            }
        }

        None
    }

    /// Byte positions that fall inside string literals
    fn string_mask(input: &str) -> Vec<bool> {
        let mut mask = vec![false; input.len()];
        let mut in_string = false;
        for (i, b) in input.bytes().enumerate() {
            if b == b'"' {
                mask[i] = true;
                in_string = !in_string;
            } else {
                mask[i] = in_string;
            }
        }
        mask
    }

    /// Check if a character is part of an operator
    fn is_operator_char(c: char) -> bool {
        matches!(c, '=' | '!' | '<' | '>' | '&' | '|' | '+' | '-' | '*' | '/' | '%')
    }

    /// Parse function arguments
    fn parse_function_args(args_str: &str) -> Result<Vec<Expression>> {
        let mut args = Vec::new();
        let mut current_arg = String::new();
        let mut paren_depth = 0i32;
        let mut in_string = false;

        for c in args_str.chars() {
            match c {
                '"' => in_string = !in_string,
                '(' if !in_string => paren_depth += 1,
                ')' if !in_string => paren_depth -= 1,
                ',' if !in_string && paren_depth == 0 => {
                    args.push(Self::parse_expression(current_arg.trim())?);
                    current_arg.clear();
                    continue;
                }
                _ => {}
            }
            current_arg.push(c);
        }

        if !current_arg.trim().is_empty() {
            args.push(Self::parse_expression(current_arg.trim())?);
        }

        Ok(args)
    }

    /// Parse an operator string
    fn parse_operator(op: &str) -> Result<Operator> {
        match op {
            "==" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            "<" => Ok(Operator::Lt),
            ">" => Ok(Operator::Gt),
            "<=" => Ok(Operator::Le),
            ">=" => Ok(Operator::Ge),
            "+" => Ok(Operator::Add),
            "-" => Ok(Operator::Sub),
            "*" => Ok(Operator::Mul),
            "/" => Ok(Operator::Div),
            "%" => Ok(Operator::Mod),
            "&&" => Ok(Operator::And),
            "||" => Ok(Operator::Or),
            "contains" => Ok(Operator::Contains),
            "starts_with" => Ok(Operator::StartsWith),
            "ends_with" => Ok(Operator::EndsWith),
            "in" => Ok(Operator::In),
            "not_in" => Ok(Operator::NotIn),
            _ => Err(CompileError::InvalidOperator(op.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_literal() {
        let expr = ExpressionParser::parse("42").unwrap();
        assert_eq!(expr, Expression::literal(Value::Number(42.0)));

        let expr = ExpressionParser::parse("3.14").unwrap();
        assert_eq!(expr, Expression::literal(Value::Number(3.14)));

        let expr = ExpressionParser::parse("-10.0").unwrap();
        assert_eq!(expr, Expression::literal(Value::Number(-10.0)));
    }

    #[test]
    fn test_parse_string_literal() {
        let expr = ExpressionParser::parse(r#""hello world""#).unwrap();
        assert_eq!(
            expr,
            Expression::literal(Value::String("hello world".to_string()))
        );
    }

    #[test]
    fn test_parse_bool_and_null_literals() {
        assert_eq!(
            ExpressionParser::parse("true").unwrap(),
            Expression::literal(Value::Bool(true))
        );
        assert_eq!(
            ExpressionParser::parse("false").unwrap(),
            Expression::literal(Value::Bool(false))
        );
        assert_eq!(
            ExpressionParser::parse("null").unwrap(),
            Expression::literal(Value::Null)
        );
    }

    #[test]
    fn test_parse_field_access() {
        let expr = ExpressionParser::parse("input.amount").unwrap();
        assert_eq!(
            expr,
            Expression::field_access(vec!["input".to_string(), "amount".to_string()])
        );

        let expr = ExpressionParser::parse("detection.geo.country").unwrap();
        assert_eq!(
            expr,
            Expression::field_access(vec![
                "detection".to_string(),
                "geo".to_string(),
                "country".to_string()
            ])
        );
    }

    #[test]
    fn test_parse_binary_comparison() {
        let expr = ExpressionParser::parse("input.amount > 0").unwrap();
        assert!(matches!(expr, Expression::Binary { .. }));

        let expr = ExpressionParser::parse(r#"input.status == "active""#).unwrap();
        assert!(matches!(expr, Expression::Binary { .. }));
    }

    #[test]
    fn test_parse_arithmetic_precedence() {
        // 2 + 3 * 4 parses as 2 + (3 * 4)
        let expr = ExpressionParser::parse("2 + 3 * 4").unwrap();
        match expr {
            Expression::Binary { op, right, .. } => {
                assert_eq!(op, Operator::Add);
                assert!(matches!(*right, Expression::Binary { .. }));
            }
            _ => panic!("Expected Binary expression"),
        }
    }

    #[test]
    fn test_parse_logical_operators() {
        let expr = ExpressionParser::parse("input.a && input.b").unwrap();
        assert!(matches!(
            expr,
            Expression::Binary {
                op: Operator::And,
                ..
            }
        ));

        let expr =
            ExpressionParser::parse(r#"input.amount > 18 && input.country == "US""#).unwrap();
        assert!(matches!(expr, Expression::Binary { .. }));
    }

    #[test]
    fn test_parse_keyword_operators() {
        let expr = ExpressionParser::parse(r#"input.email contains "@""#).unwrap();
        assert!(matches!(
            expr,
            Expression::Binary {
                op: Operator::Contains,
                ..
            }
        ));

        let expr = ExpressionParser::parse("input.country in vars.allowed").unwrap();
        assert!(matches!(
            expr,
            Expression::Binary {
                op: Operator::In,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_function_call() {
        let expr = ExpressionParser::parse("len(input.items)").unwrap();

        if let Expression::FunctionCall { name, args } = expr {
            assert_eq!(name, "len");
            assert_eq!(args.len(), 1);
        } else {
            panic!("Expected function call");
        }

        let expr = ExpressionParser::parse(r#"coalesce(vars.a, "fallback")"#).unwrap();
        if let Expression::FunctionCall { name, args } = expr {
            assert_eq!(name, "coalesce");
            assert_eq!(args.len(), 2);
        } else {
            panic!("Expected function call");
        }
    }

    #[test]
    fn test_parse_unary() {
        let expr = ExpressionParser::parse("!input.active").unwrap();
        assert!(matches!(
            expr,
            Expression::Unary {
                op: UnaryOperator::Not,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_ternary() {
        let expr = ExpressionParser::parse(r#"input.amount > 100 ? "high" : "low""#).unwrap();
        match expr {
            Expression::Ternary {
                condition,
                true_expr,
                false_expr,
            } => {
                assert!(matches!(*condition, Expression::Binary { .. }));
                assert_eq!(
                    *true_expr,
                    Expression::literal(Value::String("high".to_string()))
                );
                assert_eq!(
                    *false_expr,
                    Expression::literal(Value::String("low".to_string()))
                );
            }
            _ => panic!("Expected Ternary expression"),
        }
    }

    #[test]
    fn test_parse_with_parentheses() {
        let expr = ExpressionParser::parse("(input.a + input.b) * input.c").unwrap();
        match expr {
            Expression::Binary { op, left, .. } => {
                assert_eq!(op, Operator::Mul);
                assert!(matches!(*left, Expression::Binary { .. }));
            }
            _ => panic!("Expected Binary expression"),
        }
    }

    #[test]
    fn test_operator_inside_string_not_split() {
        let expr = ExpressionParser::parse(r#"input.name == "a+b""#).unwrap();
        match expr {
            Expression::Binary { op, right, .. } => {
                assert_eq!(op, Operator::Eq);
                assert_eq!(
                    *right,
                    Expression::literal(Value::String("a+b".to_string()))
                );
            }
            _ => panic!("Expected Binary expression"),
        }
    }

    #[test]
    fn test_multibyte_field_name() {
        let expr = ExpressionParser::parse("input.café == 1").unwrap();
        match expr {
            Expression::Binary { op, left, .. } => {
                assert_eq!(op, Operator::Eq);
                assert_eq!(
                    *left,
                    Expression::field_access(vec!["input".to_string(), "café".to_string()])
                );
            }
            _ => panic!("Expected Binary expression"),
        }
    }

    #[test]
    fn test_multibyte_string_literal() {
        let expr = ExpressionParser::parse(r#"input.name == "café""#).unwrap();
        match expr {
            Expression::Binary { op, right, .. } => {
                assert_eq!(op, Operator::Eq);
                assert_eq!(
                    *right,
                    Expression::literal(Value::String("café".to_string()))
                );
            }
            _ => panic!("Expected Binary expression"),
        }
    }

    #[test]
    fn test_invalid_expression() {
        assert!(ExpressionParser::parse("").is_err());
        assert!(ExpressionParser::parse("@#$").is_err());
    }
}
