//! Expression AST definitions

mod expression;
mod operator;

pub use expression::{Expression, UnaryOperator};
pub use operator::Operator;
