// Recursive expression tree: Column / Value / Operator / Function.

use crate::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Column(String),
    Value(Value),
    Operator { op: Op, left: Box<Expression>, right: Box<Expression> },
    Function { name: String, args: Vec<Expression> },
}

/// Binary/unary operators folded into one tag; unary forms (`Not`, `IsNull`)
/// ignore `right` by convention and carry their single operand in `left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Not,
    Add,
    Sub,
    Mul,
    Div,
    Like,
    In,
    Between,
    IsNull,
    IsNotNull,
}

impl Expression {
    pub fn column(name: impl Into<String>) -> Self {
        Expression::Column(name.into())
    }

    pub fn value(v: Value) -> Self {
        Expression::Value(v)
    }

    pub fn binary(op: Op, left: Expression, right: Expression) -> Self {
        Expression::Operator { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn and(self, other: Expression) -> Self {
        Expression::binary(Op::And, self, other)
    }

    /// Split a (possibly nested) AND expression into its conjuncts, as
    /// required for predicate pushdown.
    pub fn split_conjuncts(&self) -> Vec<Expression> {
        match self {
            Expression::Operator { op: Op::And, left, right } => {
                let mut out = left.split_conjuncts();
                out.extend(right.split_conjuncts());
                out
            }
            other => vec![other.clone()],
        }
    }

    /// Rebuild a single expression from a list of conjuncts, the inverse of
    /// [`Expression::split_conjuncts`].
    pub fn from_conjuncts(mut conjuncts: Vec<Expression>) -> Option<Expression> {
        let mut iter = conjuncts.drain(..);
        let first = iter.next()?;
        Some(iter.fold(first, |acc, e| acc.and(e)))
    }

    /// Every column name referenced anywhere in this expression tree.
    pub fn referenced_columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<String>) {
        match self {
            Expression::Column(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Expression::Value(_) => {}
            Expression::Operator { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expression::Function { args, .. } => {
                for a in args {
                    a.collect_columns(out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_rejoin_conjuncts_round_trips() {
        let e = Expression::column("a")
            .and(Expression::column("b"))
            .and(Expression::column("c"));
        let parts = e.split_conjuncts();
        assert_eq!(parts.len(), 3);
        let rejoined = Expression::from_conjuncts(parts).unwrap();
        assert_eq!(rejoined.referenced_columns(), vec!["a", "b", "c"]);
    }

    #[test]
    fn referenced_columns_dedups() {
        let e = Expression::binary(Op::Eq, Expression::column("x"), Expression::column("x"));
        assert_eq!(e.referenced_columns(), vec!["x"]);
    }
}
