//! Numeric predicate IR.
//!
//! The interpreter hands numeric path-condition facts to the decision layer
//! as `Expr` trees over integer and boolean symbols. Backends consume this IR
//! directly (the builtin backend) or after SMT-LIB2 encoding (process
//! backends).

use serde::{Deserialize, Serialize};
use std::fmt;

// ── Operators and sorts ─────────────────────────────────────────────

/// Comparison operators for numeric predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
}

impl CmpOp {
    /// The operator `op'` such that `!(a op b)` is `a op' b`.
    pub fn negate(self) -> Self {
        match self {
            CmpOp::Eq => CmpOp::NotEq,
            CmpOp::NotEq => CmpOp::Eq,
            CmpOp::Lt => CmpOp::GtEq,
            CmpOp::LtEq => CmpOp::Gt,
            CmpOp::Gt => CmpOp::LtEq,
            CmpOp::GtEq => CmpOp::Lt,
        }
    }

    /// The operator `op'` such that `a op b` is `b op' a`.
    pub fn flip(self) -> Self {
        match self {
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::NotEq => CmpOp::NotEq,
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::LtEq => CmpOp::GtEq,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::GtEq => CmpOp::LtEq,
        }
    }

    pub fn eval(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::NotEq => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::LtEq => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::GtEq => lhs >= rhs,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmpOp::Eq => write!(f, "=="),
            CmpOp::NotEq => write!(f, "!="),
            CmpOp::Lt => write!(f, "<"),
            CmpOp::LtEq => write!(f, "<="),
            CmpOp::Gt => write!(f, ">"),
            CmpOp::GtEq => write!(f, ">="),
        }
    }
}

/// Sort of a symbol or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sort {
    Int,
    Bool,
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Int => write!(f, "Int"),
            Sort::Bool => write!(f, "Bool"),
        }
    }
}

// ── Expressions ─────────────────────────────────────────────────────

/// A numeric expression or predicate over symbolic values.
///
/// Only expressions of sort `Bool` are predicates; the decision layer
/// rejects integer-sorted expressions where a predicate is expected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    Int(i64),
    Bool(bool),
    Var { name: String, sort: Sort },
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Cmp {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Int(value)
    }

    pub fn int_var(name: impl Into<String>) -> Self {
        Expr::Var {
            name: name.into(),
            sort: Sort::Int,
        }
    }

    pub fn bool_var(name: impl Into<String>) -> Self {
        Expr::Var {
            name: name.into(),
            sort: Sort::Bool,
        }
    }

    pub fn cmp(op: CmpOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Cmp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Self::cmp(CmpOp::Eq, lhs, rhs)
    }

    pub fn ne(lhs: Expr, rhs: Expr) -> Self {
        Self::cmp(CmpOp::NotEq, lhs, rhs)
    }

    pub fn lt(lhs: Expr, rhs: Expr) -> Self {
        Self::cmp(CmpOp::Lt, lhs, rhs)
    }

    pub fn le(lhs: Expr, rhs: Expr) -> Self {
        Self::cmp(CmpOp::LtEq, lhs, rhs)
    }

    pub fn gt(lhs: Expr, rhs: Expr) -> Self {
        Self::cmp(CmpOp::Gt, lhs, rhs)
    }

    pub fn ge(lhs: Expr, rhs: Expr) -> Self {
        Self::cmp(CmpOp::GtEq, lhs, rhs)
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Expr::Add(Box::new(lhs), Box::new(rhs))
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Self {
        Expr::Sub(Box::new(lhs), Box::new(rhs))
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        Expr::Mul(Box::new(lhs), Box::new(rhs))
    }

    pub fn not(inner: Expr) -> Self {
        Expr::Not(Box::new(inner))
    }

    /// The sort this expression evaluates to.
    pub fn sort(&self) -> Sort {
        match self {
            Expr::Int(_)
            | Expr::Add(_, _)
            | Expr::Sub(_, _)
            | Expr::Mul(_, _)
            | Expr::Neg(_) => Sort::Int,
            Expr::Var { sort, .. } => *sort,
            Expr::Bool(_) | Expr::Cmp { .. } | Expr::And(_) | Expr::Or(_) | Expr::Not(_) => {
                Sort::Bool
            }
        }
    }

    /// Returns true if this expression can be asserted as a path-condition fact.
    pub fn is_predicate(&self) -> bool {
        self.sort() == Sort::Bool
    }

    /// Logical negation, pushed through comparisons and connectives.
    pub fn negate(&self) -> Expr {
        match self {
            Expr::Bool(b) => Expr::Bool(!b),
            Expr::Cmp { op, lhs, rhs } => Expr::Cmp {
                op: op.negate(),
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            },
            Expr::And(parts) => Expr::Or(parts.iter().map(Expr::negate).collect()),
            Expr::Or(parts) => Expr::And(parts.iter().map(Expr::negate).collect()),
            Expr::Not(inner) => (**inner).clone(),
            other => Expr::Not(Box::new(other.clone())),
        }
    }

    /// Fold an integer-sorted expression to a constant, if it is closed.
    ///
    /// Overflowing arithmetic does not fold.
    pub fn fold_int(&self) -> Option<i64> {
        match self {
            Expr::Int(v) => Some(*v),
            Expr::Add(a, b) => a.fold_int()?.checked_add(b.fold_int()?),
            Expr::Sub(a, b) => a.fold_int()?.checked_sub(b.fold_int()?),
            Expr::Mul(a, b) => a.fold_int()?.checked_mul(b.fold_int()?),
            Expr::Neg(a) => a.fold_int()?.checked_neg(),
            _ => None,
        }
    }

    /// Collect all free symbols in first-occurrence order.
    pub fn free_vars(&self) -> Vec<(String, Sort)> {
        let mut vars = Vec::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars(&self, vars: &mut Vec<(String, Sort)>) {
        match self {
            Expr::Var { name, sort } => {
                if !vars.iter().any(|(n, _)| n == name) {
                    vars.push((name.clone(), *sort));
                }
            }
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) => {
                a.collect_vars(vars);
                b.collect_vars(vars);
            }
            Expr::Cmp { lhs, rhs, .. } => {
                lhs.collect_vars(vars);
                rhs.collect_vars(vars);
            }
            Expr::Neg(a) | Expr::Not(a) => a.collect_vars(vars),
            Expr::And(parts) | Expr::Or(parts) => {
                for p in parts {
                    p.collect_vars(vars);
                }
            }
            Expr::Int(_) | Expr::Bool(_) => {}
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(v) => write!(f, "{}", v),
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Var { name, .. } => write!(f, "{}", name),
            Expr::Add(a, b) => write!(f, "({} + {})", a, b),
            Expr::Sub(a, b) => write!(f, "({} - {})", a, b),
            Expr::Mul(a, b) => write!(f, "({} * {})", a, b),
            Expr::Neg(a) => write!(f, "-{}", a),
            Expr::Cmp { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
            Expr::And(parts) => {
                if parts.is_empty() {
                    return write!(f, "true");
                }
                let inner: Vec<_> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "({})", inner.join(" && "))
            }
            Expr::Or(parts) => {
                if parts.is_empty() {
                    return write!(f, "false");
                }
                let inner: Vec<_> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "({})", inner.join(" || "))
            }
            Expr::Not(a) => write!(f, "!({})", a),
        }
    }
}
