//! SMT-LIB2 encoding of clauses.
//!
//! Numeric clauses map directly onto `Int`/`Bool` terms. Each symbolic
//! reference becomes an `Int` constant whose value encodes its resolution:
//! `0` is null, `pos + 1` aliases heap position `pos`, and `-(id + 1)`
//! expands to the class numbered `id`. Each class-initialization fact is a
//! `Bool` constant.

use std::collections::{BTreeMap, BTreeSet};

use symdec_core::{symbol_digest, Clause, CmpOp, Expr, ReferenceSymbolic, Sort};

use crate::error::InternalFault;

/// One encoded literal: the constants it needs declared first and the
/// assertion body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub declarations: Vec<String>,
    pub assertion: String,
}

/// Stateful clause encoder. Remembers declared symbols and class numbers
/// across the session.
#[derive(Debug, Default)]
pub struct SmtEncoder {
    declared: BTreeSet<String>,
    class_ids: BTreeMap<String, i64>,
}

impl SmtEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `clause`, negated when `positive` is false.
    pub fn encode(&mut self, clause: &Clause, positive: bool) -> Result<Encoded, InternalFault> {
        let mut symbols = Vec::new();
        let body = match clause {
            Clause::NumericAssertion { predicate } => {
                if !predicate.is_predicate() {
                    return Err(InternalFault::new(format!(
                        "'{}' is not a predicate",
                        predicate
                    )));
                }
                for (name, sort) in predicate.free_vars() {
                    symbols.push((numeric_symbol(&name), sort));
                }
                to_smtlib2(predicate)
            }
            Clause::ReferenceIsNull { reference } => {
                let sym = self.reference(reference, &mut symbols);
                format!("(= {} 0)", sym)
            }
            Clause::ReferenceAliases {
                reference,
                heap_pos,
                ..
            } => {
                let sym = self.reference(reference, &mut symbols);
                let value = heap_pos
                    .checked_add(1)
                    .ok_or_else(|| InternalFault::new(format!("heap position {} out of range", heap_pos)))?;
                format!("(= {} {})", sym, value)
            }
            Clause::ReferenceExpands {
                reference,
                class_name,
            } => {
                let sym = self.reference(reference, &mut symbols);
                let next = self.class_ids.len() as i64;
                let id = *self.class_ids.entry(class_name.clone()).or_insert(next);
                format!("(= {} (- {}))", sym, id + 1)
            }
            Clause::ClassInitialized { class_name } => {
                let sym = class_symbol(class_name);
                symbols.push((sym.clone(), Sort::Bool));
                sym
            }
            Clause::ClassNotInitialized { class_name } => {
                let sym = class_symbol(class_name);
                symbols.push((sym.clone(), Sort::Bool));
                format!("(not {})", sym)
            }
        };

        let declarations = symbols
            .into_iter()
            .filter(|(name, _)| self.declared.insert(name.clone()))
            .map(|(name, sort)| format!("(declare-const {} {})", name, smt_sort(sort)))
            .collect();
        let assertion = if positive {
            body
        } else {
            format!("(not {})", body)
        };
        Ok(Encoded {
            declarations,
            assertion,
        })
    }

    fn reference(&self, reference: &ReferenceSymbolic, symbols: &mut Vec<(String, Sort)>) -> String {
        let sym = format!("r_{}", reference.digest());
        symbols.push((sym.clone(), Sort::Int));
        sym
    }
}

fn smt_sort(sort: Sort) -> &'static str {
    match sort {
        Sort::Int => "Int",
        Sort::Bool => "Bool",
    }
}

/// Quoted symbol for a numeric variable. Quoting keeps arbitrary origins
/// (dots, braces, colons) and reserved words legal.
pub fn numeric_symbol(name: &str) -> String {
    format!("|{}|", name.replace(['|', '\\'], "_"))
}

pub fn class_symbol(class_name: &str) -> String {
    format!("c_{}", symbol_digest(class_name))
}

/// Render an expression as an SMT-LIB2 term.
pub fn to_smtlib2(expr: &Expr) -> String {
    match expr {
        Expr::Int(v) => {
            if *v < 0 {
                format!("(- {})", v.unsigned_abs())
            } else {
                format!("{}", v)
            }
        }
        Expr::Bool(b) => format!("{}", b),
        Expr::Var { name, .. } => numeric_symbol(name),
        Expr::Add(a, b) => format!("(+ {} {})", to_smtlib2(a), to_smtlib2(b)),
        Expr::Sub(a, b) => format!("(- {} {})", to_smtlib2(a), to_smtlib2(b)),
        Expr::Mul(a, b) => format!("(* {} {})", to_smtlib2(a), to_smtlib2(b)),
        Expr::Neg(a) => format!("(- {})", to_smtlib2(a)),
        Expr::Cmp { op, lhs, rhs } => {
            let (l, r) = (to_smtlib2(lhs), to_smtlib2(rhs));
            match op {
                CmpOp::Eq => format!("(= {} {})", l, r),
                CmpOp::NotEq => format!("(not (= {} {}))", l, r),
                CmpOp::Lt => format!("(< {} {})", l, r),
                CmpOp::LtEq => format!("(<= {} {})", l, r),
                CmpOp::Gt => format!("(> {} {})", l, r),
                CmpOp::GtEq => format!("(>= {} {})", l, r),
            }
        }
        Expr::And(parts) => nary("and", "true", parts),
        Expr::Or(parts) => nary("or", "false", parts),
        Expr::Not(a) => format!("(not {})", to_smtlib2(a)),
    }
}

fn nary(op: &str, empty: &str, parts: &[Expr]) -> String {
    match parts {
        [] => empty.to_string(),
        [only] => to_smtlib2(only),
        _ => {
            let inner: Vec<_> = parts.iter().map(to_smtlib2).collect();
            format!("({} {})", op, inner.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symdec_core::HeapObject;

    #[test]
    fn numeric_terms() {
        let e = Expr::le(
            Expr::add(Expr::int_var("i"), Expr::int(-1)),
            Expr::int_var("{ROOT}:this.size"),
        );
        assert_eq!(to_smtlib2(&e), "(<= (+ |i| (- 1)) |{ROOT}:this.size|)");
        assert_eq!(to_smtlib2(&Expr::ne(Expr::int(1), Expr::int(2))), "(not (= 1 2))");
        assert_eq!(to_smtlib2(&Expr::And(vec![])), "true");
        assert_eq!(to_smtlib2(&Expr::int(i64::MIN)), "(- 9223372036854775808)");
    }

    #[test]
    fn symbols_are_declared_once() {
        let mut enc = SmtEncoder::new();
        let p = Clause::numeric(Expr::gt(Expr::int_var("x"), Expr::int(0)));
        let first = enc.encode(&p, true).unwrap();
        assert_eq!(first.declarations, vec!["(declare-const |x| Int)"]);
        assert_eq!(first.assertion, "(> |x| 0)");
        let second = enc.encode(&p, false).unwrap();
        assert!(second.declarations.is_empty());
        assert_eq!(second.assertion, "(not (> |x| 0))");
    }

    #[test]
    fn reference_resolutions_share_one_symbol() {
        let mut enc = SmtEncoder::new();
        let r = ReferenceSymbolic::root("this", "List");
        let sym = format!("r_{}", r.digest());
        let null = enc.encode(&Clause::null(r.clone()), true).unwrap();
        assert_eq!(null.assertion, format!("(= {} 0)", sym));
        let alias = enc
            .encode(&Clause::aliases(r.clone(), 4, HeapObject::new("List")), true)
            .unwrap();
        assert!(alias.declarations.is_empty());
        assert_eq!(alias.assertion, format!("(= {} 5)", sym));
        let a = enc.encode(&Clause::expands(r.clone(), "ArrayList"), true).unwrap();
        let b = enc.encode(&Clause::expands(r.clone(), "LinkedList"), true).unwrap();
        let again = enc.encode(&Clause::expands(r, "ArrayList"), true).unwrap();
        assert_eq!(a.assertion, format!("(= {} (- 1))", sym));
        assert_eq!(b.assertion, format!("(= {} (- 2))", sym));
        assert_eq!(again.assertion, a.assertion);
    }

    #[test]
    fn class_initialization_is_boolean() {
        let mut enc = SmtEncoder::new();
        let sym = class_symbol("Foo");
        let init = enc.encode(&Clause::initialized("Foo"), true).unwrap();
        assert_eq!(init.declarations, vec![format!("(declare-const {} Bool)", sym)]);
        let not_init = enc.encode(&Clause::not_initialized("Foo"), false).unwrap();
        assert_eq!(not_init.assertion, format!("(not (not {}))", sym));
    }

    #[test]
    fn integer_expression_is_rejected() {
        let mut enc = SmtEncoder::new();
        assert!(enc.encode(&Clause::numeric(Expr::int_var("x")), true).is_err());
    }
}
