//! In-process backend. Always available.
//!
//! Decides conjunctions of literals with:
//! - interval reasoning over single-variable linear integer constraints,
//! - boolean-variable polarity,
//! - constant folding,
//! - case splitting over disjunctions (bounded),
//! - per-reference resolution consistency (null, alias position, expansion class),
//! - class-initialization polarity.
//!
//! Anything it cannot decide counts as satisfiable.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use symdec_core::{Clause, CmpOp, Expr, HeapObject, HeapPos, ReferenceSymbolic, Sort};

use super::{require_predicate, ExternalInterface, ProtocolSession};
use crate::error::ExternalError;

/// Maximum number of disjunct branches explored per check.
const DEFAULT_SPLIT_BUDGET: usize = 256;

/// A committed or staged clause with its polarity.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Literal {
    clause: Clause,
    positive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Sat,
    Unsat,
    Unknown,
}

#[derive(Debug)]
pub struct BuiltinBackend {
    session: ProtocolSession,
    committed: Vec<Literal>,
    split_budget: usize,
}

impl Default for BuiltinBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinBackend {
    pub fn new() -> Self {
        Self {
            session: ProtocolSession::new(),
            committed: Vec::new(),
            split_budget: DEFAULT_SPLIT_BUDGET,
        }
    }

    pub fn with_split_budget(mut self, budget: usize) -> Self {
        self.split_budget = budget;
        self
    }

    pub fn session(&self) -> &ProtocolSession {
        &self.session
    }

    /// Committed assumptions, oldest first.
    pub fn committed(&self) -> Vec<(Clause, bool)> {
        self.committed
            .iter()
            .map(|l| (l.clause.clone(), l.positive))
            .collect()
    }

    fn stage(&mut self, clause: Clause) -> Result<(), ExternalError> {
        trace!(%clause, "staged");
        self.session.stage(clause)?;
        Ok(())
    }

    fn decide(&self, literals: &[Literal]) -> Verdict {
        let mut numeric = Vec::new();
        let mut references = ReferenceFacts::default();
        let mut classes: BTreeMap<&str, bool> = BTreeMap::new();

        for literal in literals {
            match &literal.clause {
                Clause::NumericAssertion { predicate } => numeric.push(if literal.positive {
                    predicate.clone()
                } else {
                    predicate.negate()
                }),
                Clause::ReferenceAliases {
                    reference,
                    heap_pos,
                    ..
                } => references.add(reference, Target::Alias(*heap_pos), literal.positive),
                Clause::ReferenceExpands {
                    reference,
                    class_name,
                } => references.add(
                    reference,
                    Target::Fresh(class_name.clone()),
                    literal.positive,
                ),
                Clause::ReferenceIsNull { reference } => {
                    references.add(reference, Target::Null, literal.positive)
                }
                Clause::ClassInitialized { class_name } | Clause::ClassNotInitialized { class_name } => {
                    let initialized = matches!(literal.clause, Clause::ClassInitialized { .. })
                        == literal.positive;
                    if *classes.entry(class_name.as_str()).or_insert(initialized) != initialized {
                        return Verdict::Unsat;
                    }
                }
            }
        }

        if !references.consistent() {
            return Verdict::Unsat;
        }
        let mut budget = self.split_budget;
        decide_numeric(numeric, &mut budget)
    }
}

impl ExternalInterface for BuiltinBackend {
    fn name(&self) -> &str {
        "builtin"
    }

    fn is_working(&mut self) -> Result<bool, ExternalError> {
        Ok(self.session.is_live())
    }

    fn send_clause_assume(&mut self, predicate: &Expr) -> Result<(), ExternalError> {
        require_predicate(predicate)?;
        self.stage(Clause::numeric(predicate.clone()))
    }

    fn send_clause_assume_aliases(
        &mut self,
        reference: &ReferenceSymbolic,
        heap_pos: HeapPos,
        object: &HeapObject,
    ) -> Result<(), ExternalError> {
        self.stage(Clause::aliases(reference.clone(), heap_pos, object.clone()))
    }

    fn send_clause_assume_expands(
        &mut self,
        reference: &ReferenceSymbolic,
        class_name: &str,
    ) -> Result<(), ExternalError> {
        self.stage(Clause::expands(reference.clone(), class_name))
    }

    fn send_clause_assume_null(
        &mut self,
        reference: &ReferenceSymbolic,
    ) -> Result<(), ExternalError> {
        self.stage(Clause::null(reference.clone()))
    }

    fn send_clause_assume_class_initialized(
        &mut self,
        class_name: &str,
    ) -> Result<(), ExternalError> {
        self.stage(Clause::initialized(class_name))
    }

    fn send_clause_assume_class_not_initialized(
        &mut self,
        class_name: &str,
    ) -> Result<(), ExternalError> {
        self.stage(Clause::not_initialized(class_name))
    }

    fn retract_clause(&mut self) -> Result<(), ExternalError> {
        self.session.retract()?;
        Ok(())
    }

    fn check_sat(&mut self, positive: bool) -> Result<bool, ExternalError> {
        let staged = Literal {
            clause: self.session.current()?.clone(),
            positive,
        };
        let mut literals = self.committed.clone();
        literals.push(staged);
        let verdict = self.decide(&literals);
        debug!(depth = self.committed.len(), positive, ?verdict, "builtin check");
        Ok(verdict != Verdict::Unsat)
    }

    fn push_assumption(&mut self, positive: bool) -> Result<(), ExternalError> {
        let clause = self.session.commit()?;
        self.committed.push(Literal { clause, positive });
        Ok(())
    }

    fn pop_assumption(&mut self) -> Result<(), ExternalError> {
        self.session.pop()?;
        self.committed.pop();
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ExternalError> {
        self.session.clear()?;
        self.committed.clear();
        Ok(())
    }

    fn quit(&mut self) -> Result<(), ExternalError> {
        self.session.quit()?;
        self.committed.clear();
        Ok(())
    }

    fn fail(&mut self) {
        self.session.fail();
        self.committed.clear();
    }
}

// ── Reference resolution ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Null,
    Alias(HeapPos),
    Fresh(String),
}

#[derive(Debug, Default)]
struct ReferenceFacts {
    must: BTreeMap<String, Vec<Target>>,
    must_not: BTreeMap<String, Vec<Target>>,
}

impl ReferenceFacts {
    fn add(&mut self, reference: &ReferenceSymbolic, target: Target, positive: bool) {
        let map = if positive {
            &mut self.must
        } else {
            &mut self.must_not
        };
        map.entry(reference.origin().to_string())
            .or_default()
            .push(target);
    }

    /// A reference resolves to exactly one target, and never to one it
    /// must not resolve to.
    fn consistent(&self) -> bool {
        self.must.iter().all(|(origin, targets)| {
            let first = &targets[0];
            targets.iter().all(|t| t == first)
                && !self
                    .must_not
                    .get(origin)
                    .is_some_and(|excluded| excluded.contains(first))
        })
    }
}

// ── Numeric reasoning ───────────────────────────────────────────────

fn decide_numeric(conjuncts: Vec<Expr>, budget: &mut usize) -> Verdict {
    let mut literals = Vec::new();
    let mut disjunctions = Vec::new();
    for conjunct in conjuncts {
        flatten(conjunct, &mut literals, &mut disjunctions);
    }

    let base = decide_literals(&literals);
    if base == Verdict::Unsat || disjunctions.is_empty() {
        return base;
    }

    let first = disjunctions.remove(0);
    let mut verdict = Verdict::Unsat;
    for disjunct in first {
        if *budget == 0 {
            return Verdict::Unknown;
        }
        *budget -= 1;
        let mut branch = literals.clone();
        branch.extend(disjunctions.iter().cloned().map(Expr::Or));
        branch.push(disjunct);
        match decide_numeric(branch, budget) {
            Verdict::Sat => return Verdict::Sat,
            Verdict::Unknown => verdict = Verdict::Unknown,
            Verdict::Unsat => {}
        }
    }
    verdict
}

/// Split a conjunct into literals and disjunctions, pushing negations
/// inward.
fn flatten(expr: Expr, literals: &mut Vec<Expr>, disjunctions: &mut Vec<Vec<Expr>>) {
    match expr {
        Expr::And(parts) => {
            for part in parts {
                flatten(part, literals, disjunctions);
            }
        }
        Expr::Or(parts) => disjunctions.push(parts),
        Expr::Not(inner) => {
            if matches!(*inner, Expr::Var { .. }) || !inner.is_predicate() {
                literals.push(Expr::Not(inner));
            } else {
                flatten(inner.negate(), literals, disjunctions);
            }
        }
        other => literals.push(other),
    }
}

fn decide_literals(literals: &[Expr]) -> Verdict {
    let mut bounds: BTreeMap<String, IntBounds> = BTreeMap::new();
    let mut bools: BTreeMap<&str, bool> = BTreeMap::new();
    let mut has_unknown = false;

    for literal in literals {
        let polarity = match literal {
            Expr::Var {
                name,
                sort: Sort::Bool,
            } => Some((name.as_str(), true)),
            Expr::Not(inner) => match inner.as_ref() {
                Expr::Var {
                    name,
                    sort: Sort::Bool,
                } => Some((name.as_str(), false)),
                _ => None,
            },
            _ => None,
        };
        if let Some((name, value)) = polarity {
            if *bools.entry(name).or_insert(value) != value {
                return Verdict::Unsat;
            }
            continue;
        }

        match literal {
            Expr::Bool(true) => {}
            Expr::Bool(false) => return Verdict::Unsat,
            Expr::Cmp { op, lhs, rhs } => match Constraint::from_cmp(*op, lhs, rhs) {
                Some(Constraint::Constant(true)) => {}
                Some(Constraint::Constant(false)) => return Verdict::Unsat,
                Some(Constraint::Bound(name, op, value)) => {
                    bounds.entry(name).or_insert_with(IntBounds::new).apply(op, value)
                }
                None => has_unknown = true,
            },
            _ => has_unknown = true,
        }
    }

    if bounds.values().any(|b| !b.is_satisfiable()) {
        return Verdict::Unsat;
    }
    if has_unknown {
        Verdict::Unknown
    } else {
        Verdict::Sat
    }
}

/// A linear integer term `sum(coeff * var) + constant`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Linear {
    coeffs: BTreeMap<String, i128>,
    constant: i128,
}

impl Linear {
    fn constant(value: i128) -> Self {
        Self {
            coeffs: BTreeMap::new(),
            constant: value,
        }
    }

    fn of(expr: &Expr) -> Option<Self> {
        match expr {
            Expr::Int(v) => Some(Self::constant(i128::from(*v))),
            Expr::Var {
                name,
                sort: Sort::Int,
            } => Some(Self {
                coeffs: BTreeMap::from([(name.clone(), 1)]),
                constant: 0,
            }),
            Expr::Add(a, b) => Self::of(a)?.plus(&Self::of(b)?, 1),
            Expr::Sub(a, b) => Self::of(a)?.plus(&Self::of(b)?, -1),
            Expr::Neg(a) => Self::of(a)?.scaled(-1),
            Expr::Mul(a, b) => {
                let (a, b) = (Self::of(a)?, Self::of(b)?);
                if a.coeffs.is_empty() {
                    b.scaled(a.constant)
                } else if b.coeffs.is_empty() {
                    a.scaled(b.constant)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn plus(mut self, other: &Linear, sign: i128) -> Option<Self> {
        for (name, coeff) in &other.coeffs {
            let entry = self.coeffs.entry(name.clone()).or_insert(0);
            *entry = entry.checked_add(coeff.checked_mul(sign)?)?;
        }
        self.coeffs.retain(|_, c| *c != 0);
        self.constant = self.constant.checked_add(other.constant.checked_mul(sign)?)?;
        Some(self)
    }

    fn scaled(mut self, factor: i128) -> Option<Self> {
        for coeff in self.coeffs.values_mut() {
            *coeff = coeff.checked_mul(factor)?;
        }
        self.coeffs.retain(|_, c| *c != 0);
        self.constant = self.constant.checked_mul(factor)?;
        Some(self)
    }
}

/// A comparison reduced to a constant truth value or a bound on one
/// variable (`var op value`).
#[derive(Debug, Clone, PartialEq, Eq)]
enum Constraint {
    Constant(bool),
    Bound(String, CmpOp, i64),
}

impl Constraint {
    fn from_cmp(op: CmpOp, lhs: &Expr, rhs: &Expr) -> Option<Self> {
        // lhs - rhs op 0
        let diff = Linear::of(lhs)?.plus(&Linear::of(rhs)?, -1)?;
        if diff.coeffs.is_empty() {
            return Some(Constraint::Constant(holds(op, diff.constant, 0)));
        }
        if diff.coeffs.len() > 1 {
            return None;
        }
        let (name, coeff) = diff.coeffs.into_iter().next()?;
        // coeff * x op m
        let (mut coeff, mut op, mut m) = (coeff, op, diff.constant.checked_neg()?);
        if coeff < 0 {
            coeff = coeff.checked_neg()?;
            m = m.checked_neg()?;
            op = op.flip();
        }
        let (op, value) = match op {
            CmpOp::Eq | CmpOp::NotEq if m.rem_euclid(coeff) != 0 => {
                return Some(Constraint::Constant(op == CmpOp::NotEq))
            }
            CmpOp::Eq | CmpOp::NotEq => (op, m / coeff),
            CmpOp::Lt => (CmpOp::LtEq, m.checked_sub(1)?.div_euclid(coeff)),
            CmpOp::LtEq => (CmpOp::LtEq, m.div_euclid(coeff)),
            CmpOp::Gt => (CmpOp::GtEq, m.div_euclid(coeff).checked_add(1)?),
            CmpOp::GtEq => (CmpOp::GtEq, m.checked_neg()?.div_euclid(coeff).checked_neg()?),
        };
        let value = i64::try_from(value).ok()?;
        Some(Constraint::Bound(name, op, value))
    }
}

fn holds(op: CmpOp, lhs: i128, rhs: i128) -> bool {
    match op {
        CmpOp::Eq => lhs == rhs,
        CmpOp::NotEq => lhs != rhs,
        CmpOp::Lt => lhs < rhs,
        CmpOp::LtEq => lhs <= rhs,
        CmpOp::Gt => lhs > rhs,
        CmpOp::GtEq => lhs >= rhs,
    }
}

/// Integer bounds tracker for one variable.
#[derive(Debug, Clone)]
struct IntBounds {
    /// Inclusive lower bound.
    lower: Option<i64>,
    /// Inclusive upper bound.
    upper: Option<i64>,
    /// Required equality value.
    eq: Option<i64>,
    /// Two different equality values were required.
    eq_conflict: bool,
    /// Forbidden values.
    neq: Vec<i64>,
}

impl IntBounds {
    fn new() -> Self {
        Self {
            lower: None,
            upper: None,
            eq: None,
            eq_conflict: false,
            neq: Vec::new(),
        }
    }

    fn apply(&mut self, op: CmpOp, value: i64) {
        match op {
            CmpOp::Eq => self.apply_eq(value),
            CmpOp::NotEq => self.neq.push(value),
            CmpOp::Lt => self.apply_le(value.saturating_sub(1)),
            CmpOp::LtEq => self.apply_le(value),
            CmpOp::Gt => self.apply_ge(value.saturating_add(1)),
            CmpOp::GtEq => self.apply_ge(value),
        }
    }

    fn apply_ge(&mut self, value: i64) {
        self.lower = Some(self.lower.map_or(value, |prev| prev.max(value)));
    }

    fn apply_le(&mut self, value: i64) {
        self.upper = Some(self.upper.map_or(value, |prev| prev.min(value)));
    }

    fn apply_eq(&mut self, value: i64) {
        match self.eq {
            Some(prev) if prev != value => self.eq_conflict = true,
            _ => self.eq = Some(value),
        }
    }

    fn is_satisfiable(&self) -> bool {
        if self.eq_conflict {
            return false;
        }
        let lo = self.lower.unwrap_or(i64::MIN);
        let hi = self.upper.unwrap_or(i64::MAX);

        if let Some(eq_val) = self.eq {
            return lo <= eq_val && eq_val <= hi && !self.neq.contains(&eq_val);
        }
        if lo > hi {
            return false;
        }
        let range_size = (hi as i128) - (lo as i128) + 1;
        if range_size <= self.neq.len() as i128 {
            return !(lo..=hi).all(|v| self.neq.contains(&v));
        }
        true
    }
}
