//! External-interface protocol.
//!
//! A leaf decider talks to a satisfiability backend through
//! [`ExternalInterface`]: stage one clause, check it (or its negation)
//! against the committed assumptions, then either commit it or retract it.
//! Backends keep their protocol state in a [`ProtocolSession`], which
//! enforces the call order:
//!
//! | call | staging before | staging after |
//! |---|---|---|
//! | `send_clause_assume*` | empty | staged |
//! | `check_sat` | staged | staged |
//! | `push_assumption` | staged | empty |
//! | `retract_clause` | staged | empty |
//! | `pop_assumption` | empty | empty |
//! | `clear` | any | empty |
//! | `quit` | empty | stopped |
//! | `fail` | any | stopped |

pub mod builtin;
pub mod decider;
pub mod encode;
pub mod smtlib;

pub use builtin::BuiltinBackend;
pub use decider::ExternalDecider;
pub use smtlib::SmtLibProcess;

use symdec_core::{Clause, Expr, HeapObject, HeapPos, ReferenceSymbolic};

use crate::error::{ExternalError, InternalFault, Liveness, ProtocolViolation};

// ── Interface ───────────────────────────────────────────────────────

/// A stateful connection to a satisfiability backend.
pub trait ExternalInterface: Send {
    fn name(&self) -> &str;

    /// Whether the backend can answer queries. May probe it on first call.
    fn is_working(&mut self) -> Result<bool, ExternalError>;

    fn send_clause_assume(&mut self, predicate: &Expr) -> Result<(), ExternalError>;

    fn send_clause_assume_aliases(
        &mut self,
        reference: &ReferenceSymbolic,
        heap_pos: HeapPos,
        object: &HeapObject,
    ) -> Result<(), ExternalError>;

    fn send_clause_assume_expands(
        &mut self,
        reference: &ReferenceSymbolic,
        class_name: &str,
    ) -> Result<(), ExternalError>;

    fn send_clause_assume_null(&mut self, reference: &ReferenceSymbolic)
        -> Result<(), ExternalError>;

    fn send_clause_assume_class_initialized(&mut self, class_name: &str)
        -> Result<(), ExternalError>;

    fn send_clause_assume_class_not_initialized(
        &mut self,
        class_name: &str,
    ) -> Result<(), ExternalError>;

    /// Discard the staged clause.
    fn retract_clause(&mut self) -> Result<(), ExternalError>;

    /// Satisfiability of the committed assumptions conjoined with the
    /// staged clause, or with its negation when `positive` is false.
    fn check_sat(&mut self, positive: bool) -> Result<bool, ExternalError>;

    /// Commit the staged clause (negated when `positive` is false).
    fn push_assumption(&mut self, positive: bool) -> Result<(), ExternalError>;

    /// Remove the most recently committed assumption.
    fn pop_assumption(&mut self) -> Result<(), ExternalError> {
        Err(ProtocolViolation::Unsupported(format!("{} cannot pop assumptions", self.name())).into())
    }

    /// Remove every committed assumption.
    fn clear(&mut self) -> Result<(), ExternalError>;

    /// Shut the backend down normally.
    fn quit(&mut self) -> Result<(), ExternalError>;

    /// Shut the backend down after an unexpected failure.
    fn fail(&mut self);

    /// Stage any clause through the matching `send_clause_assume*` call.
    fn send_clause(&mut self, clause: &Clause) -> Result<(), ExternalError> {
        match clause {
            Clause::NumericAssertion { predicate } => self.send_clause_assume(predicate),
            Clause::ReferenceAliases {
                reference,
                heap_pos,
                object,
            } => self.send_clause_assume_aliases(reference, *heap_pos, object),
            Clause::ReferenceExpands {
                reference,
                class_name,
            } => self.send_clause_assume_expands(reference, class_name),
            Clause::ReferenceIsNull { reference } => self.send_clause_assume_null(reference),
            Clause::ClassInitialized { class_name } => {
                self.send_clause_assume_class_initialized(class_name)
            }
            Clause::ClassNotInitialized { class_name } => {
                self.send_clause_assume_class_not_initialized(class_name)
            }
        }
    }
}

/// Reject integer-sorted expressions where a predicate is expected.
pub(crate) fn require_predicate(predicate: &Expr) -> Result<(), ExternalError> {
    if predicate.is_predicate() {
        Ok(())
    } else {
        Err(InternalFault::new(format!("'{}' is not a predicate", predicate)).into())
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// Protocol state of one backend session: liveness, the staged clause and
/// the depth of the committed assumption stack.
#[derive(Debug, Clone)]
pub struct ProtocolSession {
    liveness: Liveness,
    staged: Option<Clause>,
    depth: usize,
}

impl Default for ProtocolSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolSession {
    pub fn new() -> Self {
        Self {
            liveness: Liveness::Working,
            staged: None,
            depth: 0,
        }
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    pub fn is_live(&self) -> bool {
        self.liveness == Liveness::Working
    }

    /// Committed assumptions not yet popped or cleared.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn staged(&self) -> Option<&Clause> {
        self.staged.as_ref()
    }

    pub fn ensure_live(&self) -> Result<(), ProtocolViolation> {
        if self.is_live() {
            Ok(())
        } else {
            Err(ProtocolViolation::Stopped {
                liveness: self.liveness,
            })
        }
    }

    pub fn stage(&mut self, clause: Clause) -> Result<(), ProtocolViolation> {
        self.ensure_live()?;
        if self.staged.is_some() {
            return Err(ProtocolViolation::PredicateAlreadyStaged);
        }
        self.staged = Some(clause);
        Ok(())
    }

    /// The staged clause, for checking.
    pub fn current(&self) -> Result<&Clause, ProtocolViolation> {
        self.ensure_live()?;
        self.staged
            .as_ref()
            .ok_or(ProtocolViolation::NoPredicateStaged)
    }

    /// Move the staged clause onto the committed stack.
    pub fn commit(&mut self) -> Result<Clause, ProtocolViolation> {
        self.ensure_live()?;
        let clause = self
            .staged
            .take()
            .ok_or(ProtocolViolation::NoPredicateStaged)?;
        self.depth += 1;
        Ok(clause)
    }

    pub fn retract(&mut self) -> Result<Clause, ProtocolViolation> {
        self.ensure_live()?;
        self.staged
            .take()
            .ok_or(ProtocolViolation::NoPredicateStaged)
    }

    pub fn pop(&mut self) -> Result<(), ProtocolViolation> {
        self.ensure_live()?;
        if self.staged.is_some() {
            return Err(ProtocolViolation::PredicateAlreadyStaged);
        }
        if self.depth == 0 {
            return Err(ProtocolViolation::NothingToPop);
        }
        self.depth -= 1;
        Ok(())
    }

    /// Empty the committed stack and the staging slot. Returns the depth
    /// that was cleared.
    pub fn clear(&mut self) -> Result<usize, ProtocolViolation> {
        self.ensure_live()?;
        self.staged = None;
        Ok(std::mem::take(&mut self.depth))
    }

    pub fn quit(&mut self) -> Result<(), ProtocolViolation> {
        self.ensure_live()?;
        if self.staged.is_some() {
            return Err(ProtocolViolation::PredicateAlreadyStaged);
        }
        self.liveness = Liveness::Quit;
        self.depth = 0;
        Ok(())
    }

    /// Legal in any state; a second call has no effect.
    pub fn fail(&mut self) {
        if self.liveness == Liveness::Working {
            self.liveness = Liveness::Failed;
        }
        self.staged = None;
        self.depth = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause() -> Clause {
        Clause::initialized("Foo")
    }

    #[test]
    fn stage_then_commit() {
        let mut s = ProtocolSession::new();
        s.stage(clause()).unwrap();
        assert_eq!(s.current().unwrap(), &clause());
        assert_eq!(s.commit().unwrap(), clause());
        assert_eq!(s.depth(), 1);
        assert!(s.staged().is_none());
    }

    #[test]
    fn double_stage_is_a_violation() {
        let mut s = ProtocolSession::new();
        s.stage(clause()).unwrap();
        assert_eq!(
            s.stage(clause()).unwrap_err(),
            ProtocolViolation::PredicateAlreadyStaged
        );
    }

    #[test]
    fn staged_operations_need_a_staged_clause() {
        let mut s = ProtocolSession::new();
        assert_eq!(s.current().unwrap_err(), ProtocolViolation::NoPredicateStaged);
        assert_eq!(s.commit().unwrap_err(), ProtocolViolation::NoPredicateStaged);
        assert_eq!(s.retract().unwrap_err(), ProtocolViolation::NoPredicateStaged);
    }

    #[test]
    fn pop_requires_empty_staging_and_depth() {
        let mut s = ProtocolSession::new();
        assert_eq!(s.pop().unwrap_err(), ProtocolViolation::NothingToPop);
        s.stage(clause()).unwrap();
        s.commit().unwrap();
        s.stage(clause()).unwrap();
        assert_eq!(s.pop().unwrap_err(), ProtocolViolation::PredicateAlreadyStaged);
        s.retract().unwrap();
        s.pop().unwrap();
        assert_eq!(s.depth(), 0);
    }

    #[test]
    fn clear_discards_staged_clause() {
        let mut s = ProtocolSession::new();
        s.stage(clause()).unwrap();
        s.commit().unwrap();
        s.stage(clause()).unwrap();
        assert_eq!(s.clear().unwrap(), 1);
        assert!(s.staged().is_none());
        assert_eq!(s.depth(), 0);
    }

    #[test]
    fn quit_requires_empty_staging_and_stops_everything() {
        let mut s = ProtocolSession::new();
        s.stage(clause()).unwrap();
        assert!(s.quit().is_err());
        s.retract().unwrap();
        s.quit().unwrap();
        let stopped = ProtocolViolation::Stopped {
            liveness: Liveness::Quit,
        };
        assert_eq!(s.stage(clause()).unwrap_err(), stopped);
        assert_eq!(s.clear().unwrap_err(), stopped);
        assert_eq!(s.quit().unwrap_err(), stopped);
        assert!(!s.is_live());
    }

    #[test]
    fn fail_is_idempotent_and_keeps_quit() {
        let mut s = ProtocolSession::new();
        s.stage(clause()).unwrap();
        s.fail();
        s.fail();
        assert_eq!(s.liveness(), Liveness::Failed);
        assert!(s.staged().is_none());

        let mut q = ProtocolSession::new();
        q.quit().unwrap();
        q.fail();
        assert_eq!(q.liveness(), Liveness::Quit);
    }

    #[test]
    fn non_predicates_are_internal_faults() {
        assert!(require_predicate(&Expr::gt(Expr::int_var("x"), Expr::int(0))).is_ok());
        let err = require_predicate(&Expr::int_var("x")).unwrap_err();
        assert!(matches!(err, ExternalError::Internal(_)));
    }
}
