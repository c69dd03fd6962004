//! Leaf decider driving an [`ExternalInterface`].

use tracing::{debug, warn};

use symdec_core::{Clause, Expr, HeapObject, HeapPos, ReferenceSymbolic};

use super::ExternalInterface;
use crate::chain::Local;
use crate::error::{DecisionError, ExternalError, ProtocolViolation};

/// Answers every query by staging the candidate fact on the backend,
/// checking it and retracting it; mirrors every assumption mutation onto
/// the backend's committed stack.
///
/// Backend failures become [`DecisionError`]s. An I/O failure also moves
/// the backend to `fail()` so a broken session is never reused; any other
/// failure with a clause staged retracts it, so the error ends with the
/// query that raised it.
#[derive(Debug)]
pub struct ExternalDecider<E> {
    backend: E,
}

impl<E: ExternalInterface> ExternalDecider<E> {
    /// Wrap `backend`, refusing one that does not report itself working.
    pub fn new(mut backend: E) -> Result<Self, DecisionError> {
        match backend.is_working() {
            Ok(true) => Ok(Self { backend }),
            Ok(false) => Err(DecisionError::NotWorking(backend.name().to_string())),
            Err(e) => {
                backend.fail();
                Err(e.into())
            }
        }
    }

    pub fn backend(&self) -> &E {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut E {
        &mut self.backend
    }

    fn guard<T>(&mut self, result: Result<T, ExternalError>) -> Result<T, DecisionError> {
        if let Err(ExternalError::Io(e)) = &result {
            warn!(backend = self.backend.name(), error = %e, "backend I/O failed");
            self.backend.fail();
        }
        result.map_err(DecisionError::from)
    }

    /// Like [`guard`](Self::guard), for a call made while a clause is
    /// staged.
    fn guard_staged<T>(&mut self, result: Result<T, ExternalError>) -> Result<T, DecisionError> {
        if let Err(e) = &result {
            if !matches!(e, ExternalError::Io(_)) {
                if let Err(retract) = self.backend.retract_clause() {
                    debug!(backend = self.backend.name(), error = %retract, "retract after failure");
                }
            }
        }
        self.guard(result)
    }

    fn query(&mut self, clause: &Clause) -> Result<bool, DecisionError> {
        let sent = self.backend.send_clause(clause);
        self.guard(sent)?;
        let verdict = self.backend.check_sat(true);
        let verdict = self.guard_staged(verdict)?;
        let retracted = self.backend.retract_clause();
        self.guard(retracted)?;
        debug!(backend = self.backend.name(), %clause, verdict, "query");
        Ok(verdict)
    }
}

impl<E: ExternalInterface> Local for ExternalDecider<E> {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn push_assumption_local(&mut self, clause: &Clause) -> Result<(), DecisionError> {
        let sent = self.backend.send_clause(clause);
        self.guard(sent)?;
        let pushed = self.backend.push_assumption(true);
        self.guard_staged(pushed)
    }

    fn clear_assumptions_local(&mut self) -> Result<(), DecisionError> {
        let cleared = self.backend.clear();
        self.guard(cleared)
    }

    fn is_sat_local(&mut self, predicate: &Expr) -> Result<bool, DecisionError> {
        self.query(&Clause::numeric(predicate.clone()))
    }

    fn is_sat_aliases_local(
        &mut self,
        reference: &ReferenceSymbolic,
        heap_pos: HeapPos,
        object: &HeapObject,
    ) -> Result<bool, DecisionError> {
        self.query(&Clause::aliases(reference.clone(), heap_pos, object.clone()))
    }

    fn is_sat_expands_local(
        &mut self,
        reference: &ReferenceSymbolic,
        class_name: &str,
    ) -> Result<bool, DecisionError> {
        self.query(&Clause::expands(reference.clone(), class_name))
    }

    fn is_sat_null_local(&mut self, reference: &ReferenceSymbolic) -> Result<bool, DecisionError> {
        self.query(&Clause::null(reference.clone()))
    }

    fn is_sat_initialized_local(&mut self, class_name: &str) -> Result<bool, DecisionError> {
        self.query(&Clause::initialized(class_name))
    }

    fn is_sat_not_initialized_local(&mut self, class_name: &str) -> Result<bool, DecisionError> {
        self.query(&Clause::not_initialized(class_name))
    }

    fn close_local(&mut self) -> Result<(), DecisionError> {
        match self.backend.quit() {
            Ok(()) | Err(ExternalError::Protocol(ProtocolViolation::Stopped { .. })) => Ok(()),
            Err(e) => self.guard(Err(e)),
        }
    }
}
