//! The decision-procedure contract shared by every chain link.

use symdec_core::{Clause, Expr, HeapObject, HeapPos, ReferenceSymbolic};

use crate::error::DecisionError;

/// Answers satisfiability queries against an assumption store.
///
/// Every query asks whether the store conjoined with one candidate fact is
/// satisfiable. `Ok(false)` means provably unsatisfiable; an `Err` means no
/// answer could be computed.
pub trait DecisionProcedure: Send {
    fn push_assumption(&mut self, clause: Clause) -> Result<(), DecisionError>;

    fn clear_assumptions(&mut self) -> Result<(), DecisionError>;

    /// Replace the store with `clauses`, in order.
    fn set_assumptions(&mut self, clauses: Vec<Clause>) -> Result<(), DecisionError>;

    /// Snapshot of the store.
    fn get_assumptions(&self) -> Result<Vec<Clause>, DecisionError>;

    fn is_sat(&mut self, predicate: &Expr) -> Result<bool, DecisionError>;

    fn is_sat_aliases(
        &mut self,
        reference: &ReferenceSymbolic,
        heap_pos: HeapPos,
        object: &HeapObject,
    ) -> Result<bool, DecisionError>;

    fn is_sat_expands(
        &mut self,
        reference: &ReferenceSymbolic,
        class_name: &str,
    ) -> Result<bool, DecisionError>;

    fn is_sat_null(&mut self, reference: &ReferenceSymbolic) -> Result<bool, DecisionError>;

    fn is_sat_initialized(&mut self, class_name: &str) -> Result<bool, DecisionError>;

    fn is_sat_not_initialized(&mut self, class_name: &str) -> Result<bool, DecisionError>;

    /// Release backend resources.
    fn close(&mut self) -> Result<(), DecisionError> {
        Ok(())
    }

    /// Ask whether `clause` is consistent with the store.
    fn is_sat_clause(&mut self, clause: &Clause) -> Result<bool, DecisionError> {
        match clause {
            Clause::NumericAssertion { predicate } => self.is_sat(predicate),
            Clause::ReferenceAliases {
                reference,
                heap_pos,
                object,
            } => self.is_sat_aliases(reference, *heap_pos, object),
            Clause::ReferenceExpands {
                reference,
                class_name,
            } => self.is_sat_expands(reference, class_name),
            Clause::ReferenceIsNull { reference } => self.is_sat_null(reference),
            Clause::ClassInitialized { class_name } => self.is_sat_initialized(class_name),
            Clause::ClassNotInitialized { class_name } => self.is_sat_not_initialized(class_name),
        }
    }
}

impl<D: DecisionProcedure + ?Sized> DecisionProcedure for Box<D> {
    fn push_assumption(&mut self, clause: Clause) -> Result<(), DecisionError> {
        (**self).push_assumption(clause)
    }

    fn clear_assumptions(&mut self) -> Result<(), DecisionError> {
        (**self).clear_assumptions()
    }

    fn set_assumptions(&mut self, clauses: Vec<Clause>) -> Result<(), DecisionError> {
        (**self).set_assumptions(clauses)
    }

    fn get_assumptions(&self) -> Result<Vec<Clause>, DecisionError> {
        (**self).get_assumptions()
    }

    fn is_sat(&mut self, predicate: &Expr) -> Result<bool, DecisionError> {
        (**self).is_sat(predicate)
    }

    fn is_sat_aliases(
        &mut self,
        reference: &ReferenceSymbolic,
        heap_pos: HeapPos,
        object: &HeapObject,
    ) -> Result<bool, DecisionError> {
        (**self).is_sat_aliases(reference, heap_pos, object)
    }

    fn is_sat_expands(
        &mut self,
        reference: &ReferenceSymbolic,
        class_name: &str,
    ) -> Result<bool, DecisionError> {
        (**self).is_sat_expands(reference, class_name)
    }

    fn is_sat_null(&mut self, reference: &ReferenceSymbolic) -> Result<bool, DecisionError> {
        (**self).is_sat_null(reference)
    }

    fn is_sat_initialized(&mut self, class_name: &str) -> Result<bool, DecisionError> {
        (**self).is_sat_initialized(class_name)
    }

    fn is_sat_not_initialized(&mut self, class_name: &str) -> Result<bool, DecisionError> {
        (**self).is_sat_not_initialized(class_name)
    }

    fn close(&mut self) -> Result<(), DecisionError> {
        (**self).close()
    }
}
