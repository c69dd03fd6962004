use symdec_core::{Clause, Expr, HeapObject, HeapPos, ReferenceSymbolic};

use crate::assumptions::Assumptions;
use crate::error::DecisionError;
use crate::procedure::DecisionProcedure;

/// Terminal chain link: owns the assumption store and accepts every query.
#[derive(Debug, Default)]
pub struct AlwaysSat {
    store: Assumptions,
}

impl AlwaysSat {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DecisionProcedure for AlwaysSat {
    fn push_assumption(&mut self, clause: Clause) -> Result<(), DecisionError> {
        self.store.push(clause);
        Ok(())
    }

    fn clear_assumptions(&mut self) -> Result<(), DecisionError> {
        self.store.clear();
        Ok(())
    }

    fn set_assumptions(&mut self, clauses: Vec<Clause>) -> Result<(), DecisionError> {
        self.store.set(clauses);
        Ok(())
    }

    fn get_assumptions(&self) -> Result<Vec<Clause>, DecisionError> {
        Ok(self.store.snapshot())
    }

    fn is_sat(&mut self, _predicate: &Expr) -> Result<bool, DecisionError> {
        Ok(true)
    }

    fn is_sat_aliases(
        &mut self,
        _reference: &ReferenceSymbolic,
        _heap_pos: HeapPos,
        _object: &HeapObject,
    ) -> Result<bool, DecisionError> {
        Ok(true)
    }

    fn is_sat_expands(
        &mut self,
        _reference: &ReferenceSymbolic,
        _class_name: &str,
    ) -> Result<bool, DecisionError> {
        Ok(true)
    }

    fn is_sat_null(&mut self, _reference: &ReferenceSymbolic) -> Result<bool, DecisionError> {
        Ok(true)
    }

    fn is_sat_initialized(&mut self, _class_name: &str) -> Result<bool, DecisionError> {
        Ok(true)
    }

    fn is_sat_not_initialized(&mut self, _class_name: &str) -> Result<bool, DecisionError> {
        Ok(true)
    }
}
