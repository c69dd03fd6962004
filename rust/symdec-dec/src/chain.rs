//! Chain of responsibility.
//!
//! A chain is a sequence of [`Local`] links ending in a terminal
//! [`DecisionProcedure`]. Each link sees a request before the rest of the
//! chain: a query runs the link's local hook first, and a rejection stops
//! the query there. Accepted queries and every mutation continue to the
//! next link. Hooks a link does not override accept and ignore, so a link
//! is transparent for everything it does not care about.

use tracing::trace;

use symdec_core::{Clause, Expr, HeapObject, HeapPos, ReferenceSymbolic};

use crate::error::DecisionError;
use crate::procedure::DecisionProcedure;

/// The part of a chain link that runs before the rest of the chain.
pub trait Local: Send {
    /// Name used in log output.
    fn name(&self) -> &str {
        "link"
    }

    fn push_assumption_local(&mut self, _clause: &Clause) -> Result<(), DecisionError> {
        Ok(())
    }

    fn clear_assumptions_local(&mut self) -> Result<(), DecisionError> {
        Ok(())
    }

    fn set_assumptions_local(&mut self, clauses: &[Clause]) -> Result<(), DecisionError> {
        self.clear_assumptions_local()?;
        for clause in clauses {
            self.push_assumption_local(clause)?;
        }
        Ok(())
    }

    fn is_sat_local(&mut self, _predicate: &Expr) -> Result<bool, DecisionError> {
        Ok(true)
    }

    fn is_sat_aliases_local(
        &mut self,
        _reference: &ReferenceSymbolic,
        _heap_pos: HeapPos,
        _object: &HeapObject,
    ) -> Result<bool, DecisionError> {
        Ok(true)
    }

    fn is_sat_expands_local(
        &mut self,
        _reference: &ReferenceSymbolic,
        _class_name: &str,
    ) -> Result<bool, DecisionError> {
        Ok(true)
    }

    fn is_sat_null_local(&mut self, _reference: &ReferenceSymbolic) -> Result<bool, DecisionError> {
        Ok(true)
    }

    fn is_sat_initialized_local(&mut self, _class_name: &str) -> Result<bool, DecisionError> {
        Ok(true)
    }

    fn is_sat_not_initialized_local(&mut self, _class_name: &str) -> Result<bool, DecisionError> {
        Ok(true)
    }

    fn close_local(&mut self) -> Result<(), DecisionError> {
        Ok(())
    }
}

impl<L: Local + ?Sized> Local for Box<L> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn push_assumption_local(&mut self, clause: &Clause) -> Result<(), DecisionError> {
        (**self).push_assumption_local(clause)
    }

    fn clear_assumptions_local(&mut self) -> Result<(), DecisionError> {
        (**self).clear_assumptions_local()
    }

    fn set_assumptions_local(&mut self, clauses: &[Clause]) -> Result<(), DecisionError> {
        (**self).set_assumptions_local(clauses)
    }

    fn is_sat_local(&mut self, predicate: &Expr) -> Result<bool, DecisionError> {
        (**self).is_sat_local(predicate)
    }

    fn is_sat_aliases_local(
        &mut self,
        reference: &ReferenceSymbolic,
        heap_pos: HeapPos,
        object: &HeapObject,
    ) -> Result<bool, DecisionError> {
        (**self).is_sat_aliases_local(reference, heap_pos, object)
    }

    fn is_sat_expands_local(
        &mut self,
        reference: &ReferenceSymbolic,
        class_name: &str,
    ) -> Result<bool, DecisionError> {
        (**self).is_sat_expands_local(reference, class_name)
    }

    fn is_sat_null_local(&mut self, reference: &ReferenceSymbolic) -> Result<bool, DecisionError> {
        (**self).is_sat_null_local(reference)
    }

    fn is_sat_initialized_local(&mut self, class_name: &str) -> Result<bool, DecisionError> {
        (**self).is_sat_initialized_local(class_name)
    }

    fn is_sat_not_initialized_local(&mut self, class_name: &str) -> Result<bool, DecisionError> {
        (**self).is_sat_not_initialized_local(class_name)
    }

    fn close_local(&mut self) -> Result<(), DecisionError> {
        (**self).close_local()
    }
}

// ── Chained ─────────────────────────────────────────────────────────

/// One link of a chain: a local part in front of the next procedure.
#[derive(Debug)]
pub struct Chained<L, N> {
    local: L,
    next: N,
}

impl<L: Local, N: DecisionProcedure> Chained<L, N> {
    pub fn new(local: L, next: N) -> Self {
        Self { local, next }
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut L {
        &mut self.local
    }

    pub fn next(&self) -> &N {
        &self.next
    }

    pub fn next_mut(&mut self) -> &mut N {
        &mut self.next
    }

    pub fn into_parts(self) -> (L, N) {
        (self.local, self.next)
    }

    fn rejected(&self, query: &str, fact: &dyn std::fmt::Display) -> Result<bool, DecisionError> {
        trace!(link = self.local.name(), query, %fact, "rejected");
        Ok(false)
    }
}

impl<L: Local, N: DecisionProcedure> DecisionProcedure for Chained<L, N> {
    fn push_assumption(&mut self, clause: Clause) -> Result<(), DecisionError> {
        self.local.push_assumption_local(&clause)?;
        self.next.push_assumption(clause)
    }

    fn clear_assumptions(&mut self) -> Result<(), DecisionError> {
        self.local.clear_assumptions_local()?;
        self.next.clear_assumptions()
    }

    fn set_assumptions(&mut self, clauses: Vec<Clause>) -> Result<(), DecisionError> {
        self.local.set_assumptions_local(&clauses)?;
        self.next.set_assumptions(clauses)
    }

    fn get_assumptions(&self) -> Result<Vec<Clause>, DecisionError> {
        self.next.get_assumptions()
    }

    fn is_sat(&mut self, predicate: &Expr) -> Result<bool, DecisionError> {
        if !self.local.is_sat_local(predicate)? {
            return self.rejected("is_sat", predicate);
        }
        self.next.is_sat(predicate)
    }

    fn is_sat_aliases(
        &mut self,
        reference: &ReferenceSymbolic,
        heap_pos: HeapPos,
        object: &HeapObject,
    ) -> Result<bool, DecisionError> {
        if !self
            .local
            .is_sat_aliases_local(reference, heap_pos, object)?
        {
            return self.rejected("is_sat_aliases", reference);
        }
        self.next.is_sat_aliases(reference, heap_pos, object)
    }

    fn is_sat_expands(
        &mut self,
        reference: &ReferenceSymbolic,
        class_name: &str,
    ) -> Result<bool, DecisionError> {
        if !self.local.is_sat_expands_local(reference, class_name)? {
            return self.rejected("is_sat_expands", reference);
        }
        self.next.is_sat_expands(reference, class_name)
    }

    fn is_sat_null(&mut self, reference: &ReferenceSymbolic) -> Result<bool, DecisionError> {
        if !self.local.is_sat_null_local(reference)? {
            return self.rejected("is_sat_null", reference);
        }
        self.next.is_sat_null(reference)
    }

    fn is_sat_initialized(&mut self, class_name: &str) -> Result<bool, DecisionError> {
        if !self.local.is_sat_initialized_local(class_name)? {
            return self.rejected("is_sat_initialized", &class_name);
        }
        self.next.is_sat_initialized(class_name)
    }

    fn is_sat_not_initialized(&mut self, class_name: &str) -> Result<bool, DecisionError> {
        if !self.local.is_sat_not_initialized_local(class_name)? {
            return self.rejected("is_sat_not_initialized", &class_name);
        }
        self.next.is_sat_not_initialized(class_name)
    }

    fn close(&mut self) -> Result<(), DecisionError> {
        let local = self.local.close_local();
        let next = self.next.close();
        local.and(next)
    }
}

// ── Builder ─────────────────────────────────────────────────────────

/// Composes links in caller order. The first link added is the head.
#[derive(Default)]
pub struct ChainBuilder {
    links: Vec<Box<dyn Local>>,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(mut self, local: impl Local + 'static) -> Self {
        self.links.push(Box::new(local));
        self
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Close the chain with `terminal`.
    pub fn build(self, terminal: impl DecisionProcedure + 'static) -> Box<dyn DecisionProcedure> {
        let mut chain: Box<dyn DecisionProcedure> = Box::new(terminal);
        for local in self.links.into_iter().rev() {
            chain = Box::new(Chained::new(local, chain));
        }
        chain
    }
}
