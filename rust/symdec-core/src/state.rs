//! Interfaces to the interpreter-side collaborators of the decision layer.
//!
//! The decision layer never inspects the interpreter directly. It sees a
//! program state through [`State`], the loaded classes through
//! [`ClassHierarchy`], and re-enters the interpreter through
//! [`MethodRunner`] when it must evaluate an invariant-checking method.

use std::fmt;
use thiserror::Error;

use crate::clause::Clause;
use crate::expr::Expr;
use crate::values::{HeapObject, HeapPos, ReferenceSymbolic};

/// Marker a class hierarchy reports for methods that check a necessary
/// condition of heap-object validity.
pub const CONSERVATIVE_REP_OK: &str = "ConservativeRepOk";

// ── Errors ──────────────────────────────────────────────────────────

/// Failure applying a fact to a program state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The fact is ill-typed for the reference's declared class.
    #[error("cannot resolve {reference} (static type {static_type}) to an instance of {class_name}")]
    InvalidType {
        reference: String,
        class_name: String,
        static_type: String,
    },
    /// The fact contradicts a fact the state already holds.
    #[error("contradiction: {0}")]
    Contradiction(String),
    #[error("unknown class '{0}'")]
    UnknownClass(String),
}

/// Failure re-entering the interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("method {0} not found")]
    MethodNotFound(MethodRef),
    #[error("{method} faulted: {message}")]
    Fault { method: MethodRef, message: String },
}

// ── Program state ───────────────────────────────────────────────────

/// How a symbolic reference has been resolved in a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    Null,
    Object(HeapPos),
}

/// A symbolic program state.
///
/// Every `assume_*` either refines the state or fails with a [`StateError`]
/// and leaves it unchanged.
pub trait State: Send {
    fn assume_numeric(&mut self, predicate: &Expr) -> Result<(), StateError>;

    fn assume_expands(
        &mut self,
        reference: &ReferenceSymbolic,
        class_name: &str,
    ) -> Result<(), StateError>;

    fn assume_aliases(
        &mut self,
        reference: &ReferenceSymbolic,
        heap_pos: HeapPos,
        object: &HeapObject,
    ) -> Result<(), StateError>;

    fn assume_null(&mut self, reference: &ReferenceSymbolic) -> Result<(), StateError>;

    fn assume_class_initialized(
        &mut self,
        class_name: &str,
        initialized: bool,
    ) -> Result<(), StateError>;

    /// The clauses assumed so far, in order.
    fn path_condition(&self) -> Vec<Clause>;

    fn resolution(&self, reference: &ReferenceSymbolic) -> Option<Resolution>;

    fn object(&self, pos: HeapPos) -> Option<&HeapObject>;

    /// Positions of every object in the heap, ascending.
    fn heap_positions(&self) -> Vec<HeapPos>;

    fn boxed_clone(&self) -> Box<dyn State>;

    /// Apply any clause through the matching `assume_*` method.
    fn assume(&mut self, clause: &Clause) -> Result<(), StateError> {
        match clause {
            Clause::NumericAssertion { predicate } => self.assume_numeric(predicate),
            Clause::ReferenceAliases {
                reference,
                heap_pos,
                object,
            } => self.assume_aliases(reference, *heap_pos, object),
            Clause::ReferenceExpands {
                reference,
                class_name,
            } => self.assume_expands(reference, class_name),
            Clause::ReferenceIsNull { reference } => self.assume_null(reference),
            Clause::ClassInitialized { class_name } => {
                self.assume_class_initialized(class_name, true)
            }
            Clause::ClassNotInitialized { class_name } => {
                self.assume_class_initialized(class_name, false)
            }
        }
    }
}

impl fmt::Debug for dyn State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("heap_positions", &self.heap_positions())
            .field("path_condition", &self.path_condition())
            .finish()
    }
}

// ── Class hierarchy ─────────────────────────────────────────────────

/// Single-rooted class hierarchy lookup.
pub trait ClassHierarchy: Send + Sync {
    fn contains(&self, class_name: &str) -> bool;

    /// Direct superclass; `None` for the root or an unknown class.
    fn superclass(&self, class_name: &str) -> Option<&str>;

    fn declares_method(&self, class_name: &str, method_name: &str) -> bool;

    /// The method `class_name` itself declares under `marker`, if any.
    fn marked_method(&self, class_name: &str, marker: &str) -> Option<&str>;

    /// `class_name` followed by its superclasses up to the root.
    fn supertypes(&self, class_name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        if !self.contains(class_name) {
            return chain;
        }
        let mut current = Some(class_name.to_string());
        while let Some(name) = current {
            if chain.contains(&name) {
                break;
            }
            current = self.superclass(&name).map(str::to_string);
            chain.push(name);
        }
        chain
    }

    fn is_subclass(&self, sub: &str, sup: &str) -> bool {
        self.supertypes(sub).iter().any(|c| c == sup)
    }
}

// ── Interpreter re-entry ────────────────────────────────────────────

/// A method identified by its declaring class and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef {
    pub class_name: String,
    pub method_name: String,
}

impl MethodRef {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_name, self.method_name)
    }
}

/// How an invariant-checking method run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Returned(bool),
    /// The run hit its exploration bound before returning.
    ScopeExhausted,
}

/// Runs a method to completion on a receiver, isolated from the caller's
/// exploration.
pub trait MethodRunner: Send {
    fn run(
        &mut self,
        state: &dyn State,
        method: &MethodRef,
        receiver: HeapPos,
    ) -> Result<RunOutcome, RunError>;
}
