//! Symdec Core
//!
//! Shared value types for the decision-procedure layer: the numeric predicate
//! IR, symbolic references and heap-object snapshots, the path-condition
//! `Clause` model, and the interfaces through which the decision layer talks
//! to the interpreter's program state, class hierarchy and method runner.

pub mod clause;
pub mod expr;
pub mod memory;
pub mod state;
pub mod values;

pub use clause::{Clause, ClauseKind};
pub use expr::{CmpOp, Expr, Sort};
pub use state::{
    ClassHierarchy, MethodRef, MethodRunner, Resolution, RunError, RunOutcome, State, StateError,
    CONSERVATIVE_REP_OK,
};
pub use values::{symbol_digest, HeapObject, HeapPos, ReferenceSymbolic, Value};
