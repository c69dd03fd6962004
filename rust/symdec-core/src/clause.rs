//! Path-condition clauses.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::expr::Expr;
use crate::values::{HeapObject, HeapPos, ReferenceSymbolic};

/// One atomic fact of a path condition.
///
/// Clauses are immutable once built and compare structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Clause {
    /// A numeric predicate holds.
    NumericAssertion { predicate: Expr },
    /// A symbolic reference points to an object already in the heap.
    ReferenceAliases {
        reference: ReferenceSymbolic,
        heap_pos: HeapPos,
        object: HeapObject,
    },
    /// A symbolic reference points to a fresh object of the given class.
    ReferenceExpands {
        reference: ReferenceSymbolic,
        class_name: String,
    },
    /// A symbolic reference is null.
    ReferenceIsNull { reference: ReferenceSymbolic },
    /// A class was initialized before symbolic execution started.
    ClassInitialized { class_name: String },
    /// A class was not initialized before symbolic execution started.
    ClassNotInitialized { class_name: String },
}

/// Discriminant of a [`Clause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    NumericAssertion,
    ReferenceAliases,
    ReferenceExpands,
    ReferenceIsNull,
    ClassInitialized,
    ClassNotInitialized,
}

impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClauseKind::NumericAssertion => "numeric",
            ClauseKind::ReferenceAliases => "aliases",
            ClauseKind::ReferenceExpands => "expands",
            ClauseKind::ReferenceIsNull => "null",
            ClauseKind::ClassInitialized => "initialized",
            ClauseKind::ClassNotInitialized => "not-initialized",
        };
        write!(f, "{}", s)
    }
}

impl Clause {
    pub fn numeric(predicate: Expr) -> Self {
        Clause::NumericAssertion { predicate }
    }

    pub fn aliases(reference: ReferenceSymbolic, heap_pos: HeapPos, object: HeapObject) -> Self {
        Clause::ReferenceAliases {
            reference,
            heap_pos,
            object,
        }
    }

    pub fn expands(reference: ReferenceSymbolic, class_name: impl Into<String>) -> Self {
        Clause::ReferenceExpands {
            reference,
            class_name: class_name.into(),
        }
    }

    pub fn null(reference: ReferenceSymbolic) -> Self {
        Clause::ReferenceIsNull { reference }
    }

    pub fn initialized(class_name: impl Into<String>) -> Self {
        Clause::ClassInitialized {
            class_name: class_name.into(),
        }
    }

    pub fn not_initialized(class_name: impl Into<String>) -> Self {
        Clause::ClassNotInitialized {
            class_name: class_name.into(),
        }
    }

    pub fn kind(&self) -> ClauseKind {
        match self {
            Clause::NumericAssertion { .. } => ClauseKind::NumericAssertion,
            Clause::ReferenceAliases { .. } => ClauseKind::ReferenceAliases,
            Clause::ReferenceExpands { .. } => ClauseKind::ReferenceExpands,
            Clause::ReferenceIsNull { .. } => ClauseKind::ReferenceIsNull,
            Clause::ClassInitialized { .. } => ClauseKind::ClassInitialized,
            Clause::ClassNotInitialized { .. } => ClauseKind::ClassNotInitialized,
        }
    }

    /// The symbolic reference a reference clause constrains.
    pub fn reference(&self) -> Option<&ReferenceSymbolic> {
        match self {
            Clause::ReferenceAliases { reference, .. }
            | Clause::ReferenceExpands { reference, .. }
            | Clause::ReferenceIsNull { reference } => Some(reference),
            _ => None,
        }
    }

    /// The class a class-initialization clause is about.
    pub fn initialization_class(&self) -> Option<&str> {
        match self {
            Clause::ClassInitialized { class_name } | Clause::ClassNotInitialized { class_name } => {
                Some(class_name)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::NumericAssertion { predicate } => write!(f, "{}", predicate),
            Clause::ReferenceAliases {
                reference,
                heap_pos,
                object,
            } => write!(
                f,
                "{} == Object[{}] ({})",
                reference,
                heap_pos,
                object.class_name()
            ),
            Clause::ReferenceExpands {
                reference,
                class_name,
            } => write!(f, "{} == fresh {}", reference, class_name),
            Clause::ReferenceIsNull { reference } => write!(f, "{} == null", reference),
            Clause::ClassInitialized { class_name } => write!(f, "pre_init({})", class_name),
            Clause::ClassNotInitialized { class_name } => write!(f, "!pre_init({})", class_name),
        }
    }
}
