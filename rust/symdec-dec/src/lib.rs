//! Symdec Decision
//!
//! Decision procedures for a symbolic executor. A procedure keeps the
//! current path condition as an ordered list of assumption clauses and
//! answers whether a candidate fact is satisfiable together with it.
//! Procedures compose into a chain of responsibility: each link may reject
//! a query, and any link not rejecting forwards it to the next one.
//!
//! The building blocks are the [`AlwaysSat`] terminal, the
//! [`TimerDecorator`], the [`ConservativeRepOk`] heap checker and the
//! [`ExternalDecider`] leaf over an [`ExternalInterface`] backend.
//! [`bootstrap::assemble`] wires them from a [`DecisionConfig`].

pub mod always_sat;
pub mod assumptions;
pub mod bootstrap;
pub mod chain;
pub mod config;
pub mod conservative;
pub mod error;
pub mod external;
pub mod procedure;
pub mod timer;

pub use always_sat::AlwaysSat;
pub use assumptions::Assumptions;
pub use bootstrap::{assemble, available_backends, Assembled, Collaborators};
pub use chain::{ChainBuilder, Chained, Local};
pub use config::{BackendKind, ConservativeConfig, DecisionConfig, SmtLibConfig, TargetConfig};
pub use conservative::{
    CheckerParameters, ConservativeRepOk, InitialStateSupplier, StateSupplier, StateSuppliers,
};
pub use error::{
    DecisionError, ErrorKind, ExternalError, InternalFault, Liveness, ProtocolViolation,
};
pub use external::{
    BuiltinBackend, ExternalDecider, ExternalInterface, ProtocolSession, SmtLibProcess,
};
pub use procedure::DecisionProcedure;
pub use timer::{ElapsedHandle, TimerDecorator};
