//! Error taxonomy of the decision layer.
//!
//! Only [`DecisionError`] crosses the chain boundary. A `false` verdict is
//! an answer, never an error.

use std::fmt;
use thiserror::Error;

/// Lifecycle state of an external-interface session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Liveness {
    Working,
    Quit,
    Failed,
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Liveness::Working => write!(f, "working"),
            Liveness::Quit => write!(f, "quit"),
            Liveness::Failed => write!(f, "failed"),
        }
    }
}

/// Misuse of the external-interface protocol. Always a bug in the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("a predicate is already staged")]
    PredicateAlreadyStaged,
    #[error("no predicate is staged")]
    NoPredicateStaged,
    #[error("session has stopped ({liveness})")]
    Stopped { liveness: Liveness },
    #[error("no committed assumption to pop")]
    NothingToPop,
    #[error("operation not supported: {0}")]
    Unsupported(String),
}

/// A structurally impossible condition. Fatal for the current query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("internal fault: {0}")]
pub struct InternalFault(pub String);

impl InternalFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Failure of an external-interface call.
#[derive(Debug, Error)]
pub enum ExternalError {
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
    #[error("backend I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Internal(#[from] InternalFault),
}

impl ExternalError {
    /// A malformed or error response from the backend.
    pub fn bad_response(message: impl Into<String>) -> Self {
        ExternalError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message.into(),
        ))
    }
}

/// Coarse category of a [`DecisionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ProtocolViolation,
    Communication,
    Internal,
    Configuration,
}

/// The uniform failure of a satisfiability query or assumption mutation:
/// the question could not be answered.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),
    #[error("communication with backend failed: {0}")]
    Communication(#[source] std::io::Error),
    #[error(transparent)]
    Internal(#[from] InternalFault),
    #[error("backend '{0}' is not working")]
    NotWorking(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl DecisionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecisionError::Protocol(_) => ErrorKind::ProtocolViolation,
            DecisionError::Communication(_) | DecisionError::NotWorking(_) => {
                ErrorKind::Communication
            }
            DecisionError::Internal(_) => ErrorKind::Internal,
            DecisionError::Config(_) => ErrorKind::Configuration,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        DecisionError::Internal(InternalFault::new(message))
    }
}

impl From<ExternalError> for DecisionError {
    fn from(err: ExternalError) -> Self {
        match err {
            ExternalError::Protocol(v) => DecisionError::Protocol(v),
            ExternalError::Io(e) => DecisionError::Communication(e),
            ExternalError::Internal(f) => DecisionError::Internal(f),
        }
    }
}
