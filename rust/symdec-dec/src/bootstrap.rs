//! Builds the configured decision-procedure chain.
//!
//! The assembled chain is, head first:
//!
//! ```text
//! [timer] -> [conservative repOk] -> [external leaf over backend] -> AlwaysSat
//! ```
//!
//! Bracketed stages are present only when configured.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use symdec_core::{ClassHierarchy, MethodRunner};

use crate::always_sat::AlwaysSat;
use crate::chain::ChainBuilder;
use crate::config::{BackendKind, DecisionConfig, SmtLibConfig};
use crate::conservative::{CheckerParameters, ConservativeRepOk, StateSuppliers};
use crate::error::DecisionError;
use crate::external::{BuiltinBackend, ExternalDecider, SmtLibProcess};
use crate::procedure::DecisionProcedure;
use crate::timer::{ElapsedHandle, TimerDecorator};

/// Interpreter-side services the conservative checker needs.
pub struct Collaborators {
    pub hierarchy: Arc<dyn ClassHierarchy>,
    pub runner: Box<dyn MethodRunner>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// An assembled chain plus the handles the engine keeps for it.
pub struct Assembled {
    pub procedure: Box<dyn DecisionProcedure>,
    /// Timer reading, when timing is enabled.
    pub elapsed: Option<ElapsedHandle>,
    /// Supplier slots of the conservative checker, when it is enabled.
    pub suppliers: Option<StateSuppliers>,
}

impl fmt::Debug for Assembled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assembled")
            .field("elapsed", &self.elapsed)
            .field("suppliers", &self.suppliers)
            .finish_non_exhaustive()
    }
}

/// Assemble the chain `config` describes.
///
/// `collaborators` is required when the conservative checker is enabled
/// and ignored otherwise.
pub fn assemble(
    config: &DecisionConfig,
    collaborators: Option<Collaborators>,
) -> Result<Assembled, DecisionError> {
    let mut builder = ChainBuilder::new();
    let mut suppliers = None;

    if config.conservative.enabled {
        let Collaborators { hierarchy, runner } = collaborators.ok_or_else(|| {
            DecisionError::Config(
                "conservative checking is enabled but no class hierarchy or method runner was given"
                    .to_string(),
            )
        })?;
        let params = CheckerParameters {
            target: config.conservative.target.clone(),
            methods: config.conservative.methods.clone(),
            scope_exhaustion_means_success: config.conservative.scope_exhaustion_means_success,
        };
        let checker = ConservativeRepOk::new(params, hierarchy, runner);
        suppliers = Some(checker.suppliers());
        builder = builder.link(checker);
    }

    builder = match config.backend {
        BackendKind::AlwaysSat => builder,
        BackendKind::Builtin => builder.link(ExternalDecider::new(BuiltinBackend::new())?),
        BackendKind::Smtlib => {
            let process = SmtLibProcess::spawn(&config.smtlib.command, &config.smtlib.args)?;
            builder.link(ExternalDecider::new(process)?)
        }
    };
    debug!(
        backend = %config.backend,
        links = builder.len(),
        timing = config.timing,
        "assembled decision chain"
    );

    let chain = builder.build(AlwaysSat::new());
    let (procedure, elapsed) = if config.timing {
        let timer = TimerDecorator::new(chain);
        let handle = timer.handle();
        (Box::new(timer) as Box<dyn DecisionProcedure>, Some(handle))
    } else {
        (chain, None)
    };

    Ok(Assembled {
        procedure,
        elapsed,
        suppliers,
    })
}

/// Backends usable on this system.
pub fn available_backends(smtlib: &SmtLibConfig) -> Vec<BackendKind> {
    let mut backends = vec![BackendKind::AlwaysSat, BackendKind::Builtin];
    if SmtLibProcess::is_available(&smtlib.command) {
        backends.push(BackendKind::Smtlib);
    }
    backends
}
