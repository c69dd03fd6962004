//! Conservative heap-validity decider.
//!
//! Filters reference-resolution queries (`expands`, `aliases`, `null`) by
//! building the initial state the candidate fact implies and running the
//! conservative repOk method of every object in its heap. A violated
//! invariant rejects the query. Numeric and class-initialization queries
//! pass through.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use symdec_core::{
    ClassHierarchy, Clause, HeapObject, HeapPos, MethodRef, MethodRunner, ReferenceSymbolic,
    RunOutcome, State, CONSERVATIVE_REP_OK,
};

use crate::chain::Local;
use crate::config::TargetConfig;
use crate::error::{DecisionError, InternalFault};

/// Produces a program state on demand.
pub type StateSupplier = Box<dyn FnMut() -> Box<dyn State> + Send>;

/// Produces a fresh initial state for the configured target, if any.
pub type InitialStateSupplier = Box<dyn FnMut(Option<&TargetConfig>) -> Box<dyn State> + Send>;

// ── Suppliers ───────────────────────────────────────────────────────

#[derive(Default)]
struct Suppliers {
    initial: Option<InitialStateSupplier>,
    current: Option<StateSupplier>,
}

/// Shared slot for the initial-state and current-state suppliers.
///
/// Clone it before the decider is moved into a chain; suppliers installed
/// through any clone are seen by the decider.
#[derive(Clone, Default)]
pub struct StateSuppliers {
    inner: Arc<Mutex<Suppliers>>,
}

impl fmt::Debug for StateSuppliers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (initial, current) = match self.inner.lock() {
            Ok(s) => (s.initial.is_some(), s.current.is_some()),
            Err(_) => (false, false),
        };
        f.debug_struct("StateSuppliers")
            .field("initial", &initial)
            .field("current", &current)
            .finish()
    }
}

impl StateSuppliers {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Suppliers>, InternalFault> {
        self.inner
            .lock()
            .map_err(|_| InternalFault::new("state supplier lock poisoned"))
    }

    /// Supplier of fresh states at the start of symbolic execution. It is
    /// handed the checker's target.
    pub fn set_initial_state_supplier(
        &self,
        supplier: impl FnMut(Option<&TargetConfig>) -> Box<dyn State> + Send + 'static,
    ) -> Result<(), InternalFault> {
        self.lock()?.initial = Some(Box::new(supplier));
        Ok(())
    }

    /// Supplier of the state the engine is currently exploring.
    pub fn set_current_state_supplier(
        &self,
        supplier: impl FnMut() -> Box<dyn State> + Send + 'static,
    ) -> Result<(), InternalFault> {
        self.lock()?.current = Some(Box::new(supplier));
        Ok(())
    }

    fn initial_state(&self, target: Option<&TargetConfig>) -> Result<Box<dyn State>, InternalFault> {
        let mut suppliers = self.lock()?;
        let supplier = suppliers
            .initial
            .as_mut()
            .ok_or_else(|| InternalFault::new("no initial-state supplier installed"))?;
        Ok(supplier(target))
    }

    fn current_state(&self) -> Result<Option<Box<dyn State>>, InternalFault> {
        let mut suppliers = self.lock()?;
        Ok(suppliers.current.as_mut().map(|supplier| supplier()))
    }
}

// ── Parameters ──────────────────────────────────────────────────────

/// How the checker locates and judges invariant methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckerParameters {
    /// Entry point the initial state is built for.
    pub target: Option<TargetConfig>,
    /// Class name to the name of its check method. Takes precedence over
    /// the `ConservativeRepOk` marker.
    pub methods: BTreeMap<String, String>,
    /// Whether a run that exhausts its scope counts as a pass.
    pub scope_exhaustion_means_success: bool,
}

impl Default for CheckerParameters {
    fn default() -> Self {
        Self {
            target: None,
            methods: BTreeMap::new(),
            scope_exhaustion_means_success: true,
        }
    }
}

// ── Decider ─────────────────────────────────────────────────────────

pub struct ConservativeRepOk {
    params: CheckerParameters,
    hierarchy: Arc<dyn ClassHierarchy>,
    runner: Box<dyn MethodRunner>,
    suppliers: StateSuppliers,
}

impl fmt::Debug for ConservativeRepOk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConservativeRepOk")
            .field("params", &self.params)
            .field("suppliers", &self.suppliers)
            .finish()
    }
}

impl ConservativeRepOk {
    pub fn new(
        params: CheckerParameters,
        hierarchy: Arc<dyn ClassHierarchy>,
        runner: Box<dyn MethodRunner>,
    ) -> Self {
        match &params.target {
            Some(target) => debug!(
                class = %target.class,
                method = %target.method,
                "conservative repOk target"
            ),
            None => debug!("conservative repOk without a target"),
        }
        Self {
            params,
            hierarchy,
            runner,
            suppliers: StateSuppliers::new(),
        }
    }

    /// Handle for installing state suppliers after chain construction.
    pub fn suppliers(&self) -> StateSuppliers {
        self.suppliers.clone()
    }

    pub fn params(&self) -> &CheckerParameters {
        &self.params
    }

    /// The check method dispatched for an object of `class_name`: the
    /// nearest class in its hierarchy with a configured or marked method.
    pub fn check_method(&self, class_name: &str) -> Option<MethodRef> {
        self.hierarchy.supertypes(class_name).into_iter().find_map(|class| {
            let method = self
                .params
                .methods
                .get(&class)
                .cloned()
                .or_else(|| {
                    self.hierarchy
                        .marked_method(&class, CONSERVATIVE_REP_OK)
                        .map(str::to_string)
                })?;
            Some(MethodRef::new(class, method))
        })
    }

    /// A fresh initial state refined by the current path condition and the
    /// candidate fact.
    fn make_initial_state(&self, fact: &Clause) -> Result<Box<dyn State>, DecisionError> {
        let mut state = self.suppliers.initial_state(self.params.target.as_ref())?;
        if let Some(current) = self.suppliers.current_state()? {
            for clause in current.path_condition() {
                state.assume(&clause).map_err(|e| {
                    InternalFault::new(format!("replaying {} on the initial state: {}", clause, e))
                })?;
            }
        }
        state.assume(fact).map_err(|e| {
            InternalFault::new(format!("assuming {} on the initial state: {}", fact, e))
        })?;
        Ok(state)
    }

    /// Run the check method of every heap object. Only an explicit
    /// `false` (or an exhausted scope, when so configured) rejects.
    fn check_heap(&mut self, state: &dyn State) -> Result<bool, DecisionError> {
        for pos in state.heap_positions() {
            let Some(object) = state.object(pos) else {
                continue;
            };
            let Some(method) = self.check_method(object.class_name()) else {
                continue;
            };
            let outcome = self.runner.run(state, &method, pos).map_err(|e| {
                InternalFault::new(format!("running {} on Object[{}]: {}", method, pos, e))
            })?;
            trace!(%method, pos, ?outcome, "check method ran");
            let passed = match outcome {
                RunOutcome::Returned(ok) => ok,
                RunOutcome::ScopeExhausted => self.params.scope_exhaustion_means_success,
            };
            if !passed {
                debug!(%method, pos, ?outcome, "heap rejected");
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn decide(&mut self, fact: Clause) -> Result<bool, DecisionError> {
        let state = self.make_initial_state(&fact)?;
        self.check_heap(state.as_ref())
    }
}

impl Local for ConservativeRepOk {
    fn name(&self) -> &str {
        "conservative-repok"
    }

    fn is_sat_expands_local(
        &mut self,
        reference: &ReferenceSymbolic,
        class_name: &str,
    ) -> Result<bool, DecisionError> {
        self.decide(Clause::expands(reference.clone(), class_name))
    }

    fn is_sat_aliases_local(
        &mut self,
        reference: &ReferenceSymbolic,
        heap_pos: HeapPos,
        object: &HeapObject,
    ) -> Result<bool, DecisionError> {
        self.decide(Clause::aliases(reference.clone(), heap_pos, object.clone()))
    }

    fn is_sat_null_local(&mut self, reference: &ReferenceSymbolic) -> Result<bool, DecisionError> {
        self.decide(Clause::null(reference.clone()))
    }
}
