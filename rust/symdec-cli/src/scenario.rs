//! Scenario files for `symdec check`.
//!
//! A scenario declares a class table, the invariant rules behind check
//! methods, the facts that hold in the initial state, and a list of steps
//! replayed against the assembled decision chain:
//!
//! ```toml
//! name = "singly linked list"
//! roots = { this = "List" }
//! initial = [{ kind = "expands", reference = "this", class = "List" }]
//!
//! [[class]]
//! name = "List"
//! fields = { head = { reference = "Node" } }
//! markers = { ConservativeRepOk = "repOk" }
//!
//! [[check]]
//! class = "List"
//! method = "repOk"
//! rules = [{ kind = "not_null", field = "head" }]
//!
//! [[steps]]
//! action = "query"
//! fact = { kind = "null", reference = "this.head" }
//! expect = false
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use symdec_core::memory::{ClassDecl, ClassTable, FieldType, InvariantRule, MemoryState, RuleRunner};
use symdec_core::{Clause, CmpOp, Expr, HeapPos, MethodRef, ReferenceSymbolic, State, StateError};
use symdec_dec::{assemble, Collaborators, DecisionConfig, DecisionError, DecisionProcedure};

use crate::report::{QueryOutcome, Report};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("cannot read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid scenario: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown root reference '{0}'")]
    UnknownRoot(String),
    #[error("class {class} has no reference field '{field}'")]
    UnknownField { class: String, field: String },
    #[error("no object at Object[{0}]")]
    NoObject(HeapPos),
    #[error("step {0}: missing fact")]
    MissingFact(usize),
    #[error("{context}: {source}")]
    State {
        context: String,
        #[source]
        source: StateError,
    },
    #[error("cannot assemble decision chain: {0}")]
    Assemble(#[source] DecisionError),
    #[error("step {step}: {source}")]
    Decision {
        step: usize,
        #[source]
        source: DecisionError,
    },
}

impl ScenarioError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ScenarioError::Decision { .. } => 2,
            _ => 1,
        }
    }
}

// ── File format ─────────────────────────────────────────────────────

/// One fact, with references written as dotted paths from a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fact {
    /// `var op value` over an integer variable.
    Compare { var: String, op: CmpOp, value: i64 },
    Null { reference: String },
    Expands { reference: String, class: String },
    /// The reference points to the object already at `pos` in the
    /// current state.
    Aliases { reference: String, pos: HeapPos },
    Initialized { class: String },
    NotInitialized { class: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Push,
    Query,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub action: Action,
    #[serde(default)]
    pub fact: Option<Fact>,
    /// Expected verdict of a query.
    #[serde(default)]
    pub expect: Option<bool>,
}

/// Rules a check method evaluates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDecl {
    pub class: String,
    pub method: String,
    #[serde(default)]
    pub rules: Vec<InvariantRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "class")]
    pub classes: Vec<ClassDecl>,
    /// Root reference name to its static type.
    #[serde(default)]
    pub roots: BTreeMap<String, String>,
    #[serde(default)]
    pub initial: Vec<Fact>,
    #[serde(default, rename = "check")]
    pub checks: Vec<CheckDecl>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut scenario = Self::from_str(&content)?;
        if scenario.name.is_none() {
            scenario.name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned());
        }
        Ok(scenario)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(s)?)
    }

    pub fn class_table(&self) -> ClassTable {
        let mut table = ClassTable::new();
        for decl in &self.classes {
            table.insert(decl.clone());
        }
        table
    }

    pub fn rule_runner(&self) -> RuleRunner {
        let mut runner = RuleRunner::new();
        for check in &self.checks {
            runner.insert(
                MethodRef::new(check.class.clone(), check.method.clone()),
                check.rules.clone(),
            );
        }
        runner
    }

    /// The configuration actually used: declaring checks turns the
    /// conservative checker on.
    pub fn effective_config(&self, config: &DecisionConfig) -> DecisionConfig {
        let mut config = config.clone();
        if !self.checks.is_empty() && !config.conservative.enabled {
            info!("scenario declares check methods; enabling conservative checking");
            config.conservative.enabled = true;
        }
        config
    }
}

// ── Fact resolution ─────────────────────────────────────────────────

struct Resolver<'a> {
    table: &'a ClassTable,
    roots: &'a BTreeMap<String, String>,
}

impl Resolver<'_> {
    fn reference(&self, path: &str) -> Result<ReferenceSymbolic, ScenarioError> {
        let mut segments = path.split('.');
        let root = segments.next().unwrap_or_default();
        let static_type = self
            .roots
            .get(root)
            .ok_or_else(|| ScenarioError::UnknownRoot(root.to_string()))?;
        let mut reference = ReferenceSymbolic::root(root, static_type.clone());
        for field in segments {
            let class = reference.static_type().to_string();
            let field_type = self
                .table
                .fields_of(&class)
                .into_iter()
                .find(|(name, _)| name == field)
                .map(|(_, ty)| ty);
            let Some(FieldType::Reference(target)) = field_type else {
                return Err(ScenarioError::UnknownField {
                    class,
                    field: field.to_string(),
                });
            };
            reference = reference.field(field, target);
        }
        Ok(reference)
    }

    fn clause(&self, fact: &Fact, state: &dyn State) -> Result<Clause, ScenarioError> {
        Ok(match fact {
            Fact::Compare { var, op, value } => {
                Clause::numeric(Expr::cmp(*op, Expr::int_var(var.as_str()), Expr::int(*value)))
            }
            Fact::Null { reference } => Clause::null(self.reference(reference)?),
            Fact::Expands { reference, class } => {
                Clause::expands(self.reference(reference)?, class.as_str())
            }
            Fact::Aliases { reference, pos } => {
                let object = state.object(*pos).ok_or(ScenarioError::NoObject(*pos))?;
                Clause::aliases(self.reference(reference)?, *pos, object.clone())
            }
            Fact::Initialized { class } => Clause::initialized(class.as_str()),
            Fact::NotInitialized { class } => Clause::not_initialized(class.as_str()),
        })
    }
}

// ── Replay ──────────────────────────────────────────────────────────

fn lock(state: &Mutex<MemoryState>) -> std::sync::MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Replay `scenario` against the chain `config` describes.
///
/// Query failures are recorded in the report and end the replay; every
/// other failure is returned.
pub fn run(scenario: &Scenario, config: &DecisionConfig) -> Result<Report, ScenarioError> {
    let config = scenario.effective_config(config);
    let table = Arc::new(scenario.class_table());
    let resolver = Resolver {
        table: &table,
        roots: &scenario.roots,
    };

    let mut initial = MemoryState::new(table.clone());
    for fact in &scenario.initial {
        let clause = resolver.clause(fact, &initial)?;
        initial.assume(&clause).map_err(|source| ScenarioError::State {
            context: format!("initial fact {}", clause),
            source,
        })?;
    }
    let current = Arc::new(Mutex::new(initial.clone()));

    let collaborators = Collaborators {
        hierarchy: table.clone(),
        runner: Box::new(scenario.rule_runner()),
    };
    let assembled = assemble(&config, Some(collaborators)).map_err(ScenarioError::Assemble)?;
    if let Some(suppliers) = &assembled.suppliers {
        let fresh = initial.clone();
        suppliers
            .set_initial_state_supplier(move |_target| fresh.boxed_clone())
            .map_err(|fault| ScenarioError::Assemble(fault.into()))?;
        let current = Arc::clone(&current);
        suppliers
            .set_current_state_supplier(move || lock(&current).boxed_clone())
            .map_err(|fault| ScenarioError::Assemble(fault.into()))?;
    }
    let mut dp = assembled.procedure;
    dp.set_assumptions(initial.path_condition())
        .map_err(|source| ScenarioError::Decision { step: 0, source })?;

    let mut queries = Vec::new();
    for (index, step) in scenario.steps.iter().enumerate() {
        let number = index + 1;
        match step.action {
            Action::Clear => {
                dp.set_assumptions(initial.path_condition())
                    .map_err(|source| ScenarioError::Decision {
                        step: number,
                        source,
                    })?;
                *lock(&current) = initial.clone();
                debug!(step = number, "cleared");
            }
            Action::Push => {
                let fact = step.fact.as_ref().ok_or(ScenarioError::MissingFact(number))?;
                let clause = {
                    let mut state = lock(&current);
                    let clause = resolver.clause(fact, &*state)?;
                    state.assume(&clause).map_err(|source| ScenarioError::State {
                        context: format!("step {}: pushing {}", number, clause),
                        source,
                    })?;
                    clause
                };
                dp.push_assumption(clause)
                    .map_err(|source| ScenarioError::Decision {
                        step: number,
                        source,
                    })?;
            }
            Action::Query => {
                let fact = step.fact.as_ref().ok_or(ScenarioError::MissingFact(number))?;
                let clause = resolver.clause(fact, &*lock(&current))?;
                let answer = dp.is_sat_clause(&clause);
                let failed = answer.is_err();
                debug!(step = number, %clause, ?answer, "query");
                queries.push(QueryOutcome::new(number, &clause, answer, step.expect));
                if failed {
                    break;
                }
            }
        }
    }
    if let Err(e) = dp.close() {
        debug!(error = %e, "closing decision chain failed");
    }

    Ok(Report {
        scenario: scenario.name.clone().unwrap_or_default(),
        backend: config.backend.to_string(),
        queries,
        elapsed_ms: assembled.elapsed.map(|handle| handle.elapsed_millis()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use symdec_dec::BackendKind;

    const LIST: &str = r#"
name = "list"
roots = { this = "List" }
initial = [{ kind = "expands", reference = "this", class = "List" }]

[[class]]
name = "List"
fields = { head = { reference = "Node" }, size = "int" }
markers = { ConservativeRepOk = "repOk" }

[[class]]
name = "Node"
fields = { next = { reference = "Node" } }

[[check]]
class = "List"
method = "repOk"
rules = [{ kind = "not_null", field = "head" }]
"#;

    fn with_steps(steps: &str) -> Scenario {
        Scenario::from_str(&format!("{}\n{}", LIST, steps)).unwrap()
    }

    #[test]
    fn parses_classes_checks_and_steps() {
        let s = with_steps(
            r#"
[[steps]]
action = "query"
fact = { kind = "compare", var = "n", op = ">=", value = 0 }
expect = true
"#,
        );
        assert_eq!(s.classes.len(), 2);
        assert_eq!(s.checks[0].rules.len(), 1);
        assert_eq!(
            s.steps[0].fact,
            Some(Fact::Compare {
                var: "n".into(),
                op: CmpOp::GtEq,
                value: 0
            })
        );
    }

    #[test]
    fn resolves_dotted_paths() {
        let s = with_steps("");
        let table = s.class_table();
        let resolver = Resolver {
            table: &table,
            roots: &s.roots,
        };
        let r = resolver.reference("this.head.next").unwrap();
        assert_eq!(r.origin(), "{ROOT}:this.head.next");
        assert_eq!(r.static_type(), "Node");
        assert!(matches!(
            resolver.reference("that"),
            Err(ScenarioError::UnknownRoot(_))
        ));
        assert!(matches!(
            resolver.reference("this.size"),
            Err(ScenarioError::UnknownField { .. })
        ));
    }

    #[test]
    fn checks_enable_the_conservative_checker() {
        let s = with_steps("");
        assert!(s.effective_config(&DecisionConfig::default()).conservative.enabled);
        assert!(!Scenario::default()
            .effective_config(&DecisionConfig::default())
            .conservative
            .enabled);
    }

    #[test]
    fn replay_reports_verdicts() {
        let s = with_steps(
            r#"
[[steps]]
action = "query"
fact = { kind = "null", reference = "this.head" }
expect = false

[[steps]]
action = "push"
fact = { kind = "expands", reference = "this.head", class = "Node" }

[[steps]]
action = "query"
fact = { kind = "aliases", reference = "this.head.next", pos = 1 }

[[steps]]
action = "push"
fact = { kind = "compare", var = "n", op = ">", value = 3 }

[[steps]]
action = "query"
fact = { kind = "compare", var = "n", op = "<", value = 0 }
expect = false

[[steps]]
action = "clear"

[[steps]]
action = "query"
fact = { kind = "compare", var = "n", op = "<", value = 0 }
expect = true
"#,
        );
        let report = run(&s, &DecisionConfig::default()).unwrap();
        let verdicts: Vec<_> = report.queries.iter().map(|q| q.verdict).collect();
        assert_eq!(verdicts, vec![Some(false), Some(true), Some(false), Some(true)]);
        assert_eq!(report.mismatches(), 0);
        assert_eq!(report.exit_code(), 0);
        assert!(report.elapsed_ms.is_some());
        assert_eq!(report.backend, "builtin");
    }

    #[test]
    fn always_sat_backend_ignores_numeric_conflicts() {
        let s = with_steps(
            r#"
[[steps]]
action = "push"
fact = { kind = "compare", var = "n", op = ">", value = 3 }

[[steps]]
action = "query"
fact = { kind = "compare", var = "n", op = "<", value = 0 }
expect = false
"#,
        );
        let config = DecisionConfig {
            backend: BackendKind::AlwaysSat,
            ..DecisionConfig::default()
        };
        let report = run(&s, &config).unwrap();
        assert_eq!(report.queries[0].verdict, Some(true));
        assert_eq!(report.mismatches(), 1);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn contradictory_push_is_a_scenario_error() {
        let s = with_steps(
            r#"
[[steps]]
action = "push"
fact = { kind = "null", reference = "this" }
"#,
        );
        let err = run(&s, &DecisionConfig::default()).unwrap_err();
        assert!(matches!(err, ScenarioError::State { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn unanswerable_query_is_recorded() {
        let s = with_steps(
            r#"
[[steps]]
action = "query"
fact = { kind = "aliases", reference = "this.head", pos = 0 }

[[steps]]
action = "query"
fact = { kind = "null", reference = "this.head" }
"#,
        );
        // Object[0] is a List; aliasing a Node reference to it is ill-typed
        let report = run(&s, &DecisionConfig::default()).unwrap();
        assert_eq!(report.queries.len(), 1);
        assert!(report.queries[0].error.is_some());
        assert_eq!(report.exit_code(), 2);
    }

    #[test]
    fn missing_fact_is_reported() {
        let s = with_steps("[[steps]]\naction = \"push\"\n");
        assert!(matches!(
            run(&s, &DecisionConfig::default()),
            Err(ScenarioError::MissingFact(1))
        ));
    }
}
