//! Integration tests for the conservative heap-validity decider composed
//! into a full chain.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use symdec_core::memory::{ClassDecl, ClassTable, FieldType, InvariantRule, MemoryState, RuleRunner};
use symdec_core::*;
use symdec_dec::{
    assemble, AlwaysSat, BuiltinBackend, ChainBuilder, CheckerParameters, Collaborators,
    ConservativeRepOk, DecisionConfig, DecisionError, DecisionProcedure, ErrorKind,
    ExternalDecider, StateSuppliers,
};

// =============================================================================
// Fixtures
// =============================================================================

fn classes() -> Arc<ClassTable> {
    Arc::new(
        ClassTable::new()
            .with(
                ClassDecl::new("List")
                    .field("head", FieldType::Reference("Node".into()))
                    .field("size", FieldType::Int)
                    .marked(CONSERVATIVE_REP_OK, "repOk"),
            )
            .with(
                ClassDecl::new("Node")
                    .field("value", FieldType::Int)
                    .field("next", FieldType::Reference("Node".into())),
            )
            .with(ClassDecl::new("Box").field("item", FieldType::Reference("Node".into()))),
    )
}

/// `List.repOk`: the list is acyclic and its head is never null.
fn list_rules() -> RuleRunner {
    RuleRunner::new().with_rules(
        MethodRef::new("List", "repOk"),
        vec![InvariantRule::NotNull {
            field: "head".into(),
        }],
    )
}

fn this() -> ReferenceSymbolic {
    ReferenceSymbolic::root("this", "List")
}

fn install(suppliers: &StateSuppliers, current: MemoryState) {
    let table = classes();
    suppliers
        .set_initial_state_supplier(move |_| Box::new(MemoryState::new(table.clone())))
        .unwrap();
    suppliers
        .set_current_state_supplier(move || current.boxed_clone())
        .unwrap();
}

/// A state in which `this` already expanded to a `List`.
fn list_expanded() -> MemoryState {
    let mut state = MemoryState::new(classes());
    state.assume_expands(&this(), "List").unwrap();
    state
}

fn chain(runner: impl MethodRunner + 'static) -> (Box<dyn DecisionProcedure>, StateSuppliers) {
    let checker = ConservativeRepOk::new(CheckerParameters::default(), classes(), Box::new(runner));
    let suppliers = checker.suppliers();
    let dp = ChainBuilder::new()
        .link(checker)
        .link(ExternalDecider::new(BuiltinBackend::new()).unwrap())
        .build(AlwaysSat::new());
    (dp, suppliers)
}

/// Counts runs and answers `true` for everything.
struct CountingRunner(Arc<AtomicUsize>);

impl MethodRunner for CountingRunner {
    fn run(&mut self, _: &dyn State, _: &MethodRef, _: HeapPos) -> Result<RunOutcome, RunError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(RunOutcome::Returned(true))
    }
}

// =============================================================================
// Vacuous pass
// =============================================================================

#[test]
fn heap_without_check_methods_passes_every_legal_fact() {
    let runs = Arc::new(AtomicUsize::new(0));
    let (mut dp, suppliers) = chain(CountingRunner(runs.clone()));
    let mut current = MemoryState::new(classes());
    let bx = ReferenceSymbolic::root("box", "Box");
    current.assume_expands(&bx, "Box").unwrap();
    install(&suppliers, current);

    let item = bx.field("item", "Node");
    assert!(dp.is_sat_null(&item).unwrap());
    assert!(dp.is_sat_expands(&item, "Node").unwrap());
    assert!(dp.is_sat_aliases(&item, 0, &HeapObject::new("Box")).is_err());
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Rejection
// =============================================================================

#[test]
fn invalid_heap_prunes_a_fact_the_leaf_accepts() {
    let (mut dp, suppliers) = chain(list_rules());
    install(&suppliers, list_expanded());
    let head = this().field("head", "Node");

    assert!(!dp.is_sat_null(&head).unwrap());
    assert!(dp.is_sat_expands(&head, "Node").unwrap());
    // the leaf alone has no objection to a null head
    let mut leaf = ChainBuilder::new()
        .link(ExternalDecider::new(BuiltinBackend::new()).unwrap())
        .build(AlwaysSat::new());
    assert!(leaf.is_sat_null(&head).unwrap());
}

#[test]
fn numeric_and_class_queries_bypass_the_checker() {
    let runs = Arc::new(AtomicUsize::new(0));
    let (mut dp, _suppliers) = chain(CountingRunner(runs.clone()));
    dp.push_assumption(Clause::initialized("List")).unwrap();
    assert!(!dp.is_sat_not_initialized("List").unwrap());
    assert!(dp.is_sat(&Expr::ge(Expr::int_var("{ROOT}:this.size"), Expr::int(0))).unwrap());
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Internal faults
// =============================================================================

#[test]
fn missing_check_method_is_an_internal_fault() {
    let (mut dp, suppliers) = chain(RuleRunner::new());
    install(&suppliers, MemoryState::new(classes()));
    let err = dp.is_sat_expands(&this(), "List").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains("List.repOk"));
}

#[test]
fn faulting_check_method_is_an_internal_fault() {
    let runner = RuleRunner::new().with_rules(
        MethodRef::new("List", "repOk"),
        vec![InvariantRule::NotNull {
            field: "tail".into(),
        }],
    );
    let (mut dp, suppliers) = chain(runner);
    install(&suppliers, MemoryState::new(classes()));
    let err = dp.is_sat_expands(&this(), "List").unwrap_err();
    assert!(matches!(err, DecisionError::Internal(_)));
}

#[test]
fn fact_contradicting_the_replayed_path_is_an_internal_fault() {
    let (mut dp, suppliers) = chain(list_rules());
    install(&suppliers, list_expanded());
    let err = dp.is_sat_null(&this()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}

#[test]
fn missing_initial_supplier_is_an_internal_fault() {
    let (mut dp, _suppliers) = chain(list_rules());
    let err = dp.is_sat_null(&this()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}

// =============================================================================
// Bootstrap wiring
// =============================================================================

#[test]
fn suppliers_installed_after_assembly_are_used() {
    let mut config = DecisionConfig::default();
    config.conservative.enabled = true;
    let collaborators = Collaborators {
        hierarchy: classes(),
        runner: Box::new(list_rules()),
    };
    let mut assembled = assemble(&config, Some(collaborators)).unwrap();
    let suppliers = assembled.suppliers.clone().expect("checker enabled");
    install(&suppliers, list_expanded());

    let head = this().field("head", "Node");
    assert!(!assembled.procedure.is_sat_null(&head).unwrap());
    assert!(assembled.procedure.is_sat_expands(&head, "Node").unwrap());
    assert!(assembled.elapsed.is_some());
}

#[test]
fn configured_method_overrides_the_marker() {
    let mut config = DecisionConfig::default();
    config.conservative.enabled = true;
    config
        .conservative
        .methods
        .insert("Node".into(), "wellFormed".into());
    let runner = list_rules().with_rules(
        MethodRef::new("Node", "wellFormed"),
        vec![InvariantRule::IntAtLeast {
            field: "value".into(),
            min: 0,
        }],
    );
    let collaborators = Collaborators {
        hierarchy: classes(),
        runner: Box::new(runner),
    };
    let assembled = assemble(&config, Some(collaborators)).unwrap();
    let suppliers = assembled.suppliers.clone().unwrap();
    install(&suppliers, list_expanded());
    let mut dp = assembled.procedure;
    // Node.value is symbolic, so the rule holds
    assert!(dp.is_sat_expands(&this().field("head", "Node"), "Node").unwrap());
}
