//! The timer is answer-transparent and accumulates monotonically.

use std::time::Duration;

use symdec_core::{Clause, Expr, ReferenceSymbolic};
use symdec_dec::{
    AlwaysSat, BuiltinBackend, ChainBuilder, DecisionProcedure, ErrorKind, ExternalDecider,
    TimerDecorator,
};

fn leaf_chain() -> Box<dyn DecisionProcedure> {
    ChainBuilder::new()
        .link(ExternalDecider::new(BuiltinBackend::new()).unwrap())
        .build(AlwaysSat::new())
}

fn workload() -> Vec<Clause> {
    let r = ReferenceSymbolic::root("r", "Node");
    vec![
        Clause::numeric(Expr::ge(Expr::int_var("n"), Expr::int(0))),
        Clause::numeric(Expr::lt(Expr::int_var("n"), Expr::int(0))),
        Clause::numeric(Expr::eq(Expr::int_var("n"), Expr::int(7))),
        Clause::null(r.clone()),
        Clause::expands(r, "Node"),
        Clause::initialized("Foo"),
        Clause::not_initialized("Foo"),
    ]
}

#[test]
fn answers_match_the_undecorated_procedure() {
    let mut plain = leaf_chain();
    let mut timed = TimerDecorator::new(leaf_chain());
    let store = vec![
        Clause::numeric(Expr::gt(Expr::int_var("n"), Expr::int(3))),
        Clause::initialized("Foo"),
    ];
    plain.set_assumptions(store.clone()).unwrap();
    timed.set_assumptions(store).unwrap();

    for query in workload() {
        assert_eq!(
            plain.is_sat_clause(&query).unwrap(),
            timed.is_sat_clause(&query).unwrap(),
            "{}",
            query
        );
    }
    assert_eq!(plain.get_assumptions().unwrap(), timed.get_assumptions().unwrap());
}

#[test]
fn elapsed_time_never_decreases() {
    let mut timed = TimerDecorator::new(leaf_chain());
    let handle = timed.handle();
    let mut last = Duration::ZERO;
    for clause in workload() {
        timed.is_sat_clause(&clause).unwrap();
        timed.push_assumption(clause).unwrap();
        let now = handle.elapsed();
        assert!(now >= last);
        last = now;
    }
    assert_eq!(timed.elapsed(), handle.elapsed());
}

#[test]
fn failures_pass_through_and_are_timed() {
    let mut timed = TimerDecorator::new(leaf_chain());
    timed.close().unwrap();
    let before = timed.elapsed();
    let err = timed.is_sat_initialized("Foo").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    assert!(timed.elapsed() >= before);
}
