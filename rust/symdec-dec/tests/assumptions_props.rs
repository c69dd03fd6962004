//! Store behaviour for arbitrary clause sequences, through a bare terminal
//! and through a full builtin chain.

use proptest::prelude::*;
use symdec_core::{Clause, Expr, ReferenceSymbolic};
use symdec_dec::{
    AlwaysSat, BuiltinBackend, ChainBuilder, DecisionProcedure, ExternalDecider, TimerDecorator,
};

fn clause() -> impl Strategy<Value = Clause> {
    let class = prop::sample::select(vec!["Foo", "Bar", "Baz"]);
    let origin = prop::sample::select(vec!["this", "that", "other"]);
    prop_oneof![
        class.clone().prop_map(Clause::initialized),
        class.clone().prop_map(Clause::not_initialized),
        origin
            .clone()
            .prop_map(|o| Clause::null(ReferenceSymbolic::root(o, "Node"))),
        (origin, class).prop_map(|(o, c)| Clause::expands(ReferenceSymbolic::root(o, "Node"), c)),
        (-50i64..50).prop_map(|v| Clause::numeric(Expr::le(Expr::int_var("n"), Expr::int(v)))),
    ]
}

fn procedures() -> Vec<Box<dyn DecisionProcedure>> {
    vec![
        Box::new(AlwaysSat::new()),
        ChainBuilder::new()
            .link(ExternalDecider::new(BuiltinBackend::new()).unwrap())
            .build(AlwaysSat::new()),
        Box::new(TimerDecorator::new(
            ChainBuilder::new()
                .link(ExternalDecider::new(BuiltinBackend::new()).unwrap())
                .build(AlwaysSat::new()),
        )),
    ]
}

proptest! {
    #[test]
    fn pushes_are_kept_in_insertion_order(clauses in prop::collection::vec(clause(), 0..16)) {
        for mut dp in procedures() {
            for c in &clauses {
                dp.push_assumption(c.clone()).unwrap();
            }
            prop_assert_eq!(dp.get_assumptions().unwrap(), clauses.clone());
            dp.clear_assumptions().unwrap();
            prop_assert!(dp.get_assumptions().unwrap().is_empty());
        }
    }

    #[test]
    fn set_then_get_round_trips(
        before in prop::collection::vec(clause(), 0..8),
        clauses in prop::collection::vec(clause(), 0..16),
    ) {
        for mut dp in procedures() {
            dp.set_assumptions(before.clone()).unwrap();
            dp.set_assumptions(clauses.clone()).unwrap();
            prop_assert_eq!(dp.get_assumptions().unwrap(), clauses.clone());
        }
    }

    #[test]
    fn snapshots_are_unaffected_by_later_mutation(clauses in prop::collection::vec(clause(), 1..8)) {
        let mut dp = AlwaysSat::new();
        dp.set_assumptions(clauses.clone()).unwrap();
        let snapshot = dp.get_assumptions().unwrap();
        dp.clear_assumptions().unwrap();
        prop_assert_eq!(snapshot, clauses);
    }
}
