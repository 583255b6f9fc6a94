//! Deadlock detection and optimization on small nets with known answers.

use std::time::Duration;

use petri_bdd::bdd::Bdd;
use petri_bdd::deadlock::{DeadlockConfig, DeadlockDetector, Strategy};
use petri_bdd::error::AnalysisError;
use petri_bdd::explicit;
use petri_bdd::models;
use petri_bdd::net::{Marking, Net};
use petri_bdd::optimize::{Constraints, Optimizer, Optimum};
use petri_bdd::symbolic::{ReachabilityConfig, SymbolicReachability};
use test_log::test;

fn scenario_a() -> Net {
    Net::builder()
        .place("A", 1)
        .place("B", 0)
        .transition("t", ["A"], ["B"])
        .build()
        .unwrap()
}

fn scenario_b() -> Net {
    Net::builder().place("P", 1).build().unwrap()
}

// ─── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn scenario_a_end_to_end() {
    let net = scenario_a();
    let bdd = Bdd::default();
    let engine = SymbolicReachability::new(&net, &bdd);
    let reachable = engine
        .compute_reachable(&ReachabilityConfig::default())
        .unwrap()
        .into_inner();

    let markings: Vec<_> = engine
        .enumerate(&reachable.set)
        .unwrap()
        .map(|m| engine.to_named(&m))
        .collect();
    assert_eq!(markings.len(), 2);
    assert_eq!(markings[0]["A"], 1);
    assert_eq!(markings[1]["B"], 1);

    let mut detector = DeadlockDetector::new(&engine, DeadlockConfig::default());
    let report = detector.find_deadlock(&reachable.set).unwrap().into_inner();
    assert_eq!(report.marking, Some(Marking(vec![0, 1])));

    let optimizer = Optimizer::new(&engine);
    let optimum = optimizer
        .optimize(&reachable.set, Some(&[1, 5][..]), None)
        .unwrap()
        .into_inner();
    assert_eq!(
        optimum,
        Optimum::Best {
            marking: Marking(vec![0, 1]),
            score: 5
        }
    );
}

#[test]
fn scenario_b_end_to_end() {
    let net = scenario_b();
    let bdd = Bdd::default();
    let engine = SymbolicReachability::new(&net, &bdd);
    let reachable = engine
        .compute_reachable(&ReachabilityConfig::default())
        .unwrap()
        .into_inner();
    assert_eq!(reachable.count, 1u32.into());

    let mut detector = DeadlockDetector::new(&engine, DeadlockConfig::default());
    let report = detector.find_deadlock(&reachable.set).unwrap().into_inner();
    assert_eq!(report.marking, Some(Marking(vec![1])));
}

// ─── Deadlock ──────────────────────────────────────────────────────────────────

#[test]
fn exhaustive_and_hybrid_agree() {
    let nets = [
        scenario_a(),
        scenario_b(),
        models::token_ring(5).unwrap(),
        models::mutex(3).unwrap(),
        models::dining_philosophers(2).unwrap(),
        models::dining_philosophers(4).unwrap(),
    ];
    for net in &nets {
        let bdd = Bdd::default();
        let engine = SymbolicReachability::new(net, &bdd);
        let reachable = engine
            .compute_reachable(&ReachabilityConfig::default())
            .unwrap()
            .into_inner();

        let mut outcomes = Vec::new();
        for strategy in [Strategy::Exhaustive, Strategy::Hybrid] {
            let config = DeadlockConfig::default().with_strategy(strategy);
            let mut detector = DeadlockDetector::new(&engine, config);
            let report = detector.find_deadlock(&reachable.set).unwrap().into_inner();
            assert_eq!(report.strategy, strategy);
            outcomes.push(report.marking);
        }
        assert_eq!(outcomes[0], outcomes[1]);
    }
}

#[test]
fn philosophers_deadlock_holds_every_left_fork() {
    let net = models::dining_philosophers(3).unwrap();
    let bdd = Bdd::default();
    let engine = SymbolicReachability::new(&net, &bdd);
    let reachable = engine
        .compute_reachable(&ReachabilityConfig::default())
        .unwrap()
        .into_inner();

    let mut detector = DeadlockDetector::new(&engine, DeadlockConfig::default());
    let dead = detector
        .find_deadlock(&reachable.set)
        .unwrap()
        .into_inner()
        .marking
        .expect("philosophers taking the left fork first deadlock");
    let named = engine.to_named(&dead);
    for i in 0..3 {
        assert_eq!(named[&format!("left_{}", i)], 1);
        assert_eq!(named[&format!("fork_{}", i)], 0);
    }
}

#[test]
fn strict_mode_reports_mismatch() {
    let net = Net::builder()
        .place("A", 1)
        .transition("idle", Vec::<String>::new(), Vec::<String>::new())
        .build()
        .unwrap();
    let bdd = Bdd::default();
    let engine = SymbolicReachability::new(&net, &bdd);
    let reachable = engine
        .compute_reachable(&ReachabilityConfig::default())
        .unwrap()
        .into_inner();

    let config = DeadlockConfig::default()
        .with_strategy(Strategy::Hybrid)
        .with_strict(true);
    let mut detector = DeadlockDetector::new(&engine, config);
    assert!(matches!(
        detector.find_deadlock(&reachable.set),
        Err(AnalysisError::EncodingMismatch { .. })
    ));
}

// ─── Optimization ──────────────────────────────────────────────────────────────

#[test]
fn empty_constraints_match_unconstrained() {
    for net in [models::mutex(3).unwrap(), models::dining_philosophers(3).unwrap()] {
        let bdd = Bdd::default();
        let engine = SymbolicReachability::new(&net, &bdd);
        let reachable = engine
            .compute_reachable(&ReachabilityConfig::default())
            .unwrap()
            .into_inner();

        let optimizer = Optimizer::new(&engine);
        let free = optimizer.optimize(&reachable.set, None, None).unwrap().into_inner();
        let empty = optimizer
            .optimize(&reachable.set, None, Some(&Constraints::new()))
            .unwrap()
            .into_inner();
        assert_eq!(free, empty);
    }
}

#[test]
fn constraints_by_place_id() {
    let net = models::mutex(2).unwrap();
    let bdd = Bdd::default();
    let engine = SymbolicReachability::new(&net, &bdd);
    let reachable = engine
        .compute_reachable(&ReachabilityConfig::default())
        .unwrap()
        .into_inner();
    let optimizer = Optimizer::new(&engine);

    // Places: lock, idle_0, critical_0, idle_1, critical_1.
    let weights = [0, 0, 3, 0, 5];

    // Forbid process 1 from entering: the best is process 0 in its critical section.
    let constraints = Constraints::from_ids(&net, [("critical_1", 0, 0)]).unwrap();
    let optimum = optimizer
        .optimize(&reachable.set, Some(&weights[..]), Some(&constraints))
        .unwrap()
        .into_inner();
    let Optimum::Best { marking, score } = optimum else {
        panic!("expected a solution");
    };
    assert_eq!(score, 3);
    let named = engine.to_named(&marking);
    assert_eq!(named["critical_0"], 1);

    // Both processes in their critical sections at once is unreachable.
    let both = Constraints::from_ids(&net, [("critical_0", 1, 1), ("critical_1", 1, 1)]).unwrap();
    let optimum = optimizer
        .optimize(&reachable.set, None, Some(&both))
        .unwrap()
        .into_inner();
    assert_eq!(optimum, Optimum::NoSolution);
}

// ─── Phase isolation ───────────────────────────────────────────────────────────

#[test]
fn explicit_failure_leaves_symbolic_phases_usable() {
    // Firing `t` at the initial marking puts a second token into B.
    let net = Net::builder()
        .place("A", 1)
        .place("B", 1)
        .transition("t", ["A"], ["B"])
        .build()
        .unwrap();

    let err = explicit::search(&net, explicit::Strategy::Bfs, Duration::from_secs(60)).unwrap_err();
    assert!(matches!(err, AnalysisError::NotSafe { .. }));

    let bdd = Bdd::default();
    let engine = SymbolicReachability::new(&net, &bdd);
    let reachable = engine
        .compute_reachable(&ReachabilityConfig::default().with_check_safety(false))
        .unwrap()
        .into_inner();
    assert_eq!(reachable.count, 2u32.into());

    let mut detector = DeadlockDetector::new(&engine, DeadlockConfig::default());
    let report = detector.find_deadlock(&reachable.set).unwrap().into_inner();
    assert_eq!(report.marking, Some(Marking(vec![0, 1])));
}
