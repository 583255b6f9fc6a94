//! Explicit and symbolic reachability agree on the example nets.

use std::collections::HashSet;
use std::time::Duration;

use num_bigint::BigUint;
use petri_bdd::bdd::Bdd;
use petri_bdd::explicit::{self, SearchOutcome, Strategy};
use petri_bdd::models;
use petri_bdd::net::{Marking, Net};
use petri_bdd::symbolic::{ReachabilityConfig, SymbolicReachability};
use test_log::test;

const BUDGET: Duration = Duration::from_secs(60);

fn nets() -> Vec<(&'static str, Net)> {
    vec![
        ("ring", models::token_ring(6).unwrap()),
        ("mutex", models::mutex(4).unwrap()),
        ("philosophers", models::dining_philosophers(4).unwrap()),
        ("single", Net::builder().place("P", 1).build().unwrap()),
    ]
}

fn explicit_set(net: &Net, strategy: Strategy) -> HashSet<Marking> {
    match explicit::search(net, strategy, BUDGET).unwrap().value {
        SearchOutcome::Complete(markings) => markings.into_iter().collect(),
        SearchOutcome::Timeout => panic!("explicit search timed out"),
    }
}

// ─── Explicit search ───────────────────────────────────────────────────────────

#[test]
fn bfs_and_dfs_discover_the_same_markings() {
    for (name, net) in nets() {
        let bfs = explicit_set(&net, Strategy::Bfs);
        let dfs = explicit_set(&net, Strategy::Dfs);
        assert_eq!(bfs, dfs, "{}", name);
    }
}

#[test]
fn known_sizes() {
    assert_eq!(explicit_set(&models::token_ring(6).unwrap(), Strategy::Bfs).len(), 6);
    assert_eq!(explicit_set(&models::mutex(4).unwrap(), Strategy::Bfs).len(), 5);
}

// ─── Symbolic reachability ─────────────────────────────────────────────────────

#[test]
fn symbolic_count_matches_explicit() {
    for (name, net) in nets() {
        let bdd = Bdd::default();
        let engine = SymbolicReachability::new(&net, &bdd);
        let reachable = engine
            .compute_reachable(&ReachabilityConfig::default())
            .unwrap()
            .into_inner();

        let expected = explicit_set(&net, Strategy::Bfs);
        assert_eq!(reachable.count, BigUint::from(expected.len()), "{}", name);

        let enumerated: HashSet<Marking> = engine.enumerate(&reachable.set).unwrap().collect();
        assert_eq!(enumerated, expected, "{}", name);
    }
}

#[test]
fn initial_marking_is_reachable() {
    for (name, net) in nets() {
        let bdd = Bdd::default();
        let engine = SymbolicReachability::new(&net, &bdd);
        let reachable = engine
            .compute_reachable(&ReachabilityConfig::default())
            .unwrap()
            .into_inner();
        assert!(engine.contains(&reachable.set, net.initial()).unwrap(), "{}", name);
    }
}

#[test]
fn reachable_set_is_closed_under_firing() {
    for (name, net) in nets() {
        let bdd = Bdd::default();
        let engine = SymbolicReachability::new(&net, &bdd);
        let reachable = engine
            .compute_reachable(&ReachabilityConfig::default())
            .unwrap()
            .into_inner();

        // Symbolically: post(R) ⊆ R.
        let image = engine.image(&reachable.set).unwrap();
        assert!(bdd.is_implies(image.root(), reachable.set.root()), "{}", name);

        // Explicitly, marking by marking.
        for marking in engine.enumerate(&reachable.set).unwrap() {
            for t in explicit::enabled(&net, &marking) {
                let next = net.fire(&marking, t).unwrap();
                assert!(engine.contains(&reachable.set, &next).unwrap(), "{}", name);
            }
        }
    }
}

#[test]
fn enumeration_is_restartable() {
    let net = models::dining_philosophers(3).unwrap();
    let bdd = Bdd::default();
    let engine = SymbolicReachability::new(&net, &bdd);
    let reachable = engine
        .compute_reachable(&ReachabilityConfig::default())
        .unwrap()
        .into_inner();

    let markings = engine.enumerate(&reachable.set).unwrap();
    let first: Vec<Marking> = markings.clone().collect();
    let second: Vec<Marking> = markings.collect();
    assert_eq!(first, second);
    assert_eq!(BigUint::from(first.len()), reachable.count);
}

// ─── Serialization ─────────────────────────────────────────────────────────────

#[test]
fn serialize_then_reload_reproduces_the_set() {
    for (name, net) in nets() {
        let bdd = Bdd::default();
        let engine = SymbolicReachability::new(&net, &bdd);
        let reachable = engine
            .compute_reachable(&ReachabilityConfig::default())
            .unwrap()
            .into_inner();

        let mut buf = Vec::new();
        engine.serialize(&reachable.set, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let reloaded = engine.reload(&text).unwrap();
        let before: Vec<Marking> = engine.enumerate(&reachable.set).unwrap().collect();
        let after: Vec<Marking> = engine.enumerate(&reloaded).unwrap().collect();
        assert_eq!(before, after, "{}", name);
    }
}

#[test]
fn reload_into_fresh_manager() {
    let net = models::mutex(3).unwrap();

    let bdd = Bdd::default();
    let engine = SymbolicReachability::new(&net, &bdd);
    let reachable = engine
        .compute_reachable(&ReachabilityConfig::default())
        .unwrap()
        .into_inner();
    let mut buf = Vec::new();
    engine.serialize(&reachable.set, &mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();

    let other = Bdd::default();
    let fresh = SymbolicReachability::new(&net, &other);
    let reloaded = fresh.reload(&text).unwrap();
    assert_eq!(fresh.count(&reloaded).unwrap(), reachable.count);
}
