//! # petri-bdd: reachability analysis of 1-safe Petri nets
//!
//! **`petri-bdd`** computes the reachable markings of a 1-safe place/transition net
//! and answers questions about them: is there a deadlock, and which reachable
//! marking maximizes a weighted token count under per-place bounds.
//!
//! ## How it works
//!
//! In a 1-safe net every place holds at most one token, so a marking is a bit
//! vector and a *set* of markings is a boolean function. The crate represents such
//! sets as **Binary Decision Diagrams** (reduced, ordered, with complement edges)
//! and computes the reachable set as a least fixpoint of the image operator,
//! using a transition relation over current/next variable pairs.
//!
//! A plain explicit BFS/DFS search is provided as a baseline and cross-check.
//!
//! ## Quick Start
//!
//! ```rust
//! use petri_bdd::bdd::Bdd;
//! use petri_bdd::deadlock::{DeadlockConfig, DeadlockDetector};
//! use petri_bdd::net::{Marking, Net};
//! use petri_bdd::optimize::{Optimizer, Optimum};
//! use petri_bdd::symbolic::{ReachabilityConfig, SymbolicReachability};
//!
//! // 1. Describe the net: one token moving from A to B
//! let net = Net::builder()
//!     .place("A", 1)
//!     .place("B", 0)
//!     .transition("t", ["A"], ["B"])
//!     .build()
//!     .unwrap();
//!
//! // 2. One manager per net; every symbolic component borrows it
//! let bdd = Bdd::default();
//! let engine = SymbolicReachability::new(&net, &bdd);
//! let reachable = engine.compute_reachable(&ReachabilityConfig::default()).unwrap().value;
//! assert_eq!(reachable.count, 2u32.into());
//!
//! // 3. Nothing is enabled once the token sits in B
//! let mut detector = DeadlockDetector::new(&engine, DeadlockConfig::default());
//! let report = detector.find_deadlock(&reachable.set).unwrap().value;
//! assert_eq!(report.marking, Some(Marking(vec![0, 1])));
//!
//! // 4. Weighted optimum
//! let optimum = Optimizer::new(&engine).optimize(&reachable.set, Some(&[1, 5][..]), None).unwrap().value;
//! assert_eq!(optimum, Optimum::Best { marking: Marking(vec![0, 1]), score: 5 });
//! ```
//!
//! ## Core Components
//!
//! - **[`bdd`]**: The [`Bdd`][crate::bdd::Bdd] manager: node construction, ITE, quantification, renaming.
//! - **[`net`]**: Net model, validation and builder.
//! - **[`explicit`]**: Explicit BFS/DFS state-space search.
//! - **[`symbolic`]**: Transition relation and reachability fixpoint.
//! - **[`deadlock`]**: Exhaustive and hybrid deadlock detection.
//! - **[`exact`]**: Z3-backed check of whether any transition can fire.
//! - **[`optimize`]**: Constrained weighted optimization over reachable markings.
//! - **[`dot`]**: Graphviz export, reload and rendering.

pub mod assignments;
pub mod bdd;
pub mod cache;
pub mod deadlock;
pub mod dot;
pub mod error;
pub mod exact;
pub mod explicit;
pub mod models;
pub mod net;
pub mod node;
pub mod optimize;
pub mod reference;
pub mod sat;
pub mod symbolic;
pub mod table;
pub mod utils;
