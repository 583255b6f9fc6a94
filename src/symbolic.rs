//! Symbolic reachability over a shared BDD manager.
//!
//! Every place `i` owns two variables: the current-state variable `2i+1`
//! and the next-state variable `2i+2`. Interleaving keeps the relation
//! small and makes the next-to-current renaming order preserving.
//!
//! # Example
//!
//! ```
//! use petri_bdd::bdd::Bdd;
//! use petri_bdd::models;
//! use petri_bdd::symbolic::{ReachabilityConfig, SymbolicReachability};
//!
//! let net = models::token_ring(5).unwrap();
//! let bdd = Bdd::default();
//! let engine = SymbolicReachability::new(&net, &bdd);
//!
//! let reachable = engine.compute_reachable(&ReachabilityConfig::default()).unwrap();
//! assert_eq!(reachable.value.count, 5u32.into());
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use num_bigint::BigUint;

use crate::assignments::Assignments;
use crate::bdd::{Bdd, ManagerId};
use crate::dot::{self, DotConfig};
use crate::error::{AnalysisError, DotError};
use crate::net::{Marking, Net};
use crate::reference::Ref;
use crate::utils::Timed;

pub fn current_var(place: usize) -> u32 {
    2 * place as u32 + 1
}

pub fn next_var(place: usize) -> u32 {
    2 * place as u32 + 2
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Internal variable names, safe for any downstream tool.
///
/// Place `A-1` becomes `x_A_1` (current) and `y_A_1` (next). Identifiers
/// that collide after sanitizing get a `__<n>` suffix in declaration order.
#[derive(Debug, Clone)]
pub struct VarNames {
    current: Vec<String>,
    next: Vec<String>,
    reverse: HashMap<String, usize>,
}

impl VarNames {
    pub fn new(places: &[String]) -> Self {
        let mut used = HashSet::new();
        let mut bases = Vec::with_capacity(places.len());
        for id in places {
            let base = sanitize(id);
            let mut name = base.clone();
            let mut n = 0;
            while !used.insert(name.clone()) {
                n += 1;
                name = format!("{}__{}", base, n);
            }
            bases.push(name);
        }

        let current: Vec<String> = bases.iter().map(|b| format!("x_{}", b)).collect();
        let next = bases.iter().map(|b| format!("y_{}", b)).collect();
        let reverse = current.iter().enumerate().map(|(p, name)| (name.clone(), p)).collect();
        VarNames { current, next, reverse }
    }

    pub fn current(&self, place: usize) -> &str {
        &self.current[place]
    }

    pub fn next(&self, place: usize) -> &str {
        &self.next[place]
    }

    /// Place index behind an internal name, with whether it is the next-state copy.
    pub fn place_of(&self, name: &str) -> Option<(usize, bool)> {
        if let Some(&p) = self.reverse.get(name) {
            return Some((p, false));
        }
        let rest = name.strip_prefix("y_")?;
        let p = *self.reverse.get(&format!("x_{}", rest))?;
        Some((p, true))
    }

    /// Internal name of a diagram variable.
    pub fn of_var(&self, v: u32) -> &str {
        let p = ((v - 1) / 2) as usize;
        if v % 2 == 1 {
            &self.current[p]
        } else {
            &self.next[p]
        }
    }
}

/// A set of markings: a predicate over the current-state variables of one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateSet {
    root: Ref,
    manager: ManagerId,
}

impl StateSet {
    pub fn root(&self) -> Ref {
        self.root
    }

    pub fn manager(&self) -> ManagerId {
        self.manager
    }
}

/// Bounds on the reachability fixpoint.
#[derive(Debug, Clone)]
pub struct ReachabilityConfig {
    /// Maximum number of image computations.
    pub max_iterations: Option<usize>,
    pub time_budget: Option<Duration>,
    /// Checked before every image step.
    pub cancel: Arc<AtomicBool>,
    /// Reject nets in which some reachable firing creates a second token.
    pub check_safety: bool,
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            max_iterations: None,
            time_budget: None,
            cancel: Arc::new(AtomicBool::new(false)),
            check_safety: true,
        }
    }
}

impl ReachabilityConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_time_budget(mut self, time_budget: Duration) -> Self {
        self.time_budget = Some(time_budget);
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_check_safety(mut self, check_safety: bool) -> Self {
        self.check_safety = check_safety;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Reachable {
    pub set: StateSet,
    pub count: BigUint,
    /// Number of image computations, the final empty one included.
    pub iterations: usize,
}

/// Lazy iterator over the markings of a [`StateSet`].
///
/// Order: lexicographic over places, marked before unmarked.
#[derive(Clone)]
pub struct Markings<'a> {
    inner: Assignments<'a>,
}

impl Iterator for Markings<'_> {
    type Item = Marking;

    fn next(&mut self) -> Option<Self::Item> {
        let bits = self.inner.next()?;
        Some(Marking(bits.into_iter().map(u32::from).collect()))
    }
}

pub struct SymbolicReachability<'a> {
    net: &'a Net,
    bdd: &'a Bdd,
    names: VarNames,
    current_vars: Vec<u32>,
    next_to_current: HashMap<u32, u32>,
    relation: Ref,
}

impl<'a> SymbolicReachability<'a> {
    /// Encodes `net` into `bdd`, building the transition relation once.
    pub fn new(net: &'a Net, bdd: &'a Bdd) -> Self {
        let n = net.num_places();
        let mut engine = SymbolicReachability {
            net,
            bdd,
            names: VarNames::new(net.places()),
            current_vars: (0..n).map(current_var).collect(),
            next_to_current: (0..n).map(|p| (next_var(p), current_var(p))).collect(),
            relation: Ref::ZERO,
        };
        engine.relation = engine.transition_relation();
        debug!(
            "Transition relation for {} transition(s) has {} node(s)",
            net.num_transitions(),
            bdd.size(engine.relation)
        );
        engine
    }

    pub fn net(&self) -> &'a Net {
        self.net
    }

    pub fn bdd(&self) -> &'a Bdd {
        self.bdd
    }

    pub fn names(&self) -> &VarNames {
        &self.names
    }

    pub fn relation(&self) -> Ref {
        self.relation
    }

    pub fn current_vars(&self) -> &[u32] {
        &self.current_vars
    }

    /// Wraps a predicate over current-state variables built in this manager.
    pub(crate) fn state_set(&self, root: Ref) -> StateSet {
        StateSet {
            root,
            manager: self.bdd.id(),
        }
    }

    fn owned(&self, set: &StateSet) -> Result<Ref, AnalysisError> {
        if set.manager != self.bdd.id() {
            return Err(AnalysisError::ForeignPredicate);
        }
        Ok(set.root)
    }

    fn marking_cube(&self, marking: &Marking) -> Ref {
        self.bdd.cube((0..self.net.num_places()).map(|p| {
            let v = current_var(p) as i32;
            if marking.is_marked(p) {
                v
            } else {
                -v
            }
        }))
    }

    /// The singleton set holding the initial marking.
    pub fn initial_predicate(&self) -> StateSet {
        self.state_set(self.marking_cube(self.net.initial()))
    }

    /// Relation over current and next variables: some transition fires.
    ///
    /// Places a transition does not touch keep their value (frame axiom).
    pub fn transition_relation(&self) -> Ref {
        let bdd = self.bdd;
        let n = self.net.num_places();

        let relations: Vec<Ref> = (0..self.net.num_transitions())
            .map(|t| {
                let inputs = self.net.inputs(t);
                let outputs = self.net.outputs(t);
                let mut parts = Vec::with_capacity(n + inputs.len());
                for &p in inputs {
                    parts.push(bdd.mk_var(current_var(p)));
                }
                for p in 0..n {
                    let y = bdd.mk_var(next_var(p));
                    if outputs.contains(&p) {
                        parts.push(y);
                    } else if inputs.contains(&p) {
                        parts.push(-y);
                    } else {
                        parts.push(bdd.apply_eq(y, bdd.mk_var(current_var(p))));
                    }
                }
                bdd.apply_and_many(parts)
            })
            .collect();

        bdd.apply_or_many(relations)
    }

    /// Markings enabling at least one transition that touches some place.
    pub fn enabled_any(&self) -> Ref {
        let bdd = self.bdd;
        bdd.apply_or_many(
            (0..self.net.num_transitions())
                .filter(|&t| !self.net.is_vacuous(t))
                .map(|t| bdd.apply_and_many(self.net.inputs(t).iter().map(|&p| bdd.mk_var(current_var(p))))),
        )
    }

    fn post(&self, states: Ref) -> Ref {
        let img = self.bdd.and_exists(states, self.relation, &self.current_vars);
        self.bdd.rename(img, &self.next_to_current)
    }

    /// Successors of `set` in one firing.
    pub fn image(&self, set: &StateSet) -> Result<StateSet, AnalysisError> {
        let root = self.owned(set)?;
        Ok(self.state_set(self.post(root)))
    }

    /// Least fixpoint of the image starting from the initial marking.
    pub fn compute_reachable(&self, config: &ReachabilityConfig) -> Result<Timed<Reachable>, AnalysisError> {
        let start = Instant::now();
        let bdd = self.bdd;

        let init = self.initial_predicate().root;
        let mut current = init;
        let mut frontier = init;
        let mut iterations = 0;

        loop {
            let interrupted = |reason: &'static str| AnalysisError::Interrupted {
                iterations,
                elapsed: start.elapsed(),
                reason,
            };
            if config.cancel.load(Ordering::Relaxed) {
                return Err(interrupted("cancelled"));
            }
            if config.max_iterations.is_some_and(|max| iterations >= max) {
                return Err(interrupted("iteration limit reached"));
            }
            if config.time_budget.is_some_and(|budget| start.elapsed() > budget) {
                return Err(interrupted("time budget exceeded"));
            }

            iterations += 1;
            let succ = self.post(frontier);
            let delta = bdd.apply_and(succ, -current);
            debug!(
                "iteration {}: frontier {} node(s), reachable {} node(s)",
                iterations,
                bdd.size(delta),
                bdd.size(current)
            );
            if bdd.is_zero(delta) {
                break;
            }
            current = bdd.apply_or(current, delta);
            frontier = delta;
        }

        if config.check_safety {
            self.check_safety(current)?;
        }

        let count = bdd.sat_count(current, self.net.num_places());
        let (hits, misses) = bdd.cache_stats();
        info!(
            "Symbolic reachability: {} marking(s) after {} iteration(s) in {:?}, {} node(s) of {} allocated",
            count,
            iterations,
            start.elapsed(),
            bdd.size(current),
            bdd.num_nodes()
        );
        debug!("Computed table: {} hit(s), {} miss(es)", hits, misses);

        Ok(Timed::since(
            start,
            Reachable {
                set: self.state_set(current),
                count,
                iterations,
            },
        ))
    }

    /// Fails if some marking in `states` enables a firing that puts a second
    /// token into an already marked output place.
    fn check_safety(&self, states: Ref) -> Result<(), AnalysisError> {
        let bdd = self.bdd;
        for t in 0..self.net.num_transitions() {
            let inputs = self.net.inputs(t);
            let enabled = bdd.apply_and_many(
                std::iter::once(states).chain(inputs.iter().map(|&p| bdd.mk_var(current_var(p)))),
            );
            if bdd.is_zero(enabled) {
                continue;
            }
            for &p in self.net.outputs(t).iter().filter(|p| !inputs.contains(p)) {
                if !bdd.is_zero(bdd.apply_and(enabled, bdd.mk_var(current_var(p)))) {
                    return Err(AnalysisError::NotSafe {
                        place: self.net.places()[p].clone(),
                        transition: self.net.transitions()[t].clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Number of markings in `set`.
    pub fn count(&self, set: &StateSet) -> Result<BigUint, AnalysisError> {
        let root = self.owned(set)?;
        Ok(self.bdd.sat_count(root, self.net.num_places()))
    }

    pub fn contains(&self, set: &StateSet, marking: &Marking) -> Result<bool, AnalysisError> {
        let root = self.owned(set)?;
        if marking.len() != self.net.num_places() || marking.0.iter().any(|&n| n > 1) {
            return Ok(false);
        }
        let cube = self.marking_cube(marking);
        Ok(self.bdd.is_implies(cube, root))
    }

    /// Lazily enumerates the markings of `set`; clone the iterator to restart.
    pub fn enumerate(&self, set: &StateSet) -> Result<Markings<'a>, AnalysisError> {
        let root = self.owned(set)?;
        Ok(Markings {
            inner: self.bdd.assignments(root, &self.current_vars),
        })
    }

    pub fn to_named(&self, marking: &Marking) -> BTreeMap<String, u32> {
        self.net.named(marking)
    }

    /// Label of a variable in reports: the place id, primed for next-state variables.
    fn display_var(&self, v: u32) -> String {
        let p = ((v - 1) / 2) as usize;
        let id = &self.net.places()[p];
        if v % 2 == 1 {
            id.clone()
        } else {
            format!("{}'", id)
        }
    }

    /// Writes `set` as a DOT graph labelled with the original place ids.
    pub fn serialize(&self, set: &StateSet, mut writer: impl Write) -> Result<(), AnalysisError> {
        let root = self.owned(set)?;
        let raw = self.bdd.to_dot_with_config(&[root], &DotConfig::default(), &|v| {
            format!("{}#{}", self.names.of_var(v), v)
        })?;
        let dot = dot::relabel(&raw, |label| {
            let (name, _) = label.rsplit_once('#')?;
            let (p, next) = self.names.place_of(name)?;
            let id = &self.net.places()[p];
            Some(if next { format!("{}'", id) } else { id.clone() })
        });
        writer.write_all(dot.as_bytes())?;
        debug!("Serialized a set of {} node(s)", self.bdd.size(root));
        Ok(())
    }

    /// Reads back a set written by [`serialize`](Self::serialize).
    pub fn reload(&self, text: &str) -> Result<StateSet, AnalysisError> {
        let roots = self.bdd.from_dot(text, |label| {
            if let Some(p) = self.net.place_index(label) {
                return Some(current_var(p));
            }
            let p = self.net.place_index(label.strip_suffix('\'')?)?;
            Some(next_var(p))
        })?;
        let &[root] = roots.as_slice() else {
            return Err(DotError::RootCount {
                expected: 1,
                found: roots.len(),
            }
            .into());
        };

        let bdd = self.bdd;
        let next = bdd
            .descendants([root])
            .into_iter()
            .filter(|&i| i != Ref::ONE.index())
            .map(|i| bdd.variable(i))
            .filter(|v| v % 2 == 0)
            .min();
        if let Some(v) = next {
            return Err(DotError::NextState(self.display_var(v)).into());
        }
        Ok(self.state_set(root))
    }

    /// Readable boolean expression of `set` over place ids.
    pub fn to_expr(&self, set: &StateSet) -> Result<String, AnalysisError> {
        let root = self.owned(set)?;
        Ok(self.bdd.to_expr(root, &|v| self.display_var(v)))
    }

    /// Renders a DOT file to PNG; see [`dot::render`].
    pub fn render(&self, dot_path: &Path, image_path: &Path) -> bool {
        dot::render(dot_path, image_path)
    }
}
