//! Deadlock detection over a symbolic reachable set.
//!
//! A marking is dead when no transition is enabled at it. Small nets are
//! checked exhaustively, marking by marking. Larger ones are first filtered
//! symbolically through the structural predicate `¬enabled_any`; only the
//! surviving candidates go through the exact check.
//!
//! The exact check asks Z3 whether at least one transition can fire; see
//! [`crate::exact`]. The structural predicate ignores transitions that touch
//! no place, the exact check does not; such disagreements are reported as
//! mismatches.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use num_bigint::BigUint;
use num_traits::ToPrimitive;

use crate::error::{AnalysisError, SolverError};
use crate::exact::ExactCheck;
use crate::net::Marking;
use crate::symbolic::{StateSet, SymbolicReachability};
use crate::utils::Timed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Pick by size thresholds.
    Auto,
    Exhaustive,
    Hybrid,
}

#[derive(Debug, Clone)]
pub struct DeadlockConfig {
    pub marking_limit: u64,
    pub place_limit: usize,
    pub transition_limit: usize,
    /// Candidates checked after the first one turns out live.
    pub max_resamples: usize,
    /// Turn the first mismatch into [`AnalysisError::EncodingMismatch`].
    pub strict: bool,
    pub strategy: Strategy,
    /// Z3 timeout per exact check.
    pub solver_timeout: Option<Duration>,
}

impl Default for DeadlockConfig {
    fn default() -> Self {
        Self {
            marking_limit: 64,
            place_limit: 16,
            transition_limit: 12,
            max_resamples: 100,
            strict: false,
            strategy: Strategy::Auto,
            solver_timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl DeadlockConfig {
    pub fn with_limits(mut self, markings: u64, places: usize, transitions: usize) -> Self {
        self.marking_limit = markings;
        self.place_limit = places;
        self.transition_limit = transitions;
        self
    }

    pub fn with_max_resamples(mut self, max_resamples: usize) -> Self {
        self.max_resamples = max_resamples;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_solver_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.solver_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlockReport {
    /// First dead marking found, if any.
    pub marking: Option<Marking>,
    /// Strategy actually used, never [`Strategy::Auto`].
    pub strategy: Strategy,
    /// Number of exact checks performed.
    pub checked: usize,
    /// Candidates the structural predicate called dead but the exact check did not.
    pub mismatches: usize,
}

pub struct DeadlockDetector<'e, 'a> {
    engine: &'e SymbolicReachability<'a>,
    config: DeadlockConfig,
    exact: ExactCheck,
}

/// Reads an exact-check answer as "dead"; a failure counts as nothing enabled.
fn settle(result: Result<u64, SolverError>, shown: impl FnOnce() -> String) -> bool {
    match result {
        Ok(enabled) => enabled == 0,
        Err(e) => {
            warn!("Exact check failed at {}: {}; counting no enabled transition", shown(), e);
            true
        }
    }
}

impl<'e, 'a> DeadlockDetector<'e, 'a> {
    pub fn new(engine: &'e SymbolicReachability<'a>, config: DeadlockConfig) -> Self {
        let exact = ExactCheck::new(config.solver_timeout);
        Self { engine, config, exact }
    }

    pub fn config(&self) -> &DeadlockConfig {
        &self.config
    }

    /// Resolves [`Strategy::Auto`] for a reachable set of `count` markings.
    pub fn choose_strategy(&self, count: &BigUint) -> Strategy {
        let net = self.engine.net();
        match self.config.strategy {
            Strategy::Auto => {
                if count.to_u64().is_some_and(|n| n <= self.config.marking_limit)
                    && net.num_places() <= self.config.place_limit
                    && net.num_transitions() <= self.config.transition_limit
                {
                    Strategy::Exhaustive
                } else {
                    Strategy::Hybrid
                }
            }
            strategy => strategy,
        }
    }

    /// Exact check: whether no transition can fire at `marking`.
    ///
    /// A failing solver counts as "nothing enabled".
    pub fn is_dead(&mut self, marking: &Marking) -> bool {
        let net = self.engine.net();
        settle(self.exact.enabled(net, marking), || net.display(marking).to_string())
    }

    fn mismatch(&self, marking: &Marking, mismatches: &mut usize) -> Result<(), AnalysisError> {
        let shown = self.engine.net().display(marking).to_string();
        *mismatches += 1;
        if self.config.strict {
            return Err(AnalysisError::EncodingMismatch { marking: shown });
        }
        warn!("Structural deadlock candidate {} is live according to the exact check", shown);
        Ok(())
    }

    /// Searches `set` for a dead marking.
    pub fn find_deadlock(&mut self, set: &StateSet) -> Result<Timed<DeadlockReport>, AnalysisError> {
        let start = Instant::now();
        let count = self.engine.count(set)?;
        let strategy = self.choose_strategy(&count);
        debug!("Deadlock search over {} marking(s) using {:?}", count, strategy);

        let mut report = DeadlockReport {
            marking: None,
            strategy,
            checked: 0,
            mismatches: 0,
        };

        match strategy {
            Strategy::Exhaustive | Strategy::Auto => {
                for marking in self.engine.enumerate(set)? {
                    report.checked += 1;
                    if self.is_dead(&marking) {
                        report.marking = Some(marking);
                        break;
                    }
                }
            }
            Strategy::Hybrid => {
                let bdd = self.engine.bdd();
                let dead = -self.engine.enabled_any();
                let candidates = bdd.apply_and(set.root(), dead);
                let mut candidates = self.engine.enumerate(&self.engine.state_set(candidates))?;

                if let Some(first) = candidates.next() {
                    report.checked += 1;
                    if self.is_dead(&first) {
                        report.marking = Some(first);
                    } else {
                        self.mismatch(&first, &mut report.mismatches)?;
                        for marking in candidates.take(self.config.max_resamples) {
                            report.checked += 1;
                            if self.is_dead(&marking) {
                                report.marking = Some(marking);
                                break;
                            }
                            self.mismatch(&marking, &mut report.mismatches)?;
                        }
                    }
                }
            }
        }

        match &report.marking {
            Some(marking) => info!(
                "Deadlock found at {} after {} exact check(s) in {:?}",
                self.engine.net().display(marking),
                report.checked,
                start.elapsed()
            ),
            None => info!(
                "No deadlock found after {} exact check(s) in {:?}",
                report.checked,
                start.elapsed()
            ),
        }
        if report.mismatches > 0 {
            warn!("{} structural candidate(s) disagreed with the exact check", report.mismatches);
        }

        Ok(Timed::since(start, report))
    }
}
