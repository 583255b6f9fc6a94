//! Exact enabledness check backed by Z3.
//!
//! Each query builds a fresh integer model with one variable `e_t` per
//! transition, bounded by `0 <= e_t <= 1` when every input place of `t` is
//! marked and by `e_t = 0` otherwise. A transition without input places is
//! always bounded by 1. The marking is live iff `sum(e_t) >= 1` is
//! satisfiable, i.e. iff the maximum number of enabled transitions is
//! positive.
//!
//! ```
//! use petri_bdd::exact::ExactCheck;
//! use petri_bdd::net::Net;
//!
//! let net = Net::builder()
//!     .place("A", 1)
//!     .place("B", 0)
//!     .transition("t", ["A"], ["B"])
//!     .build()
//!     .unwrap();
//! let mut check = ExactCheck::default();
//! assert_eq!(check.enabled(&net, net.initial()).unwrap(), 1);
//! ```

use std::time::Duration;

use log::debug;
use z3::ast::Int;
use z3::{with_z3_config, Config, SatResult, Solver};

use crate::error::SolverError;
use crate::net::{Marking, Net};

/// Upper bound of `e_t` at `marking`: the minimum of `m_p` over the places
/// `p` with `pre[p][t] = 1`, or 1 when there are none.
pub fn bounds(net: &Net, marking: &Marking) -> Vec<i64> {
    (0..net.num_transitions())
        .map(|t| {
            (0..net.num_places())
                .filter(|&p| net.pre(p, t) == 1)
                .map(|p| i64::from(marking.tokens(p)))
                .min()
                .unwrap_or(1)
        })
        .collect()
}

/// Maps a solver verdict to the optimum of the 0/1 model.
///
/// `Unsat` means no transition can be enabled, so the optimum is 0.
pub fn verdict(result: SatResult, enabled: impl FnOnce() -> Option<u64>) -> Result<u64, SolverError> {
    match result {
        SatResult::Sat => enabled().ok_or(SolverError::MissingModel),
        SatResult::Unsat => Ok(0),
        SatResult::Unknown => Err(SolverError::Unknown),
    }
}

/// Owns the solver configuration and counts the queries sent to Z3.
///
/// Queries run strictly one after another behind `&mut self`.
#[derive(Debug, Clone)]
pub struct ExactCheck {
    timeout: Option<Duration>,
    queries: usize,
}

impl Default for ExactCheck {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(10)))
    }
}

impl ExactCheck {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout, queries: 0 }
    }

    pub fn queries(&self) -> usize {
        self.queries
    }

    /// Number of transitions enabled at `marking` in a witness model, or 0 if
    /// none can be.
    pub fn enabled(&mut self, net: &Net, marking: &Marking) -> Result<u64, SolverError> {
        let bounds = bounds(net, marking);
        if bounds.iter().all(|&bound| bound == 0) {
            return Ok(0);
        }
        self.queries += 1;

        let mut config = Config::new();
        config.set_model_generation(true);
        if let Some(timeout) = self.timeout {
            config.set_timeout_msec(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        }

        let result = with_z3_config(&config, || {
            let solver = Solver::new();

            let mut vars = Vec::with_capacity(bounds.len());
            let mut sum = Int::from_i64(0);
            for (t, &bound) in bounds.iter().enumerate() {
                let var = Int::new_const(format!("e_{}", t));
                // CONSTRAINT: 0 <= e_t <= bound_t
                solver.assert(var.ge(Int::from_i64(0)));
                solver.assert(var.le(Int::from_i64(bound)));
                sum += &var;
                vars.push(var);
            }
            // CONSTRAINT: at least one transition fires
            solver.assert(sum.ge(Int::from_i64(1)));

            let result = solver.check();
            verdict(result, || {
                let model = solver.get_model()?;
                vars.iter()
                    .map(|var| model.get_const_interp(var).and_then(|value| value.as_u64()))
                    .sum()
            })
        });

        debug!("Exact check #{} over {} transition(s): {:?}", self.queries, bounds.len(), result);
        result
    }
}
