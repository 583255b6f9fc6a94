//! Weighted optimization over a reachable set.
//!
//! Scores every admissible marking as `Σ tokens × weight` and keeps the
//! first one reaching the maximum, in enumeration order.

use std::collections::BTreeMap;
use std::time::Instant;

use log::{debug, info, warn};

use crate::error::AnalysisError;
use crate::net::{Marking, Net};
use crate::symbolic::{StateSet, SymbolicReachability};
use crate::utils::Timed;

/// Inclusive per-place token bounds, keyed by place index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraints {
    bounds: BTreeMap<usize, (u32, u32)>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `min <= tokens(place) <= max`; a later bound on the same place replaces it.
    pub fn with_bound(mut self, place: usize, min: u32, max: u32) -> Self {
        self.bounds.insert(place, (min, max));
        self
    }

    /// Builds constraints from place identifiers.
    pub fn from_ids<S: AsRef<str>>(
        net: &Net,
        bounds: impl IntoIterator<Item = (S, u32, u32)>,
    ) -> Result<Self, AnalysisError> {
        let mut constraints = Self::new();
        for (id, min, max) in bounds {
            let id = id.as_ref();
            let place = net
                .place_index(id)
                .ok_or_else(|| AnalysisError::UnknownPlace(id.to_string()))?;
            constraints = constraints.with_bound(place, min, max);
        }
        Ok(constraints)
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn admits(&self, marking: &Marking) -> bool {
        self.bounds
            .iter()
            .all(|(&p, &(min, max))| (min..=max).contains(&marking.tokens(p)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Optimum {
    Best { marking: Marking, score: i64 },
    /// No reachable marking satisfies the constraints.
    NoSolution,
}

pub struct Optimizer<'e, 'a> {
    engine: &'e SymbolicReachability<'a>,
}

impl<'e, 'a> Optimizer<'e, 'a> {
    pub fn new(engine: &'e SymbolicReachability<'a>) -> Self {
        Self { engine }
    }

    /// Weights in effect: `weights`, else the net's, else uniform 1.
    fn resolve_weights(&self, weights: Option<&[i64]>) -> Vec<i64> {
        let net = self.engine.net();
        match weights {
            Some(w) if w.len() == net.num_places() => w.to_vec(),
            Some(w) => {
                warn!(
                    "Ignoring {} weight(s) for {} place(s), falling back to uniform weights",
                    w.len(),
                    net.num_places()
                );
                vec![1; net.num_places()]
            }
            None => net
                .weights()
                .map(<[i64]>::to_vec)
                .unwrap_or_else(|| vec![1; net.num_places()]),
        }
    }

    pub fn optimize(
        &self,
        set: &StateSet,
        weights: Option<&[i64]>,
        constraints: Option<&Constraints>,
    ) -> Result<Timed<Optimum>, AnalysisError> {
        let start = Instant::now();
        let net = self.engine.net();
        let weights = self.resolve_weights(weights);

        if let Some(constraints) = constraints {
            if let Some(&p) = constraints.bounds.keys().find(|&&p| p >= net.num_places()) {
                return Err(AnalysisError::UnknownPlace(format!("#{}", p)));
            }
        }

        let mut best: Option<(Marking, i64)> = None;
        let mut admitted = 0usize;
        for marking in self.engine.enumerate(set)? {
            if constraints.is_some_and(|c| !c.admits(&marking)) {
                continue;
            }
            admitted += 1;
            let score: i64 = marking.marked().map(|p| i64::from(marking.tokens(p)) * weights[p]).sum();
            if best.as_ref().map_or(true, |&(_, s)| score > s) {
                best = Some((marking, score));
            }
        }
        debug!("{} marking(s) satisfy the constraints", admitted);

        let optimum = match best {
            Some((marking, score)) => {
                info!(
                    "Best marking {} with score {} in {:?}",
                    net.display(&marking),
                    score,
                    start.elapsed()
                );
                Optimum::Best { marking, score }
            }
            None => {
                info!("No reachable marking satisfies the constraints");
                Optimum::NoSolution
            }
        };
        Ok(Timed::since(start, optimum))
    }
}
