//! Explicit state-space search.
//!
//! Enumerates reachable markings one by one. Exponential in the worst case,
//! but simple enough to serve as the reference the symbolic engine is checked
//! against.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use log::info;

use crate::error::AnalysisError;
use crate::net::{Marking, Net};
use crate::utils::Timed;

/// Frontier discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// FIFO frontier.
    Bfs,
    /// LIFO frontier.
    Dfs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Every reachable marking, in discovery order (initial marking first).
    Complete(Vec<Marking>),
    /// The time budget ran out; partial results are discarded.
    Timeout,
}

impl SearchOutcome {
    pub fn markings(&self) -> Option<&[Marking]> {
        match self {
            SearchOutcome::Complete(markings) => Some(markings),
            SearchOutcome::Timeout => None,
        }
    }
}

/// Transitions enabled at `marking`, in index order.
pub fn enabled<'a>(net: &'a Net, marking: &'a Marking) -> impl Iterator<Item = usize> + 'a {
    (0..net.num_transitions()).filter(move |&t| net.is_enabled(marking, t))
}

/// Explores the reachable markings of `net`.
///
/// The budget is checked once per dequeued marking.
pub fn search(
    net: &Net,
    strategy: Strategy,
    time_budget: Duration,
) -> Result<Timed<SearchOutcome>, AnalysisError> {
    let start = Instant::now();

    let initial = net.initial().clone();
    let mut visited = HashSet::from([initial.clone()]);
    let mut order = vec![initial.clone()];
    let mut frontier = VecDeque::from([initial]);

    loop {
        let marking = match strategy {
            Strategy::Bfs => frontier.pop_front(),
            Strategy::Dfs => frontier.pop_back(),
        };
        let Some(marking) = marking else {
            break;
        };

        if start.elapsed() > time_budget {
            info!(
                "{:?} search timed out after {:?} with {} marking(s) discovered",
                strategy,
                start.elapsed(),
                order.len()
            );
            return Ok(Timed::since(start, SearchOutcome::Timeout));
        }

        for t in enabled(net, &marking) {
            let next = net.fire(&marking, t)?;
            if visited.insert(next.clone()) {
                order.push(next.clone());
                frontier.push_back(next);
            }
        }
    }

    debug_assert_eq!(visited.len(), order.len());
    info!(
        "{:?} search found {} reachable marking(s) in {:?}",
        strategy,
        order.len(),
        start.elapsed()
    );
    Ok(Timed::since(start, SearchOutcome::Complete(order)))
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::models;

    const BUDGET: Duration = Duration::from_secs(60);

    fn scenario_a() -> Net {
        Net::builder()
            .place("A", 1)
            .place("B", 0)
            .transition("t", ["A"], ["B"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_scenario_a() {
        let net = scenario_a();
        for strategy in [Strategy::Bfs, Strategy::Dfs] {
            let result = search(&net, strategy, BUDGET).unwrap();
            assert_eq!(
                result.value,
                SearchOutcome::Complete(vec![Marking(vec![1, 0]), Marking(vec![0, 1])])
            );
        }
    }

    #[test]
    fn test_no_transitions() {
        let net = Net::builder().place("P", 1).build().unwrap();
        let result = search(&net, Strategy::Bfs, BUDGET).unwrap();
        assert_eq!(result.value, SearchOutcome::Complete(vec![Marking(vec![1])]));
    }

    #[test]
    fn test_bfs_dfs_same_set() {
        let net = models::dining_philosophers(3).unwrap();
        let bfs = search(&net, Strategy::Bfs, BUDGET).unwrap().into_inner();
        let dfs = search(&net, Strategy::Dfs, BUDGET).unwrap().into_inner();

        let bfs: HashSet<_> = bfs.markings().unwrap().iter().cloned().collect();
        let dfs: HashSet<_> = dfs.markings().unwrap().iter().cloned().collect();
        assert_eq!(bfs, dfs);
    }

    #[test]
    fn test_discovery_order_bfs() {
        let net = models::token_ring(4).unwrap();
        let result = search(&net, Strategy::Bfs, BUDGET).unwrap();
        let markings = result.value.markings().unwrap().to_vec();
        assert_eq!(markings.len(), 4);
        assert_eq!(markings[0], *net.initial());
        assert_eq!(markings[1], Marking(vec![0, 1, 0, 0]));
    }

    #[test]
    fn test_exhausted_budget_times_out() {
        // 500 dequeues cannot all happen within a nanosecond.
        let net = models::token_ring(500).unwrap();
        for strategy in [Strategy::Bfs, Strategy::Dfs] {
            let result = search(&net, strategy, Duration::from_nanos(1)).unwrap();
            assert_eq!(result.value, SearchOutcome::Timeout);
            assert_eq!(result.value.markings(), None);
        }
    }

    #[test]
    fn test_not_safe() {
        let net = Net::builder()
            .place("A", 1)
            .place("B", 1)
            .transition("t", ["A"], ["B"])
            .build()
            .unwrap();
        let err = search(&net, Strategy::Bfs, BUDGET).unwrap_err();
        assert!(matches!(err, AnalysisError::NotSafe { .. }));
    }

    #[test]
    fn test_enabled() {
        let net = models::mutex(2).unwrap();
        let enabled: Vec<_> = enabled(&net, net.initial()).collect();
        assert_eq!(enabled, vec![0, 2]);
    }
}
