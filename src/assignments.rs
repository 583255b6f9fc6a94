//! Iterator over complete satisfying assignments of a BDD.
//!
//! Unlike a path walk, every yielded assignment fixes *all* variables of the
//! given support list: variables skipped by the diagram are expanded into
//! both values. Assignments come out in lexicographic order of the support
//! list, `true` before `false`, independently of the diagram's shape; the
//! enumeration of a subset is therefore a subsequence of the enumeration of
//! any superset.
//!
//! # Example
//!
//! ```
//! use petri_bdd::bdd::Bdd;
//!
//! let bdd = Bdd::default();
//! let f = bdd.mk_var(1); // x2 is a don't-care
//!
//! let all: Vec<_> = bdd.assignments(f, &[1, 2]).collect();
//! assert_eq!(all, vec![vec![true, true], vec![true, false]]);
//! ```
//!
//! The number of assignments can be exponential in the number of variables.

use crate::bdd::Bdd;
use crate::reference::Ref;

impl Bdd {
    /// Returns an iterator over all complete assignments to `vars` that satisfy `f`.
    ///
    /// `vars` must be sorted in increasing order and cover every variable `f` depends on.
    pub fn assignments<'a>(&'a self, f: Ref, vars: &[u32]) -> Assignments<'a> {
        Assignments::new(self, f, vars)
    }
}

#[derive(Debug, Clone, Copy)]
enum Branch {
    High,
    Low,
    Done,
}

#[derive(Debug, Clone)]
struct StackFrame {
    node: Ref,
    depth: usize,
    next_branch: Branch,
}

/// Lazy enumeration created by [`Bdd::assignments()`].
///
/// Cloning the iterator forks it; build a fresh one to restart from the beginning.
#[derive(Clone)]
pub struct Assignments<'a> {
    bdd: &'a Bdd,
    vars: Vec<u32>,
    stack: Vec<StackFrame>,
    current: Vec<bool>,
}

impl<'a> Assignments<'a> {
    pub fn new(bdd: &'a Bdd, f: Ref, vars: &[u32]) -> Self {
        debug_assert!(vars.windows(2).all(|w| w[0] < w[1]), "vars must be sorted");
        Assignments {
            bdd,
            vars: vars.to_vec(),
            stack: vec![StackFrame {
                node: f,
                depth: 0,
                next_branch: Branch::High,
            }],
            current: vec![false; vars.len()],
        }
    }
}

impl Iterator for Assignments<'_> {
    type Item = Vec<bool>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let node = frame.node;
            let depth = frame.depth;

            if self.bdd.is_zero(node) {
                self.stack.pop();
                continue;
            }

            if depth == self.vars.len() {
                assert!(self.bdd.is_one(node), "support list misses a variable");
                self.stack.pop();
                return Some(self.current.clone());
            }

            let (low, high) = self.bdd.top_cofactors(node, self.vars[depth]);
            let branch = frame.next_branch;
            let (child, value) = match branch {
                Branch::High => {
                    frame.next_branch = Branch::Low;
                    (high, true)
                }
                Branch::Low => {
                    frame.next_branch = Branch::Done;
                    (low, false)
                }
                Branch::Done => {
                    self.stack.pop();
                    continue;
                }
            };

            self.current[depth] = value;
            self.stack.push(StackFrame {
                node: child,
                depth: depth + 1,
                next_branch: Branch::High,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_constants() {
        let bdd = Bdd::default();

        assert_eq!(bdd.assignments(bdd.one(), &[]).count(), 1);
        assert_eq!(bdd.assignments(bdd.one(), &[1, 2, 3]).count(), 8);
        assert_eq!(bdd.assignments(bdd.zero(), &[1, 2]).count(), 0);
    }

    #[test]
    fn test_xor_order() {
        let bdd = Bdd::default();
        let f = bdd.apply_xor(bdd.mk_var(1), bdd.mk_var(2));

        let all: Vec<_> = bdd.assignments(f, &[1, 2]).collect();
        assert_eq!(all, vec![vec![true, false], vec![false, true]]);
    }

    #[test]
    fn test_count_matches_sat_count() {
        let bdd = Bdd::default();
        let x: Vec<Ref> = (1..=5).map(|v| bdd.mk_var(v)).collect();
        let f = bdd.apply_or(bdd.apply_and(x[0], -x[3]), bdd.apply_xor(x[1], x[4]));

        let n = bdd.assignments(f, &[1, 2, 3, 4, 5]).count();
        assert_eq!(num_bigint::BigUint::from(n), bdd.sat_count(f, 5));
    }

    #[test]
    fn test_subset_enumeration_is_subsequence() {
        let bdd = Bdd::default();
        let x: Vec<Ref> = (1..=3).map(|v| bdd.mk_var(v)).collect();
        let f = bdd.apply_or(x[0], x[2]);
        let g = bdd.apply_and(f, -x[1]);

        let all_f: Vec<_> = bdd.assignments(f, &[1, 2, 3]).collect();
        let all_g: Vec<_> = bdd.assignments(g, &[1, 2, 3]).collect();
        let filtered: Vec<_> = all_f.into_iter().filter(|a| !a[1]).collect();
        assert_eq!(filtered, all_g);
    }

    #[test]
    fn test_restart_by_clone() {
        let bdd = Bdd::default();
        let f = bdd.mk_var(1);
        let it = bdd.assignments(f, &[1, 2]);
        let first: Vec<_> = it.clone().collect();
        let second: Vec<_> = it.collect();
        assert_eq!(first, second);
    }
}
