//! 1-safe place/transition nets.
//!
//! A [`Net`] is immutable once built. Places and transitions keep their
//! original string identifiers and get a dense index in declaration order;
//! every analysis works on indices and maps back to identifiers for reports.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::warn;

use crate::error::{AnalysisError, NetError};

/// Token count per place, indexed by place index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Marking(pub Vec<u32>);

impl Marking {
    pub fn tokens(&self, place: usize) -> u32 {
        self.0[place]
    }

    pub fn is_marked(&self, place: usize) -> bool {
        self.0[place] > 0
    }

    /// Indices of the places holding a token.
    pub fn marked(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().enumerate().filter(|(_, n)| **n > 0).map(|(p, _)| p)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u32>> for Marking {
    fn from(tokens: Vec<u32>) -> Self {
        Marking(tokens)
    }
}

#[derive(Debug, Clone)]
pub struct Net {
    places: Vec<String>,
    transitions: Vec<String>,
    place_index: HashMap<String, usize>,
    // place-major: pre[p][t]
    pre: Vec<Vec<u8>>,
    inputs: Vec<Vec<usize>>,
    outputs: Vec<Vec<usize>>,
    initial: Marking,
    weights: Option<Vec<i64>>,
}

fn check_unique(kind: &str, ids: &[String]) -> Result<HashMap<String, usize>, NetError> {
    let mut index = HashMap::with_capacity(ids.len());
    for (i, id) in ids.iter().enumerate() {
        if index.insert(id.clone(), i).is_some() {
            return Err(NetError::Malformed(format!("duplicate {} id `{}`", kind, id)));
        }
    }
    Ok(index)
}

fn check_matrix(name: &str, matrix: &[Vec<u8>], places: usize, transitions: usize) -> Result<(), NetError> {
    if matrix.len() != places {
        return Err(NetError::Malformed(format!(
            "{} has {} row(s) for {} place(s)",
            name,
            matrix.len(),
            places
        )));
    }
    for (p, row) in matrix.iter().enumerate() {
        if row.len() != transitions {
            return Err(NetError::Malformed(format!(
                "{} row {} has {} column(s) for {} transition(s)",
                name,
                p,
                row.len(),
                transitions
            )));
        }
        if let Some(t) = row.iter().position(|&x| x > 1) {
            return Err(NetError::Malformed(format!(
                "{}[{}][{}] = {} is not 0/1",
                name, p, t, row[t]
            )));
        }
    }
    Ok(())
}

impl Net {
    /// Validates and assembles a net from its incidence matrices.
    ///
    /// `pre` and `post` are place-major (`pre[p][t]`). A `weights` vector of
    /// the wrong length is dropped in favour of uniform weights.
    pub fn new(
        places: Vec<String>,
        transitions: Vec<String>,
        pre: Vec<Vec<u8>>,
        post: Vec<Vec<u8>>,
        initial: Vec<u32>,
        weights: Option<Vec<i64>>,
    ) -> Result<Self, NetError> {
        if places.is_empty() {
            return Err(NetError::Malformed("net has no places".to_string()));
        }
        let place_index = check_unique("place", &places)?;
        check_unique("transition", &transitions)?;
        check_matrix("pre", &pre, places.len(), transitions.len())?;
        check_matrix("post", &post, places.len(), transitions.len())?;

        if initial.len() != places.len() {
            return Err(NetError::Malformed(format!(
                "initial marking has {} entries for {} place(s)",
                initial.len(),
                places.len()
            )));
        }
        if let Some(p) = initial.iter().position(|&n| n > 1) {
            return Err(NetError::Malformed(format!(
                "initial marking puts {} tokens into `{}`",
                initial[p], places[p]
            )));
        }

        let weights = match weights {
            Some(w) if w.len() != places.len() => {
                warn!(
                    "Ignoring {} weight(s) for {} place(s), falling back to uniform weights",
                    w.len(),
                    places.len()
                );
                None
            }
            w => w,
        };

        let column = |matrix: &[Vec<u8>], t: usize| -> Vec<usize> {
            (0..places.len()).filter(|&p| matrix[p][t] == 1).collect()
        };
        let inputs = (0..transitions.len()).map(|t| column(&pre, t)).collect();
        let outputs = (0..transitions.len()).map(|t| column(&post, t)).collect();

        Ok(Net {
            places,
            transitions,
            place_index,
            pre,
            inputs,
            outputs,
            initial: Marking(initial),
            weights,
        })
    }

    pub fn builder() -> NetBuilder {
        NetBuilder::default()
    }

    pub fn num_places(&self) -> usize {
        self.places.len()
    }

    pub fn num_transitions(&self) -> usize {
        self.transitions.len()
    }

    pub fn places(&self) -> &[String] {
        &self.places
    }

    pub fn transitions(&self) -> &[String] {
        &self.transitions
    }

    pub fn place_index(&self, id: &str) -> Option<usize> {
        self.place_index.get(id).copied()
    }

    pub fn pre(&self, place: usize, transition: usize) -> u8 {
        self.pre[place][transition]
    }

    /// Input places of `transition`, in increasing order.
    pub fn inputs(&self, transition: usize) -> &[usize] {
        &self.inputs[transition]
    }

    /// Output places of `transition`, in increasing order.
    pub fn outputs(&self, transition: usize) -> &[usize] {
        &self.outputs[transition]
    }

    /// Whether `transition` neither consumes nor produces anything.
    pub fn is_vacuous(&self, transition: usize) -> bool {
        self.inputs[transition].is_empty() && self.outputs[transition].is_empty()
    }

    pub fn initial(&self) -> &Marking {
        &self.initial
    }

    /// Declared weights, if any.
    pub fn weights(&self) -> Option<&[i64]> {
        self.weights.as_deref()
    }

    pub fn is_enabled(&self, marking: &Marking, transition: usize) -> bool {
        self.inputs[transition].iter().all(|&p| marking.is_marked(p))
    }

    /// Fires an enabled transition.
    ///
    /// Fails with [`AnalysisError::NotSafe`] when the successor would hold
    /// more than one token in some place.
    pub fn fire(&self, marking: &Marking, transition: usize) -> Result<Marking, AnalysisError> {
        debug_assert!(self.is_enabled(marking, transition));
        let mut next = marking.clone();
        for &p in &self.inputs[transition] {
            next.0[p] -= 1;
        }
        for &p in &self.outputs[transition] {
            next.0[p] += 1;
            if next.0[p] > 1 {
                return Err(AnalysisError::NotSafe {
                    place: self.places[p].clone(),
                    transition: self.transitions[transition].clone(),
                });
            }
        }
        Ok(next)
    }

    /// Maps a marking to `place id -> tokens`.
    pub fn named(&self, marking: &Marking) -> BTreeMap<String, u32> {
        self.places.iter().cloned().zip(marking.0.iter().copied()).collect()
    }

    /// Formats a marking as the set of its marked places, e.g. `{A, C}`.
    pub fn display<'a>(&'a self, marking: &'a Marking) -> DisplayMarking<'a> {
        DisplayMarking { net: self, marking }
    }
}

pub struct DisplayMarking<'a> {
    net: &'a Net,
    marking: &'a Marking,
}

impl fmt::Display for DisplayMarking<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, p) in self.marking.marked().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.net.places[p])?;
        }
        write!(f, "}}")
    }
}

/// Incremental construction of a [`Net`] by identifier.
///
/// ```
/// use petri_bdd::net::Net;
///
/// let net = Net::builder()
///     .place("A", 1)
///     .place("B", 0)
///     .transition("t", ["A"], ["B"])
///     .build()
///     .unwrap();
/// assert_eq!(net.inputs(0), &[0]);
/// assert_eq!(net.outputs(0), &[1]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct NetBuilder {
    places: Vec<(String, u32, Option<i64>)>,
    transitions: Vec<(String, Vec<String>, Vec<String>)>,
}

impl NetBuilder {
    pub fn place(mut self, id: impl Into<String>, tokens: u32) -> Self {
        self.places.push((id.into(), tokens, None));
        self
    }

    /// Adds a place with an optimization weight; unweighted places weigh 1.
    pub fn weighted_place(mut self, id: impl Into<String>, tokens: u32, weight: i64) -> Self {
        self.places.push((id.into(), tokens, Some(weight)));
        self
    }

    pub fn transition<I, O>(mut self, id: impl Into<String>, inputs: I, outputs: O) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        self.transitions.push((
            id.into(),
            inputs.into_iter().map(Into::into).collect(),
            outputs.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn build(self) -> Result<Net, NetError> {
        let ids: Vec<String> = self.places.iter().map(|(id, _, _)| id.clone()).collect();
        let index = check_unique("place", &ids)?;

        let mut pre = vec![vec![0u8; self.transitions.len()]; ids.len()];
        let mut post = pre.clone();
        for (t, (tid, inputs, outputs)) in self.transitions.iter().enumerate() {
            for (matrix, arcs) in [(&mut pre, inputs), (&mut post, outputs)] {
                for place in arcs {
                    let p = *index.get(place).ok_or_else(|| {
                        NetError::Malformed(format!("transition `{}` refers to unknown place `{}`", tid, place))
                    })?;
                    if matrix[p][t] == 1 {
                        return Err(NetError::Malformed(format!(
                            "transition `{}` lists place `{}` twice",
                            tid, place
                        )));
                    }
                    matrix[p][t] = 1;
                }
            }
        }

        let initial = self.places.iter().map(|&(_, n, _)| n).collect();
        let weights = if self.places.iter().any(|(_, _, w)| w.is_some()) {
            Some(self.places.iter().map(|(_, _, w)| w.unwrap_or(1)).collect())
        } else {
            None
        };
        let transitions = self.transitions.into_iter().map(|(id, _, _)| id).collect();

        Net::new(ids, transitions, pre, post, initial, weights)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn ids(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_valid() {
        let net = Net::new(
            ids(&["A", "B"]),
            ids(&["t"]),
            vec![vec![1], vec![0]],
            vec![vec![0], vec![1]],
            vec![1, 0],
            None,
        )
        .unwrap();
        assert_eq!(net.num_places(), 2);
        assert_eq!(net.place_index("B"), Some(1));
        assert_eq!(net.inputs(0), &[0]);
        assert_eq!(net.outputs(0), &[1]);
        assert!(net.weights().is_none());
    }

    #[test]
    fn test_malformed() {
        let no_places = Net::new(vec![], vec![], vec![], vec![], vec![], None);
        assert!(matches!(no_places, Err(NetError::Malformed(_))));

        let duplicate = Net::new(
            ids(&["A", "A"]),
            vec![],
            vec![vec![], vec![]],
            vec![vec![], vec![]],
            vec![0, 0],
            None,
        );
        assert!(matches!(duplicate, Err(NetError::Malformed(_))));

        let ragged = Net::new(ids(&["A"]), ids(&["t"]), vec![vec![]], vec![vec![0]], vec![0], None);
        assert!(matches!(ragged, Err(NetError::Malformed(_))));

        let not_binary = Net::new(ids(&["A"]), ids(&["t"]), vec![vec![2]], vec![vec![0]], vec![0], None);
        assert!(matches!(not_binary, Err(NetError::Malformed(_))));

        let unsafe_initial = Net::new(ids(&["A"]), vec![], vec![vec![]], vec![vec![]], vec![3], None);
        assert!(matches!(unsafe_initial, Err(NetError::Malformed(_))));
    }

    #[test]
    fn test_weight_fallback() {
        let net = Net::new(
            ids(&["A", "B"]),
            vec![],
            vec![vec![], vec![]],
            vec![vec![], vec![]],
            vec![1, 0],
            Some(vec![5]),
        )
        .unwrap();
        assert!(net.weights().is_none());
    }

    #[test]
    fn test_fire() {
        let net = Net::builder()
            .place("A", 1)
            .place("B", 0)
            .transition("t", ["A"], ["B"])
            .transition("u", ["B"], ["A"])
            .build()
            .unwrap();

        let m0 = net.initial().clone();
        assert!(net.is_enabled(&m0, 0));
        assert!(!net.is_enabled(&m0, 1));
        let m1 = net.fire(&m0, 0).unwrap();
        assert_eq!(m1, Marking(vec![0, 1]));
        assert_eq!(net.fire(&m1, 1).unwrap(), m0);
    }

    #[test]
    fn test_fire_not_safe() {
        let net = Net::builder()
            .place("A", 1)
            .place("B", 1)
            .transition("t", ["A"], ["B"])
            .build()
            .unwrap();
        let err = net.fire(net.initial(), 0).unwrap_err();
        assert!(matches!(err, AnalysisError::NotSafe { ref place, .. } if place == "B"));
    }

    #[test]
    fn test_builder_errors() {
        let unknown = Net::builder().place("A", 0).transition("t", ["X"], Vec::<String>::new()).build();
        assert!(matches!(unknown, Err(NetError::Malformed(_))));

        let twice = Net::builder().place("A", 0).transition("t", ["A", "A"], Vec::<String>::new()).build();
        assert!(matches!(twice, Err(NetError::Malformed(_))));
    }

    #[test]
    fn test_named_and_display() {
        let net = Net::builder()
            .weighted_place("A", 1, 3)
            .place("B", 0)
            .place("C", 1)
            .build()
            .unwrap();
        assert_eq!(net.weights(), Some(&[3, 1, 1][..]));

        let named = net.named(net.initial());
        assert_eq!(named.get("A"), Some(&1));
        assert_eq!(named.get("B"), Some(&0));
        assert_eq!(net.display(net.initial()).to_string(), "{A, C}");
    }
}
