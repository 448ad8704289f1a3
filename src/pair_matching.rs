//! Pair Matching
//!
//! The interface used by the fiber-merging heuristic: a list of candidate pairs between arbitrary node ids, each
//! with a real weight, is reduced to a dense perfect matching problem with integral costs, and the pairs
//! selected by the solver are handed back unchanged.
//!

use super::util::*;
use super::error::MatchingError;
use super::perfect_matching::*;
use super::verifier::*;
use crate::serde::{Serialize, Deserialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// weights are mapped linearly onto the integers of `[0, WEIGHTS_RANGE]`
pub const WEIGHTS_RANGE: f64 = 1e6;

/// a candidate pair of nodes and the weight of merging them
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedPair {
    pub first: usize,
    pub second: usize,
    pub weight: f64,
}

impl WeightedPair {
    pub fn new(first: usize, second: usize, weight: f64) -> Self {
        Self { first, second, weight }
    }

    pub fn has_node(&self, index: usize) -> bool {
        self.first == index || self.second == index
    }

    /// `node(0)` is `first` and `node(1)` is `second`
    pub fn node(&self, k: usize) -> usize {
        assert!(k < 2, "a pair has only two nodes");
        if k == 0 {
            self.first
        } else {
            self.second
        }
    }
}

/// pairs are ordered by weight only
impl PartialOrd for WeightedPair {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.weight.partial_cmp(&other.weight)
    }
}

impl fmt::Display for WeightedPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{},{}}} = {}", self.first, self.second, self.weight)
    }
}

/// the number of distinct node ids
pub fn calc_num_nodes(pairs: &[WeightedPair]) -> usize {
    pairs.iter().flat_map(|pair| [pair.first, pair.second]).collect::<BTreeSet<_>>().len()
}

/// select a minimum-weight set of pairs covering every node exactly once; the selected pairs keep their input order
pub fn match_pairs(pairs: &[WeightedPair], check_match: bool, options: MatcherOptions) -> Result<Vec<WeightedPair>, MatchingError> {
    if pairs.is_empty() {
        return Err(MatchingError::EmptyEdges);
    }
    let nodes: BTreeSet<usize> = pairs.iter().flat_map(|pair| [pair.first, pair.second]).collect();
    if nodes.len() % 2 == 1 {
        return Err(MatchingError::OddPairNodes(nodes.len()));
    }
    let mapped_nodes: BTreeMap<usize, NodeIndex> = nodes.iter().enumerate().map(|(mapped, &node)| (node, mapped)).collect();
    let max_weight = pairs.iter().map(|pair| pair.weight).fold(f64::NEG_INFINITY, f64::max);
    let min_weight = pairs.iter().map(|pair| pair.weight).fold(f64::INFINITY, f64::min);
    let range = max_weight - min_weight;
    let weighted_edges: Vec<WeightedEdge> = pairs
        .iter()
        .map(|pair| {
            let scaled = if range > 0. { ((pair.weight - min_weight) * WEIGHTS_RANGE / range).floor() } else { 0. };
            (mapped_nodes[&pair.first], mapped_nodes[&pair.second], cost_from_f64(scaled))
        })
        .collect();
    debug!("matching {} pairs over {} nodes, weights in [{}, {}]", pairs.len(), nodes.len(), min_weight, max_weight);
    let initializer = GraphInitializer::new(nodes.len(), weighted_edges);
    let mut matching = PerfectMatching::from_initializer(&initializer, options)?;
    matching.solve()?;
    if check_match {
        check_perfect_matching_optimality(initializer.node_num, &initializer.weighted_edges, &matching, COST_THRESHOLD)?;
    }
    let mut selected = vec![];
    for (e, pair) in pairs.iter().enumerate() {
        if matching.get_solution(e)? {
            selected.push(*pair);
        }
    }
    Ok(selected)
}

/// if the pairs cover an odd number of nodes, drop every pair of the node whose cheapest pair is the most
/// expensive, trying the next node whenever the removal isolates another one
pub fn make_even(pairs: &[WeightedPair]) -> Result<Vec<WeightedPair>, MatchingError> {
    let mut node_min_weights: BTreeMap<usize, f64> = BTreeMap::new();
    for pair in pairs.iter() {
        for k in 0..2 {
            let min_weight = node_min_weights.entry(pair.node(k)).or_insert(pair.weight);
            if pair.weight < *min_weight {
                *min_weight = pair.weight;
            }
        }
    }
    if node_min_weights.len() % 2 == 0 {
        return Ok(pairs.to_vec());
    }
    let mut sorted_min_weights: Vec<(usize, f64)> = node_min_weights.into_iter().collect();
    sorted_min_weights.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    for &(node, _) in sorted_min_weights.iter().rev() {
        let even_pairs: Vec<WeightedPair> = pairs.iter().filter(|pair| !pair.has_node(node)).copied().collect();
        if calc_num_nodes(&even_pairs) % 2 == 0 {
            debug!("make_even: removed node {node}");
            return Ok(even_pairs);
        }
    }
    Err(MatchingError::CannotMakeEven)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_matching_sparse_ids() {
        // cargo test pair_matching_sparse_ids -- --nocapture
        let pairs = vec![
            WeightedPair::new(10, 42, 0.5),
            WeightedPair::new(42, 7, 0.1),
            WeightedPair::new(7, 3, 0.9),
            WeightedPair::new(3, 10, 0.2),
            WeightedPair::new(10, 7, 0.3),
        ];
        assert_eq!(calc_num_nodes(&pairs), 4);
        let selected = match_pairs(&pairs, true, MatcherOptions::default()).unwrap();
        // {42,7} + {3,10} = 0.3 beats {10,42} + {7,3} = 1.4
        assert_eq!(selected, vec![pairs[1], pairs[3]]);
        assert_eq!(selected[0].to_string(), "{42,7} = 0.1");
        assert!(pairs[1] < pairs[0]);
        assert!(pairs[0].has_node(42) && !pairs[0].has_node(7));
        assert_eq!(pairs[2].node(1), 3);
    }

    #[test]
    fn pair_matching_equal_weights() {
        // cargo test pair_matching_equal_weights -- --nocapture
        let pairs = vec![WeightedPair::new(0, 1, 2.), WeightedPair::new(2, 3, 2.)];
        assert_eq!(match_pairs(&pairs, true, MatcherOptions::default()).unwrap(), pairs);
    }

    #[test]
    fn pair_matching_errors() {
        // cargo test pair_matching_errors -- --nocapture
        assert_eq!(match_pairs(&[], false, MatcherOptions::default()), Err(MatchingError::EmptyEdges));
        let odd = vec![WeightedPair::new(0, 1, 1.), WeightedPair::new(1, 2, 1.)];
        assert_eq!(match_pairs(&odd, false, MatcherOptions::default()), Err(MatchingError::OddPairNodes(3)));
        // a star around node 0 next to a separate pair
        let star = vec![WeightedPair::new(0, 1, 1.), WeightedPair::new(0, 2, 1.), WeightedPair::new(0, 3, 1.), WeightedPair::new(4, 5, 1.)];
        assert_eq!(match_pairs(&star, false, MatcherOptions::default()), Err(MatchingError::NoPerfectMatching));
    }

    #[test]
    fn pair_matching_make_even() {
        // cargo test pair_matching_make_even -- --nocapture
        let pairs = vec![
            WeightedPair::new(0, 1, 1.),
            WeightedPair::new(1, 2, 2.),
            WeightedPair::new(2, 3, 1.),
            WeightedPair::new(3, 4, 5.),
            WeightedPair::new(4, 2, 6.),
        ];
        // node 4 has the most expensive cheapest pair
        let even = make_even(&pairs).unwrap();
        assert_eq!(even, pairs[..3].to_vec());
        assert_eq!(calc_num_nodes(&even), 4);
        assert_eq!(make_even(&even).unwrap(), even);
        // ties are tried from the largest node id
        let path = vec![WeightedPair::new(0, 1, 1.), WeightedPair::new(1, 2, 1.)];
        assert_eq!(make_even(&path).unwrap(), vec![path[0]]);
        // the leaf with the most expensive pair goes first
        let star = vec![WeightedPair::new(0, 1, 1.), WeightedPair::new(0, 2, 2.), WeightedPair::new(0, 3, 3.), WeightedPair::new(0, 4, 4.)];
        assert_eq!(make_even(&star).unwrap(), star[..3].to_vec());
    }
}
