extern crate cfg_if;
extern crate rand_xoshiro;
extern crate priority_queue;
extern crate serde;
#[macro_use] extern crate serde_json;
#[macro_use] extern crate log;
extern crate chrono;
extern crate derivative;
extern crate thiserror;

pub mod util;
pub mod error;
pub mod pairing_heap;
pub mod perfect_matching;
pub mod primal_tree;
pub mod blossom_shrink;
pub mod blossom_expand;
pub mod dual_update;
pub mod dual_min_cost;
pub mod matching_init;
pub mod matching_repair;
pub mod verifier;
pub mod pair_matching;
pub mod visualize;
pub mod example;

use util::*;
use error::MatchingError;
use perfect_matching::*;


/// solve a minimum-weight perfect matching with default options, returning the partner of every node
/// (to re-solve after small changes, keep a [`perfect_matching::PerfectMatching`] and use its update bracket)
pub fn minimum_weight_perfect_matching(node_num: NodeNum, weighted_edges: &[WeightedEdge]) -> Result<Vec<NodeIndex>, MatchingError> {
    let initializer = GraphInitializer::new(node_num, weighted_edges.to_vec());
    let mut matching = PerfectMatching::from_initializer(&initializer, MatcherOptions::default())?;
    matching.solve()?;
    (0..node_num).map(|i| matching.get_match(i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_weight_perfect_matching_basic() {  // cargo test minimum_weight_perfect_matching_basic -- --nocapture
        let weighted_edges = vec![(0, 1, 3 as Cost), (1, 2, 1 as Cost), (2, 3, 3 as Cost), (3, 0, 1 as Cost)];
        assert_eq!(minimum_weight_perfect_matching(4, &weighted_edges), Ok(vec![3, 2, 1, 0]));
        assert_eq!(minimum_weight_perfect_matching(3, &weighted_edges[..1]), Err(MatchingError::OddNodeCount(3)));
    }
}
