//! Example Graphs
//!
//! Deterministic random graphs to exercise the solver, and an exhaustive search that serves as the ground truth
//! on small instances.
//! Every generator takes a seed, so that a failing case can be reproduced from the seed alone.
//!

use super::util::*;
use crate::rand_xoshiro::rand_core::SeedableRng;
use rand::Rng;
use rand::seq::SliceRandom;

/// exhaustive search is only done up to this number of nodes
pub const BRUTE_FORCE_MAX_NODE_NUM: NodeNum = 12;

/// a random graph that always has a perfect matching: a hidden random matching plus `degree` random edges per node,
/// all with integer costs in `[0, max_cost]`
pub fn random_graph(node_num: NodeNum, degree: usize, max_cost: u64, seed: u64) -> GraphInitializer {
    assert!(node_num >= 2 && node_num % 2 == 0, "node_num must be a positive even number");
    let mut rng = DeterministicRng::seed_from_u64(seed);
    let mut order: Vec<NodeIndex> = (0..node_num).collect();
    order.shuffle(&mut rng);
    let mut weighted_edges = Vec::with_capacity(node_num / 2 + node_num * degree);
    for pair in order.chunks(2) {
        weighted_edges.push((pair[0], pair[1], rng.gen_range(0..=max_cost) as Cost));
    }
    for i in 0..node_num {
        for _ in 0..degree {
            let j = rng.gen_range(0..node_num);
            if j != i {
                weighted_edges.push((i, j, rng.gen_range(0..=max_cost) as Cost));
            }
        }
    }
    weighted_edges.shuffle(&mut rng);
    GraphInitializer::new(node_num, weighted_edges)
}

/// every pair of nodes connected, with integer costs in `[0, max_cost]`
pub fn random_complete_graph(node_num: NodeNum, max_cost: u64, seed: u64) -> GraphInitializer {
    assert!(node_num % 2 == 0, "node_num must be even");
    let mut rng = DeterministicRng::seed_from_u64(seed);
    let mut weighted_edges = Vec::with_capacity(node_num * node_num.saturating_sub(1) / 2);
    for i in 0..node_num {
        for j in i + 1..node_num {
            weighted_edges.push((i, j, rng.gen_range(0..=max_cost) as Cost));
        }
    }
    GraphInitializer::new(node_num, weighted_edges)
}

/// random points in the unit square, each connected to its `neighbors` nearest points; the cost is the distance
/// scaled by `scale` and rounded, the kind of graph built when merging nearby segments
pub fn random_geometric_graph(node_num: NodeNum, neighbors: usize, scale: f64, seed: u64) -> GraphInitializer {
    assert!(node_num >= 2 && node_num % 2 == 0, "node_num must be a positive even number");
    let mut rng = DeterministicRng::seed_from_u64(seed);
    let points: Vec<(f64, f64)> = (0..node_num).map(|_| (rng.gen::<f64>(), rng.gen::<f64>())).collect();
    let distance = |i: NodeIndex, j: NodeIndex| ((points[i].0 - points[j].0).powi(2) + (points[i].1 - points[j].1).powi(2)).sqrt();
    let mut weighted_edges = vec![];
    for i in 0..node_num {
        let mut others: Vec<NodeIndex> = (0..node_num).filter(|&j| j != i).collect();
        others.sort_by(|&a, &b| distance(i, a).partial_cmp(&distance(i, b)).unwrap_or(std::cmp::Ordering::Equal));
        for &j in others.iter().take(neighbors) {
            // each undirected edge once, even when both endpoints pick each other
            if i < j || !is_near_neighbor(&points, j, i, neighbors) {
                weighted_edges.push((i, j, cost_from_f64((distance(i, j) * scale).round())));
            }
        }
    }
    // the nearest-neighbor graph may miss a perfect matching; chain consecutive points as a fallback
    for i in (0..node_num).step_by(2) {
        weighted_edges.push((i, i + 1, cost_from_f64((distance(i, i + 1) * scale).round())));
    }
    GraphInitializer::new(node_num, weighted_edges)
}

/// whether `j` is among the `neighbors` nearest points of `i`
fn is_near_neighbor(points: &[(f64, f64)], i: NodeIndex, j: NodeIndex, neighbors: usize) -> bool {
    let distance = |a: NodeIndex, b: NodeIndex| ((points[a].0 - points[b].0).powi(2) + (points[a].1 - points[b].1).powi(2)).sqrt();
    let d_ij = distance(i, j);
    let closer = (0..points.len()).filter(|&k| k != i && k != j && distance(i, k) < d_ij).count();
    closer < neighbors
}

/// the minimum cost of a perfect matching by dynamic programming over subsets, `None` if there is none
pub fn brute_force_minimum_cost(initializer: &GraphInitializer) -> Option<Cost> {
    let node_num = initializer.node_num;
    assert!(node_num <= BRUTE_FORCE_MAX_NODE_NUM, "exhaustive search over {node_num} nodes is too slow");
    let mut pair_cost: Vec<Vec<Option<Cost>>> = vec![vec![None; node_num]; node_num];
    for &(i, j, cost) in initializer.weighted_edges.iter() {
        for (a, b) in [(i, j), (j, i)] {
            pair_cost[a][b] = match pair_cost[a][b] {
                Some(existing) if existing <= cost => Some(existing),
                _ => Some(cost),
            };
        }
    }
    let full: usize = (1 << node_num) - 1;
    let mut best: Vec<Option<Cost>> = vec![None; full + 1];
    best[0] = Some(0 as Cost);
    for mask in 0..full {
        let cost = match best[mask] {
            Some(cost) => cost,
            None => continue,
        };
        // always match the lowest unmatched node next
        let i = (!mask).trailing_zeros() as usize;
        for j in i + 1..node_num {
            if mask & (1 << j) != 0 {
                continue;
            }
            if let Some(pair) = pair_cost[i][j] {
                let next = mask | (1 << i) | (1 << j);
                if best[next].map_or(true, |existing| cost + pair < existing) {
                    best[next] = Some(cost + pair);
                }
            }
        }
    }
    best[full]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perfect_matching::*;
    use crate::verifier::*;

    fn option_sets() -> Vec<MatcherOptions> {
        let mut option_sets = vec![MatcherOptions::default()];
        for dual_greedy_update_option in [DualGreedyUpdate::Cc, DualGreedyUpdate::Scc] {
            option_sets.push(MatcherOptions { fractional_jumpstart: false, dual_greedy_update_option, ..MatcherOptions::default() });
        }
        if !IS_INTEGER_COST {
            option_sets.push(MatcherOptions { dual_greedy_update_option: DualGreedyUpdate::Single, ..MatcherOptions::default() });
            option_sets.push(MatcherOptions { dual_lp_threshold: 1., update_duals_after: true, ..MatcherOptions::default() });
        }
        option_sets
    }

    #[test]
    fn example_brute_force() {
        // cargo test example_brute_force -- --nocapture
        let square = GraphInitializer::new(4, vec![(0, 1, 1 as Cost), (1, 2, 5 as Cost), (2, 3, 1 as Cost), (3, 0, 5 as Cost), (0, 1, 4 as Cost)]);
        assert_eq!(brute_force_minimum_cost(&square), Some(2 as Cost));
        let path = GraphInitializer::new(4, vec![(0, 1, 1 as Cost), (1, 2, 1 as Cost)]);
        assert_eq!(brute_force_minimum_cost(&path), None);
    }

    #[test]
    fn example_generators_are_deterministic() {
        // cargo test example_generators_are_deterministic -- --nocapture
        assert_eq!(random_graph(10, 3, 100, 7), random_graph(10, 3, 100, 7));
        assert_ne!(random_graph(10, 3, 100, 7), random_graph(10, 3, 100, 8));
        for seed in 0..10 {
            assert!(brute_force_minimum_cost(&random_graph(12, 1, 100, seed)).is_some());
            assert!(brute_force_minimum_cost(&random_geometric_graph(12, 2, 1000., seed)).is_some());
        }
        let complete = random_complete_graph(6, 10, 0);
        assert_eq!(complete.weighted_edges.len(), 15);
    }

    #[test]
    fn example_solver_matches_brute_force() {
        // cargo test example_solver_matches_brute_force -- --nocapture
        for seed in 0..100 {
            let node_num = 2 + 2 * (seed as usize % 6);
            let initializer = match seed % 3 {
                0 => random_graph(node_num, 2, 50, seed),
                1 => random_complete_graph(node_num, 50, seed),
                _ => random_geometric_graph(node_num, 3, 100., seed),
            };
            let expected = brute_force_minimum_cost(&initializer).unwrap();
            for options in option_sets() {
                let mut matching = PerfectMatching::from_initializer(&initializer, options.clone()).unwrap();
                matching.solve().unwrap();
                let cost = compute_perfect_matching_cost(&initializer.weighted_edges, &matching).unwrap();
                assert_eq!(cost, expected, "seed {seed} with {options:?}");
                check_perfect_matching_optimality(node_num, &initializer.weighted_edges, &matching, COST_THRESHOLD).unwrap();
            }
        }
    }
}
