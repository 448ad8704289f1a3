//! Optimality Verifier
//!
//! Checks a solved [`PerfectMatching`] against the graph it was built from: the matching must be perfect and the
//! dual certificate returned by [`PerfectMatching::get_dual_solution`] must be feasible and satisfy the
//! complementary slackness conditions, which together prove the matching is of minimum weight.
//!

use super::util::*;
use super::error::MatchingError;
use super::perfect_matching::*;

/// the enclosing blossom ids of `i`, innermost first; a chain longer than the number of ids must contain a cycle
fn blossom_chain(blossom_parents: &[Option<usize>], i: usize) -> Result<Vec<usize>, MatchingError> {
    let mut chain = vec![];
    let mut cursor = blossom_parents[i];
    while let Some(b) = cursor {
        if chain.len() >= blossom_parents.len() {
            return Err(MatchingError::BlossomStructure(format!("cyclic blossom nesting above {i}")));
        }
        chain.push(b);
        cursor = blossom_parents[b];
    }
    Ok(chain)
}

/// verify that `pm` holds a minimum-weight perfect matching of the graph given by `weighted_edges`;
/// `threshold` is the tolerated violation of a (doubled) reduced cost
pub fn check_perfect_matching_optimality(node_num: NodeNum, weighted_edges: &[WeightedEdge], pm: &PerfectMatching, threshold: Cost) -> Result<(), MatchingError> {
    if node_num != pm.node_num || weighted_edges.len() != pm.edge_num() {
        return Err(MatchingError::BlossomStructure(format!(
            "graph has {} nodes and {} edges but the solver has {} and {}",
            node_num,
            weighted_edges.len(),
            pm.node_num,
            pm.edge_num()
        )));
    }
    // primal: every node has a mutual partner and exactly one selected edge
    let mut selected_count = vec![0usize; node_num];
    for (e, &(i, j, _)) in weighted_edges.iter().enumerate() {
        if pm.get_solution(e)? {
            if pm.get_match(i)? != j || pm.get_match(j)? != i {
                return Err(MatchingError::BlossomStructure(format!("selected edge {e} does not join partners {i} and {j}")));
            }
            selected_count[i] += 1;
            selected_count[j] += 1;
        }
    }
    if let Some(i) = (0..node_num).find(|&i| selected_count[i] != 1) {
        return Err(MatchingError::BlossomStructure(format!("node {} is covered by {} selected edges", i, selected_count[i])));
    }

    // the blossom forest: parents are blossoms, numbered in any order, and every blossom has an odd number of children
    let DualSolution { blossom_parents, twice_y } = pm.get_dual_solution()?;
    let id_num = blossom_parents.len();
    let mut children_count = vec![0usize; id_num];
    for (id, parent) in blossom_parents.iter().enumerate() {
        if let Some(parent) = *parent {
            if parent == id || parent < node_num || parent >= id_num {
                return Err(MatchingError::BlossomStructure(format!("invalid parent {parent} of {id}")));
            }
            children_count[parent] += 1;
        }
    }
    for b in node_num..id_num {
        if children_count[b] < 3 || children_count[b] % 2 == 0 {
            return Err(MatchingError::BlossomStructure(format!("blossom {} has {} children", b, children_count[b])));
        }
        if twice_y[b] < -threshold {
            return Err(MatchingError::BlossomStructure(format!("blossom {} has negative dual {}", b, twice_y[b])));
        }
    }
    for id in 0..id_num {
        blossom_chain(&blossom_parents, id)?;
    }

    // dual feasibility and complementary slackness
    let mut crossing_count = vec![0usize; id_num];
    for (e, &(i, j, cost)) in weighted_edges.iter().enumerate() {
        let chain_i = blossom_chain(&blossom_parents, i)?;
        let chain_j = blossom_chain(&blossom_parents, j)?;
        let crossing: Vec<usize> = chain_i
            .iter()
            .filter(|b| !chain_j.contains(b))
            .chain(chain_j.iter().filter(|b| !chain_i.contains(b)))
            .copied()
            .collect();
        let slack = cost * COST_FACTOR - twice_y[i] - twice_y[j] - crossing.iter().map(|&b| twice_y[b]).sum::<Cost>();
        if slack < -threshold {
            return Err(MatchingError::ComplementarySlackness { edge: e, slack });
        }
        if pm.get_solution(e)? {
            if slack > threshold {
                return Err(MatchingError::ComplementarySlackness { edge: e, slack });
            }
            for b in crossing {
                crossing_count[b] += 1;
            }
        }
    }
    for b in node_num..id_num {
        if twice_y[b] > threshold && crossing_count[b] != 1 {
            return Err(MatchingError::BlossomStructure(format!(
                "blossom {} with positive dual is crossed by {} selected edges",
                b, crossing_count[b]
            )));
        }
    }
    Ok(())
}

/// the total cost of the selected edges
pub fn compute_perfect_matching_cost(weighted_edges: &[WeightedEdge], pm: &PerfectMatching) -> Result<Cost, MatchingError> {
    let mut cost = 0 as Cost;
    for (e, &(_, _, edge_cost)) in weighted_edges.iter().enumerate() {
        if pm.get_solution(e)? {
            cost += edge_cost;
        }
    }
    Ok(cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example::*;
    use crate::pair_matching::*;

    #[test]
    fn verifier_accepts_optimal_matching() {
        // cargo test verifier_accepts_optimal_matching -- --nocapture
        for seed in 0..20 {
            let initializer = random_graph(20, 4, 100, seed);
            let mut matching = PerfectMatching::from_initializer(&initializer, MatcherOptions::default()).unwrap();
            matching.solve().unwrap();
            check_perfect_matching_optimality(initializer.node_num, &initializer.weighted_edges, &matching, COST_THRESHOLD).unwrap();
        }
    }

    /// at optimality the dual objective, the sum of all node and blossom duals, equals the matching cost
    fn assert_dual_objective(initializer: &GraphInitializer, matching: &PerfectMatching) {
        let cost = compute_perfect_matching_cost(&initializer.weighted_edges, matching).unwrap();
        let DualSolution { twice_y, .. } = matching.get_dual_solution().unwrap();
        let dual: f64 = twice_y.iter().map(|&y| cost_to_f64(y)).sum();
        let primal = cost_to_f64(cost * COST_FACTOR);
        assert!((dual - primal).abs() <= 1e-6 * primal.abs().max(1.), "dual objective {dual} != {primal}");
    }

    #[test]
    fn verifier_accepts_nested_blossoms() {
        // cargo test verifier_accepts_nested_blossoms -- --nocapture
        let mut option_sets = vec![MatcherOptions::default()];
        for dual_greedy_update_option in [DualGreedyUpdate::Cc, DualGreedyUpdate::Scc] {
            option_sets.push(MatcherOptions { fractional_jumpstart: false, dual_greedy_update_option, ..MatcherOptions::default() });
        }
        if !IS_INTEGER_COST {
            option_sets.push(MatcherOptions { dual_greedy_update_option: DualGreedyUpdate::Single, ..MatcherOptions::default() });
            option_sets.push(MatcherOptions { dual_lp_threshold: 1., update_duals_after: true, ..MatcherOptions::default() });
        }
        for seed in 0..6 {
            let node_num = 100 + 30 * seed as usize;
            for initializer in [random_graph(node_num, 3, 1000, seed), random_geometric_graph(node_num, 4, 1000., seed)] {
                for options in option_sets.iter() {
                    let mut matching = PerfectMatching::from_initializer(&initializer, options.clone()).unwrap();
                    matching.solve().unwrap();
                    check_perfect_matching_optimality(node_num, &initializer.weighted_edges, &matching, COST_THRESHOLD)
                        .unwrap_or_else(|err| panic!("seed {seed} with {options:?}: {err}"));
                    assert_dual_objective(&initializer, &matching);
                }
            }
        }
        // blossoms here get numbered before some of the blossoms nested inside them
        for seed in [3, 19] {
            let initializer = random_graph(200, 3, 1000, seed);
            let pairs: Vec<WeightedPair> = initializer.weighted_edges.iter().map(|&(i, j, cost)| WeightedPair::new(i, j, cost_to_f64(cost))).collect();
            let checked = match_pairs(&pairs, true, MatcherOptions::default()).unwrap();
            assert_eq!(checked, match_pairs(&pairs, false, MatcherOptions::default()).unwrap(), "seed {seed}");
            assert_eq!(checked.len(), 100);
        }
    }

    #[test]
    fn verifier_rejects_wrong_costs() {
        // cargo test verifier_rejects_wrong_costs -- --nocapture
        let weighted_edges: Vec<WeightedEdge> = [(0, 1, 1), (1, 2, 5), (2, 3, 1), (3, 0, 5)].iter().map(|&(i, j, c)| (i, j, c as Cost)).collect();
        let mut matching = PerfectMatching::new(4, 4).unwrap();
        for &(i, j, cost) in weighted_edges.iter() {
            matching.add_edge(i, j, cost).unwrap();
        }
        assert_eq!(
            check_perfect_matching_optimality(4, &weighted_edges, &matching, COST_THRESHOLD),
            Err(MatchingError::NotSolved)
        );
        matching.solve().unwrap();
        assert_eq!(compute_perfect_matching_cost(&weighted_edges, &matching), Ok(2 as Cost));
        check_perfect_matching_optimality(4, &weighted_edges, &matching, COST_THRESHOLD).unwrap();
        // claim the unused edges were much cheaper: the certificate no longer holds
        let mut cheaper = weighted_edges.clone();
        cheaper[1].2 = -10 as Cost;
        let err = check_perfect_matching_optimality(4, &cheaper, &matching, COST_THRESHOLD).unwrap_err();
        assert_eq!(err.check_code(), Some(1));
        let err = check_perfect_matching_optimality(6, &weighted_edges, &matching, COST_THRESHOLD).unwrap_err();
        assert_eq!(err.check_code(), Some(2));
    }
}
