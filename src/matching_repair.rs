//! Incremental Update
//!
//! A solved graph can be modified and solved again without starting over. [`PerfectMatching::start_update`]
//! makes the dual of every inner node cumulative over its enclosing blossoms, so that the true slack of any edge
//! can be read from its two original endpoints. An edge that violates its dual constraint either turns its
//! outer endpoint (and the partner of that endpoint) into a tree root, or dissolves the outermost blossom it
//! lives in. [`PerfectMatching::finish_update`] then flattens the dissolved blossoms, restores dual feasibility
//! around the new roots and builds a forest of single-node trees for the next [`PerfectMatching::solve`].
//!

use super::util::*;
use super::error::MatchingError;
use super::perfect_matching::*;

impl PerfectMatching {
    /// open an update bracket after a solve
    pub fn start_update(&mut self) -> Result<(), MatchingError> {
        if self.first_solve {
            return Err(MatchingError::NotSolved);
        }
        if self.updating {
            return Ok(());
        }
        self.free_removed();
        let mut selfloops = vec![];
        for i0 in 0..self.node_num {
            self.nodes[i0].is_processed = false;
            if self.nodes[i0].is_outer {
                continue;
            }
            {
                let node = &mut self.nodes[i0];
                node.is_tree_root = false;
                node.blossom_ptr = None;
                node.match_arc = None;
            }
            // climb to the outer blossom or to a blossom already visited, leaving downward pointers
            let mut i = i0;
            loop {
                let j = self.blossom_parent_of(i);
                self.nodes[j].is_processed = false;
                if self.nodes[j].is_outer || self.nodes[j].is_marked {
                    break;
                }
                let node = &mut self.nodes[j];
                selfloops.append(&mut node.blossom_selfloops);
                node.blossom_ptr = Some(i);
                node.match_arc = None;
                i = j;
            }
            let parent = self.blossom_parent_of(i);
            let b = if self.nodes[parent].is_outer {
                parent
            } else {
                self.outermost_blossom(parent)
            };
            // walk back down, accumulating the duals of the enclosing blossoms
            loop {
                let parent_y = self.nodes[self.blossom_parent_of(i)].y;
                let node = &mut self.nodes[i];
                node.y_saved = node.y;
                node.y += parent_y;
                node.blossom_grandparent = Some(b);
                if !node.is_blossom {
                    break;
                }
                node.is_marked = true;
                i = node.blossom_ptr.expect("the climb leaves a pointer towards the original node");
            }
        }
        let selfloop_num = selfloops.len();
        for a in selfloops {
            let (i, j) = self.get_real_endpoints(a);
            self.add_edge_to_list(i, a, 0);
            self.add_edge_to_list(j, a, 1);
            self.edges[a].slack -= cost_double(self.nodes[i].blossom_eps);
        }
        self.root_blossoms.clear();
        self.finished = false;
        self.updating = true;
        debug!("start update: {} blossoms, {} self-loops re-attached", self.blossom_num, selfloop_num);
        Ok(())
    }

    /// the outermost blossom containing the inner node `i`, valid inside an update bracket
    #[inline]
    fn outermost_blossom(&self, i: NodeIndex) -> NodeIndex {
        self.nodes[i].blossom_grandparent.expect("inner node must know its outermost blossom")
    }

    /// `i` itself when outer, otherwise its outermost blossom
    #[inline]
    fn outer_of(&self, i: NodeIndex) -> NodeIndex {
        if self.nodes[i].is_outer {
            i
        } else {
            self.outermost_blossom(i)
        }
    }

    /// the two nodes an edge really connects: its outer endpoints, or two children of the smallest blossom
    /// containing both original endpoints; returned as (tail, head) of the arc in direction 0
    pub(crate) fn get_real_endpoints(&self, a: EdgeIndex) -> (NodeIndex, NodeIndex) {
        let mut delta: isize = 0;
        let mut i = self.edges[a].head0[1];
        while !self.nodes[i].is_outer {
            i = self.blossom_parent_of(i);
            delta -= 1;
        }
        let mut j = self.edges[a].head0[0];
        while !self.nodes[j].is_outer {
            j = self.blossom_parent_of(j);
            delta += 1;
        }
        if i != j {
            return (i, j);
        }
        i = self.edges[a].head0[1];
        j = self.edges[a].head0[0];
        while delta < 0 {
            i = self.blossom_parent_of(i);
            delta += 1;
        }
        while delta > 0 {
            j = self.blossom_parent_of(j);
            delta -= 1;
        }
        while self.nodes[i].blossom_parent != self.nodes[j].blossom_parent {
            i = self.blossom_parent_of(i);
            j = self.blossom_parent_of(j);
        }
        debug_assert!(!self.nodes[i].is_outer && !self.nodes[j].is_outer);
        (i, j)
    }

    /// turn the outer node `i` and its partner into tree roots of the next solve
    fn make_root_pair(&mut self, i: NodeIndex) {
        if self.nodes[i].is_tree_root {
            return;
        }
        self.nodes[i].is_tree_root = true;
        let j = self.matched_node(i);
        debug_assert!(!self.nodes[j].is_tree_root && self.nodes[j].is_outer);
        self.nodes[j].is_tree_root = true;
        if self.nodes[j].is_blossom {
            self.root_blossoms.push(j);
        }
    }

    /// an edge whose dual constraint is violated: free an outer endpoint, or dissolve the blossom around it
    fn process_negative_edge(&mut self, a: EdgeIndex) {
        let mut i = self.edges[a].head0[0];
        for dir in 0..2 {
            i = self.edges[a].head0[dir];
            if self.nodes[i].is_outer {
                self.make_root_pair(i);
                return;
            }
            if self.nodes[self.outermost_blossom(i)].is_removed {
                return;
            }
        }
        let b = self.outermost_blossom(i);
        debug_assert!(self.nodes[b].is_outer);
        self.make_root_pair(b);
        self.nodes[b].is_removed = true;
        self.removed_blossoms.push(b);
        debug!("update: blossom {b} will be dissolved by edge {a}");
    }

    /// add an edge inside an update bracket; with `skip_if_nonnegative` an edge that does not violate the current
    /// duals is not added at all and `None` is returned
    pub fn add_new_edge(&mut self, i: NodeIndex, j: NodeIndex, cost: Cost, skip_if_nonnegative: bool) -> Result<Option<EdgeIndex>, MatchingError> {
        if !self.updating {
            return Err(MatchingError::NotUpdating);
        }
        self.check_edge_endpoints(i, j)?;
        let a = self.push_edge(i, j, cost);
        let bi = self.outer_of(i);
        let bj = self.outer_of(j);
        let (i, j) = if bi == bj {
            let (i, j) = self.get_real_endpoints(a);
            let parents_y = self.nodes[self.blossom_parent_of(i)].y + self.nodes[self.blossom_parent_of(j)].y;
            self.edges[a].slack += parents_y;
            (i, j)
        } else {
            (bi, bj)
        };
        let [j0, i0] = self.edges[a].head0;
        self.edges[a].slack -= self.nodes[j0].y + self.nodes[i0].y;
        if skip_if_nonnegative && self.edges[a].slack >= 0 as Cost {
            self.edges.pop();
            return Ok(None);
        }
        self.add_edge_to_list(i, a, 0);
        self.add_edge_to_list(j, a, 1);
        if self.edges[a].slack < 0 as Cost {
            self.process_negative_edge(a);
        }
        Ok(Some(a))
    }

    /// whether edge `e` is forced to be tight: the matched edge of an outer node or an edge of a blossom cycle
    fn is_structural_edge(&self, e: EdgeIndex) -> bool {
        let is_edge = |arc: Option<Arc>| arc.map(|arc| arc.edge) == Some(e);
        let [j0, i0] = self.edges[e].head0;
        let (bi, bj) = (self.outer_of(i0), self.outer_of(j0));
        if bi != bj {
            return is_edge(self.nodes[bi].match_arc) || is_edge(self.nodes[bj].match_arc);
        }
        let (i, j) = self.get_real_endpoints(e);
        is_edge(self.nodes[i].blossom_sibling) || is_edge(self.nodes[j].blossom_sibling)
    }

    /// change the cost of edge `e` by `delta` inside an update bracket
    pub fn update_cost(&mut self, e: EdgeIndex, delta: Cost) -> Result<(), MatchingError> {
        if !self.updating {
            return Err(MatchingError::NotUpdating);
        }
        if e >= self.edges.len() {
            return Err(MatchingError::UnknownEdge(e));
        }
        self.edges[e].slack += delta * COST_FACTOR;
        let slack = self.edges[e].slack;
        if slack == 0 as Cost || (slack > 0 as Cost && !self.is_structural_edge(e)) {
            return Ok(());
        }
        self.process_negative_edge(e);
        Ok(())
    }

    /// close the update bracket: flatten dissolved blossoms and rebuild the forest of trees
    pub fn finish_update(&mut self) -> Result<(), MatchingError> {
        if !self.updating {
            return Err(MatchingError::NotUpdating);
        }
        let mut dissolved = vec![];
        for i0 in 0..self.node_num {
            if self.nodes[i0].is_outer {
                continue;
            }
            if !self.nodes[self.outermost_blossom(i0)].is_removed {
                let mut i = i0;
                loop {
                    let node = &mut self.nodes[i];
                    node.y = node.y_saved;
                    node.is_marked = false;
                    i = self.blossom_parent_of(i);
                    if !self.nodes[i].is_marked {
                        break;
                    }
                }
                continue;
            }
            // hand the edges of every enclosing blossom down to the original endpoints
            let mut i = self.blossom_parent_of(i0);
            loop {
                if self.nodes[i].is_removed && !self.nodes[i].is_outer {
                    break;
                }
                let y_parent = if self.nodes[i].is_outer { 0 as Cost } else { self.nodes[self.blossom_parent_of(i)].y };
                for dir in 0..2 {
                    for a in self.take_edge_list(i, dir) {
                        let j = self.edges[a].head0[1 - dir];
                        self.add_edge_to_list(j, a, dir);
                        let j_parent_y = self.nodes[self.blossom_parent_of(j)].y;
                        self.edges[a].slack += j_parent_y - y_parent;
                    }
                }
                if self.nodes[i].is_removed {
                    break;
                }
                let parent = self.blossom_parent_of(i);
                self.nodes[i].is_removed = true;
                self.removed_blossoms.push(i);
                i = parent;
            }
            let node = &mut self.nodes[i0];
            node.y = node.y_saved;
            node.is_outer = true;
            node.flag = Label::Free;
            node.is_tree_root = true;
            dissolved.push(i0);
        }
        for i in dissolved {
            self.nodes[i].blossom_parent = None;
            self.nodes[i].blossom_sibling = None;
        }

        // raise the dual of every original root until one of its edges becomes tight
        for i in 0..self.node_num {
            if !self.nodes[i].is_tree_root {
                continue;
            }
            let incident = self.incident_edges(i);
            let slack_min = incident.iter().map(|&(a, _)| self.edges[a].slack).fold(COST_INFINITY, |min, slack| if slack < min { slack } else { min });
            if incident.is_empty() {
                continue;
            }
            self.nodes[i].y += slack_min;
            for (a, _) in incident {
                self.edges[a].slack -= slack_min;
            }
        }
        // two roots joined by a tight edge are matched right away
        for i in 0..self.node_num {
            if !self.nodes[i].is_tree_root {
                continue;
            }
            for (a, dir) in self.incident_edges(i) {
                let j = self.edges[a].head[dir];
                if self.edges[a].slack <= 0 as Cost && self.nodes[j].is_tree_root && !self.nodes[j].is_removed {
                    self.nodes[i].is_tree_root = false;
                    self.nodes[j].is_tree_root = false;
                    self.nodes[i].match_arc = Some(Arc::new(a, dir));
                    self.nodes[j].match_arc = Some(Arc::new(a, 1 - dir));
                    self.nodes[j].flag = Label::Free;
                    break;
                }
            }
        }

        self.reset_forest();
        let blossom_roots: Vec<NodeIndex> = std::mem::take(&mut self.root_blossoms).into_iter().filter(|&b| !self.nodes[b].is_removed).collect();
        let mut last_root = self.sentinel();
        for r in (0..self.node_num).chain(blossom_roots) {
            if !self.nodes[r].is_tree_root {
                continue;
            }
            self.push_tree_root(r, last_root);
            self.nodes[r].match_arc = None;
            last_root = r;
        }
        self.tree_num = self.trees.len();

        let removed_num = self.removed_blossoms.len();
        self.blossom_num -= removed_num;
        self.free_removed();
        self.updating = false;
        if self.options.verbose {
            info!("update finished: {} trees, {} blossoms dissolved", self.tree_num, removed_num);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example::*;
    use crate::verifier::*;

    fn solve_edges(node_num: NodeNum, weighted_edges: &[WeightedEdge]) -> PerfectMatching {
        let mut matching = PerfectMatching::new(node_num, weighted_edges.len()).unwrap();
        for &(i, j, cost) in weighted_edges.iter() {
            matching.add_edge(i, j, cost).unwrap();
        }
        matching.solve().unwrap();
        matching
    }

    fn triangles() -> Vec<WeightedEdge> {
        [(0, 1, 2), (1, 2, 2), (2, 0, 2), (3, 4, 2), (4, 5, 2), (5, 3, 2), (0, 5, 30), (2, 3, 10)]
            .iter()
            .map(|&(i, j, cost)| (i, j, cost as Cost))
            .collect()
    }

    #[test]
    fn matching_repair_requires_bracket() {
        // cargo test matching_repair_requires_bracket -- --nocapture
        let mut matching = PerfectMatching::new(4, 2).unwrap();
        matching.add_edge(0, 1, 1 as Cost).unwrap();
        matching.add_edge(2, 3, 1 as Cost).unwrap();
        assert_eq!(matching.start_update(), Err(MatchingError::NotSolved));
        matching.solve().unwrap();
        assert_eq!(matching.add_edge(0, 2, 1 as Cost), Err(MatchingError::NotUpdating));
        assert_eq!(matching.update_cost(0, 1 as Cost), Err(MatchingError::NotUpdating));
        assert_eq!(matching.finish_update(), Err(MatchingError::NotUpdating));
        matching.start_update().unwrap();
        assert_eq!(matching.get_match(0), Err(MatchingError::NotSolved));
        assert_eq!(matching.update_cost(5, 1 as Cost), Err(MatchingError::UnknownEdge(5)));
        assert!(matches!(matching.add_new_edge(1, 1, 1 as Cost, false), Err(MatchingError::InvalidEdge { .. })));
        matching.finish_update().unwrap();
        assert_eq!(matching.tree_num, 0);
        matching.solve().unwrap();
        assert_eq!(matching.get_match(3), Ok(2));
    }

    #[test]
    fn matching_repair_new_edge_across_blossoms() {
        // cargo test matching_repair_new_edge_across_blossoms -- --nocapture
        let weighted_edges = triangles();
        let (bridge, without_bridge) = weighted_edges.split_last().unwrap();
        let mut matching = solve_edges(6, without_bridge);
        assert_eq!(compute_perfect_matching_cost(without_bridge, &matching).unwrap(), 34 as Cost);
        matching.start_update().unwrap();
        // a costly edge does not violate the duals and can be skipped
        assert_eq!(matching.add_new_edge(1, 4, 100 as Cost, true), Ok(None));
        assert_eq!(matching.edge_num(), without_bridge.len());
        let e = matching.add_edge(bridge.0, bridge.1, bridge.2).unwrap();
        assert_eq!(e, without_bridge.len());
        matching.finish_update().unwrap();
        matching.solve().unwrap();
        assert_eq!(compute_perfect_matching_cost(&weighted_edges, &matching).unwrap(), 14 as Cost);
        assert_eq!(matching.get_match(2), Ok(3));
        assert!(matching.get_solution(e).unwrap());
        check_perfect_matching_optimality(6, &weighted_edges, &matching, COST_THRESHOLD).unwrap();
    }

    #[test]
    fn matching_repair_update_matched_edge() {
        // cargo test matching_repair_update_matched_edge -- --nocapture
        let mut weighted_edges = triangles();
        let mut matching = solve_edges(6, &weighted_edges);
        assert_eq!(matching.get_match(2), Ok(3));
        // the bridge becomes more expensive than the detour through (0, 5)
        matching.start_update().unwrap();
        matching.update_cost(7, 30 as Cost).unwrap();
        matching.finish_update().unwrap();
        assert!(matching.tree_num > 0);
        matching.solve().unwrap();
        weighted_edges[7].2 += 30 as Cost;
        assert_eq!(compute_perfect_matching_cost(&weighted_edges, &matching).unwrap(), 34 as Cost);
        assert_eq!(matching.get_match(0), Ok(5));
        check_perfect_matching_optimality(6, &weighted_edges, &matching, COST_THRESHOLD).unwrap();
        // lowering an unmatched edge below its slack brings it into the matching
        matching.start_update().unwrap();
        matching.update_cost(7, -30 as Cost).unwrap();
        matching.finish_update().unwrap();
        matching.solve().unwrap();
        weighted_edges[7].2 -= 30 as Cost;
        assert_eq!(compute_perfect_matching_cost(&weighted_edges, &matching).unwrap(), 14 as Cost);
    }

    #[test]
    fn matching_repair_random_equivalence() {
        // cargo test matching_repair_random_equivalence -- --nocapture
        for seed in 0..60 {
            let node_num = 4 + 2 * (seed as usize % 4);
            let initializer = random_graph(node_num, 3, 20, seed);
            let mut weighted_edges = initializer.weighted_edges.clone();
            // move a random edge to the end and add it incrementally
            let moved = weighted_edges.remove(seed as usize % weighted_edges.len());
            weighted_edges.push(moved);
            let (last, partial) = weighted_edges.split_last().unwrap();
            let partial_graph = GraphInitializer::new(node_num, partial.to_vec());
            if brute_force_minimum_cost(&partial_graph).is_none() {
                continue;
            }
            let mut matching = PerfectMatching::from_initializer(&partial_graph, MatcherOptions::default()).unwrap();
            matching.solve().unwrap();
            matching.start_update().unwrap();
            matching.add_edge(last.0, last.1, last.2).unwrap();
            matching.finish_update().unwrap();
            matching.solve().unwrap();
            let full_graph = GraphInitializer::new(node_num, weighted_edges.clone());
            let expected = brute_force_minimum_cost(&full_graph).unwrap();
            assert_eq!(compute_perfect_matching_cost(&weighted_edges, &matching).unwrap(), expected, "seed {seed}");
            // then change the cost of an edge
            let e = (seed as usize * 7) % weighted_edges.len();
            let delta = if seed % 2 == 0 { 5 as Cost } else { -3 as Cost };
            matching.start_update().unwrap();
            matching.update_cost(e, delta).unwrap();
            matching.finish_update().unwrap();
            matching.solve().unwrap();
            weighted_edges[e].2 += delta;
            let updated_graph = GraphInitializer::new(node_num, weighted_edges.clone());
            let expected = brute_force_minimum_cost(&updated_graph).unwrap();
            assert_eq!(compute_perfect_matching_cost(&weighted_edges, &matching).unwrap(), expected, "seed {seed}");
        }
    }
}
