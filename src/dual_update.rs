//! Dual Update
//!
//! When no tree can grow, shrink, expand or augment, every tree `t` gets an increase `eps_delta` of its dual
//! such that all edge slacks stay nonnegative. The bound a tree has on its own comes from its queues; the
//! interaction between trees comes from the queues of the tree edges:
//!
//! * "+"/"+" edges between `t` and `t2` allow `eps_delta(t) + eps_delta(t2) <= slack`
//! * "+"/"-" edges from `t` to `t2` allow `eps_delta(t) - eps_delta(t2) <= slack`
//!
//! The greedy policies choose one epsilon per connected component ([`DualGreedyUpdate::Cc`]), per strongly
//! connected component of the tight "+"/"-" graph ([`DualGreedyUpdate::Scc`]) or one for all trees
//! ([`DualGreedyUpdate::Single`]). With few trees left, the optimal increase is computed as a linear program.
//!

use super::util::*;
use super::error::MatchingError;
use super::perfect_matching::*;
use super::dual_min_cost::*;
use std::time::Instant;

/// the slacks of the queues of a tree edge, from the point of view of `t` with the other tree at `head[dir]`
struct TreeEdgeSlacks {
    /// "+"/"+" edges
    eps00: Cost,
    /// `eps01[dir]` for "+" nodes of `t` to "-" nodes of `t2`, `eps01[1 - dir]` for the reverse
    eps01: [Cost; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComponentMark {
    Unvisited,
    /// waiting in the queue of the component under construction
    Queued,
    Fixed,
}

impl PerfectMatching {
    pub(crate) fn update_duals(&mut self) -> Result<bool, MatchingError> {
        self.update_duals_with(self.options.dual_greedy_update_option)
    }

    /// compute and commit an increase of the tree duals; returns whether the total increase is positive
    pub(crate) fn update_duals_with(&mut self, greedy: DualGreedyUpdate) -> Result<bool, MatchingError> {
        let begin = Instant::now();
        let trees: Vec<TreeIndex> = self.roots().into_iter().map(|r| self.tree_of(r)).collect();
        for &t in trees.iter() {
            let mut eps = COST_INFINITY;
            if let Some(slack) = self.heap_min_slack(&self.trees[t].pq0) {
                eps = slack;
            }
            if let Some(slack) = self.heap_min_slack(&self.trees[t].pq_blossoms) {
                if eps > slack {
                    eps = slack;
                }
            }
            if let Some(slack) = self.pq00_min_skipping_selfloops(t) {
                if cost_double(eps) > slack {
                    eps = cost_half(slack);
                }
            }
            self.trees[t].eps_delta = eps - self.trees[t].eps;
        }
        if self.tree_num as f64 >= self.options.dual_lp_threshold * self.node_num as f64 {
            self.compute_eps_greedy(&trees, greedy);
        } else if let Err(err) = self.compute_eps_global(&trees) {
            warn!("LP dual update failed ({err}), falling back to connected components");
            self.compute_eps_cc(&trees);
        }
        let mut delta = 0 as Cost;
        for &t in trees.iter() {
            let eps_delta = self.trees[t].eps_delta;
            if eps_delta > 0 as Cost {
                if eps_delta >= cost_half(COST_INFINITY) {
                    debug!("tree {t} rooted at {} can raise its dual forever", self.trees[t].root);
                    return Err(MatchingError::NoPerfectMatching);
                }
                delta += eps_delta;
                self.trees[t].eps += eps_delta;
            }
        }
        self.stats.dual_update_count += 1;
        self.stats.dual_time += begin.elapsed().as_secs_f64();
        Ok(delta > COST_THRESHOLD)
    }

    fn compute_eps_greedy(&mut self, trees: &[TreeIndex], greedy: DualGreedyUpdate) {
        match greedy {
            DualGreedyUpdate::Cc => self.compute_eps_cc(trees),
            DualGreedyUpdate::Scc => self.compute_eps_scc(trees),
            DualGreedyUpdate::Single => self.compute_eps_single(trees),
        }
    }

    fn tree_edge_slacks(&self, t: TreeIndex, e: TreeEdgeIndex, dir: usize) -> TreeEdgeSlacks {
        let t2 = self.tree_edge_head(e, dir);
        let (eps, eps2) = (self.trees[t].eps, self.trees[t2].eps);
        let tree_edge = &self.tree_edges[e];
        let eps00 = self.heap_min_slack(&tree_edge.pq00).map_or(COST_INFINITY, |slack| slack - eps - eps2);
        let mut eps01 = [COST_INFINITY; 2];
        if let Some(slack) = self.heap_min_slack(&tree_edge.pq01[dir]) {
            eps01[dir] = slack - eps + eps2;
        }
        if let Some(slack) = self.heap_min_slack(&tree_edge.pq01[1 - dir]) {
            eps01[1 - dir] = slack - eps2 + eps;
        }
        TreeEdgeSlacks { eps00, eps01 }
    }

    /// the same epsilon for all trees
    fn compute_eps_single(&mut self, trees: &[TreeIndex]) {
        let mut eps = COST_INFINITY;
        for &t in trees.iter() {
            if eps > self.trees[t].eps_delta {
                eps = self.trees[t].eps_delta;
            }
            let mut cursor = self.trees[t].first[0];
            while let Some(e) = cursor {
                cursor = self.tree_edges[e].next[0];
                let Some(t2) = self.tree_edges[e].head[0] else { continue };
                if let Some(slack) = self.heap_min_slack(&self.tree_edges[e].pq00) {
                    let slack = slack - self.trees[t].eps - self.trees[t2].eps;
                    if cost_double(eps) > slack {
                        eps = cost_half(slack);
                    }
                }
            }
        }
        for &t in trees.iter() {
            self.trees[t].eps_delta = eps;
        }
    }

    /// one epsilon per connected component; a tree only joins the component when a "+"/"-" edge between them
    /// is tight, otherwise the neighbor is treated as if its epsilon was zero
    fn compute_eps_cc(&mut self, trees: &[TreeIndex]) {
        let mut marks = vec![ComponentMark::Unvisited; self.trees.len()];
        let mut component_num = 0;
        for &t0 in trees.iter() {
            if marks[t0] != ComponentMark::Unvisited {
                continue;
            }
            let mut eps = self.trees[t0].eps_delta;
            let mut component = vec![t0];
            marks[t0] = ComponentMark::Queued;
            let mut head = 0;
            while head < component.len() {
                let t = component[head];
                head += 1;
                for (e, dir) in self.live_tree_edges(t) {
                    let t2 = self.tree_edge_head(e, dir);
                    let TreeEdgeSlacks { eps00, eps01 } = self.tree_edge_slacks(t, e, dir);
                    if marks[t2] == ComponentMark::Queued {
                        if cost_double(eps) > eps00 {
                            eps = cost_half(eps00);
                        }
                        continue;
                    }
                    let eps2 = if marks[t2] == ComponentMark::Fixed {
                        self.trees[t2].eps_delta
                    } else if eps01[0] > 0 as Cost && eps01[1] > 0 as Cost {
                        0 as Cost
                    } else {
                        component.push(t2);
                        marks[t2] = ComponentMark::Queued;
                        if eps > eps00 {
                            eps = eps00;
                        }
                        if eps > self.trees[t2].eps_delta {
                            eps = self.trees[t2].eps_delta;
                        }
                        continue;
                    };
                    if eps > eps00 - eps2 {
                        eps = eps00 - eps2;
                    }
                    if eps > eps2 + eps01[dir] {
                        eps = eps2 + eps01[dir];
                    }
                }
            }
            for t in component {
                self.trees[t].eps_delta = eps;
                marks[t] = ComponentMark::Fixed;
            }
            component_num += 1;
        }
        debug!("dual update: {} trees in {component_num} connected components", trees.len());
    }

    /// whether the tree edge `(e, dir)` of `t` carries a tight "+"/"-" edge, towards `head[dir]` if `forward`
    fn is_tight_01(&self, t: TreeIndex, e: TreeEdgeIndex, dir: usize, forward: bool) -> bool {
        let slacks = self.tree_edge_slacks(t, e, dir);
        let slack = if forward { slacks.eps01[dir] } else { slacks.eps01[1 - dir] };
        slack <= 0 as Cost
    }

    /// depth first search over tight "+"/"-" edges from `t0`, returning the trees in finishing order
    fn tight_dfs(&self, t0: TreeIndex, forward: bool, visited: &mut [bool], edges: &[Vec<(TreeEdgeIndex, usize)>]) -> Vec<TreeIndex> {
        let mut finished = vec![];
        let mut stack: Vec<(TreeIndex, usize)> = vec![(t0, 0)];
        visited[t0] = true;
        while let Some((t, cursor)) = stack.pop() {
            match edges[t].get(cursor) {
                Some(&(e, dir)) => {
                    stack.push((t, cursor + 1));
                    let t2 = self.tree_edge_head(e, dir);
                    if !visited[t2] && self.is_tight_01(t, e, dir, forward) {
                        visited[t2] = true;
                        stack.push((t2, 0));
                    }
                }
                None => finished.push(t),
            }
        }
        finished
    }

    /// one epsilon per strongly connected component of the tight "+"/"-" edges, components later in
    /// topological order are fixed first
    fn compute_eps_scc(&mut self, trees: &[TreeIndex]) {
        let mut edges: Vec<Vec<(TreeEdgeIndex, usize)>> = vec![vec![]; self.trees.len()];
        for &t in trees.iter() {
            edges[t] = self.live_tree_edges(t);
        }
        let mut visited = vec![false; self.trees.len()];
        let mut order = vec![];
        for &t0 in trees.iter() {
            if !visited[t0] {
                order.extend(self.tight_dfs(t0, true, &mut visited, &edges));
            }
        }
        let mut visited = vec![false; self.trees.len()];
        let mut component_id = vec![0; self.trees.len()];
        let mut components: Vec<Vec<TreeIndex>> = vec![];
        for &t0 in order.iter().rev() {
            if visited[t0] {
                continue;
            }
            let component = self.tight_dfs(t0, false, &mut visited, &edges);
            for &t in component.iter() {
                component_id[t] = components.len();
            }
            components.push(component);
        }
        for c in (0..components.len()).rev() {
            let mut eps = COST_INFINITY;
            for &t in components[c].iter() {
                if eps > self.trees[t].eps_delta {
                    eps = self.trees[t].eps_delta;
                }
                for &(e, dir) in edges[t].iter() {
                    let t2 = self.tree_edge_head(e, dir);
                    let TreeEdgeSlacks { eps00, eps01 } = self.tree_edge_slacks(t, e, dir);
                    if component_id[t2] < c {
                        if eps > eps01[dir] {
                            eps = eps01[dir];
                        }
                        if eps > eps00 {
                            eps = eps00;
                        }
                    } else if component_id[t2] == c {
                        if cost_double(eps) > eps00 {
                            eps = cost_half(eps00);
                        }
                    } else {
                        let eps2 = self.trees[t2].eps_delta;
                        if eps > eps01[dir] + eps2 {
                            eps = eps01[dir] + eps2;
                        }
                        if eps > eps00 - eps2 {
                            eps = eps00 - eps2;
                        }
                    }
                }
            }
            for &t in components[c].iter() {
                self.trees[t].eps_delta = eps;
            }
        }
        debug!("dual update: {} trees in {} strongly connected components", trees.len(), components.len());
    }

    /// the optimal increase as a linear program: tree `k` owns the variables `2k` and `2k + 1` with
    /// `eps_delta = (x[2k] - x[2k + 1]) / 2`
    fn compute_eps_global(&mut self, trees: &[TreeIndex]) -> Result<(), MinCostError> {
        let mut ids = vec![0; self.trees.len()];
        let mut constraint_num = 0;
        for (k, &t) in trees.iter().enumerate() {
            ids[t] = 2 * k;
            constraint_num += 6 * self.live_tree_edges(t).len();
        }
        let mut lp = DualMinCost::new(2 * trees.len(), constraint_num);
        for &t in trees.iter() {
            let i = ids[t];
            lp.add_unary_term(i, -1);
            lp.set_lower_bound(i, 0 as Cost);
            lp.add_unary_term(i + 1, 1);
            lp.set_upper_bound(i + 1, 0 as Cost);
            let eps_delta = self.trees[t].eps_delta;
            if eps_delta < COST_INFINITY {
                lp.set_upper_bound(i, eps_delta);
                lp.set_lower_bound(i + 1, -eps_delta);
            }
            for (e, dir) in self.tree_edges_of(t) {
                if dir != 0 {
                    continue;
                }
                let j = ids[self.tree_edge_head(e, 0)];
                let TreeEdgeSlacks { eps00, eps01 } = self.tree_edge_slacks(t, e, 0);
                if eps01[0] < COST_INFINITY {
                    lp.add_constraint(j, i, eps01[0]);
                    lp.add_constraint(i + 1, j + 1, eps01[0]);
                }
                if eps01[1] < COST_INFINITY {
                    lp.add_constraint(i, j, eps01[1]);
                    lp.add_constraint(j + 1, i + 1, eps01[1]);
                }
                if eps00 < COST_INFINITY {
                    lp.add_constraint(i + 1, j, eps00);
                    lp.add_constraint(j + 1, i, eps00);
                }
            }
        }
        lp.solve()?;
        for &t in trees.iter() {
            let i = ids[t];
            self.trees[t].eps_delta = cost_half(lp.get_solution(i) - lp.get_solution(i + 1));
        }
        debug!("dual update: LP over {} trees with {} constraints", trees.len(), constraint_num);
        Ok(())
    }
}
