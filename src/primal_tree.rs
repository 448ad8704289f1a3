//! Alternating Tree Forest
//!
//! The main loop of the solver: every tree rooted at an unmatched outer node is grown along tight edges,
//! odd cycles inside a tree are shrunk, exhausted "-" blossoms are expanded and two trees connected by a tight
//! edge between "+" nodes are augmented and dissolved. When no tree can make progress, the duals are raised
//! by one of the policies in [`crate::dual_update`].
//!

use super::util::*;
use super::error::MatchingError;
use super::pairing_heap::*;
use super::perfect_matching::*;
use std::time::Instant;

/// main-loop passes without any primal or dual change before giving up
const MAX_STALLED_PASSES: usize = 3;

impl PerfectMatching {
    /// solve and resolve the blossom nesting into a matching of the original nodes
    pub fn solve(&mut self) -> Result<(), MatchingError> {
        self.solve_with_finish(true)
    }

    /// with `finish == false` the blossoms are left in place and only the outer nodes know their partners
    pub fn solve_with_finish(&mut self, finish: bool) -> Result<(), MatchingError> {
        self.options.validate()?;
        let begin = Instant::now();
        if self.options.verbose {
            info!("perfect matching with {} nodes and {} edges", self.node_num, self.edges.len());
        }
        let mut init_time = self.stats.init_time;
        if self.first_solve {
            if let Some(isolated) = (0..self.node_num).find(|&i| self.nodes[i].first == [None, None]) {
                debug!("node {isolated} has no incident edge");
                return Err(MatchingError::NoPerfectMatching);
            }
            if self.options.fractional_jumpstart {
                self.init_global()?;
            } else {
                self.init_greedy();
            }
            self.first_solve = false;
            init_time = begin.elapsed().as_secs_f64();
            if self.options.verbose {
                info!("init done [{:.3} secs], {} trees", init_time, self.tree_num);
            }
        } else if self.options.verbose {
            info!("solving updated problem, {} trees", self.tree_num);
        }
        self.stats = MatchingStats { init_time, ..MatchingStats::default() };
        let main_loop_begin = Instant::now();
        self.attach_tree_neighbors();
        self.run_main_loop()?;
        self.stats.main_loop_time = main_loop_begin.elapsed().as_secs_f64();
        if finish {
            let finish_begin = Instant::now();
            self.finish();
            self.stats.finish_time = finish_begin.elapsed().as_secs_f64();
        }
        self.finished = true;
        if self.options.verbose {
            info!(
                "done [{:.3} secs]. {} grows, {} expands, {} shrinks",
                begin.elapsed().as_secs_f64(),
                self.stats.grow_count,
                self.stats.expand_count,
                self.stats.shrink_count
            );
            info!(
                "expands: [{:.3} secs], shrinks: [{:.3} secs], dual updates: [{:.3} secs]",
                self.stats.expand_time, self.stats.shrink_time, self.stats.dual_time
            );
        }
        Ok(())
    }

    /// put the edges of every root into the queues of its tree, creating tree edges towards processed roots
    fn attach_tree_neighbors(&mut self) {
        for r in self.roots() {
            let t = self.tree_of(r);
            for (a, dir) in self.incident_edges(r) {
                let j = self.edges[a].head[dir];
                if self.nodes[j].flag == Label::Free {
                    self.trees[t].pq0.add(a, &mut self.edges);
                } else if self.nodes[j].is_processed {
                    let t2 = self.tree_of(j);
                    self.ensure_tree_edge(t, t2);
                    self.pq00_add(t2, a);
                }
            }
            self.nodes[r].is_processed = true;
            for (e, dir) in self.tree_edges_of(t) {
                let t2 = self.tree_edge_head(e, dir);
                self.trees[t2].pq_current = None;
            }
        }
    }

    fn run_main_loop(&mut self) -> Result<(), MatchingError> {
        let mut stalled_passes = 0;
        loop {
            let tree_num0 = self.tree_num;
            let primal_count0 = self.primal_count();
            let mut delta = 0 as Cost;
            let mut cursor = self.nodes[self.sentinel()].tree_sibling_next;
            while let Some(r) = cursor {
                let r2 = self.nodes[r].tree_sibling_next;
                let r3 = r2.and_then(|r2| self.nodes[r2].tree_sibling_next);
                let t = self.tree_of(r);
                let tree_num1 = self.tree_num;

                // attach the neighboring trees
                self.trees[t].pq_current = Some(CurrentQueue::OwnTree);
                if self.options.update_duals_before {
                    let (eps, a_augment, eps_augment) = self.local_tree_eps(t, true);
                    if eps > self.trees[t].eps {
                        delta += eps - self.trees[t].eps;
                        self.trees[t].eps = eps;
                    }
                    if let Some(a) = a_augment {
                        if eps_augment <= self.trees[t].eps {
                            self.augment(a);
                        }
                    }
                } else {
                    for (e, dir) in self.live_tree_edges(t) {
                        let t2 = self.tree_edge_head(e, dir);
                        self.trees[t2].pq_current = Some(CurrentQueue::TreeEdge(e));
                        self.trees[t2].dir_current = dir;
                        if let Some(slack) = self.heap_min_slack(&self.tree_edges[e].pq00) {
                            if slack - self.trees[t].eps <= self.trees[t2].eps {
                                let a = self.tree_edges[e].pq00.get_min().expect("non-empty queue");
                                self.augment(a);
                                break;
                            }
                        }
                    }
                }

                // grow the tree as far as tight edges allow
                let eps = self.trees[t].eps;
                while tree_num1 == self.tree_num {
                    if let Some(a) = self.trees[t].pq0.get_min().filter(|&a| self.edges[a].slack <= eps) {
                        let dir = if self.nodes[self.edges[a].head[1]].flag == Label::Free && self.nodes[self.edges[a].head[1]].is_outer { 1 } else { 0 };
                        let i = self.outer_head(a, 1 - dir);
                        let j = self.edges[a].head[dir];
                        debug_assert!(self.nodes[i].flag == Label::Plus && self.nodes[j].flag == Label::Free);
                        self.nodes[j].flag = Label::Minus;
                        self.nodes[j].tree = Some(t);
                        self.nodes[j].tree_parent = Some(Arc::new(a, 1 - dir));
                        self.nodes[j].y += eps;
                        let k = self.matched_node(j);
                        self.nodes[k].y -= eps;
                        self.add_tree_child(i, k);
                        self.grow_tree(k);
                    } else if let Some(a) = self.trees[t].pq00.get_min().filter(|&a| self.edges[a].slack <= cost_double(eps)) {
                        self.trees[t].pq00.remove(a, &mut self.edges);
                        if self.process_edge00(a, true) {
                            self.shrink(a);
                        }
                    } else if let Some(a) = self.trees[t].pq_blossoms.get_min().filter(|&a| self.edges[a].slack <= eps) {
                        self.trees[t].pq_blossoms.remove(a, &mut self.edges);
                        let head = self.edges[a].head;
                        let j = if self.nodes[head[0]].flag == Label::Minus { head[0] } else { head[1] };
                        let y = self.nodes[j].y;
                        self.nodes[j].y = self.edges[a].slack;
                        self.edges[a].slack = y;
                        self.expand(j);
                    } else {
                        break;
                    }
                }

                // detach the neighboring trees
                if tree_num1 == self.tree_num {
                    self.trees[t].pq_current = None;
                    if self.options.update_duals_after {
                        let (eps, a_augment, eps_augment) = self.local_tree_eps(t, false);
                        let mut progress = false;
                        if eps > self.trees[t].eps {
                            delta += eps - self.trees[t].eps;
                            self.trees[t].eps = eps;
                            progress = true;
                        }
                        match a_augment {
                            Some(a) if eps_augment <= self.trees[t].eps => self.augment(a),
                            _ => {
                                if progress && self.tree_num as f64 >= self.options.single_tree_threshold * self.node_num as f64 {
                                    cursor = Some(self.trees[t].root);
                                    continue;
                                }
                            }
                        }
                    } else {
                        for (e, dir) in self.tree_edges_of(t) {
                            let t2 = self.tree_edge_head(e, dir);
                            self.trees[t2].pq_current = None;
                        }
                    }
                }

                cursor = match r2 {
                    Some(r2) if !self.nodes[r2].is_tree_root => r3,
                    other => other,
                };
            }

            if self.tree_num == 0 {
                return Ok(());
            }
            let mut progress = self.tree_num != tree_num0 || self.primal_count() != primal_count0 || delta > COST_THRESHOLD;
            if self.tree_num == tree_num0 {
                let mut dual_progress = self.update_duals()?;
                if !dual_progress && !IS_INTEGER_COST && delta <= COST_THRESHOLD {
                    dual_progress = self.update_duals_with(DualGreedyUpdate::Single)?;
                }
                progress |= dual_progress;
            }
            if progress {
                stalled_passes = 0;
            } else {
                stalled_passes += 1;
                if stalled_passes >= MAX_STALLED_PASSES {
                    warn!("no progress after {stalled_passes} passes with {} trees left", self.tree_num);
                    return Err(MatchingError::NoProgress);
                }
            }
        }
    }

    fn primal_count(&self) -> (usize, usize, usize) {
        (self.stats.grow_count, self.stats.shrink_count, self.stats.expand_count)
    }

    /// the largest epsilon tree `t` can take on its own, the cheapest augmenting edge and the epsilon it needs;
    /// `attach` sets `pq_current` of the neighbors while iterating, otherwise it is cleared
    fn local_tree_eps(&mut self, t: TreeIndex, attach: bool) -> (Cost, Option<EdgeIndex>, Cost) {
        let mut eps = COST_INFINITY;
        let mut a_augment: Option<EdgeIndex> = None;
        let mut eps_augment = COST_INFINITY;
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
        let tree_edges = if attach { self.live_tree_edges(t) } else { self.tree_edges_of(t) };
        for (e, dir) in tree_edges {
            let t2 = self.tree_edge_head(e, dir);
            if attach {
                self.trees[t2].pq_current = Some(CurrentQueue::TreeEdge(e));
                self.trees[t2].dir_current = dir;
            } else {
                self.trees[t2].pq_current = None;
            }
            let t2_eps = self.trees[t2].eps;
            if let Some(a) = self.tree_edges[e].pq00.get_min() {
                let slack = self.edges[a].slack;
                if a_augment.is_none() || eps_augment > slack - t2_eps {
                    a_augment = Some(a);
                    eps_augment = slack - t2_eps;
                }
            }
            if let Some(slack) = self.heap_min_slack(&self.tree_edges[e].pq01[dir]) {
                if eps > slack + t2_eps {
                    eps = slack + t2_eps;
                }
            }
        }
        if eps > eps_augment {
            eps = eps_augment;
        }
        (eps, a_augment, eps_augment)
    }

    /// the minimum slack of `pq00` of a tree after dropping the edges that became internal to a blossom
    pub(crate) fn pq00_min_skipping_selfloops(&mut self, t: TreeIndex) -> Option<Cost> {
        while let Some(a) = self.trees[t].pq00.get_min() {
            if self.process_edge00(a, false) {
                return Some(self.edges[a].slack);
            }
            self.trees[t].pq00.remove(a, &mut self.edges);
        }
        None
    }

    /// bring both endpoints of an edge between "+" nodes up to date; returns whether the endpoints lie in
    /// different outer nodes, otherwise the edge is attached to the children of the common blossom or parked
    /// as a self-loop
    pub(crate) fn process_edge00(&mut self, a: EdgeIndex, update_boundary_edge: bool) -> bool {
        let mut prev: [Option<NodeIndex>; 2] = [None, None];
        let mut last: [NodeIndex; 2] = [0, 0];
        for dir in 0..2 {
            let j = self.edges[a].head[dir];
            if self.nodes[j].is_outer {
                last[dir] = j;
            } else {
                let penultimate = self.penultimate_blossom(j);
                prev[dir] = Some(penultimate);
                last[dir] = self.blossom_parent_of(penultimate);
            }
        }
        if last[0] != last[1] {
            for dir in 0..2 {
                let j = self.edges[a].head[dir];
                if j != last[dir] {
                    self.move_edge(j, last[dir], a, 1 - dir);
                }
            }
            if update_boundary_edge {
                let t = self.tree_of(self.edges[a].head[0]);
                self.edges[a].slack -= cost_double(self.trees[t].eps);
            }
            return true;
        }
        // both endpoints are inside the same outer blossom, so both `prev` are known
        let prev = prev.map(|p| p.expect("inner endpoint"));
        if prev[0] != prev[1] {
            for dir in 0..2 {
                let j = self.edges[a].head[dir];
                if j != prev[dir] {
                    self.move_edge(j, prev[dir], a, 1 - dir);
                }
            }
            self.edges[a].slack -= cost_double(self.nodes[prev[0]].blossom_eps);
            return false;
        }
        for dir in 0..2 {
            let j = self.edges[a].head[1 - dir];
            self.remove_edge_from_list(j, a, dir);
        }
        self.nodes[prev[0]].blossom_selfloops.push(a);
        false
    }

    /// dissolve the tree containing `i0`, flipping the alternating path from `i0` to the root
    fn augment_branch(&mut self, i0: NodeIndex) {
        let t = self.tree_of(i0);
        let r = self.trees[t].root;
        let eps = self.trees[t].eps;
        self.trees[t].pq_current = Some(CurrentQueue::OwnTree);
        for (e, dir) in self.live_tree_edges(t) {
            let t2 = self.tree_edge_head(e, dir);
            self.tree_edges[e].head[1 - dir] = None;
            self.trees[t2].pq_current = Some(CurrentQueue::TreeEdge(e));
            self.trees[t2].dir_current = dir;
        }

        let descendants = self.tree_descendants(r);
        for &i in descendants.iter() {
            let minus = self.matched_node(i);
            if !self.nodes[minus].is_processed {
                continue;
            }
            if self.nodes[minus].is_blossom {
                let a = self.match_of(minus).edge;
                std::mem::swap(&mut self.edges[a].slack, &mut self.nodes[minus].y);
                PairingHeap::reset_item(&mut self.edges, a);
            }
            for (a, dir) in self.incident_edges(minus) {
                let j = self.outer_head(a, dir);
                if self.nodes[j].flag == Label::Plus && self.nodes[j].is_processed {
                    let t2 = self.tree_of(j);
                    if t2 != t {
                        self.edges[a].slack += eps;
                        if PairingHeap::is_reset(&self.edges, a) {
                            self.trees[t2].pq0.add(a, &mut self.edges);
                        }
                    }
                } else {
                    self.edges[a].slack += eps;
                }
            }
        }
        self.trees[t].pq_blossoms.clear();

        for (e, dir) in self.tree_edges_of(t) {
            let t2 = self.tree_edge_head(e, dir);
            self.trees[t2].pq_current = None;
            self.tree_edges[e].pq01[1 - dir].merge_into(&mut self.trees[t2].pq0, &mut self.edges);
            for q in self.tree_edges[e].pq00.items(&self.edges) {
                self.edges[q].slack -= eps;
                self.outer_head(q, 0);
                self.outer_head(q, 1);
            }
            self.tree_edges[e].pq00.merge_into(&mut self.trees[t2].pq0, &mut self.edges);
            for q in self.tree_edges[e].pq01[dir].drain(&mut self.edges) {
                self.edges[q].slack -= eps;
                self.outer_head(q, 0);
                self.outer_head(q, 1);
            }
        }
        for q in self.trees[t].pq0.drain(&mut self.edges) {
            self.edges[q].slack -= eps;
            self.outer_head(q, 0);
            self.outer_head(q, 1);
        }
        for q in self.trees[t].pq00.drain(&mut self.edges) {
            self.process_edge00(q, true);
        }

        let root = &mut self.nodes[r];
        root.flag = Label::Free;
        root.is_processed = false;
        root.y += eps;
        for &i in descendants.iter() {
            let j = self.matched_node(i);
            let minus = &mut self.nodes[j];
            minus.flag = Label::Free;
            minus.is_processed = false;
            minus.y -= eps;
            let plus = &mut self.nodes[i];
            plus.flag = Label::Free;
            plus.is_processed = false;
            plus.y += eps;
        }

        if !self.nodes[i0].is_tree_root {
            let j = self.matched_node(i0);
            let mut i = self.outer_tree_parent(j);
            let mut aa = self.tree_parent_of(j);
            self.nodes[j].match_arc = Some(aa);
            while !self.nodes[i].is_tree_root {
                let j = self.matched_node(i);
                self.nodes[i].match_arc = Some(aa.rev());
                i = self.outer_tree_parent(j);
                aa = self.tree_parent_of(j);
                self.nodes[j].match_arc = Some(aa);
            }
            self.nodes[i].match_arc = Some(aa.rev());
        }
        self.unlink_root(r);
    }

    /// augment along a tight edge between "+" nodes of two different trees
    pub(crate) fn augment(&mut self, a: EdgeIndex) {
        for dir in 0..2 {
            let j = self.outer_head(a, dir);
            self.augment_branch(j);
            self.nodes[j].match_arc = Some(Arc::new(a, 1 - dir));
        }
        self.stats.augment_count += 1;
        if self.options.verbose {
            let tree_num = self.tree_num;
            if tree_num.is_power_of_two() || tree_num <= 8 || (tree_num <= 64 && tree_num % 8 == 0) {
                info!("{tree_num} trees left");
            }
        }
    }

    /// put the edges of a new "+" node into the queues; tight edges to free nodes grow the tree immediately
    fn grow_node(&mut self, i: NodeIndex) {
        debug_assert!(self.nodes[i].is_outer && self.nodes[i].flag == Label::Plus);
        let t = self.tree_of(i);
        let eps = self.trees[t].eps;
        let mut a_augment: Option<EdgeIndex> = None;
        for (a, dir) in self.incident_edges(i) {
            let j = self.outer_head(a, dir);
            let flag = self.nodes[j].flag;
            match flag {
                Label::Free => {
                    self.edges[a].slack += eps;
                    if self.edges[a].slack > 0 as Cost {
                        self.trees[t].pq0.add(a, &mut self.edges);
                    } else {
                        self.nodes[j].flag = Label::Minus;
                        self.nodes[j].tree = Some(t);
                        self.nodes[j].tree_parent = Some(Arc::new(a, 1 - dir));
                        self.nodes[j].y += eps;
                        let k = self.matched_node(j);
                        self.nodes[k].y -= eps;
                        self.add_tree_child(i, k);
                    }
                }
                Label::Plus if self.nodes[j].is_processed => {
                    let t2 = self.tree_of(j);
                    if !PairingHeap::is_reset(&self.edges, a) {
                        self.trees[t2].pq0.remove(a, &mut self.edges);
                    }
                    if self.edges[a].slack <= self.trees[t2].eps && t2 != t {
                        a_augment = Some(a);
                    }
                    self.edges[a].slack += eps;
                    self.ensure_tree_edge(t, t2);
                    self.pq00_add(t2, a);
                }
                _ => {
                    self.edges[a].slack += eps;
                    if flag == Label::Minus {
                        let t2 = self.tree_of(j);
                        if t2 != t {
                            self.ensure_tree_edge(t, t2);
                            self.pq01_add(t2, true, a);
                        }
                    }
                }
            }
        }
        self.nodes[i].is_processed = true;
        if !self.nodes[i].is_tree_root {
            let j = self.matched_node(i);
            self.nodes[j].is_processed = true;
            if self.nodes[j].is_blossom {
                let a = self.match_of(i).edge;
                std::mem::swap(&mut self.edges[a].slack, &mut self.nodes[j].y);
                self.trees[t].pq_blossoms.add(a, &mut self.edges);
            }
        }
        if let Some(a) = a_augment {
            self.augment(a);
        }
        self.stats.grow_count += 1;
    }

    /// process the new subtree hanging below the "+" node `r`, depth first
    fn grow_tree(&mut self, r: NodeIndex) {
        let stop = match self.nodes[r].first_tree_child {
            Some(child) => Some(child),
            None => self.nodes[r].tree_sibling_next,
        };
        let t = self.tree_of(r);
        let eps = self.trees[t].eps;
        let tree_num0 = self.tree_num;
        let mut i = r;
        loop {
            if !self.nodes[i].is_tree_root {
                let minus = self.matched_node(i);
                for (a, dir) in self.incident_edges(minus) {
                    let j = self.outer_head(a, dir);
                    if self.nodes[j].flag == Label::Plus && self.nodes[j].is_processed {
                        let t2 = self.tree_of(j);
                        if !PairingHeap::is_reset(&self.edges, a) {
                            self.trees[t2].pq0.remove(a, &mut self.edges);
                        }
                        self.edges[a].slack -= eps;
                        if t2 != t {
                            self.ensure_tree_edge(t, t2);
                            self.pq01_add(t2, false, a);
                        }
                    } else {
                        self.edges[a].slack -= eps;
                    }
                }
            }
            self.grow_node(i);
            if self.tree_num != tree_num0 {
                break;
            }
            let next = match self.nodes[i].first_tree_child {
                Some(child) => Some(child),
                None => {
                    while i != r && self.nodes[i].tree_sibling_next.is_none() {
                        let minus = self.matched_node(i);
                        i = self.outer_tree_parent(minus);
                    }
                    self.nodes[i].tree_sibling_next
                }
            };
            match next {
                Some(next) if Some(next) != stop => i = next,
                _ => break,
            }
        }
    }

    /// resolve the matching of every node hidden inside blossoms, outermost blossom first
    pub(crate) fn finish(&mut self) {
        for i0 in 0..self.node_num {
            if self.nodes[i0].match_arc.is_some() {
                continue;
            }
            let mut chain = vec![];
            let mut b = i0;
            loop {
                chain.push(b);
                b = self.blossom_parent_of(b);
                if self.nodes[b].match_arc.is_some() {
                    break;
                }
            }
            while let Some(b_prev) = chain.pop() {
                let b_match = self.match_of(b);
                let mut k = self.arc_tail0(b_match);
                while self.nodes[k].blossom_parent != Some(b) {
                    k = self.blossom_parent_of(k);
                }
                self.nodes[k].match_arc = Some(b_match);
                let mut i = self.arc_head(self.blossom_sibling_of(k));
                while i != k {
                    let sibling = self.blossom_sibling_of(i);
                    self.nodes[i].match_arc = Some(sibling);
                    let j = self.arc_head(sibling);
                    self.nodes[j].match_arc = Some(sibling.rev());
                    i = self.arc_head(self.blossom_sibling_of(j));
                }
                b = b_prev;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solve_edges(node_num: usize, weighted_edges: &[(usize, usize, i32)], options: MatcherOptions) -> PerfectMatching {
        let mut matching = PerfectMatching::new_with_options(node_num, weighted_edges.len(), options).unwrap();
        for &(i, j, cost) in weighted_edges.iter() {
            matching.add_edge(i, j, cost as Cost).unwrap();
        }
        matching.solve().unwrap();
        matching
    }

    fn matched_cost(matching: &PerfectMatching, weighted_edges: &[(usize, usize, i32)]) -> i32 {
        (0..matching.edge_num()).filter(|&e| matching.get_solution(e).unwrap()).map(|e| weighted_edges[e].2).sum()
    }

    fn all_option_sets() -> Vec<MatcherOptions> {
        let mut option_sets = vec![];
        for fractional_jumpstart in [false, true] {
            if IS_INTEGER_COST && fractional_jumpstart {
                continue;
            }
            for dual_greedy_update_option in [DualGreedyUpdate::Cc, DualGreedyUpdate::Scc, DualGreedyUpdate::Single] {
                if IS_INTEGER_COST && dual_greedy_update_option == DualGreedyUpdate::Single {
                    continue;
                }
                for (update_duals_before, update_duals_after) in [(false, false), (true, false), (false, true)] {
                    option_sets.push(MatcherOptions {
                        fractional_jumpstart,
                        dual_greedy_update_option,
                        update_duals_before,
                        update_duals_after,
                        ..MatcherOptions::default()
                    });
                }
            }
        }
        option_sets
    }

    #[test]
    fn primal_tree_four_nodes() {
        // cargo test primal_tree_four_nodes -- --nocapture
        let weighted_edges = [(0, 1, 1), (0, 2, 5), (0, 3, 3), (1, 2, 3), (1, 3, 5), (2, 3, 1)];
        for options in all_option_sets() {
            let matching = solve_edges(4, &weighted_edges, options.clone());
            assert_eq!(matching.get_match(0), Ok(1), "{options:?}");
            assert_eq!(matching.get_match(1), Ok(0));
            assert_eq!(matching.get_match(2), Ok(3));
            assert_eq!(matching.get_match(3), Ok(2));
            assert!(matching.get_solution(0).unwrap());
            assert!(matching.get_solution(5).unwrap());
            assert_eq!(matched_cost(&matching, &weighted_edges), 2);
        }
    }

    #[test]
    fn primal_tree_odd_cycle_with_chord() {
        // cargo test primal_tree_odd_cycle_with_chord -- --nocapture
        // a 6-cycle of unit edges with the chord (0, 3); the chord alone leaves two disjoint pairs
        let mut weighted_edges: Vec<(usize, usize, i32)> = (0..6).map(|i| (i, (i + 1) % 6, 2)).collect();
        weighted_edges.push((0, 3, 1));
        for options in all_option_sets() {
            let matching = solve_edges(6, &weighted_edges, options.clone());
            // costs were doubled to keep them integral: cycle edges 2, chord 1
            assert_eq!(matched_cost(&matching, &weighted_edges), 5, "{options:?}");
            assert_eq!(matching.get_match(0), Ok(3));
            assert_eq!(matching.get_match(1), Ok(2));
            assert_eq!(matching.get_match(4), Ok(5));
        }
    }

    #[cfg(not(feature = "integer_cost"))]
    #[test]
    fn primal_tree_odd_cycle_with_fractional_chord() {
        // cargo test primal_tree_odd_cycle_with_fractional_chord -- --nocapture
        let mut weighted_edges: Vec<(usize, usize, f64)> = (0..6).map(|i| (i, (i + 1) % 6, 1.)).collect();
        weighted_edges.push((0, 3, 0.5));
        for options in all_option_sets() {
            let mut matching = PerfectMatching::new_with_options(6, weighted_edges.len(), options.clone()).unwrap();
            for &(i, j, cost) in weighted_edges.iter() {
                matching.add_edge(i, j, cost).unwrap();
            }
            matching.solve().unwrap();
            let cost: f64 = (0..weighted_edges.len()).filter(|&e| matching.get_solution(e).unwrap()).map(|e| weighted_edges[e].2).sum();
            assert_eq!(cost, 2.5, "{options:?}");
            assert_eq!(matching.get_match(0), Ok(3));
            assert_eq!(matching.get_match(1), Ok(2));
            assert_eq!(matching.get_match(4), Ok(5));
        }
    }

    #[test]
    fn primal_tree_triangles_force_blossoms() {
        // cargo test primal_tree_triangles_force_blossoms -- --nocapture
        // two cheap triangles joined by an expensive bridge: both triangles shrink before the bridge is used
        let weighted_edges = [(0, 1, 2), (1, 2, 2), (2, 0, 2), (3, 4, 2), (4, 5, 2), (5, 3, 2), (2, 3, 10), (0, 5, 30)];
        for options in all_option_sets() {
            let matching = solve_edges(6, &weighted_edges, options.clone());
            assert_eq!(matching.get_match(2), Ok(3), "{options:?}");
            assert_eq!(matching.get_match(0), Ok(1));
            assert_eq!(matching.get_match(4), Ok(5));
            for i in 0..6 {
                let partner = matching.get_match(i).unwrap();
                assert_eq!(matching.get_match(partner), Ok(i));
            }
        }
    }

    #[test]
    fn primal_tree_solve_is_idempotent() {
        // cargo test primal_tree_solve_is_idempotent -- --nocapture
        let weighted_edges = [(0, 1, 4), (1, 2, 1), (2, 3, 4), (3, 0, 1), (0, 2, 2), (1, 3, 2)];
        let mut matching = solve_edges(4, &weighted_edges, MatcherOptions::default());
        let first: Vec<_> = (0..4).map(|i| matching.get_match(i).unwrap()).collect();
        matching.solve().unwrap();
        let second: Vec<_> = (0..4).map(|i| matching.get_match(i).unwrap()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn primal_tree_no_perfect_matching() {
        // cargo test primal_tree_no_perfect_matching -- --nocapture
        let mut matching = PerfectMatching::new(4, 2).unwrap();
        matching.add_edge(0, 1, 1 as Cost).unwrap();
        matching.add_edge(1, 2, 1 as Cost).unwrap();
        assert_eq!(matching.solve(), Err(MatchingError::NoPerfectMatching));
        // a star has edges everywhere but still no perfect matching
        let mut matching = PerfectMatching::new(4, 3).unwrap();
        for leaf in 1..4 {
            matching.add_edge(0, leaf, 1 as Cost).unwrap();
        }
        assert_eq!(matching.solve(), Err(MatchingError::NoPerfectMatching));
    }

    #[test]
    fn primal_tree_without_finish() {
        // cargo test primal_tree_without_finish -- --nocapture
        let weighted_edges = [(0, 1, 2), (1, 2, 2), (2, 0, 2), (3, 4, 2), (4, 5, 2), (5, 3, 2), (2, 3, 10), (0, 5, 30)];
        let mut matching = PerfectMatching::new(6, weighted_edges.len()).unwrap();
        for &(i, j, cost) in weighted_edges.iter() {
            matching.add_edge(i, j, cost as Cost).unwrap();
        }
        matching.solve_with_finish(false).unwrap();
        for i in 0..6 {
            match matching.get_match(i) {
                Ok(partner) => assert!(matching.nodes[i].is_outer && matching.get_match(partner) == Ok(i)),
                Err(err) => assert!(!matching.nodes[i].is_outer && err == MatchingError::NotSolved),
            }
        }
        // solving again only resolves the remaining blossoms
        matching.solve().unwrap();
        assert_eq!(matching.get_match(2), Ok(3));
        assert_eq!(matching.get_match(0), Ok(1));
        assert_eq!(matching.get_match(5), Ok(4));
    }
}
