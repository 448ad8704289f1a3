//! Matching Initialization
//!
//! Two jump-starts for the first solve. The greedy one raises every node dual as far as its cheapest edge
//! allows and matches tight pairs. The global one then grows each remaining tree on its own with a private
//! epsilon until it either meets another tree (augment) or closes an odd cycle; cycles are kept as fractional
//! half-integral components and every cycle becomes one tree of the main loop, rooted at one of its nodes.
//!

use super::util::*;
use super::error::MatchingError;
use super::pairing_heap::*;
use super::perfect_matching::*;
use std::time::Instant;

/// what the critical edge of a tree grown by the global initialization leads to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitEvent {
    /// the tree meets another tree or a cycle
    Augment,
    /// an edge between two "+" nodes of the same tree closes an odd cycle
    Shrink,
}

impl PerfectMatching {
    /// greedy duals and matching; unmatched nodes become single-node trees
    pub(crate) fn init_greedy(&mut self) {
        for i in 0..self.node_num {
            self.nodes[i].y = COST_INFINITY;
        }
        for a in 0..self.edges.len() {
            for dir in 0..2 {
                let i = self.edges[a].head[dir];
                if self.nodes[i].y > self.edges[a].slack {
                    self.nodes[i].y = self.edges[a].slack;
                }
            }
        }
        for a in 0..self.edges.len() {
            for dir in 0..2 {
                let i = self.edges[a].head[dir];
                if !self.nodes[i].is_outer {
                    self.nodes[i].is_outer = true;
                    self.nodes[i].y = cost_half(self.nodes[i].y);
                }
                self.edges[a].slack -= self.nodes[i].y;
            }
        }
        self.tree_num = self.node_num;
        for i in 0..self.node_num {
            if self.nodes[i].flag == Label::Free {
                continue;
            }
            let incident = self.incident_edges(i);
            let slack_min = incident.iter().map(|&(a, _)| self.edges[a].slack)
                .fold(COST_INFINITY, |min, slack| if slack < min { slack } else { min });
            self.nodes[i].y += slack_min;
            for (a, dir) in incident {
                let j = self.edges[a].head[dir];
                if self.edges[a].slack <= slack_min && self.nodes[i].flag == Label::Plus && self.nodes[j].flag == Label::Plus {
                    self.nodes[i].flag = Label::Free;
                    self.nodes[j].flag = Label::Free;
                    self.nodes[i].match_arc = Some(Arc::new(a, dir));
                    self.nodes[j].match_arc = Some(Arc::new(a, 1 - dir));
                    self.tree_num -= 2;
                }
                self.edges[a].slack -= slack_min;
            }
        }
        self.reset_forest();
        let mut last_root = self.sentinel();
        for i in 0..self.node_num {
            if self.nodes[i].flag != Label::Plus {
                continue;
            }
            self.push_tree_root(i, last_root);
            last_root = i;
        }
        debug!("greedy init: {} of {} nodes left unmatched", self.tree_num, self.node_num);
    }

    /// free all nodes of the tree rooted at `r`
    fn free_tree_init(&mut self, r: NodeIndex) {
        let descendants = self.tree_descendants(r);
        self.nodes[r].flag = Label::Free;
        for i in descendants {
            let minus = self.matched_node(i);
            self.nodes[minus].flag = Label::Free;
            self.nodes[i].flag = Label::Free;
        }
    }

    /// flip the matching along the tree path from the "+" node `i0` to the root
    fn rematch_to_root_init(&mut self, i0: NodeIndex) {
        if self.nodes[i0].is_tree_root {
            return;
        }
        let j = self.matched_node(i0);
        let mut aa = self.tree_parent_of(j);
        self.nodes[j].match_arc = Some(aa);
        let mut i = self.arc_head(aa);
        while !self.nodes[i].is_tree_root {
            let j = self.matched_node(i);
            self.nodes[i].match_arc = Some(aa.rev());
            aa = self.tree_parent_of(j);
            self.nodes[j].match_arc = Some(aa);
            i = self.arc_head(aa);
        }
        self.nodes[i].match_arc = Some(aa.rev());
    }

    /// the lowest common "+" ancestor of the endpoints of `a0`; nodes on both paths below it are left with
    /// `is_outer == false` to mark the cycle
    fn find_blossom_root_init(&mut self, a0: EdgeIndex) -> NodeIndex {
        let mut ends = [self.edges[a0].head[0], self.edges[a0].head[1]];
        let mut branch = 0;
        let (r, j) = loop {
            let i = ends[branch];
            if !self.nodes[i].is_outer {
                break (i, ends[1 - branch]);
            }
            self.nodes[i].is_outer = false;
            if self.nodes[i].is_tree_root {
                let mut k = ends[1 - branch];
                while self.nodes[k].is_outer {
                    self.nodes[k].is_outer = false;
                    k = self.matched_node(k);
                    self.nodes[k].is_outer = false;
                    k = self.arc_head(self.tree_parent_of(k));
                }
                break (k, i);
            }
            let minus = self.matched_node(i);
            self.nodes[minus].is_outer = false;
            ends[branch] = self.arc_head(self.tree_parent_of(minus));
            branch = 1 - branch;
        };
        let mut i = r;
        while i != j {
            i = self.matched_node(i);
            self.nodes[i].is_outer = true;
            i = self.arc_head(self.tree_parent_of(i));
            self.nodes[i].is_outer = true;
        }
        r
    }

    /// turn the tree rooted at `tree_root` into an odd cycle closed by `a0`, linked by `blossom_sibling`
    fn shrink_init(&mut self, a0: EdgeIndex, tree_root: NodeIndex) {
        self.free_tree_init(tree_root);
        let r = self.find_blossom_root_init(a0);
        self.rematch_to_root_init(r);
        self.nodes[tree_root].is_tree_root = false;

        let mut branch = 0;
        let mut follow_match = true;
        let mut a_prev = Arc::new(a0, 0);
        let mut i = self.arc_head(a_prev);
        loop {
            let a_next = if follow_match { self.nodes[i].match_arc } else { self.nodes[i].tree_parent };
            follow_match = !follow_match;
            self.nodes[i].flag = Label::Plus;
            self.nodes[i].match_arc = None;
            if branch == 0 {
                self.nodes[i].blossom_sibling = a_next;
                if i == r {
                    branch = 1;
                    follow_match = true;
                    a_prev = Arc::new(a0, 1);
                    i = self.arc_head(a_prev);
                    if i == r {
                        break;
                    }
                } else {
                    a_prev = self.blossom_sibling_of(i);
                    i = self.arc_head(a_prev);
                }
            } else {
                self.nodes[i].blossom_sibling = Some(a_prev.rev());
                a_prev = a_next.expect("cycle nodes below the root are matched and in the tree");
                i = self.arc_head(a_prev);
                if i == r {
                    break;
                }
            }
        }
        self.nodes[i].blossom_sibling = Some(a_prev.rev());
    }

    /// match the cycle containing `k` in pairs, leaving `k` alone
    fn expand_init(&mut self, k: NodeIndex) {
        let mut i = self.arc_head(self.blossom_sibling_of(k));
        loop {
            self.nodes[i].flag = Label::Free;
            self.nodes[i].is_outer = true;
            if i == k {
                break;
            }
            let sibling = self.blossom_sibling_of(i);
            self.nodes[i].match_arc = Some(sibling);
            let j = self.arc_head(sibling);
            self.nodes[j].flag = Label::Free;
            self.nodes[j].is_outer = true;
            self.nodes[j].match_arc = Some(sibling.rev());
            i = self.arc_head(self.blossom_sibling_of(j));
        }
    }

    /// dissolve the tree rooted at `r`, rematching the path from `i0` to the root
    fn augment_branch_init(&mut self, i0: NodeIndex, r: NodeIndex) {
        self.free_tree_init(r);
        self.rematch_to_root_init(i0);
        self.unlink_root(r);
    }

    /// attach the free node `j` reached by `a` (in direction `dir` from the "+" node `i`) and its partner
    fn grow_init(&mut self, pq: &mut PairingHeap, i: NodeIndex, a: EdgeIndex, dir: usize) -> NodeIndex {
        let j = self.edges[a].head[dir];
        debug_assert!(self.nodes[j].flag == Label::Free && !self.nodes[j].is_blossom);
        if let Some(b) = self.nodes[j].best_edge {
            if !PairingHeap::is_reset(&self.edges, b) {
                pq.remove(b, &mut self.edges);
            }
        }
        self.nodes[j].flag = Label::Minus;
        self.nodes[j].tree = self.nodes[i].tree;
        self.nodes[j].tree_parent = Some(Arc::new(a, 1 - dir));
        let k = self.matched_node(j);
        if let Some(b) = self.nodes[k].best_edge {
            if !PairingHeap::is_reset(&self.edges, b) {
                pq.remove(b, &mut self.edges);
            }
        }
        self.add_tree_child(i, k);
        k
    }

    /// fractional jump-start on top of the greedy one
    pub(crate) fn init_global(&mut self) -> Result<(), MatchingError> {
        let begin = Instant::now();
        self.init_greedy();
        for i in 0..self.node_num {
            self.nodes[i].best_edge = None;
        }
        let mut pq = PairingHeap::new();
        let mut cursor = self.nodes[self.sentinel()].tree_sibling_next;
        while let Some(r) = cursor {
            let r2 = self.nodes[r].tree_sibling_next;
            let r3 = r2.and_then(|r2| self.nodes[r2].tree_sibling_next);
            let marker = self.nodes[r].tree;
            pq.clear();

            let mut i = r;
            let mut eps = 0 as Cost;
            let mut critical: Option<(Arc, InitEvent)> = None;
            let mut critical_eps = COST_INFINITY;
            let mut branch_root = i;
            loop {
                self.nodes[i].is_processed = true;
                self.nodes[i].y -= eps;
                if !self.nodes[i].is_tree_root {
                    let minus = self.matched_node(i);
                    self.nodes[minus].y += eps;
                }
                let incident = self.incident_edges(i);
                let mut stopped_at: Option<usize> = None;
                for (index, &(a, dir)) in incident.iter().enumerate() {
                    self.edges[a].slack += eps;
                    let j = self.edges[a].head[dir];
                    let slack = self.edges[a].slack;
                    if self.nodes[j].tree == marker && self.nodes[j].flag != Label::Free {
                        // same tree
                        if self.nodes[j].flag == Label::Plus {
                            let slack = if self.nodes[j].is_processed { slack } else { slack + eps };
                            if cost_double(critical_eps) > slack || critical.is_none() {
                                critical = Some((Arc::new(a, dir), InitEvent::Shrink));
                                critical_eps = cost_half(slack);
                                if critical_eps <= eps {
                                    stopped_at = Some(index);
                                    break;
                                }
                            }
                        }
                    } else if self.nodes[j].flag == Label::Plus {
                        // another tree or a cycle
                        if critical_eps >= slack || critical.is_none() {
                            critical = Some((Arc::new(a, dir), InitEvent::Augment));
                            critical_eps = slack;
                            if critical_eps <= eps {
                                stopped_at = Some(index);
                                break;
                            }
                        }
                    } else if slack > eps {
                        if slack < critical_eps {
                            match self.nodes[j].best_edge {
                                Some(b) if !PairingHeap::is_reset(&self.edges, b) => {
                                    if slack < self.edges[b].slack {
                                        pq.decrease(b, a, &mut self.edges);
                                        self.nodes[j].best_edge = Some(a);
                                    }
                                }
                                _ => {
                                    self.nodes[j].best_edge = Some(a);
                                    pq.add(a, &mut self.edges);
                                }
                            }
                        }
                    } else {
                        self.grow_init(&mut pq, i, a, dir);
                    }
                }
                if let Some(index) = stopped_at {
                    for &(a, _) in incident[index + 1..].iter() {
                        self.edges[a].slack += eps;
                    }
                    break;
                }

                // next "+" node of the current branch
                if let Some(child) = self.nodes[i].first_tree_child {
                    i = child;
                    continue;
                }
                while i != branch_root && self.nodes[i].tree_sibling_next.is_none() {
                    let minus = self.matched_node(i);
                    i = self.arc_head(self.tree_parent_of(minus));
                }
                if i == branch_root {
                    let a = match pq.get_min().filter(|&a| self.edges[a].slack < critical_eps) {
                        Some(a) => a,
                        None => {
                            eps = critical_eps;
                            break;
                        }
                    };
                    pq.remove(a, &mut self.edges);
                    let dir = if self.nodes[self.edges[a].head[0]].flag == Label::Free { 0 } else { 1 };
                    eps = self.edges[a].slack;
                    let tail = self.edges[a].head[1 - dir];
                    let k = self.grow_init(&mut pq, tail, a, dir);
                    i = k;
                    branch_root = k;
                    continue;
                }
                i = self.nodes[i].tree_sibling_next.expect("checked above");
            }
            let (critical_arc, event) = match critical {
                Some(critical) => critical,
                None => {
                    debug!("tree rooted at {r} cannot meet any other tree");
                    return Err(MatchingError::NoPerfectMatching);
                }
            };

            // write the tree epsilon into the duals and slacks
            let mut tree_nodes = vec![r];
            tree_nodes.extend(self.tree_descendants(r));
            for i in tree_nodes {
                if self.nodes[i].is_processed {
                    self.nodes[i].y += eps;
                    if !self.nodes[i].is_tree_root {
                        let match_arc = self.match_of(i);
                        let j = self.arc_head(match_arc);
                        self.nodes[j].y -= eps;
                        let delta = eps - self.edges[match_arc.edge].slack;
                        for (a, _) in self.incident_edges(j) {
                            self.edges[a].slack += delta;
                        }
                        self.nodes[j].best_edge = None;
                    }
                    for (a, dir) in self.incident_edges(i) {
                        if !PairingHeap::is_reset(&self.edges, a) {
                            let j = self.edges[a].head[dir];
                            debug_assert!(self.nodes[j].flag == Label::Free && self.nodes[j].best_edge == Some(a));
                            self.nodes[j].best_edge = None;
                            PairingHeap::reset_item(&mut self.edges, a);
                        }
                        self.edges[a].slack -= eps;
                    }
                    self.nodes[i].is_processed = false;
                } else if !self.nodes[i].is_tree_root {
                    let minus = self.matched_node(i);
                    self.nodes[minus].best_edge = None;
                }
                self.nodes[i].best_edge = None;
            }

            let i = self.arc_tail(critical_arc);
            let j = self.arc_head(critical_arc);
            match event {
                InitEvent::Shrink => self.shrink_init(critical_arc.edge, r),
                InitEvent::Augment => {
                    self.augment_branch_init(i, r);
                    if self.nodes[j].is_outer {
                        self.augment_branch_init(j, j);
                    } else {
                        self.expand_init(j);
                        self.tree_num -= 1;
                    }
                    self.nodes[i].match_arc = Some(critical_arc);
                    self.nodes[j].match_arc = Some(critical_arc.rev());
                }
            }

            cursor = match r2 {
                Some(r2) if !self.nodes[r2].is_tree_root => r3,
                other => other,
            };
        }

        // every remaining cycle becomes a tree rooted at its first node
        self.reset_forest();
        for i in 0..self.node_num {
            self.nodes[i].tree = None;
        }
        let mut last_root = self.sentinel();
        let mut root_num = 0;
        for r in 0..self.node_num {
            if !self.nodes[r].is_outer {
                self.expand_init(r);
                self.push_tree_root(r, last_root);
                last_root = r;
                root_num += 1;
            }
        }
        debug_assert_eq!(root_num, self.tree_num);
        debug!("global init: {} odd cycles left [{:.3} secs]", self.tree_num, begin.elapsed().as_secs_f64());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles() -> PerfectMatching {
        let weighted_edges = [(0, 1, 1), (1, 2, 1), (2, 0, 1), (3, 4, 1), (4, 5, 1), (5, 3, 1), (2, 3, 10)];
        let mut matching = PerfectMatching::new(6, weighted_edges.len()).unwrap();
        for &(i, j, cost) in weighted_edges.iter() {
            matching.add_edge(i, j, cost as Cost).unwrap();
        }
        matching
    }

    fn assert_dual_feasible(matching: &PerfectMatching) {
        for (a, edge) in matching.edges.iter().enumerate() {
            assert!(edge.slack >= 0 as Cost, "edge {a} has negative slack {:?}", edge.slack);
        }
    }

    #[test]
    fn matching_init_greedy() {
        // cargo test matching_init_greedy -- --nocapture
        let mut matching = PerfectMatching::new(4, 3).unwrap();
        for i in 0..3 {
            matching.add_edge(i, i + 1, 1 as Cost).unwrap();
        }
        matching.init_greedy();
        assert_eq!(matching.tree_num, 0);
        assert_eq!(matching.matched_node(0), 1);
        assert_eq!(matching.matched_node(2), 3);
        assert_dual_feasible(&matching);
        // a triangle per side leaves one node of each unmatched
        let mut matching = two_triangles();
        matching.init_greedy();
        assert_eq!(matching.tree_num, 2);
        assert_eq!(matching.roots(), vec![2, 5]);
        assert_eq!(matching.nodes[2].y + matching.nodes[3].y, 2 as Cost);
        assert_dual_feasible(&matching);
    }

    #[test]
    fn matching_init_global_cycles() {
        // cargo test matching_init_global_cycles -- --nocapture
        let mut matching = two_triangles();
        matching.init_global().unwrap();
        // each triangle is one odd cycle, rooted at its smallest node
        assert_eq!(matching.roots(), vec![0, 3]);
        assert_eq!(matching.tree_num, 2);
        assert_eq!(matching.matched_node(1), 2);
        assert_eq!(matching.matched_node(4), 5);
        assert_dual_feasible(&matching);
        for i in 0..6 {
            assert!(matching.nodes[i].is_outer && !matching.nodes[i].is_processed);
        }
    }

    #[test]
    fn matching_init_global_augments() {
        // cargo test matching_init_global_augments -- --nocapture
        // greedy matches the cheap middle edge (0, 1) and leaves both ends 2 and 3 as trees
        let weighted_edges = [(0, 1, 1), (2, 0, 2), (1, 3, 2)];
        let mut matching = PerfectMatching::new(4, weighted_edges.len()).unwrap();
        for &(i, j, cost) in weighted_edges.iter() {
            matching.add_edge(i, j, cost as Cost).unwrap();
        }
        let mut greedy = PerfectMatching::new(4, weighted_edges.len()).unwrap();
        for &(i, j, cost) in weighted_edges.iter() {
            greedy.add_edge(i, j, cost as Cost).unwrap();
        }
        greedy.init_greedy();
        assert_eq!(greedy.roots(), vec![2, 3]);
        matching.init_global().unwrap();
        assert_eq!(matching.tree_num, 0);
        assert_eq!(matching.matched_node(0), 2);
        assert_eq!(matching.matched_node(1), 3);
        assert_eq!(matching.matched_node(3), 1);
        assert_dual_feasible(&matching);
        let mut matching = PerfectMatching::new(4, 3).unwrap();
        for leaf in 1..4 {
            matching.add_edge(0, leaf, 1 as Cost).unwrap();
        }
        assert_eq!(matching.init_global(), Err(MatchingError::NoPerfectMatching));
    }
}
