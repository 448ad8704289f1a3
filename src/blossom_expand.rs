//! Blossom Expand
//!
//! A "-" blossom whose dual reaches zero is dissolved: the even-length path of its cycle between the node
//! matched to the tree parent and the node matched to the tree child stays in the tree, the rest of the
//! cycle becomes free, matched pairs.
//!

use super::util::*;
use super::perfect_matching::*;
use std::time::Instant;

impl PerfectMatching {
    /// re-attach an edge parked inside `i` once `i` is no longer part of an outer blossom
    fn process_selfloop(&mut self, a: EdgeIndex) {
        let mut prev = [0; 2];
        for dir in 0..2 {
            prev[dir] = self.penultimate_blossom(self.edges[a].head[dir]);
        }
        if prev[0] != prev[1] {
            self.add_edge_to_list(prev[0], a, 1);
            self.add_edge_to_list(prev[1], a, 0);
            self.edges[a].slack -= cost_double(self.nodes[prev[0]].blossom_eps);
        } else {
            self.nodes[prev[0]].blossom_selfloops.push(a);
        }
    }

    /// free a cycle child and redistribute the edges parked inside it
    fn release_cycle_node(&mut self, i: NodeIndex) {
        self.nodes[i].flag = Label::Free;
        self.nodes[i].is_outer = true;
        while let Some(a) = self.nodes[i].blossom_selfloops.pop() {
            self.process_selfloop(a);
        }
        self.nodes[i].is_outer = false;
    }

    /// dissolve the "-" blossom `b` whose dual is zero
    pub(crate) fn expand(&mut self, b: NodeIndex) {
        debug_assert!(self.nodes[b].is_blossom && self.nodes[b].is_outer && self.nodes[b].flag == Label::Minus);
        let begin = Instant::now();
        let t = self.tree_of(b);
        let eps = self.trees[t].eps;
        let mut a_augment: Option<EdgeIndex> = None;

        // hand the tree edges of b to the children they really touch
        self.outer_tree_parent(b);
        let b_tree_parent = self.tree_parent_of(b);
        let entry = self.penultimate_blossom(self.edges[b_tree_parent.edge].head0[1 - b_tree_parent.dir]);
        self.move_edge(b, entry, b_tree_parent.edge, b_tree_parent.dir);
        let b_match = self.match_of(b);
        let k = self.penultimate_blossom(self.edges[b_match.edge].head0[1 - b_match.dir]);
        self.move_edge(b, k, b_match.edge, b_match.dir);

        // match the cycle in pairs starting after k
        let mut expanded = vec![];
        let mut i = self.arc_head(self.blossom_sibling_of(k));
        loop {
            expanded.push(i);
            self.release_cycle_node(i);
            if i == k {
                break;
            }
            let sibling = self.blossom_sibling_of(i);
            self.nodes[i].match_arc = Some(sibling);
            let j = self.arc_head(sibling);
            expanded.push(j);
            self.release_cycle_node(j);
            self.nodes[j].match_arc = Some(sibling.rev());
            i = self.arc_head(self.blossom_sibling_of(j));
        }
        self.nodes[k].match_arc = Some(b_match);

        // the even path from the entry node to k replaces b in the tree
        let i = entry;
        let aa = self.blossom_sibling_of(i);
        {
            let node = &mut self.nodes[i];
            node.flag = Label::Minus;
            node.tree = Some(t);
            node.y += eps;
            node.tree_parent = Some(b_tree_parent);
        }
        if i != k {
            let first_plus = if self.nodes[i].match_arc == Some(aa) {
                let mut first_plus: Option<NodeIndex> = None;
                let mut last_plus: Option<NodeIndex> = None;
                let mut i = self.matched_node(i);
                loop {
                    let aa = self.blossom_sibling_of(i);
                    let node = &mut self.nodes[i];
                    node.flag = Label::Plus;
                    node.tree = Some(t);
                    node.y -= eps;
                    node.tree_sibling_prev = i;
                    node.tree_sibling_next = None;
                    match last_plus {
                        Some(last) => self.nodes[last].first_tree_child = Some(i),
                        None => first_plus = Some(i),
                    }
                    last_plus = Some(i);
                    i = self.arc_head(aa);
                    let node = &mut self.nodes[i];
                    node.flag = Label::Minus;
                    node.tree = Some(t);
                    node.y += eps;
                    node.tree_parent = Some(aa.rev());
                    if i == k {
                        break;
                    }
                    i = self.matched_node(i);
                }
                let last_plus = last_plus.expect("the path has at least one \"+\" node");
                self.nodes[last_plus].first_tree_child = Some(self.matched_node(k));
                first_plus.expect("the path has at least one \"+\" node")
            } else {
                let mut i = k;
                let mut j = self.matched_node(k);
                loop {
                    let sibling = self.blossom_sibling_of(i);
                    let node = &mut self.nodes[i];
                    node.tree_parent = Some(sibling);
                    node.flag = Label::Minus;
                    node.tree = Some(t);
                    node.y += eps;
                    i = self.arc_head(sibling);
                    let node = &mut self.nodes[i];
                    node.flag = Label::Plus;
                    node.tree = Some(t);
                    node.y -= eps;
                    node.first_tree_child = Some(j);
                    node.tree_sibling_prev = i;
                    node.tree_sibling_next = None;
                    j = i;
                    i = self.matched_node(i);
                    if self.nodes[i].flag == Label::Minus {
                        break;
                    }
                }
                j
            };

            // first_plus takes the place of the old child of b
            let child = self.matched_node(k);
            let parent = self.arc_head(b_tree_parent);
            let prev = self.nodes[child].tree_sibling_prev;
            let next = self.nodes[child].tree_sibling_next;
            self.nodes[first_plus].tree_sibling_prev = prev;
            self.nodes[first_plus].tree_sibling_next = next;
            if self.nodes[prev].tree_sibling_next.is_some() {
                self.nodes[prev].tree_sibling_next = Some(first_plus);
            } else {
                self.nodes[parent].first_tree_child = Some(first_plus);
            }
            match next {
                Some(next) => self.nodes[next].tree_sibling_prev = first_plus,
                None => {
                    let first = self.nodes[parent].first_tree_child.expect("parent has children");
                    self.nodes[first].tree_sibling_prev = first_plus;
                }
            }
            self.nodes[child].tree_sibling_prev = child;
            self.nodes[child].tree_sibling_next = None;
        }

        // edges inside the former cycle, walking the tree path from k up to the entry node
        let mut i = k;
        loop {
            if self.nodes[i].is_blossom {
                let a = self.match_of(i).edge;
                std::mem::swap(&mut self.edges[a].slack, &mut self.nodes[i].y);
                self.trees[t].pq_blossoms.add(a, &mut self.edges);
            }
            for (a, dir) in self.incident_edges(i) {
                let j = self.edges[a].head[dir];
                if self.nodes[j].flag != Label::Plus {
                    self.edges[a].slack -= eps;
                }
            }
            self.nodes[i].is_processed = true;
            if self.nodes[i].tree_parent == Some(b_tree_parent) {
                break;
            }
            i = self.arc_head(self.tree_parent_of(i));
            for (a, dir) in self.incident_edges(i) {
                let j = self.edges[a].head[dir];
                if self.nodes[j].flag == Label::Free {
                    self.edges[a].slack += eps;
                    self.trees[t].pq0.add(a, &mut self.edges);
                } else if self.nodes[j].flag == Label::Plus && i < j {
                    self.edges[a].slack += cost_double(eps);
                    self.trees[t].pq00.add(a, &mut self.edges);
                }
            }
            self.nodes[i].is_processed = true;
            i = self.matched_node(i);
        }

        // edges leaving the former cycle go back to the children they touch
        for dir in 0..2 {
            for a in self.take_edge_list(b, dir) {
                let i = self.penultimate_blossom(self.edges[a].head0[1 - dir]);
                self.add_edge_to_list(i, a, dir);
                let j = self.outer_head(a, dir);
                let i_flag = self.nodes[i].flag;
                if i_flag == Label::Minus {
                    continue;
                }
                let j_flag = self.nodes[j].flag;
                let j_tree = self.nodes[j].tree;
                if j_flag == Label::Plus && j_tree != Some(t) {
                    let t2 = self.tree_of(j);
                    self.pq01_remove(t2, false, a);
                }
                if i_flag == Label::Free {
                    self.edges[a].slack += eps;
                    if j_flag == Label::Plus {
                        let t2 = self.tree_of(j);
                        self.trees[t2].pq0.add(a, &mut self.edges);
                    }
                    continue;
                }
                self.edges[a].slack += cost_double(eps);
                match j_flag {
                    Label::Free => self.trees[t].pq0.add(a, &mut self.edges),
                    Label::Plus => {
                        let t2 = self.tree_of(j);
                        if t2 != t {
                            self.ensure_tree_edge(t, t2);
                            if self.edges[a].slack <= self.trees[t2].eps + eps {
                                a_augment = Some(a);
                            }
                        }
                        self.pq00_add(t2, a);
                    }
                    Label::Minus => {
                        let t2 = self.tree_of(j);
                        if t2 != t {
                            self.ensure_tree_edge(t, t2);
                            self.pq01_add(t2, true, a);
                        }
                    }
                }
            }
        }
        for i in expanded {
            self.nodes[i].is_outer = true;
        }
        self.retire_blossom(b);
        self.blossom_num -= 1;
        self.stats.expand_count += 1;
        self.stats.expand_time += begin.elapsed().as_secs_f64();
        debug!("expand: blossom {b} in tree {t}");
        if let Some(a) = a_augment {
            self.augment(a);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blossom_expand_releases_cycle() {
        // cargo test blossom_expand_releases_cycle -- --nocapture
        // the triangle 1-2-3 is shrunk while growing from 0, later the cheap pair (3, 4) forces it apart
        let weighted_edges = [(0, 1, 4), (1, 2, 2), (2, 3, 2), (3, 1, 2), (3, 4, 1), (4, 5, 8), (2, 5, 12)];
        for fractional_jumpstart in [false, !IS_INTEGER_COST] {
            let options = MatcherOptions { fractional_jumpstart, ..MatcherOptions::default() };
            let mut matching = PerfectMatching::new_with_options(6, weighted_edges.len(), options).unwrap();
            for &(i, j, cost) in weighted_edges.iter() {
                matching.add_edge(i, j, cost as Cost).unwrap();
            }
            matching.solve().unwrap();
            let cost: i32 = (0..weighted_edges.len())
                .filter(|&e| matching.get_solution(e).unwrap())
                .map(|e| weighted_edges[e].2)
                .sum();
            // brute force: (0,1) (2,3) (4,5) = 14, (0,1) (3,4) (2,5) = 17
            assert_eq!(cost, 14);
            assert_eq!(matching.get_match(0), Ok(1));
            assert_eq!(matching.get_match(4), Ok(5));
        }
    }

    #[test]
    fn blossom_expand_retired_slots_are_reused() {
        // cargo test blossom_expand_retired_slots_are_reused -- --nocapture
        let mut matching = PerfectMatching::new(4, 1).unwrap();
        let b1 = matching.allocate_blossom();
        let b2 = matching.allocate_blossom();
        assert_eq!((b1, b2), (5, 6));
        matching.retire_blossom(b1);
        // one removed blossom is not yet more than a quarter of 4 nodes
        assert!(matching.nodes[b1].is_removed);
        assert_eq!(matching.allocate_blossom(), 7);
        matching.retire_blossom(b2);
        assert_eq!(matching.allocate_blossom(), b2);
        assert!(!matching.nodes[b2].is_removed);
        assert_eq!(matching.allocate_blossom(), b1);
    }
}
