//! Blossom Shrink
//!
//! A tight edge between two "+" nodes of the same tree closes an odd cycle through their lowest common
//! ancestor. The cycle is contracted into a new "+" blossom that takes the place of the ancestor in the tree.
//!

use super::util::*;
use super::perfect_matching::*;
use std::time::Instant;

impl PerfectMatching {
    /// mark the two tree paths from the endpoints of `a0` and return their meeting point; every node of the
    /// cycle leaves the outer level
    fn find_blossom_root(&mut self, a0: EdgeIndex) -> NodeIndex {
        let mut ends = [self.edges[a0].head[0], self.edges[a0].head[1]];
        let mut branch = 0;
        let (r, top) = loop {
            let x = ends[branch];
            if self.nodes[x].is_marked {
                break (x, ends[1 - branch]);
            }
            self.nodes[x].is_marked = true;
            if self.nodes[x].is_tree_root {
                let mut i = ends[1 - branch];
                while !self.nodes[i].is_marked {
                    self.nodes[i].is_marked = true;
                    let minus = self.matched_node(i);
                    i = self.outer_tree_parent(minus);
                }
                break (i, x);
            }
            let minus = self.matched_node(x);
            ends[branch] = self.outer_tree_parent(minus);
            branch = 1 - branch;
        };
        // the nodes above the root were marked by one of the walks
        let mut i = r;
        while i != top {
            let minus = self.matched_node(i);
            i = self.arc_head(self.tree_parent_of(minus));
            self.nodes[i].is_marked = false;
        }
        for start in [self.edges[a0].head[0], self.edges[a0].head[1]] {
            let mut i = start;
            while i != r {
                self.nodes[i].is_marked = false;
                self.nodes[i].is_outer = false;
                let minus = self.matched_node(i);
                self.nodes[minus].is_outer = false;
                i = self.arc_head(self.tree_parent_of(minus));
            }
        }
        self.nodes[r].is_marked = false;
        self.nodes[r].is_outer = false;
        r
    }

    /// append the "+" children of `i` to those of `b`
    fn splice_tree_children(&mut self, b: NodeIndex, i: NodeIndex) {
        let Some(j) = self.nodes[i].first_tree_child else {
            return;
        };
        match self.nodes[b].first_tree_child {
            None => self.nodes[b].first_tree_child = Some(j),
            Some(first) => {
                let j_last = self.nodes[j].tree_sibling_prev;
                let b_last = self.nodes[first].tree_sibling_prev;
                self.nodes[j].tree_sibling_prev = b_last;
                self.nodes[b_last].tree_sibling_next = Some(j);
                self.nodes[first].tree_sibling_prev = j_last;
            }
        }
    }

    /// contract the odd cycle closed by the tight edge `a0` between two "+" nodes of the same tree
    pub(crate) fn shrink(&mut self, a0: EdgeIndex) {
        debug_assert!(self.nodes[self.edges[a0].head[0]].is_outer && self.nodes[self.edges[a0].head[1]].is_outer);
        let begin = Instant::now();
        let b = self.allocate_blossom();
        let r = self.find_blossom_root(a0);
        let t = self.tree_of(r);
        let eps = self.trees[t].eps;
        let mut a_augment: Option<EdgeIndex> = None;

        // first pass: take the cycle out of the tree and collect the children hanging from it
        let mut i = self.edges[a0].head[0];
        let mut branch = 0;
        loop {
            if i == r && branch == 1 {
                break;
            }
            self.nodes[i].is_marked = true;
            if i == r {
                branch = 1;
                i = self.edges[a0].head[1];
                continue;
            }
            self.remove_from_tree(i);
            self.splice_tree_children(b, i);
            let minus = self.matched_node(i);
            self.nodes[minus].is_marked = true;
            if self.nodes[minus].is_blossom {
                let a = self.match_of(minus).edge;
                self.trees[t].pq_blossoms.remove(a, &mut self.edges);
                std::mem::swap(&mut self.edges[a].slack, &mut self.nodes[minus].y);
            }
            i = self.arc_head(self.tree_parent_of(minus));
        }
        self.splice_tree_children(b, r);

        {
            let node = &mut self.nodes[b];
            node.is_outer = true;
            node.flag = Label::Plus;
            node.is_blossom = true;
            node.is_processed = true;
            node.tree = Some(t);
            node.y = -eps;
        }
        let is_tree_root = self.nodes[r].is_tree_root;
        self.nodes[b].is_tree_root = is_tree_root;

        // b takes the place of r among its siblings
        let prev = self.nodes[r].tree_sibling_prev;
        let next = self.nodes[r].tree_sibling_next;
        self.nodes[b].tree_sibling_prev = prev;
        self.nodes[b].tree_sibling_next = next;
        let b_parent = if is_tree_root {
            None
        } else {
            let minus = self.matched_node(r);
            Some(self.outer_tree_parent(minus))
        };
        if self.nodes[prev].tree_sibling_next.is_some() {
            self.nodes[prev].tree_sibling_next = Some(b);
        } else {
            let parent = b_parent.expect("the first child has a parent");
            self.nodes[parent].first_tree_child = Some(b);
        }
        match next {
            Some(next) => self.nodes[next].tree_sibling_prev = b,
            None => {
                if let Some(parent) = b_parent {
                    let first = self.nodes[parent].first_tree_child.expect("parent has children");
                    self.nodes[first].tree_sibling_prev = b;
                }
            }
        }

        let b_match = if is_tree_root {
            self.trees[t].root = b;
            None
        } else {
            let arc = self.match_of(r);
            self.nodes[b].match_arc = Some(arc);
            Some(arc)
        };
        // the dual of a "-" blossom partner is kept in the slack of the matched edge while it is in the queue
        let mut b_match_slack = 0 as Cost;
        if let Some(arc) = b_match {
            let partner = self.arc_head(arc);
            if self.nodes[partner].is_blossom {
                b_match_slack = self.edges[arc.edge].slack;
                self.edges[arc.edge].slack = self.nodes[partner].y;
            }
        }

        // second pass: move the boundary edges of "-" nodes to b and link the cycle through blossom_sibling
        let mut branch = 0;
        let mut a_prev = Arc::new(a0, 0);
        let mut i = self.arc_head(a_prev);
        loop {
            if self.nodes[i].flag == Label::Plus {
                self.nodes[i].y += eps;
            } else {
                self.nodes[i].y -= eps;
            }
            self.nodes[i].is_processed = false;
            if self.nodes[i].flag == Label::Minus {
                for dir in 0..2 {
                    for a in self.take_edge_list(i, dir) {
                        let j0 = self.edges[a].head[dir];
                        let mut j = j0;
                        while !self.nodes[j].is_outer && !self.nodes[j].is_marked {
                            j = self.blossom_parent_of(j);
                        }
                        if j != j0 {
                            self.move_edge(j0, j, a, 1 - dir);
                        }
                        if self.nodes[j].is_marked {
                            self.add_edge_to_list(i, a, dir);
                            if self.nodes[j].flag == Label::Minus {
                                self.edges[a].slack += eps;
                            }
                        } else {
                            self.add_edge_to_list(b, a, dir);
                            let j_flag = self.nodes[j].flag;
                            let j_tree = self.nodes[j].tree;
                            if j_flag == Label::Plus && j_tree != Some(t) {
                                let t2 = self.tree_of(j);
                                self.pq01_remove(t2, false, a);
                                if self.edges[a].slack + eps <= self.trees[t2].eps {
                                    a_augment = Some(a);
                                }
                            }
                            self.edges[a].slack += cost_double(eps);
                            match j_flag {
                                Label::Free => self.trees[t].pq0.add(a, &mut self.edges),
                                Label::Plus => {
                                    let t2 = self.tree_of(j);
                                    self.ensure_tree_edge(t, t2);
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
                }
            }

            let a_next = if self.nodes[i].flag == Label::Plus { self.nodes[i].match_arc } else { self.nodes[i].tree_parent };
            let node = &mut self.nodes[i];
            node.blossom_parent = Some(b);
            node.match_arc = None;
            node.blossom_grandparent = Some(b);
            node.blossom_selfloops.clear();
            if branch == 0 {
                self.nodes[i].blossom_sibling = a_next;
                if i == r {
                    branch = 1;
                    a_prev = Arc::new(a0, 1);
                    i = self.arc_head(a_prev);
                    if i == r {
                        break;
                    }
                } else {
                    a_prev = a_next.expect("cycle node below the root has a parent arc");
                    i = self.arc_head(a_prev);
                }
            } else {
                self.nodes[i].blossom_sibling = Some(a_prev.rev());
                a_prev = a_next.expect("cycle node below the root has a parent arc");
                i = self.arc_head(a_prev);
                if i == r {
                    break;
                }
            }
        }
        self.nodes[i].blossom_sibling = Some(a_prev.rev());
        self.nodes[r].is_tree_root = false;

        let mut i = self.arc_head(self.blossom_sibling_of(r));
        loop {
            self.nodes[i].is_marked = false;
            self.nodes[i].blossom_eps = eps;
            if i == r {
                break;
            }
            i = self.arc_head(self.blossom_sibling_of(i));
        }

        if let Some(arc) = b_match {
            if self.nodes[self.arc_head(arc)].is_blossom {
                self.edges[arc.edge].slack = b_match_slack;
            }
            debug_assert_eq!(self.arc_tail(arc), r);
            self.move_edge(r, b, arc.edge, arc.dir);
        }

        self.stats.shrink_count += 1;
        self.blossom_num += 1;
        self.stats.shrink_time += begin.elapsed().as_secs_f64();
        debug!("shrink: blossom {b} with root {r} in tree {t}");
        if let Some(a) = a_augment {
            self.augment(a);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blossom_shrink_triangle() {
        // cargo test blossom_shrink_triangle -- --nocapture
        let options = MatcherOptions { fractional_jumpstart: false, ..MatcherOptions::default() };
        let mut matching = PerfectMatching::new_with_options(4, 4, options).unwrap();
        matching.add_edge(0, 1, 2 as Cost).unwrap();
        matching.add_edge(1, 2, 2 as Cost).unwrap();
        matching.add_edge(2, 0, 2 as Cost).unwrap();
        matching.add_edge(2, 3, 20 as Cost).unwrap();
        matching.solve().unwrap();
        // node 3 can only be matched to 2, the remaining pair comes out of the triangle
        assert_eq!(matching.get_match(3), Ok(2));
        assert_eq!(matching.get_match(0), Ok(1));
        assert_eq!(matching.get_blossom_num(), matching.stats.shrink_count - matching.stats.expand_count);
    }

    #[test]
    fn blossom_shrink_links_cycle() {
        // cargo test blossom_shrink_links_cycle -- --nocapture
        let mut matching = PerfectMatching::new(6, 9).unwrap();
        // a pentagon of cheap edges with one expensive pendant forces a blossom over the pentagon
        for i in 0..5 {
            matching.add_edge(i, (i + 1) % 5, 2 as Cost).unwrap();
        }
        matching.add_edge(0, 5, 40 as Cost).unwrap();
        matching.options.fractional_jumpstart = false;
        matching.solve_with_finish(false).unwrap();
        if matching.blossom_num > 0 {
            let b = (matching.node_num + 1..matching.nodes.len())
                .find(|&b| matching.nodes[b].is_blossom && matching.nodes[b].is_outer && !matching.nodes[b].is_removed)
                .expect("an outer blossom");
            // walking blossom_sibling from any child visits an odd cycle of children of b
            let start = (0..5).find(|&i| matching.nodes[i].blossom_parent == Some(b)).unwrap();
            let mut i = start;
            let mut length = 0;
            loop {
                assert_eq!(matching.nodes[i].blossom_parent, Some(b));
                i = matching.arc_head(matching.blossom_sibling_of(i));
                length += 1;
                if i == start {
                    break;
                }
            }
            assert_eq!(length % 2, 1);
        }
        matching.solve().unwrap();
        assert_eq!(matching.get_match(5), Ok(0));
        assert_eq!(matching.get_match(1), Ok(2));
        assert_eq!(matching.get_match(3), Ok(4));
    }
}
