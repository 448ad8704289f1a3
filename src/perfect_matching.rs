//! Perfect Matching Graph Store
//!
//! All the state of a minimum-weight perfect matching solver lives in a few arenas owned by [`PerfectMatching`]:
//! original nodes followed by a sentinel and by the blossoms created during the search, the edges with their two
//! intrusive adjacency lists, the alternating trees and the tree edges connecting pairs of trees.
//! Cross references are plain indices, and an [`Arc`] is an edge index together with a direction.
//!
//! Slacks and node duals are stored multiplied by [`COST_FACTOR`]. The slack of an edge incident to a tree node is
//! stored lazily: the epsilon of the tree is added ("+" node) or subtracted ("-" node) when reading the true value,
//! so that growing the duals of a whole tree is a single update of [`Tree::eps`].
//!
//! The algorithm itself is split over several modules that all extend [`PerfectMatching`]:
//! [`crate::primal_tree`], [`crate::blossom_shrink`], [`crate::blossom_expand`], [`crate::dual_update`],
//! [`crate::matching_init`] and [`crate::matching_repair`].
//!

use super::util::*;
use super::error::MatchingError;
use super::pairing_heap::*;
use super::visualize::*;
use crate::derivative::Derivative;
use crate::serde::{Serialize, Deserialize};
use std::collections::HashMap;

/// the label of an outer node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    /// even node of an alternating tree, including the root
    Plus,
    /// odd node of an alternating tree
    Minus,
    /// matched node outside of any tree
    Free,
}

/// a directed half of an edge: the head is `edge.head[dir]` and the tail is `edge.head[1 - dir]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Arc {
    pub edge: EdgeIndex,
    pub dir: usize,
}

impl Arc {
    pub fn new(edge: EdgeIndex, dir: usize) -> Self {
        debug_assert!(dir < 2);
        Self { edge, dir }
    }

    /// the same edge in the opposite direction
    #[inline]
    pub fn rev(self) -> Self {
        Self { edge: self.edge, dir: 1 - self.dir }
    }
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct Node {
    /// not contained in any blossom
    pub is_outer: bool,
    /// only meaningful for outer nodes
    pub flag: Label,
    pub is_tree_root: bool,
    /// whether the incident edges were already put into the queues of its tree
    pub is_processed: bool,
    pub is_blossom: bool,
    /// scratch mark used by blossom discovery and incremental updates
    pub is_marked: bool,
    /// a retired blossom waiting to be reused
    pub is_removed: bool,
    /// heads of the two circular adjacency lists; in list `dir` this node is `edge.head[1 - dir]`
    pub first: [Option<EdgeIndex>; 2],
    /// the arc towards the matched partner; `None` for a tree root or an inner node whose match is not resolved yet
    pub match_arc: Option<Arc>,
    /// twice the dual variable, stored lazily for tree nodes
    pub y: Cost,
    /// dual variable saved at the beginning of an incremental update
    pub y_saved: Cost,
    /// for "-" nodes: the arc towards the "+" parent
    pub tree_parent: Option<Arc>,
    /// for "+" nodes: the first "+" grandchild
    pub first_tree_child: Option<NodeIndex>,
    /// siblings among the "+" children of the same grandparent; `prev` of the first child is the last child
    pub tree_sibling_prev: NodeIndex,
    pub tree_sibling_next: Option<NodeIndex>,
    pub tree: Option<TreeIndex>,
    pub blossom_parent: Option<NodeIndex>,
    /// the outermost blossom, only maintained during an incremental update
    pub blossom_grandparent: Option<NodeIndex>,
    /// the arc towards the next node of the odd cycle of the parent blossom
    pub blossom_sibling: Option<Arc>,
    /// edges with both endpoints inside this node that must be revisited when it is expanded
    #[derivative(Debug = "ignore")]
    pub blossom_selfloops: Vec<EdgeIndex>,
    /// the tree epsilon at the time the parent blossom was created
    pub blossom_eps: Cost,
    /// downward pointer used while walking blossom trees during an incremental update
    pub blossom_ptr: Option<NodeIndex>,
    /// the cheapest edge from a tree during the global initialization
    pub best_edge: Option<EdgeIndex>,
}

impl Node {
    pub fn new() -> Self {
        Self {
            is_outer: false,
            flag: Label::Plus,
            is_tree_root: false,
            is_processed: false,
            is_blossom: false,
            is_marked: false,
            is_removed: false,
            first: [None, None],
            match_arc: None,
            y: 0 as Cost,
            y_saved: 0 as Cost,
            tree_parent: None,
            first_tree_child: None,
            tree_sibling_prev: 0,
            tree_sibling_next: None,
            tree: None,
            blossom_parent: None,
            blossom_grandparent: None,
            blossom_sibling: None,
            blossom_selfloops: vec![],
            blossom_eps: 0 as Cost,
            blossom_ptr: None,
            best_edge: None,
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    /// reduced cost, multiplied by [`COST_FACTOR`]
    pub slack: Cost,
    /// current endpoints, possibly stale inner nodes until they are lazily lifted to their outer blossom
    pub head: [NodeIndex; 2],
    /// original endpoints: `head0[1]` is the `i` and `head0[0]` is the `j` of [`PerfectMatching::add_edge`]
    pub head0: [NodeIndex; 2],
    pub next: [EdgeIndex; 2],
    pub prev: [EdgeIndex; 2],
    pub heap_links: HeapLinks,
}

impl HeapStore for Vec<Edge> {
    #[inline]
    fn heap_key(&self, item: usize) -> Cost {
        self[item].slack
    }
    #[inline]
    fn heap_links(&self, item: usize) -> &HeapLinks {
        &self[item].heap_links
    }
    #[inline]
    fn heap_links_mut(&mut self, item: usize) -> &mut HeapLinks {
        &mut self[item].heap_links
    }
}

/// the queue a neighboring "+" node uses while a tree is being processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentQueue {
    /// the neighbor belongs to the tree under processing: use [`Tree::pq00`]
    OwnTree,
    /// the tree edge connecting the neighbor's tree to the tree under processing
    TreeEdge(TreeEdgeIndex),
}

#[derive(Debug, Clone)]
pub struct Tree {
    pub root: NodeIndex,
    /// the dual increase of "+" nodes not yet written into the node duals
    pub eps: Cost,
    /// the increase proposed by the last dual update
    pub eps_delta: Cost,
    /// tree edges where this tree is `head[1]` (index 0) or `head[0]` (index 1)
    pub first: [Option<TreeEdgeIndex>; 2],
    pub pq_current: Option<CurrentQueue>,
    pub dir_current: usize,
    /// edges from a "+" node of this tree to a free node
    pub pq0: PairingHeap,
    /// edges between two "+" nodes of this tree
    pub pq00: PairingHeap,
    /// matched edges of "-" blossoms, keyed by the blossom dual
    pub pq_blossoms: PairingHeap,
}

impl Tree {
    pub fn new(root: NodeIndex) -> Self {
        Self {
            root,
            eps: 0 as Cost,
            eps_delta: 0 as Cost,
            first: [None, None],
            pq_current: None,
            dir_current: 0,
            pq0: PairingHeap::new(),
            pq00: PairingHeap::new(),
            pq_blossoms: PairingHeap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TreeEdge {
    /// `head[dir]` is the other tree when iterating from list `first[dir]`; `None` once that tree is gone
    pub head: [Option<TreeIndex>; 2],
    pub next: [Option<TreeEdgeIndex>; 2],
    /// edges between "+" nodes of the two trees
    pub pq00: PairingHeap,
    /// `pq01[dir]` holds edges from "+" nodes of `head[1 - dir]` to "-" nodes of `head[dir]`
    pub pq01: [PairingHeap; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DualGreedyUpdate {
    /// one epsilon per connected component of trees
    Cc,
    /// one epsilon per strongly connected component of trees
    Scc,
    /// a single epsilon shared by all trees, only with floating point costs
    Single,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MatcherOptions {
    /// initialize with the global (fractional) jump-start instead of the greedy one
    pub fractional_jumpstart: bool,
    pub dual_greedy_update_option: DualGreedyUpdate,
    /// the LP dual update is used when `tree_num < dual_lp_threshold * node_num`
    pub dual_lp_threshold: f64,
    pub update_duals_before: bool,
    pub update_duals_after: bool,
    /// with `update_duals_after`, keep working on the same tree while `tree_num >= single_tree_threshold * node_num`
    pub single_tree_threshold: f64,
    /// log the progress at `info` level
    pub verbose: bool,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            fractional_jumpstart: !IS_INTEGER_COST,
            dual_greedy_update_option: DualGreedyUpdate::Cc,
            dual_lp_threshold: 0.,
            update_duals_before: false,
            update_duals_after: false,
            single_tree_threshold: 1.,
            verbose: false,
        }
    }
}

impl MatcherOptions {
    /// integer costs cannot be split by the fixed epsilon or the LP policies
    pub fn validate(&self) -> Result<(), MatchingError> {
        if IS_INTEGER_COST {
            if self.dual_greedy_update_option == DualGreedyUpdate::Single {
                return Err(MatchingError::RequiresFloatingCost("fixed epsilon dual update"));
            }
            if self.dual_lp_threshold > 0. {
                return Err(MatchingError::RequiresFloatingCost("LP dual update"));
            }
            if self.fractional_jumpstart {
                return Err(MatchingError::RequiresFloatingCost("fractional jump-start"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MatchingStats {
    pub grow_count: usize,
    pub shrink_count: usize,
    pub expand_count: usize,
    pub augment_count: usize,
    pub dual_update_count: usize,
    /// seconds
    pub init_time: f64,
    pub main_loop_time: f64,
    pub shrink_time: f64,
    pub expand_time: f64,
    pub dual_time: f64,
    pub finish_time: f64,
}

/// the dual certificate: original nodes first, then one entry per blossom in first-visit order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DualSolution {
    /// the enclosing blossom, `None` for outer nodes and outermost blossoms
    pub blossom_parents: Vec<Option<usize>>,
    /// twice the dual variable
    pub twice_y: Vec<Cost>,
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct PerfectMatching {
    /// the number of original nodes; `nodes[node_num]` is the sentinel heading the list of tree roots
    pub node_num: NodeNum,
    #[derivative(Debug = "ignore")]
    pub nodes: Vec<Node>,
    #[derivative(Debug = "ignore")]
    pub edges: Vec<Edge>,
    /// capacity hint; exceeding it only costs a reallocation
    pub edge_num_max: usize,
    #[derivative(Debug = "ignore")]
    pub trees: Vec<Tree>,
    #[derivative(Debug = "ignore")]
    pub tree_edges: Vec<TreeEdge>,
    free_tree_edges: Vec<TreeEdgeIndex>,
    /// blossom slots ready for reuse
    free_blossoms: Vec<NodeIndex>,
    /// blossoms retired by expansions, returned to [`Self::free_blossoms`] in batches
    pub(crate) removed_blossoms: Vec<NodeIndex>,
    /// blossoms that became tree roots during an incremental update
    pub(crate) root_blossoms: Vec<NodeIndex>,
    pub tree_num: usize,
    pub blossom_num: usize,
    pub(crate) first_solve: bool,
    /// between `start_update` and `finish_update`
    pub(crate) updating: bool,
    /// a finished solve whose matching can be queried
    pub(crate) finished: bool,
    pub options: MatcherOptions,
    pub stats: MatchingStats,
}

impl PerfectMatching {
    /// `edge_num_max` is only a capacity hint
    pub fn new(node_num: NodeNum, edge_num_max: usize) -> Result<Self, MatchingError> {
        if node_num % 2 == 1 {
            return Err(MatchingError::OddNodeCount(node_num));
        }
        let mut nodes = Vec::with_capacity(node_num + 1 + node_num / 2);
        nodes.resize_with(node_num + 1, Node::new);
        Ok(Self {
            node_num,
            nodes,
            edges: Vec::with_capacity(edge_num_max),
            edge_num_max,
            trees: vec![],
            tree_edges: vec![],
            free_tree_edges: vec![],
            free_blossoms: vec![],
            removed_blossoms: vec![],
            root_blossoms: vec![],
            tree_num: 0,
            blossom_num: 0,
            first_solve: true,
            updating: false,
            finished: false,
            options: MatcherOptions::default(),
            stats: MatchingStats::default(),
        })
    }

    pub fn new_with_options(node_num: NodeNum, edge_num_max: usize, options: MatcherOptions) -> Result<Self, MatchingError> {
        let mut matching = Self::new(node_num, edge_num_max)?;
        matching.options = options;
        Ok(matching)
    }

    /// build a solver holding every edge of the graph
    pub fn from_initializer(initializer: &GraphInitializer, options: MatcherOptions) -> Result<Self, MatchingError> {
        let mut matching = Self::new_with_options(initializer.node_num, initializer.weighted_edges.len(), options)?;
        for &(i, j, cost) in initializer.weighted_edges.iter() {
            matching.add_edge(i, j, cost)?;
        }
        Ok(matching)
    }

    pub fn edge_num(&self) -> usize {
        self.edges.len()
    }

    pub fn stats(&self) -> &MatchingStats {
        &self.stats
    }

    pub(crate) fn check_edge_endpoints(&self, i: NodeIndex, j: NodeIndex) -> Result<(), MatchingError> {
        if i >= self.node_num || j >= self.node_num || i == j {
            return Err(MatchingError::InvalidEdge { i, j, node_num: self.node_num });
        }
        Ok(())
    }

    /// add an edge of the given cost; after the first solve this is [`Self::add_new_edge`] and requires an update bracket
    pub fn add_edge(&mut self, i: NodeIndex, j: NodeIndex, cost: Cost) -> Result<EdgeIndex, MatchingError> {
        if !self.first_solve {
            return self.add_new_edge(i, j, cost, false)?.ok_or(MatchingError::NotUpdating);
        }
        self.check_edge_endpoints(i, j)?;
        let a = self.push_edge(i, j, cost);
        self.add_edge_to_list(i, a, 0);
        self.add_edge_to_list(j, a, 1);
        Ok(a)
    }

    /// append an edge record that is not linked into any adjacency list yet
    pub(crate) fn push_edge(&mut self, i: NodeIndex, j: NodeIndex, cost: Cost) -> EdgeIndex {
        if self.edges.len() >= self.edge_num_max {
            self.reallocate_edges();
        }
        let a = self.edges.len();
        self.edges.push(Edge {
            slack: cost * COST_FACTOR,
            head: [j, i],
            head0: [j, i],
            next: [a, a],
            prev: [a, a],
            heap_links: HeapLinks::default(),
        });
        a
    }

    fn reallocate_edges(&mut self) {
        let edge_num_max = self.edge_num_max * 3 / 2 + 16;
        warn!("reallocating edges from {} to {}, a larger `edge_num_max` in the constructor avoids it", self.edge_num_max, edge_num_max);
        self.edges.reserve_exact(edge_num_max - self.edges.len());
        self.edge_num_max = edge_num_max;
    }

    /// whether edge `e` belongs to the matching
    pub fn get_solution(&self, e: EdgeIndex) -> Result<bool, MatchingError> {
        if !self.finished {
            return Err(MatchingError::NotSolved);
        }
        let edge = self.edges.get(e).ok_or(MatchingError::UnknownEdge(e))?;
        Ok(self.nodes[edge.head0[1]].match_arc == Some(Arc::new(e, 0)))
    }

    /// the partner of original node `i`
    pub fn get_match(&self, i: NodeIndex) -> Result<NodeIndex, MatchingError> {
        if i >= self.node_num {
            return Err(MatchingError::UnknownNode(i));
        }
        if !self.finished {
            return Err(MatchingError::NotSolved);
        }
        let arc = self.nodes[i].match_arc.ok_or(MatchingError::NotSolved)?;
        Ok(self.arc_head0(arc))
    }

    /// twice the dual variable of original node `i`, relative to its enclosing blossoms
    pub fn get_twice_sum(&self, i: NodeIndex) -> Result<Cost, MatchingError> {
        if i >= self.node_num {
            return Err(MatchingError::UnknownNode(i));
        }
        if !self.finished {
            return Err(MatchingError::NotSolved);
        }
        Ok(self.nodes[i].y)
    }

    pub fn get_blossom_num(&self) -> usize {
        self.blossom_num
    }

    pub fn get_dual_solution(&self) -> Result<DualSolution, MatchingError> {
        if self.first_solve {
            return Err(MatchingError::NotSolved);
        }
        let mut blossom_parents: Vec<Option<usize>> = vec![None; self.node_num];
        let mut twice_y: Vec<Cost> = self.nodes[..self.node_num].iter().map(|node| node.y).collect();
        let mut ids: HashMap<NodeIndex, usize> = HashMap::new();
        for i0 in 0..self.node_num {
            if self.nodes[i0].is_outer {
                continue;
            }
            let mut child_id = i0;
            let mut i = self.blossom_parent_of(i0);
            loop {
                if let Some(&id) = ids.get(&i) {
                    blossom_parents[child_id] = Some(id);
                    break;
                }
                let id = blossom_parents.len();
                ids.insert(i, id);
                blossom_parents.push(None);
                twice_y.push(self.nodes[i].y);
                blossom_parents[child_id] = Some(id);
                child_id = id;
                if self.nodes[i].is_outer {
                    break;
                }
                i = self.blossom_parent_of(i);
            }
        }
        debug_assert_eq!(blossom_parents.len(), self.node_num + self.blossom_num);
        Ok(DualSolution { blossom_parents, twice_y })
    }

    /// the graph as added, only available before the first solve because costs are read back from the slacks
    pub fn to_initializer(&self) -> Result<GraphInitializer, MatchingError> {
        if !self.first_solve {
            return Err(MatchingError::AlreadySolved);
        }
        let weighted_edges = self.edges.iter().map(|edge| (edge.head0[1], edge.head0[0], edge.slack / COST_FACTOR)).collect();
        Ok(GraphInitializer::new(self.node_num, weighted_edges))
    }

    /// write the graph in edge-list format, see [`GraphInitializer::to_edge_list`]
    pub fn save(&self, filename: &str, format: usize) -> Result<(), MatchingError> {
        self.to_initializer()?.save_edge_list(filename, format)
    }

    /*
     * arcs and adjacency lists
     */

    #[inline]
    pub(crate) fn arc_head(&self, arc: Arc) -> NodeIndex {
        self.edges[arc.edge].head[arc.dir]
    }

    #[inline]
    pub(crate) fn arc_tail(&self, arc: Arc) -> NodeIndex {
        self.edges[arc.edge].head[1 - arc.dir]
    }

    #[inline]
    pub(crate) fn arc_head0(&self, arc: Arc) -> NodeIndex {
        self.edges[arc.edge].head0[arc.dir]
    }

    #[inline]
    pub(crate) fn arc_tail0(&self, arc: Arc) -> NodeIndex {
        self.edges[arc.edge].head0[1 - arc.dir]
    }

    #[inline]
    pub(crate) fn match_of(&self, i: NodeIndex) -> Arc {
        self.nodes[i].match_arc.expect("node must be matched")
    }

    /// the (raw) head of the matched arc
    #[inline]
    pub(crate) fn matched_node(&self, i: NodeIndex) -> NodeIndex {
        self.arc_head(self.match_of(i))
    }

    #[inline]
    pub(crate) fn tree_parent_of(&self, i: NodeIndex) -> Arc {
        self.nodes[i].tree_parent.expect("\"-\" node must have a tree parent")
    }

    #[inline]
    pub(crate) fn tree_of(&self, i: NodeIndex) -> TreeIndex {
        self.nodes[i].tree.expect("tree node must belong to a tree")
    }

    #[inline]
    pub(crate) fn blossom_parent_of(&self, i: NodeIndex) -> NodeIndex {
        self.nodes[i].blossom_parent.expect("inner node must have a parent blossom")
    }

    #[inline]
    pub(crate) fn blossom_sibling_of(&self, i: NodeIndex) -> Arc {
        self.nodes[i].blossom_sibling.expect("inner node must have a blossom sibling")
    }

    /// append `a` to the adjacency list `dir` of `i`, making `i` the tail `head[1 - dir]`
    pub(crate) fn add_edge_to_list(&mut self, i: NodeIndex, a: EdgeIndex, dir: usize) {
        match self.nodes[i].first[dir] {
            Some(first) => {
                let last = self.edges[first].prev[dir];
                self.edges[a].prev[dir] = last;
                self.edges[a].next[dir] = first;
                self.edges[last].next[dir] = a;
                self.edges[first].prev[dir] = a;
            }
            None => {
                self.nodes[i].first[dir] = Some(a);
                self.edges[a].prev[dir] = a;
                self.edges[a].next[dir] = a;
            }
        }
        self.edges[a].head[1 - dir] = i;
    }

    pub(crate) fn remove_edge_from_list(&mut self, i: NodeIndex, a: EdgeIndex, dir: usize) {
        let prev = self.edges[a].prev[dir];
        if prev == a {
            self.nodes[i].first[dir] = None;
        } else {
            let next = self.edges[a].next[dir];
            self.edges[prev].next[dir] = next;
            self.edges[next].prev[dir] = prev;
            self.nodes[i].first[dir] = Some(next);
        }
    }

    pub(crate) fn move_edge(&mut self, from: NodeIndex, to: NodeIndex, a: EdgeIndex, dir: usize) {
        self.remove_edge_from_list(from, a, dir);
        self.add_edge_to_list(to, a, dir);
    }

    /// a snapshot of adjacency list `dir` of `i`; its other endpoint is `edge.head[dir]`
    pub(crate) fn edge_list(&self, i: NodeIndex, dir: usize) -> Vec<EdgeIndex> {
        let mut list = vec![];
        if let Some(first) = self.nodes[i].first[dir] {
            let mut a = first;
            loop {
                list.push(a);
                a = self.edges[a].next[dir];
                if a == first {
                    break;
                }
            }
        }
        list
    }

    /// detach adjacency list `dir` of `i`, returning its edges in order
    pub(crate) fn take_edge_list(&mut self, i: NodeIndex, dir: usize) -> Vec<EdgeIndex> {
        let list = self.edge_list(i, dir);
        self.nodes[i].first[dir] = None;
        list
    }

    /// all (edge, dir) pairs incident to `i`
    pub(crate) fn incident_edges(&self, i: NodeIndex) -> Vec<(EdgeIndex, usize)> {
        let mut edges = self.edge_list(i, 0).into_iter().map(|a| (a, 0)).collect::<Vec<_>>();
        edges.extend(self.edge_list(i, 1).into_iter().map(|a| (a, 1)));
        edges
    }

    /// the child of an outer blossom that contains the inner node `j`
    pub(crate) fn penultimate_blossom(&self, mut j: NodeIndex) -> NodeIndex {
        loop {
            let parent = self.blossom_parent_of(j);
            if self.nodes[parent].is_outer {
                return j;
            }
            j = parent;
        }
    }

    /// lift `edge.head[dir]` to its outer blossom, moving the edge into the adjacency list of that blossom
    pub(crate) fn outer_head(&mut self, a: EdgeIndex, dir: usize) -> NodeIndex {
        let j = self.edges[a].head[dir];
        if self.nodes[j].is_outer {
            return j;
        }
        let outer = self.blossom_parent_of(self.penultimate_blossom(j));
        self.move_edge(j, outer, a, 1 - dir);
        outer
    }

    /// the outer "+" parent of a "-" node
    pub(crate) fn outer_tree_parent(&mut self, i: NodeIndex) -> NodeIndex {
        let arc = self.tree_parent_of(i);
        self.outer_head(arc.edge, arc.dir)
    }

    /*
     * alternating trees
     */

    #[inline]
    pub(crate) fn sentinel(&self) -> NodeIndex {
        self.node_num
    }

    /// current tree roots in list order
    pub(crate) fn roots(&self) -> Vec<NodeIndex> {
        let mut roots = vec![];
        let mut cursor = self.nodes[self.sentinel()].tree_sibling_next;
        while let Some(r) = cursor {
            roots.push(r);
            cursor = self.nodes[r].tree_sibling_next;
        }
        roots
    }

    /// make the "+" node `j` the first grandchild of the "+" node `i`
    pub(crate) fn add_tree_child(&mut self, i: NodeIndex, j: NodeIndex) {
        let tree = self.nodes[i].tree;
        let first = self.nodes[i].first_tree_child;
        let node = &mut self.nodes[j];
        node.flag = Label::Plus;
        node.tree = tree;
        node.first_tree_child = None;
        node.tree_sibling_next = first;
        match first {
            Some(first) => {
                let last = self.nodes[first].tree_sibling_prev;
                self.nodes[j].tree_sibling_prev = last;
                self.nodes[first].tree_sibling_prev = j;
            }
            None => self.nodes[j].tree_sibling_prev = j,
        }
        self.nodes[i].first_tree_child = Some(j);
    }

    /// unlink the "+" node `i` from the children of its grandparent; heads of the tree arcs must be up to date
    pub(crate) fn remove_from_tree(&mut self, i: NodeIndex) {
        let prev = self.nodes[i].tree_sibling_prev;
        let next = self.nodes[i].tree_sibling_next;
        let grandparent = self.arc_head(self.tree_parent_of(self.matched_node(i)));
        match next {
            Some(next) => self.nodes[next].tree_sibling_prev = prev,
            None => {
                let first = self.nodes[grandparent].first_tree_child.expect("grandparent has children");
                self.nodes[first].tree_sibling_prev = prev;
            }
        }
        if self.nodes[prev].tree_sibling_next.is_some() {
            self.nodes[prev].tree_sibling_next = next;
        } else {
            self.nodes[grandparent].first_tree_child = next;
        }
    }

    /// depth-first successor of a "+" node in its tree, `None` after the last one
    pub(crate) fn next_in_tree(&mut self, i: NodeIndex) -> Option<NodeIndex> {
        if let Some(child) = self.nodes[i].first_tree_child {
            return Some(child);
        }
        let mut i = i;
        while !self.nodes[i].is_tree_root && self.nodes[i].tree_sibling_next.is_none() {
            let minus = self.matched_node(i);
            i = self.outer_tree_parent(minus);
        }
        if self.nodes[i].is_tree_root {
            None
        } else {
            self.nodes[i].tree_sibling_next
        }
    }

    /// all "+" nodes of the tree rooted at `r` except the root itself, depth first
    pub(crate) fn tree_descendants(&mut self, r: NodeIndex) -> Vec<NodeIndex> {
        let mut nodes = vec![];
        let mut cursor = self.nodes[r].first_tree_child;
        while let Some(i) = cursor {
            nodes.push(i);
            cursor = self.next_in_tree(i);
        }
        nodes
    }

    /// unlink a root from the list of tree roots
    pub(crate) fn unlink_root(&mut self, r: NodeIndex) {
        let prev = self.nodes[r].tree_sibling_prev;
        let next = self.nodes[r].tree_sibling_next;
        self.nodes[prev].tree_sibling_next = next;
        if let Some(next) = next {
            self.nodes[next].tree_sibling_prev = prev;
        }
        self.nodes[r].is_tree_root = false;
        self.tree_num -= 1;
    }

    /// append a new single-node tree rooted at `r` after `last_root` in the list of roots
    pub(crate) fn push_tree_root(&mut self, r: NodeIndex, last_root: NodeIndex) {
        let t = self.trees.len();
        self.trees.push(Tree::new(r));
        let node = &mut self.nodes[r];
        node.is_tree_root = true;
        node.flag = Label::Plus;
        node.first_tree_child = None;
        node.tree_sibling_prev = last_root;
        node.tree_sibling_next = None;
        node.tree = Some(t);
        self.nodes[last_root].tree_sibling_next = Some(r);
    }

    /// drop all trees and tree edges before a new forest is built
    pub(crate) fn reset_forest(&mut self) {
        self.trees.clear();
        self.tree_edges.clear();
        self.free_tree_edges.clear();
        let sentinel = self.sentinel();
        self.nodes[sentinel].tree_sibling_next = None;
    }

    /*
     * tree edges and the queues reached through `pq_current`
     */

    pub(crate) fn add_tree_edge(&mut self, t0: TreeIndex, t1: TreeIndex) {
        let tree_edge = TreeEdge {
            head: [Some(t1), Some(t0)],
            next: [self.trees[t0].first[0], self.trees[t1].first[1]],
            pq00: PairingHeap::new(),
            pq01: [PairingHeap::new(), PairingHeap::new()],
        };
        let e = match self.free_tree_edges.pop() {
            Some(e) => {
                self.tree_edges[e] = tree_edge;
                e
            }
            None => {
                self.tree_edges.push(tree_edge);
                self.tree_edges.len() - 1
            }
        };
        self.trees[t0].first[0] = Some(e);
        self.trees[t1].first[1] = Some(e);
        self.trees[t1].pq_current = Some(CurrentQueue::TreeEdge(e));
        self.trees[t1].dir_current = 0;
    }

    /// live tree edges of `t` as (tree edge, dir) with the other tree at `head[dir]`; edges to vanished trees are released
    pub(crate) fn live_tree_edges(&mut self, t: TreeIndex) -> Vec<(TreeEdgeIndex, usize)> {
        let mut live = vec![];
        for dir in 0..2 {
            let mut prev: Option<TreeEdgeIndex> = None;
            let mut cursor = self.trees[t].first[dir];
            while let Some(e) = cursor {
                let next = self.tree_edges[e].next[dir];
                if self.tree_edges[e].head[dir].is_none() {
                    match prev {
                        Some(prev) => self.tree_edges[prev].next[dir] = next,
                        None => self.trees[t].first[dir] = next,
                    }
                    self.free_tree_edges.push(e);
                } else {
                    live.push((e, dir));
                    prev = Some(e);
                }
                cursor = next;
            }
        }
        live
    }

    /// tree edges of `t` without releasing anything
    pub(crate) fn tree_edges_of(&self, t: TreeIndex) -> Vec<(TreeEdgeIndex, usize)> {
        let mut edges = vec![];
        for dir in 0..2 {
            let mut cursor = self.trees[t].first[dir];
            while let Some(e) = cursor {
                if self.tree_edges[e].head[dir].is_some() {
                    edges.push((e, dir));
                }
                cursor = self.tree_edges[e].next[dir];
            }
        }
        edges
    }

    /// the "other" tree of a live tree edge
    #[inline]
    pub(crate) fn tree_edge_head(&self, e: TreeEdgeIndex, dir: usize) -> TreeIndex {
        self.tree_edges[e].head[dir].expect("live tree edge")
    }

    fn current_queue(&self, t: TreeIndex) -> CurrentQueue {
        self.trees[t].pq_current.expect("tree must be adjacent to the tree under processing")
    }

    /// connect tree `t2` to the tree `t` under processing if it is not already
    pub(crate) fn ensure_tree_edge(&mut self, t: TreeIndex, t2: TreeIndex) {
        if self.trees[t2].pq_current.is_none() {
            self.add_tree_edge(t, t2);
        }
    }

    /// add `a` to the "+"/"+" queue between tree `t2` and the tree under processing
    pub(crate) fn pq00_add(&mut self, t2: TreeIndex, a: EdgeIndex) {
        match self.current_queue(t2) {
            CurrentQueue::OwnTree => self.trees[t2].pq00.add(a, &mut self.edges),
            CurrentQueue::TreeEdge(e) => self.tree_edges[e].pq00.add(a, &mut self.edges),
        }
    }

    /// the "+"/"-" queues between tree `t2` and the tree under processing: `towards_t2` selects edges
    /// from "+" nodes of the processed tree to "-" nodes of `t2`
    pub(crate) fn pq01_index(&self, t2: TreeIndex, towards_t2: bool) -> (TreeEdgeIndex, usize) {
        match self.current_queue(t2) {
            CurrentQueue::OwnTree => unreachable!("a tree is never adjacent to itself"),
            CurrentQueue::TreeEdge(e) => {
                let dir_current = self.trees[t2].dir_current;
                (e, if towards_t2 { dir_current } else { 1 - dir_current })
            }
        }
    }

    pub(crate) fn pq01_add(&mut self, t2: TreeIndex, towards_t2: bool, a: EdgeIndex) {
        let (e, dir) = self.pq01_index(t2, towards_t2);
        self.tree_edges[e].pq01[dir].add(a, &mut self.edges);
    }

    pub(crate) fn pq01_remove(&mut self, t2: TreeIndex, towards_t2: bool, a: EdgeIndex) {
        let (e, dir) = self.pq01_index(t2, towards_t2);
        self.tree_edges[e].pq01[dir].remove(a, &mut self.edges);
    }

    #[inline]
    pub(crate) fn heap_min_slack(&self, heap: &PairingHeap) -> Option<Cost> {
        heap.get_min().map(|a| self.edges[a].slack)
    }

    /*
     * blossom slots
     */

    pub(crate) fn allocate_blossom(&mut self) -> NodeIndex {
        match self.free_blossoms.pop() {
            Some(b) => {
                self.nodes[b] = Node::new();
                b
            }
            None => {
                self.nodes.push(Node::new());
                self.nodes.len() - 1
            }
        }
    }

    /// park an expanded blossom until enough of them accumulate
    pub(crate) fn retire_blossom(&mut self, b: NodeIndex) {
        self.nodes[b].is_removed = true;
        self.removed_blossoms.push(b);
        if 4 * self.removed_blossoms.len() > self.node_num {
            self.free_removed();
        }
    }

    /// return retired blossoms to the free pool
    pub(crate) fn free_removed(&mut self) {
        self.free_blossoms.append(&mut self.removed_blossoms);
    }
}

impl MatchingVisualizer for PerfectMatching {
    fn snapshot(&self, abbrev: bool) -> serde_json::Value {
        let mut nodes = Vec::<serde_json::Value>::new();
        for (index, node) in self.nodes.iter().enumerate() {
            if index == self.node_num || node.is_removed || (index > self.node_num && self.free_blossoms.contains(&index)) {
                nodes.push(json!(null));
                continue;
            }
            let partner = if node.is_outer || index < self.node_num { node.match_arc.map(|arc| self.arc_head0(arc)) } else { None };
            nodes.push(json!({
                if abbrev { "y" } else { "twice_dual" }: cost_to_f64(node.y),
                if abbrev { "o" } else { "is_outer" }: node.is_outer,
                if abbrev { "b" } else { "is_blossom" }: node.is_blossom,
                if abbrev { "f" } else { "flag" }: if node.is_outer { Some(node.flag) } else { None },
                if abbrev { "r" } else { "is_tree_root" }: node.is_tree_root,
                if abbrev { "m" } else { "match" }: partner,
                if abbrev { "p" } else { "blossom_parent" }: if node.is_outer { None } else { node.blossom_parent },
            }));
        }
        let mut edges = Vec::<serde_json::Value>::new();
        for edge in self.edges.iter() {
            edges.push(json!({
                if abbrev { "l" } else { "left" }: edge.head0[1],
                if abbrev { "r" } else { "right" }: edge.head0[0],
                if abbrev { "s" } else { "slack" }: cost_to_f64(edge.slack),
            }));
        }
        json!({
            "node_num": self.node_num,
            "tree_num": self.tree_num,
            "blossom_num": self.blossom_num,
            "nodes": nodes,
            "edges": edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_matching_rejects_bad_input() {
        // cargo test perfect_matching_rejects_bad_input -- --nocapture
        assert_eq!(PerfectMatching::new(3, 3).unwrap_err(), MatchingError::OddNodeCount(3));
        let mut matching = PerfectMatching::new(4, 2).unwrap();
        assert!(matches!(matching.add_edge(0, 4, 1 as Cost), Err(MatchingError::InvalidEdge { .. })));
        assert!(matches!(matching.add_edge(2, 2, 1 as Cost), Err(MatchingError::InvalidEdge { .. })));
        assert_eq!(matching.add_edge(0, 1, 1 as Cost), Ok(0));
        assert_eq!(matching.get_match(0), Err(MatchingError::NotSolved));
        assert_eq!(matching.get_solution(0), Err(MatchingError::NotSolved));
        assert_eq!(matching.get_match(7), Err(MatchingError::UnknownNode(7)));
        assert!(matching.get_dual_solution().is_err());
    }

    #[test]
    fn perfect_matching_twice_sum() {
        // cargo test perfect_matching_twice_sum -- --nocapture
        let mut matching = PerfectMatching::new(2, 1).unwrap();
        matching.add_edge(0, 1, 3 as Cost).unwrap();
        assert_eq!(matching.get_twice_sum(0), Err(MatchingError::NotSolved));
        matching.solve().unwrap();
        assert_eq!(matching.get_twice_sum(5), Err(MatchingError::UnknownNode(5)));
        // the matched edge is tight
        let twice_sum = matching.get_twice_sum(0).unwrap() + matching.get_twice_sum(1).unwrap();
        assert_eq!(twice_sum, 6 as Cost);
    }

    #[test]
    fn perfect_matching_adjacency_lists() {
        // cargo test perfect_matching_adjacency_lists -- --nocapture
        let mut matching = PerfectMatching::new(4, 1).unwrap();
        let a = matching.add_edge(0, 1, 3 as Cost).unwrap();
        let b = matching.add_edge(0, 2, 4 as Cost).unwrap();
        let c = matching.add_edge(3, 0, 5 as Cost).unwrap();
        assert!(matching.edge_num_max > 1, "capacity grows past the hint");
        assert_eq!(matching.edges[a].slack, 6 as Cost);
        assert_eq!(matching.edges[a].head, [1, 0]);
        assert_eq!(matching.edge_list(0, 0), vec![a, b]);
        assert_eq!(matching.edge_list(0, 1), vec![c]);
        assert_eq!(matching.incident_edges(0), vec![(a, 0), (b, 0), (c, 1)]);
        // the other endpoint of an edge in list `dir` is `head[dir]`
        for (e, dir) in matching.incident_edges(0) {
            assert_ne!(matching.edges[e].head[dir], 0);
            assert_eq!(matching.edges[e].head[1 - dir], 0);
        }
        matching.move_edge(0, 2, a, 0);
        assert_eq!(matching.edge_list(0, 0), vec![b]);
        assert_eq!(matching.edge_list(2, 0), vec![a]);
        assert_eq!(matching.edges[a].head[1], 2);
        matching.remove_edge_from_list(0, b, 0);
        assert!(matching.nodes[0].first[0].is_none());
        let arc = Arc::new(c, 0);
        assert_eq!(matching.arc_head(arc), 0);
        assert_eq!(matching.arc_tail(arc), 3);
        assert_eq!(matching.arc_head0(arc.rev()), 3);
    }

    #[test]
    fn perfect_matching_save_before_solve() {
        // cargo test perfect_matching_save_before_solve -- --nocapture
        let mut matching = PerfectMatching::new(4, 4).unwrap();
        matching.add_edge(0, 1, 7 as Cost).unwrap();
        matching.add_edge(2, 3, 9 as Cost).unwrap();
        let initializer = matching.to_initializer().unwrap();
        assert_eq!(initializer.weighted_edges, vec![(0, 1, 7 as Cost), (2, 3, 9 as Cost)]);
        let filename = std::env::temp_dir().join("blossom_matching_save_before_solve.txt");
        let filename = filename.to_str().unwrap();
        matching.save(filename, 0).unwrap();
        assert_eq!(GraphInitializer::load_edge_list(filename).unwrap(), initializer);
        matching.solve().unwrap();
        assert_eq!(matching.save(filename, 0), Err(MatchingError::AlreadySolved));
        assert_eq!(matching.get_match(2), Ok(3));
    }

    #[test]
    fn matcher_options_json() {
        // cargo test matcher_options_json -- --nocapture
        let options: MatcherOptions = serde_json::from_str(r#"{"dual_greedy_update_option":"scc","verbose":true}"#).unwrap();
        assert_eq!(options.dual_greedy_update_option, DualGreedyUpdate::Scc);
        assert!(options.verbose);
        assert_eq!(options.single_tree_threshold, 1.);
        assert!(serde_json::from_str::<MatcherOptions>(r#"{"unknown":1}"#).is_err());
        assert!(MatcherOptions::default().validate().is_ok());
    }
}
