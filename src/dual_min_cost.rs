//! Dual Min Cost
//!
//! A small linear program over difference constraints: minimize `sum c_i x_i` subject to `x_j - x_i <= cmax`
//! and optional bounds `l_i <= x_i <= u_i`. Its LP dual is an uncapacitated min-cost flow where every variable
//! supplies `c_i` units, so it is solved with successive shortest paths; the optimal `x` are then the shortest
//! distances in the residual graph from an extra node pinned to zero that carries the bounds.
//!
//! The LP dual update of [`crate::dual_update`] builds one of these per phase, with two variables per tree.
//!

use super::util::*;
use crate::priority_queue::PriorityQueue;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MinCostError {
    /// some variable can increase forever while decreasing the objective
    #[error("the objective is unbounded")]
    Unbounded,
    /// the constraints contradict each other
    #[error("the constraints are infeasible")]
    NegativeCycle,
}

#[derive(Debug, Clone)]
struct FlowArc {
    head: usize,
    cost: Cost,
    /// remaining capacity, the reverse arc is at `index ^ 1`
    residual: i64,
}

/// the residual network of the flow problem
#[derive(Debug, Clone)]
struct FlowGraph {
    arcs: Vec<FlowArc>,
    /// outgoing arcs of every vertex
    out: Vec<Vec<usize>>,
}

const CAPACITY_INFINITY: i64 = i64::MAX / 4;

impl FlowGraph {
    fn new(vertex_num: usize, arc_num_max: usize) -> Self {
        Self {
            arcs: Vec::with_capacity(2 * arc_num_max),
            out: vec![vec![]; vertex_num],
        }
    }

    fn add_arc(&mut self, tail: usize, head: usize, cost: Cost, capacity: i64) {
        self.out[tail].push(self.arcs.len());
        self.arcs.push(FlowArc { head, cost, residual: capacity });
        self.out[head].push(self.arcs.len());
        self.arcs.push(FlowArc { head: tail, cost: -cost, residual: 0 });
    }

    #[inline]
    fn tail(&self, arc: usize) -> usize {
        self.arcs[arc ^ 1].head
    }

    /// shortest distances over arcs with residual capacity; every vertex in `sources` starts at zero and
    /// `skip` vertices are ignored
    fn bellman_ford(&self, sources: &[usize], skip: &[usize]) -> Result<Vec<Option<Cost>>, MinCostError> {
        let vertex_num = self.out.len();
        let mut distance: Vec<Option<Cost>> = vec![None; vertex_num];
        for &v in sources.iter() {
            distance[v] = Some(0 as Cost);
        }
        for _ in 0..vertex_num {
            let mut updated = false;
            for (index, arc) in self.arcs.iter().enumerate() {
                if arc.residual <= 0 {
                    continue;
                }
                let tail = self.tail(index);
                if skip.contains(&tail) || skip.contains(&arc.head) {
                    continue;
                }
                if let Some(tail_distance) = distance[tail] {
                    let new_distance = tail_distance + arc.cost;
                    let improves = match distance[arc.head] {
                        Some(head_distance) => new_distance < head_distance - COST_THRESHOLD,
                        None => true,
                    };
                    if improves {
                        distance[arc.head] = Some(new_distance);
                        updated = true;
                    }
                }
            }
            if !updated {
                return Ok(distance);
            }
        }
        Err(MinCostError::NegativeCycle)
    }

    /// Dijkstra's algorithm on reduced costs, returning the incoming arc of every reached vertex and the distances
    fn dijkstra(&self, source: usize, potential: &[Cost]) -> (Vec<Option<usize>>, Vec<Option<Cost>>) {
        let vertex_num = self.out.len();
        let mut previous: Vec<Option<usize>> = vec![None; vertex_num];
        let mut distance: Vec<Option<Cost>> = vec![None; vertex_num];
        let mut visited = vec![false; vertex_num];
        let mut pq = PriorityQueue::<usize, PriorityElement>::new();
        pq.push(source, PriorityElement::new(0 as Cost));
        distance[source] = Some(0 as Cost);
        while let Some((v, PriorityElement { distance: v_distance })) = pq.pop() {
            visited[v] = true;
            for &index in self.out[v].iter() {
                let arc = &self.arcs[index];
                if arc.residual <= 0 || visited[arc.head] {
                    continue;
                }
                let mut reduced_cost = arc.cost + potential[v] - potential[arc.head];
                if reduced_cost < 0 as Cost {
                    reduced_cost = 0 as Cost;  // rounding
                }
                let new_distance = v_distance + reduced_cost;
                if distance[arc.head].map_or(true, |existing| new_distance < existing) {
                    distance[arc.head] = Some(new_distance);
                    previous[arc.head] = Some(index);
                    if pq.get_priority(&arc.head).is_some() {
                        pq.change_priority(&arc.head, PriorityElement::new(new_distance));
                    } else {
                        pq.push(arc.head, PriorityElement::new(new_distance));
                    }
                }
            }
        }
        (previous, distance)
    }
}

#[derive(Debug)]
pub struct PriorityElement {
    pub distance: Cost,
}

impl PriorityElement {
    pub fn new(distance: Cost) -> Self {
        Self { distance }
    }
}

impl std::cmp::PartialEq for PriorityElement {
    #[inline]
    fn eq(&self, other: &PriorityElement) -> bool {
        self.distance == other.distance
    }
}

impl std::cmp::Eq for PriorityElement {}

impl std::cmp::PartialOrd for PriorityElement {
    #[inline]
    fn partial_cmp(&self, other: &PriorityElement) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::cmp::Ord for PriorityElement {
    #[inline]
    fn cmp(&self, other: &PriorityElement) -> std::cmp::Ordering {
        // reverse `self` and `other` to prioritize smaller distance
        other.distance.partial_cmp(&self.distance).unwrap_or(std::cmp::Ordering::Equal)
    }
}

#[derive(Debug, Clone)]
pub struct DualMinCost {
    /// number of variables
    pub node_num: usize,
    objective: Vec<i64>,
    lower: Vec<Option<Cost>>,
    upper: Vec<Option<Cost>>,
    /// `(i, j, cmax)` for `x_j - x_i <= cmax`
    constraints: Vec<(usize, usize, Cost)>,
    solution: Vec<Cost>,
}

impl DualMinCost {
    pub fn new(node_num: usize, constraint_num_max: usize) -> Self {
        Self {
            node_num,
            objective: vec![0; node_num],
            lower: vec![None; node_num],
            upper: vec![None; node_num],
            constraints: Vec::with_capacity(constraint_num_max),
            solution: vec![0 as Cost; node_num],
        }
    }

    /// add `coefficient * x_i` to the objective
    pub fn add_unary_term(&mut self, i: usize, coefficient: i64) {
        self.objective[i] += coefficient;
    }

    pub fn set_lower_bound(&mut self, i: usize, bound: Cost) {
        self.lower[i] = Some(bound);
    }

    pub fn set_upper_bound(&mut self, i: usize, bound: Cost) {
        self.upper[i] = Some(bound);
    }

    /// require `x_j - x_i <= cmax`
    pub fn add_constraint(&mut self, i: usize, j: usize, cmax: Cost) {
        debug_assert!(i < self.node_num && j < self.node_num && i != j);
        self.constraints.push((i, j, cmax));
    }

    pub fn solve(&mut self) -> Result<(), MinCostError> {
        let zero = self.node_num;
        let super_source = zero + 1;
        let super_sink = zero + 2;
        let mut graph = FlowGraph::new(zero + 3, self.constraints.len() + 3 * self.node_num + 1);
        for &(i, j, cmax) in self.constraints.iter() {
            graph.add_arc(i, j, cmax, CAPACITY_INFINITY);
        }
        for i in 0..self.node_num {
            if let Some(lower) = self.lower[i] {
                graph.add_arc(i, zero, -lower, CAPACITY_INFINITY);
            }
            if let Some(upper) = self.upper[i] {
                graph.add_arc(zero, i, upper, CAPACITY_INFINITY);
            }
        }
        // every variable supplies its objective coefficient, the zero node balances the total
        let mut supply = self.objective.clone();
        supply.push(-self.objective.iter().sum::<i64>());
        let mut required = 0;
        for (v, &amount) in supply.iter().enumerate() {
            if amount > 0 {
                graph.add_arc(super_source, v, 0 as Cost, amount);
                required += amount;
            } else if amount < 0 {
                graph.add_arc(v, super_sink, 0 as Cost, -amount);
            }
        }
        // initial potentials from a virtual source connected to everything
        let all: Vec<usize> = (0..graph.out.len()).collect();
        let mut potential: Vec<Cost> = graph.bellman_ford(&all, &[])?
            .into_iter().map(|distance| distance.unwrap_or(0 as Cost)).collect();
        let mut flow = 0;
        while flow < required {
            let (previous, distance) = graph.dijkstra(super_source, &potential);
            if distance[super_sink].is_none() {
                return Err(MinCostError::Unbounded);
            }
            let farthest = distance.iter().flatten().fold(0 as Cost, |max, &d| if d > max { d } else { max });
            for (v, d) in distance.iter().enumerate() {
                potential[v] += d.unwrap_or(farthest);
            }
            let mut bottleneck = i64::MAX;
            let mut v = super_sink;
            while let Some(index) = previous[v] {
                bottleneck = bottleneck.min(graph.arcs[index].residual);
                v = graph.tail(index);
            }
            let mut v = super_sink;
            while let Some(index) = previous[v] {
                graph.arcs[index].residual -= bottleneck;
                graph.arcs[index ^ 1].residual += bottleneck;
                v = graph.tail(index);
            }
            flow += bottleneck;
        }
        // complementary slackness: residual distances from the zero node are an optimal primal
        let distance = graph.bellman_ford(&[zero], &[super_source, super_sink])?;
        for i in 0..self.node_num {
            self.solution[i] = distance[i].ok_or(MinCostError::Unbounded)?;
        }
        Ok(())
    }

    pub fn get_solution(&self, i: usize) -> Cost {
        self.solution[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dual_min_cost_bounds() {
        // cargo test dual_min_cost_bounds -- --nocapture
        let mut lp = DualMinCost::new(2, 1);
        lp.add_unary_term(0, -1);
        lp.add_unary_term(1, -1);
        lp.set_upper_bound(0, 3 as Cost);
        lp.add_constraint(0, 1, 2 as Cost);
        lp.solve().unwrap();
        assert_eq!(lp.get_solution(0), 3 as Cost);
        assert_eq!(lp.get_solution(1), 5 as Cost);
    }

    #[test]
    fn dual_min_cost_tree_pair() {
        // cargo test dual_min_cost_tree_pair -- --nocapture
        // two trees with a "+"/"+" edge of slack 6 between them, limited by 10 and 1 on their own
        let mut lp = DualMinCost::new(4, 2);
        for (i, limit) in [(0, 10), (2, 1)] {
            lp.add_unary_term(i, -1);
            lp.set_lower_bound(i, 0 as Cost);
            lp.add_unary_term(i + 1, 1);
            lp.set_upper_bound(i + 1, 0 as Cost);
            lp.set_upper_bound(i, limit as Cost);
            lp.set_lower_bound(i + 1, -limit as Cost);
        }
        lp.add_constraint(1, 2, 6 as Cost);
        lp.add_constraint(3, 0, 6 as Cost);
        lp.solve().unwrap();
        let x: Vec<Cost> = (0..4).map(|i| lp.get_solution(i)).collect();
        // twice the epsilon of each tree, summing up to twice the slack
        let twice_eps = [x[0] - x[1], x[2] - x[3]];
        assert_eq!(twice_eps[0] + twice_eps[1], 12 as Cost);
        assert!(twice_eps[1] <= 2 as Cost && twice_eps[1] >= 0 as Cost);
        assert!(x[2] - x[1] <= 6 as Cost && x[0] - x[3] <= 6 as Cost);
    }

    #[test]
    fn dual_min_cost_failures() {
        // cargo test dual_min_cost_failures -- --nocapture
        let mut lp = DualMinCost::new(1, 0);
        lp.add_unary_term(0, -1);
        lp.set_lower_bound(0, 0 as Cost);
        assert_eq!(lp.solve(), Err(MinCostError::Unbounded));
        let mut lp = DualMinCost::new(1, 0);
        lp.set_lower_bound(0, 5 as Cost);
        lp.set_upper_bound(0, 3 as Cost);
        assert_eq!(lp.solve(), Err(MinCostError::NegativeCycle));
    }
}
