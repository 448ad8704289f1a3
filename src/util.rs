use super::rand_xoshiro;
use crate::error::MatchingError;
use crate::rand_xoshiro::rand_core::RngCore;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::prelude::*;
use std::time::Instant;

cfg_if::cfg_if! {
    if #[cfg(feature="integer_cost")] {
        /// use i64 to store costs; halving a doubled integer cost stays exact
        pub type Cost = i64;
        pub const COST_INFINITY: Cost = i64::MAX / 4;
        pub const COST_THRESHOLD: Cost = 0;
        pub const IS_INTEGER_COST: bool = true;
    } else {
        pub type Cost = f64;
        pub const COST_INFINITY: Cost = 1e100;
        pub const COST_THRESHOLD: Cost = 1e-12;
        pub const IS_INTEGER_COST: bool = false;
    }
}

/// every cost is stored multiplied by this factor, so that `y` of a node is twice its dual variable
pub const COST_FACTOR: Cost = 2 as Cost;

pub type NodeIndex = usize;
pub type EdgeIndex = usize;
pub type TreeIndex = usize;
pub type TreeEdgeIndex = usize;
pub type NodeNum = usize;

/// (i, j, cost) of an undirected edge
pub type WeightedEdge = (NodeIndex, NodeIndex, Cost);

#[inline]
#[allow(clippy::unnecessary_cast)]
pub fn cost_half(value: Cost) -> Cost {
    value / (2 as Cost)
}

#[inline]
pub fn cost_double(value: Cost) -> Cost {
    value + value
}

#[inline]
#[allow(clippy::unnecessary_cast)]
pub fn cost_to_f64(value: Cost) -> f64 {
    value as f64
}

#[inline]
#[allow(clippy::unnecessary_cast)]
pub fn cost_from_f64(value: f64) -> Cost {
    value as Cost
}

/// a weighted graph to be matched, the input of [`crate::perfect_matching::PerfectMatching`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphInitializer {
    /// the number of nodes, must be even
    pub node_num: NodeNum,
    /// weighted edges, where node indices are within the range [0, node_num)
    pub weighted_edges: Vec<WeightedEdge>,
}

impl GraphInitializer {
    pub fn new(node_num: NodeNum, weighted_edges: Vec<WeightedEdge>) -> Self {
        Self { node_num, weighted_edges }
    }

    /// parse either the DIMACS form (`p edge N M` followed by 1-indexed `e i j cost` lines)
    /// or the bare form (`N M` followed by 0-indexed `i j cost` lines)
    pub fn parse_edge_list(content: &str) -> Result<Self, MatchingError> {
        let mut header: Option<(NodeNum, usize, bool)> = None;
        let mut weighted_edges = Vec::new();
        for (line_idx, raw_line) in content.lines().enumerate() {
            let line_number = line_idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('c') {
                continue;
            }
            let parse_error = |message: &str| MatchingError::Parse {
                line: line_number,
                message: message.to_string(),
            };
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match header {
                None => {
                    let (numbers, dimacs) = if tokens[0] == "p" {
                        if tokens.len() != 4 || tokens[1] != "edge" {
                            return Err(parse_error("expect `p edge <node_num> <edge_num>`"));
                        }
                        (&tokens[2..4], true)
                    } else {
                        if tokens.len() != 2 {
                            return Err(parse_error("expect `<node_num> <edge_num>`"));
                        }
                        (&tokens[0..2], false)
                    };
                    let node_num = numbers[0].parse::<NodeNum>().map_err(|_| parse_error("invalid node number"))?;
                    let edge_num = numbers[1].parse::<usize>().map_err(|_| parse_error("invalid edge number"))?;
                    header = Some((node_num, edge_num, dimacs));
                    weighted_edges.reserve(edge_num);
                }
                Some((node_num, _, dimacs)) => {
                    let fields = if dimacs {
                        if tokens.len() != 4 || tokens[0] != "e" {
                            return Err(parse_error("expect `e <i> <j> <cost>`"));
                        }
                        &tokens[1..4]
                    } else {
                        if tokens.len() != 3 {
                            return Err(parse_error("expect `<i> <j> <cost>`"));
                        }
                        &tokens[0..3]
                    };
                    let mut i = fields[0].parse::<usize>().map_err(|_| parse_error("invalid node index"))?;
                    let mut j = fields[1].parse::<usize>().map_err(|_| parse_error("invalid node index"))?;
                    let cost = fields[2].parse::<Cost>().map_err(|_| parse_error("invalid cost"))?;
                    if dimacs {
                        if i == 0 || j == 0 {
                            return Err(parse_error("DIMACS node indices start from 1"));
                        }
                        i -= 1;
                        j -= 1;
                    }
                    if i >= node_num || j >= node_num {
                        return Err(parse_error("node index out of range"));
                    }
                    weighted_edges.push((i, j, cost));
                }
            }
        }
        let (node_num, edge_num, _) = header.ok_or(MatchingError::Parse {
            line: 0,
            message: "missing header".to_string(),
        })?;
        if weighted_edges.len() != edge_num {
            return Err(MatchingError::Parse {
                line: 0,
                message: format!("header declares {} edges but {} found", edge_num, weighted_edges.len()),
            });
        }
        Ok(Self::new(node_num, weighted_edges))
    }

    pub fn load_edge_list(filename: &str) -> Result<Self, MatchingError> {
        let mut file = File::open(filename)?;
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        Self::parse_edge_list(&content)
    }

    /// format 0 is the DIMACS form, any other value writes the bare 0-indexed form
    pub fn to_edge_list(&self, format: usize) -> String {
        let mut content = String::new();
        if format == 0 {
            content.push_str(&format!("p edge {} {}\n", self.node_num, self.weighted_edges.len()));
            for &(i, j, cost) in self.weighted_edges.iter() {
                content.push_str(&format!("e {} {} {}\n", i + 1, j + 1, cost));
            }
        } else {
            content.push_str(&format!("{} {}\n", self.node_num, self.weighted_edges.len()));
            for &(i, j, cost) in self.weighted_edges.iter() {
                content.push_str(&format!("{} {} {}\n", i, j, cost));
            }
        }
        content
    }

    pub fn save_edge_list(&self, filename: &str, format: usize) -> Result<(), MatchingError> {
        let mut file = File::create(filename)?;
        file.write_all(self.to_edge_list(format).as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

pub type DeterministicRng = rand_xoshiro::Xoshiro256StarStar;

pub trait F64Rng {
    fn next_f64(&mut self) -> f64;
}

impl F64Rng for DeterministicRng {
    fn next_f64(&mut self) -> f64 {
        f64::from_bits(0x3FF << 52 | self.next_u64() >> 12) - 1.
    }
}

/// record the solving time of multiple graphs
pub struct BenchmarkProfiler {
    /// each record corresponds to a different graph
    pub records: Vec<BenchmarkProfilerEntry>,
    /// summation of all solving time
    pub sum_round_time: f64,
    /// summation of the node numbers
    pub sum_node_num: usize,
    /// the file to output the profiler results
    pub benchmark_profiler_output: Option<File>,
}

pub struct BenchmarkProfilerEntry {
    /// the number of nodes of the solved graph
    pub node_num: NodeNum,
    /// the time of beginning a solving procedure
    begin_time: Option<Instant>,
    /// interval between calling [`BenchmarkProfiler::begin`] and [`BenchmarkProfiler::end`]
    pub round_time: Option<f64>,
}

impl BenchmarkProfiler {
    pub fn new(output_filename: Option<String>) -> Result<Self, MatchingError> {
        let benchmark_profiler_output = match output_filename {
            Some(filename) => Some(File::create(filename)?),
            None => None,
        };
        Ok(Self {
            records: vec![],
            sum_round_time: 0.,
            sum_node_num: 0,
            benchmark_profiler_output,
        })
    }

    /// record the beginning of a solving procedure
    pub fn begin(&mut self, node_num: NodeNum) {
        if let Some(last_entry) = self.records.last() {
            assert!(last_entry.round_time.is_some(), "call `begin` and `end` in pairs");
        }
        self.records.push(BenchmarkProfilerEntry {
            node_num,
            begin_time: Some(Instant::now()),
            round_time: None,
        });
    }

    /// record the ending of a solving procedure, optionally with a solver report
    pub fn end(&mut self, report: Option<serde_json::Value>) -> Result<(), MatchingError> {
        let last_entry = self.records.last_mut().expect("last entry not exists, call `begin` before `end`");
        let begin_time = last_entry.begin_time.take().expect("entry already ended");
        let round_time = begin_time.elapsed().as_secs_f64();
        last_entry.round_time = Some(round_time);
        self.sum_round_time += round_time;
        self.sum_node_num += last_entry.node_num;
        if let Some(file) = self.benchmark_profiler_output.as_mut() {
            let mut value = json!({
                "round_time": round_time,
                "node_num": last_entry.node_num,
            });
            if let Some(report) = report {
                value.as_object_mut().unwrap().insert("solver_profile".to_string(), report);
            }
            file.write_all(value.to_string().as_bytes())?;
            file.write_all(b"\n")?;
        }
        Ok(())
    }

    /// print out a brief one-line statistics
    pub fn brief(&self) -> String {
        let total = self.sum_round_time / (self.records.len() as f64);
        let per_node = self.sum_round_time / (self.sum_node_num as f64);
        format!("total: {total:.3e}, node: {per_node:.3e},")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand_xoshiro::rand_core::SeedableRng;

    #[test]
    fn util_edge_list_dimacs() {
        // cargo test util_edge_list_dimacs -- --nocapture
        let content = "c a comment line\np edge 4 3\ne 1 2 10\ne 3 4 7\ne 1 4 3\n";
        let initializer = GraphInitializer::parse_edge_list(content).unwrap();
        assert_eq!(initializer.node_num, 4);
        assert_eq!(initializer.weighted_edges.len(), 3);
        assert_eq!(initializer.weighted_edges[0].0, 0);
        assert_eq!(initializer.weighted_edges[2].1, 3);
        assert_eq!(initializer.weighted_edges[1].2, 7 as Cost);
        let written = initializer.to_edge_list(0);
        assert_eq!(GraphInitializer::parse_edge_list(&written).unwrap(), initializer);
        let bare = initializer.to_edge_list(1);
        assert!(bare.starts_with("4 3\n0 1 10\n"));
        assert_eq!(GraphInitializer::parse_edge_list(&bare).unwrap(), initializer);
    }

    #[test]
    fn util_edge_list_errors() {
        // cargo test util_edge_list_errors -- --nocapture
        assert!(matches!(GraphInitializer::parse_edge_list(""), Err(MatchingError::Parse { .. })));
        let out_of_range = "p edge 2 1\ne 1 3 1\n";
        assert!(matches!(
            GraphInitializer::parse_edge_list(out_of_range),
            Err(MatchingError::Parse { line: 2, .. })
        ));
        let missing = "p edge 2 2\ne 1 2 1\n";
        assert!(GraphInitializer::parse_edge_list(missing).is_err());
    }

    #[test]
    fn util_deterministic_rng() {
        // cargo test util_deterministic_rng -- --nocapture
        let mut rng_1 = DeterministicRng::seed_from_u64(123);
        let mut rng_2 = DeterministicRng::seed_from_u64(123);
        for _ in 0..100 {
            let value = rng_1.next_f64();
            assert!((0. ..1.).contains(&value));
            assert_eq!(value, rng_2.next_f64());
        }
    }
}
