//! Visualizer
//!
//! This module records the state of the solver as a sequence of JSON snapshots, which helps to debug
//! the blossom structure and the duals step by step
//!

use crate::serde_json;
use std::fs::File;
use std::io::{Write, Seek, SeekFrom};
use std::path::Path;
use crate::chrono::Local;

pub trait MatchingVisualizer {
    /// take a snapshot, set `abbrev` to true to save space
    fn snapshot(&self, abbrev: bool) -> serde_json::Value;
}

#[derive(Debug)]
pub struct Visualizer {
    /// save to file if applicable
    file: Option<File>,
    /// all snapshots
    snapshots: Vec<(String, serde_json::Value)>,
}

impl Visualizer {
    /// create a new visualizer writing to `filename`, or keeping snapshots in memory only
    pub fn new(mut filename: Option<String>) -> std::io::Result<Self> {
        if cfg!(feature = "disable_visualizer") {
            filename = None;  // do not open file
        }
        let file = match filename {
            Some(filename) => {
                if let Some(folder) = Path::new(&filename).parent() {
                    std::fs::create_dir_all(folder)?;
                }
                Some(File::create(filename)?)
            }
            None => None,
        };
        Ok(Self {
            file,
            snapshots: Vec::new(),
        })
    }

    /// append another snapshot and rewrite the whole file, so that it stays valid even if the program stops
    pub fn snapshot(&mut self, name: String, matching: &impl MatchingVisualizer) -> std::io::Result<()> {
        if cfg!(feature = "disable_visualizer") {
            return Ok(())
        }
        let abbrev = true;
        let value = matching.snapshot(abbrev);
        self.snapshots.push((name, value));
        self.save()?;
        Ok(())
    }

    pub fn snapshot_num(&self) -> usize {
        self.snapshots.len()
    }

    /// save to file
    pub fn save(&mut self) -> std::io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.set_len(0)?;  // truncate the file
            file.seek(SeekFrom::Start(0))?;  // move the cursor to the front
            file.write_all(json!({
                "snapshots": &self.snapshots,
            }).to_string().as_bytes())?;
            file.sync_all()?;
        }
        Ok(())
    }
}

const DEFAULT_VISUALIZE_DATA_FOLDER: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/visualize/data/");

pub fn visualize_data_folder() -> String {
    DEFAULT_VISUALIZE_DATA_FOLDER.to_string()
}

pub fn auto_visualize_data_filename() -> String {
    format!("{}.json", Local::now().format("%Y%m%d-%H-%M-%S%.3f"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perfect_matching::*;
    use crate::util::*;

    #[test]
    fn visualize_solver_snapshots() {  // cargo test visualize_solver_snapshots -- --nocapture
        let filename = std::env::temp_dir().join("blossom_matching_visualize").join(auto_visualize_data_filename());
        let filename = filename.to_str().unwrap().to_string();
        let mut visualizer = Visualizer::new(Some(filename.clone())).unwrap();
        let weighted_edges = [(0, 1, 2), (1, 2, 2), (2, 0, 2), (2, 3, 7)];
        let mut matching = PerfectMatching::new(4, weighted_edges.len()).unwrap();
        for &(i, j, cost) in weighted_edges.iter() {
            matching.add_edge(i, j, cost as Cost).unwrap();
        }
        visualizer.snapshot(format!("initial"), &matching).unwrap();
        matching.solve().unwrap();
        visualizer.snapshot(format!("solved"), &matching).unwrap();
        if cfg!(feature = "disable_visualizer") {
            return
        }
        assert_eq!(visualizer.snapshot_num(), 2);
        let content = std::fs::read_to_string(&filename).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        let snapshots = value["snapshots"].as_array().unwrap();
        assert_eq!(snapshots[0][0], json!("initial"));
        let solved = &snapshots[1][1];
        assert_eq!(solved["node_num"], json!(4));
        assert_eq!(solved["edges"].as_array().unwrap().len(), 4);
        assert_eq!(solved["nodes"][3]["m"], json!(2));
    }
}
