//! Errors
//!
//! Every failure a caller can trigger through the public interface; internal invariant violations are
//! guarded by debug assertions instead.
//!

use crate::util::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchingError {
    #[error("# of nodes is odd ({0}): perfect matching cannot exist")]
    OddNodeCount(NodeNum),
    #[error("wrong node id's ({i}, {j}) with {node_num} nodes")]
    InvalidEdge { i: NodeIndex, j: NodeIndex, node_num: NodeNum },
    #[error("unknown edge {0}")]
    UnknownEdge(EdgeIndex),
    #[error("unknown node {0}")]
    UnknownNode(NodeIndex),
    #[error("{0} can only be used with floating point cost, disable feature `integer_cost`")]
    RequiresFloatingCost(&'static str),
    #[error("graph has no perfect matching")]
    NoPerfectMatching,
    #[error("dual updates stalled without reaching a perfect matching")]
    NoProgress,
    #[error("solve must be called before querying the solution")]
    NotSolved,
    #[error("the graph was already solved, call start_update first")]
    NotUpdating,
    #[error("save cannot be called after solve")]
    AlreadySolved,
    #[error("io error: {0}")]
    Io(String),
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("complementary slackness violated at edge {edge} (reduced cost {slack})")]
    ComplementarySlackness { edge: EdgeIndex, slack: Cost },
    #[error("blossom structure inconsistent: {0}")]
    BlossomStructure(String),
    #[error("edge list passed to match_pairs is empty")]
    EmptyEdges,
    #[error("odd number of nodes ({0}), run make_even first to remove the worst node")]
    OddPairNodes(usize),
    #[error("an even number of nodes could not be found by removing a single node")]
    CannotMakeEven,
}

impl MatchingError {
    /// the numeric code of an optimality check failure: 1 for violated slackness, 2 for a bad blossom tree
    pub fn check_code(&self) -> Option<i32> {
        match self {
            Self::ComplementarySlackness { .. } => Some(1),
            Self::BlossomStructure(_) => Some(2),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MatchingError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_error_messages() {
        // cargo test matching_error_messages -- --nocapture
        let err = MatchingError::OddNodeCount(5);
        assert_eq!(err.to_string(), "# of nodes is odd (5): perfect matching cannot exist");
        let err = MatchingError::InvalidEdge { i: 2, j: 2, node_num: 4 };
        assert!(err.to_string().contains("(2, 2)"));
        assert_eq!(MatchingError::BlossomStructure("x".to_string()).check_code(), Some(2));
        assert_eq!(MatchingError::NoProgress.check_code(), None);
        let io: MatchingError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(io, MatchingError::Io(_)));
    }
}
