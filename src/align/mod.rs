//! Seed-and-extend alignment of reads against the graph.
//!
//! The per-read flow is: precompute k-mer windows, collect and rank seed
//! chains, extend the most promising chains with banded DP in both
//! directions, and assemble the best candidate into an
//! [`AlignmentRecord`](crate::types::AlignmentRecord).

mod aligner;
mod assemble;
mod dp;
mod extend;
mod scoring;
mod scratch;

pub use aligner::{AlignerError, GraphAligner};
pub use assemble::{mapping_quality, Candidate, MAX_MAPQ};
pub use dp::{DpMatrix, DpResult};
pub use extend::{extend_left, extend_right, ExtendScratch, Extension, ExtensionLimits};
pub use scoring::ScoreMatrix;
pub use scratch::{Scratch, ScratchUsage};

use thiserror::Error;

use crate::graph::NodeId;

/// How read ends are treated during extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum AlignMode {
    /// Extensions may stop anywhere; unaligned read ends are soft-clipped.
    #[default]
    Local,
    /// Extensions must consume the read to its ends; the graph end is free.
    Global,
}

impl std::str::FromStr for AlignMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(AlignMode::Local),
            "global" => Ok(AlignMode::Global),
            other => Err(format!("unknown alignment mode '{other}'")),
        }
    }
}

/// Failure while aligning a single read.
///
/// These indicate a graph or index inconsistency rather than a bad read; the
/// pipeline reports the read unmapped and keeps going.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlignError {
    /// Traversal reached a node without bases.
    #[error("node {node} has no bases")]
    EmptyNode {
        /// Offending node.
        node: NodeId,
    },

    /// An index hit whose bases do not agree with the read.
    #[error("index hit at node {node} offset {offset} disagrees with read offset {query}")]
    InconsistentSeed {
        /// Node of the hit.
        node: NodeId,
        /// Offset of the hit within the node.
        offset: usize,
        /// Read offset of the window.
        query: usize,
    },

    /// Seed chain without segments.
    #[error("seed chain has no segments")]
    EmptyChain,

    /// Assembled path with consecutive nodes that share no edge.
    #[error("alignment path steps from node {from} to {to} without an edge")]
    DisconnectedPath {
        /// Source node.
        from: NodeId,
        /// Target node.
        to: NodeId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Local".parse::<AlignMode>(), Ok(AlignMode::Local));
        assert_eq!("GLOBAL".parse::<AlignMode>(), Ok(AlignMode::Global));
        assert!("semi".parse::<AlignMode>().is_err());
        assert_eq!(AlignMode::default(), AlignMode::Local);
    }
}
