//! Sequence graph: an arena of sequence-bearing nodes joined by weighted,
//! directed edges.
//!
//! Nodes are addressed by a dense [`NodeId`] (their index in the arena).
//! Each node keeps both its outgoing and incoming edges so traversal works in
//! either direction without searching. The graph is immutable once built and
//! is shared read-only between alignment workers.

mod packed;
mod text;

pub use packed::{PackedSequence, PackedSequenceError};
pub use text::{read_graph, write_graph};

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::types::AlignmentPath;

/// Dense node identifier (index into the graph arena).
pub type NodeId = u32;

/// Errors raised while building or parsing a graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Two nodes share a name.
    #[error("duplicate node name '{name}'")]
    DuplicateNode {
        /// Offending name.
        name: String,
    },

    /// An edge references a node name that was never defined.
    #[error("edge references unknown node '{name}'")]
    UnknownNode {
        /// Name that could not be resolved.
        name: String,
    },

    /// An edge references a node id outside the arena.
    #[error("edge references unknown node id {id}")]
    UnknownNodeId {
        /// Identifier that could not be resolved.
        id: NodeId,
    },

    /// Edge weight is not a probability.
    #[error("edge {from} -> {to} has weight {weight} outside [0, 1]")]
    InvalidWeight {
        /// Source node id.
        from: NodeId,
        /// Destination node id.
        to: NodeId,
        /// Rejected weight.
        weight: f32,
    },

    /// Node sequence holds a character outside `ACGTN`.
    #[error("node '{node}' has unsupported base '{base}' at position {position}")]
    InvalidBase {
        /// Node name.
        node: String,
        /// Offending character.
        base: char,
        /// Offset within the node.
        position: usize,
    },

    /// Node without sequence.
    #[error("node '{name}' has an empty sequence")]
    EmptyNode {
        /// Node name.
        name: String,
    },

    /// Malformed line in the graph text format.
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// Packing failure bubbling up from [`PackedSequence`].
    #[error("packing error: {0}")]
    Packing(#[from] PackedSequenceError),

    /// I/O failure while reading a graph.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Directed, weighted edge between two nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Source node.
    pub from: NodeId,
    /// Destination node.
    pub to: NodeId,
    /// Relative likelihood of the transition, in `[0, 1]`.
    pub weight: f32,
}

/// Sequence-bearing graph node.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    name: String,
    info: Option<String>,
    sequence: Vec<u8>,
    packed: PackedSequence,
    next: Vec<Edge>,
    prev: Vec<Edge>,
}

impl Node {
    /// Dense identifier.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variant annotation from the node header, if any.
    pub fn info(&self) -> Option<&str> {
        self.info.as_deref()
    }

    /// Uppercase ASCII sequence.
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Two-bit packed copy of the sequence.
    pub fn packed(&self) -> &PackedSequence {
        &self.packed
    }

    /// Sequence length.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Whether the node holds no bases (never true for a built graph).
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Outgoing edges in insertion order.
    pub fn next(&self) -> &[Edge] {
        &self.next
    }

    /// Incoming edges in insertion order.
    pub fn prev(&self) -> &[Edge] {
        &self.prev
    }
}

/// Immutable sequence graph.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
    names: FxHashMap<String, NodeId>,
    edge_count: usize,
}

impl Graph {
    /// Start building a graph.
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    /// Parse a graph in the text format from any buffered reader.
    pub fn read<R: BufRead>(reader: R) -> Result<Self, GraphError> {
        read_graph(reader)
    }

    /// Parse a graph from a file in the graph text format.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, GraphError> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of directed edges.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Total number of bases over all nodes.
    pub fn total_bases(&self) -> usize {
        self.nodes.iter().map(Node::len).sum()
    }

    /// Node by id.
    ///
    /// # Panics
    /// Panics if `id` is not a node of this graph.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    /// Node by id, if present.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize)
    }

    /// Resolve a node name.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Whether an edge `from -> to` exists.
    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.get(from)
            .map(|node| node.next.iter().any(|edge| edge.to == to))
            .unwrap_or(false)
    }

    /// BLAKE3 digest over node names, sequences and edges.
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for node in &self.nodes {
            hasher.update(&node.id.to_le_bytes());
            hasher.update(node.name.as_bytes());
            hasher.update(&[0]);
            hasher.update(&node.sequence);
            hasher.update(&[0]);
            for edge in &node.next {
                hasher.update(&edge.to.to_le_bytes());
                hasher.update(&edge.weight.to_bits().to_le_bytes());
            }
        }
        hasher.finalize()
    }
}

/// Reconstruct the target bases covered by `path`.
///
/// Returns `None` when a node is missing, consecutive nodes are not joined by
/// an edge, or the offsets fall outside their nodes.
pub fn path_sequence(graph: &Graph, path: &AlignmentPath) -> Option<Vec<u8>> {
    let (first, last) = match (path.nodes.first(), path.nodes.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return Some(Vec::new()),
    };

    for pair in path.nodes.windows(2) {
        if !graph.has_edge(pair[0], pair[1]) {
            return None;
        }
    }

    if path.nodes.len() == 1 {
        let seq = graph.get(first)?.sequence();
        return (path.start <= path.end && path.end <= seq.len())
            .then(|| seq[path.start..path.end].to_vec());
    }

    let head = graph.get(first)?.sequence();
    let tail = graph.get(last)?.sequence();
    if path.start > head.len() || path.end > tail.len() {
        return None;
    }

    let mut out = head[path.start..].to_vec();
    for &middle in &path.nodes[1..path.nodes.len() - 1] {
        out.extend_from_slice(graph.get(middle)?.sequence());
    }
    out.extend_from_slice(&tail[..path.end]);
    Some(out)
}

#[derive(Debug, Clone)]
struct PendingNode {
    name: String,
    info: Option<String>,
    sequence: Vec<u8>,
}

/// Incremental graph constructor.
///
/// Nodes receive ids in insertion order. Edges are validated on insertion and
/// wired into both endpoints when [`build`](Self::build) runs, which also
/// computes the packed sequence caches.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    nodes: Vec<PendingNode>,
    names: FxHashMap<String, NodeId>,
    edges: Vec<Edge>,
}

impl GraphBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its id.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        sequence: &[u8],
    ) -> Result<NodeId, GraphError> {
        self.add_node_with_info(name, None, sequence)
    }

    /// Add a node carrying variant annotation.
    pub fn add_node_with_info(
        &mut self,
        name: impl Into<String>,
        info: Option<String>,
        sequence: &[u8],
    ) -> Result<NodeId, GraphError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(GraphError::DuplicateNode { name });
        }

        let mut clean = Vec::with_capacity(sequence.len());
        for (position, &base) in sequence.iter().enumerate() {
            let upper = base.to_ascii_uppercase();
            if !matches!(upper, b'A' | b'C' | b'G' | b'T' | b'N') {
                return Err(GraphError::InvalidBase {
                    node: name,
                    base: base as char,
                    position,
                });
            }
            clean.push(upper);
        }

        let id = self.nodes.len() as NodeId;
        self.names.insert(name.clone(), id);
        self.nodes.push(PendingNode {
            name,
            info,
            sequence: clean,
        });
        Ok(id)
    }

    /// Append bases to an existing node (used while streaming node bodies).
    pub fn extend_node(&mut self, id: NodeId, sequence: &[u8]) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(id as usize)
            .ok_or(GraphError::UnknownNodeId { id })?;
        let offset = node.sequence.len();
        for (idx, &base) in sequence.iter().enumerate() {
            let upper = base.to_ascii_uppercase();
            if !matches!(upper, b'A' | b'C' | b'G' | b'T' | b'N') {
                return Err(GraphError::InvalidBase {
                    node: node.name.clone(),
                    base: base as char,
                    position: offset + idx,
                });
            }
            node.sequence.push(upper);
        }
        Ok(())
    }

    /// Resolve a name added earlier.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Add a directed edge.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, weight: f32) -> Result<(), GraphError> {
        for id in [from, to] {
            if id as usize >= self.nodes.len() {
                return Err(GraphError::UnknownNodeId { id });
            }
        }
        if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
            return Err(GraphError::InvalidWeight { from, to, weight });
        }
        self.edges.push(Edge { from, to, weight });
        Ok(())
    }

    /// Finish construction.
    pub fn build(self) -> Result<Graph, GraphError> {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (idx, pending) in self.nodes.into_iter().enumerate() {
            if pending.sequence.is_empty() {
                return Err(GraphError::EmptyNode { name: pending.name });
            }
            let packed = PackedSequence::pack(&pending.sequence)?;
            nodes.push(Node {
                id: idx as NodeId,
                name: pending.name,
                info: pending.info,
                sequence: pending.sequence,
                packed,
                next: Vec::new(),
                prev: Vec::new(),
            });
        }

        let edge_count = self.edges.len();
        for edge in self.edges {
            nodes[edge.from as usize].next.push(edge);
            nodes[edge.to as usize].prev.push(edge);
        }

        Ok(Graph {
            nodes,
            names: self.names,
            edge_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> Graph {
        let mut builder = Graph::builder();
        let a = builder.add_node("a", b"ACGT").unwrap();
        let b = builder.add_node("b", b"GG").unwrap();
        let c = builder.add_node("c", b"TT").unwrap();
        let d = builder.add_node("d", b"CAT").unwrap();
        builder.add_edge(a, b, 0.5).unwrap();
        builder.add_edge(a, c, 0.5).unwrap();
        builder.add_edge(b, d, 1.0).unwrap();
        builder.add_edge(c, d, 1.0).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn edges_are_mirrored_on_both_endpoints() {
        let graph = diamond();
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.node(0).next().len(), 2);
        assert_eq!(graph.node(3).prev().len(), 2);
        assert!(graph.has_edge(0, 1));
        assert!(!graph.has_edge(1, 0));
        assert_eq!(graph.node_id("d"), Some(3));
    }

    #[test]
    fn builder_rejects_bad_input() {
        let mut builder = Graph::builder();
        builder.add_node("x", b"ACGT").unwrap();
        assert!(matches!(
            builder.add_node("x", b"A"),
            Err(GraphError::DuplicateNode { .. })
        ));
        assert!(matches!(
            builder.add_node("y", b"ACQ"),
            Err(GraphError::InvalidBase { position: 2, .. })
        ));
        assert!(matches!(
            builder.add_edge(0, 9, 1.0),
            Err(GraphError::UnknownNodeId { id: 9 })
        ));
        assert!(matches!(
            builder.add_edge(0, 0, 1.5),
            Err(GraphError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn empty_node_fails_build() {
        let mut builder = Graph::builder();
        builder.add_node("empty", b"").unwrap();
        assert!(matches!(builder.build(), Err(GraphError::EmptyNode { .. })));
    }

    #[test]
    fn path_sequence_spans_nodes() {
        let graph = diamond();
        let path = AlignmentPath::new(vec![0, 2, 3], 2, 2);
        assert_eq!(path_sequence(&graph, &path), Some(b"GTTTCA".to_vec()));

        let single = AlignmentPath::new(vec![0], 1, 3);
        assert_eq!(path_sequence(&graph, &single), Some(b"CG".to_vec()));

        let broken = AlignmentPath::new(vec![1, 2], 0, 1);
        assert_eq!(path_sequence(&graph, &broken), None);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let first = diamond();
        let second = diamond();
        assert_eq!(first.fingerprint(), second.fingerprint());

        let mut builder = Graph::builder();
        builder.add_node("a", b"ACGA").unwrap();
        let other = builder.build().unwrap();
        assert_ne!(first.fingerprint(), other.fingerprint());
    }
}
