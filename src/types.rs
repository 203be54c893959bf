//! Reads, CIGAR operations, graph paths and the alignment records built from them.

use std::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::graph::NodeId;

/// Orientation of a read relative to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Strand {
    /// Read aligns as given.
    Forward,
    /// Reverse complement of the read aligns.
    Reverse,
}

impl Strand {
    /// Both strands, forward first.
    pub const BOTH: [Strand; 2] = [Strand::Forward, Strand::Reverse];

    /// `+` or `-`.
    pub fn symbol(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }

    /// Whether this is the reverse strand.
    pub fn is_reverse(self) -> bool {
        self == Strand::Reverse
    }
}

/// Sequencing read as delivered by the read source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    /// Read name (without the leading `@`).
    pub name: String,
    /// Bases as uppercase ASCII.
    pub sequence: Vec<u8>,
    /// Phred+33 quality string, same length as `sequence`.
    pub qualities: Vec<u8>,
}

impl Read {
    /// Construct a read, uppercasing the bases.
    pub fn new(name: impl Into<String>, sequence: &[u8], qualities: &[u8]) -> Self {
        Self {
            name: name.into(),
            sequence: sequence.to_ascii_uppercase(),
            qualities: qualities.to_vec(),
        }
    }

    /// Read length.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Whether the read has no bases.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// CIGAR-like operation kinds describing how a read aligns to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum CigarOpKind {
    /// Read and graph bases are identical (`=`).
    Match,
    /// Read and graph bases differ (`X`).
    Mismatch,
    /// Insertion relative to the graph (`I`).
    Insertion,
    /// Deletion relative to the graph (`D`).
    Deletion,
    /// Read bases left unaligned at either end (`S`).
    SoftClip,
}

impl CigarOpKind {
    /// Single-character code.
    pub fn symbol(self) -> char {
        match self {
            CigarOpKind::Match => '=',
            CigarOpKind::Mismatch => 'X',
            CigarOpKind::Insertion => 'I',
            CigarOpKind::Deletion => 'D',
            CigarOpKind::SoftClip => 'S',
        }
    }

    /// Whether the operation consumes read bases.
    pub fn consumes_query(self) -> bool {
        !matches!(self, CigarOpKind::Deletion)
    }

    /// Whether the operation consumes graph bases.
    pub fn consumes_target(self) -> bool {
        matches!(
            self,
            CigarOpKind::Match | CigarOpKind::Mismatch | CigarOpKind::Deletion
        )
    }
}

/// CIGAR operation with length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CigarOp {
    /// Operation kind.
    pub kind: CigarOpKind,
    /// Number of bases affected by the operation.
    pub len: u32,
}

impl CigarOp {
    /// Construct a new CIGAR operation.
    pub fn new(kind: CigarOpKind, len: u32) -> Self {
        Self { kind, len }
    }
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len, self.kind.symbol())
    }
}

/// Append `len` bases of `kind`, merging with the previous operation when it
/// has the same kind. Zero-length operations are dropped.
pub fn push_op(ops: &mut Vec<CigarOp>, kind: CigarOpKind, len: u32) {
    if len == 0 {
        return;
    }
    match ops.last_mut() {
        Some(last) if last.kind == kind => last.len += len,
        _ => ops.push(CigarOp::new(kind, len)),
    }
}

/// Append every operation of `other`, merging at the seam.
pub fn extend_ops(ops: &mut Vec<CigarOp>, other: &[CigarOp]) {
    for op in other {
        push_op(ops, op.kind, op.len);
    }
}

/// Render operations as text (`*` when empty).
pub fn cigar_string(ops: &[CigarOp]) -> String {
    if ops.is_empty() {
        return "*".to_string();
    }
    ops.iter().map(CigarOp::to_string).collect()
}

/// Ordered graph nodes an alignment traverses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct AlignmentPath {
    /// Visited node ids, in traversal order.
    pub nodes: Vec<NodeId>,
    /// Offset into the first node where the alignment starts.
    pub start: usize,
    /// Offset (exclusive) into the last node where the alignment ends.
    pub end: usize,
}

impl AlignmentPath {
    /// Construct a path.
    pub fn new(nodes: Vec<NodeId>, start: usize, end: usize) -> Self {
        Self { nodes, start, end }
    }

    /// Whether the path visits no node.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Display for AlignmentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nodes.is_empty() {
            return write!(f, "*");
        }
        write!(f, "{}:", self.start)?;
        for (idx, node) in self.nodes.iter().enumerate() {
            if idx > 0 {
                write!(f, ">")?;
            }
            write!(f, "{node}")?;
        }
        write!(f, ":{}", self.end)
    }
}

/// Best alignment of one read.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct AlignmentRecord {
    /// Read name.
    pub name: String,
    /// Aligned orientation.
    pub strand: Strand,
    /// First aligned read base (in aligned orientation).
    pub query_start: usize,
    /// One past the last aligned read base (in aligned orientation).
    pub query_end: usize,
    /// Graph path of the alignment (empty when unmapped).
    pub path: AlignmentPath,
    /// Alignment operations including soft clips.
    pub cigar: Vec<CigarOp>,
    /// Alignment score.
    pub score: i64,
    /// Phred-scaled mapping quality.
    pub mapq: u8,
    /// Read bases in aligned orientation.
    pub sequence: Vec<u8>,
    /// Phred+33 qualities in aligned orientation.
    pub qualities: Vec<u8>,
    /// Free-form `TAG:TYPE:VALUE` annotations.
    pub notes: Vec<String>,
}

impl AlignmentRecord {
    /// Record for a read that could not be placed.
    pub fn unmapped(read: &Read) -> Self {
        Self {
            name: read.name.clone(),
            strand: Strand::Forward,
            query_start: 0,
            query_end: 0,
            path: AlignmentPath::default(),
            cigar: Vec::new(),
            score: 0,
            mapq: 0,
            sequence: read.sequence.clone(),
            qualities: read.qualities.clone(),
            notes: Vec::new(),
        }
    }

    /// Whether the read was placed on the graph.
    pub fn is_mapped(&self) -> bool {
        !self.path.is_empty()
    }

    /// Number of read bases consumed by non-clip operations.
    pub fn aligned_query_len(&self) -> usize {
        self.query_end - self.query_start
    }

    /// Number of graph bases covered by the operations.
    pub fn target_len(&self) -> usize {
        self.cigar
            .iter()
            .filter(|op| op.kind.consumes_target())
            .map(|op| op.len as usize)
            .sum()
    }

    /// Count of mismatching bases.
    pub fn mismatches(&self) -> usize {
        self.cigar
            .iter()
            .filter(|op| op.kind == CigarOpKind::Mismatch)
            .map(|op| op.len as usize)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_op_merges_and_skips_empty() {
        let mut ops = Vec::new();
        push_op(&mut ops, CigarOpKind::Match, 3);
        push_op(&mut ops, CigarOpKind::Match, 2);
        push_op(&mut ops, CigarOpKind::Insertion, 0);
        push_op(&mut ops, CigarOpKind::Mismatch, 1);
        assert_eq!(cigar_string(&ops), "5=1X");
        assert_eq!(cigar_string(&[]), "*");
    }

    #[test]
    fn path_display_lists_offsets_and_nodes() {
        let path = AlignmentPath::new(vec![1, 2, 4], 3, 7);
        assert_eq!(path.to_string(), "3:1>2>4:7");
        assert_eq!(AlignmentPath::default().to_string(), "*");
    }

    #[test]
    fn record_metrics_follow_cigar() {
        let read = Read::new("r", b"acgt", b"IIII");
        assert_eq!(read.sequence, b"ACGT".to_vec());
        let mut record = AlignmentRecord::unmapped(&read);
        assert!(!record.is_mapped());
        record.cigar = vec![
            CigarOp::new(CigarOpKind::SoftClip, 1),
            CigarOp::new(CigarOpKind::Match, 2),
            CigarOp::new(CigarOpKind::Deletion, 1),
            CigarOp::new(CigarOpKind::Mismatch, 1),
        ];
        assert_eq!(record.target_len(), 4);
        assert_eq!(record.mismatches(), 1);
    }
}
