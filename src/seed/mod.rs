//! Exact-match seeds between a read and the graph.
//!
//! All chains of a read share one flat segment vector; a [`SeedChain`] is a
//! strand, a total length and a contiguous range into that vector. The
//! buffer is reset, not reallocated, between reads.

mod finder;
mod rank;

pub use finder::{find_seeds, SeedScratch};
pub use rank::{rank_chains, seed_could_be_better};

use crate::graph::NodeId;
use crate::types::Strand;

/// One exact-match run inside a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeedSegment {
    /// Node holding the matched bases.
    pub node: NodeId,
    /// Offset of the first matched base within the node.
    pub target_start: u32,
    /// Offset of the first matched base within the (strand-oriented) read.
    pub query_start: u32,
    /// Number of matched bases.
    pub len: u32,
}

impl SeedSegment {
    /// One past the last matched node base.
    pub fn target_end(&self) -> u32 {
        self.target_start + self.len
    }

    /// One past the last matched read base.
    pub fn query_end(&self) -> u32 {
        self.query_start + self.len
    }

    /// Target minus query offset; constant along an ungapped match.
    pub fn diagonal(&self) -> i64 {
        self.target_start as i64 - self.query_start as i64
    }
}

/// Exact match possibly crossing node boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedChain {
    /// Read orientation the chain was found on.
    pub strand: Strand,
    /// Sum of segment lengths.
    pub total_len: u32,
    start: u32,
    count: u32,
}

impl SeedChain {
    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.count as usize
    }
}

/// Flat storage for the seed chains of one read.
#[derive(Debug, Clone, Default)]
pub struct SeedBuffer {
    segments: Vec<SeedSegment>,
    chains: Vec<SeedChain>,
}

impl SeedBuffer {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all chains, keeping allocations.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.chains.clear();
    }

    /// Append a chain made of `segments` (in graph order).
    pub fn push_chain(&mut self, strand: Strand, segments: &[SeedSegment]) {
        let start = self.segments.len() as u32;
        let total_len = segments.iter().map(|seg| seg.len).sum();
        self.segments.extend_from_slice(segments);
        self.chains.push(SeedChain {
            strand,
            total_len,
            start,
            count: segments.len() as u32,
        });
    }

    /// Chains in their current order.
    pub fn chains(&self) -> &[SeedChain] {
        &self.chains
    }

    /// Number of chains.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Whether no chain was found.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Bytes currently reserved.
    pub fn reserved_bytes(&self) -> usize {
        self.segments.capacity() * std::mem::size_of::<SeedSegment>()
            + self.chains.capacity() * std::mem::size_of::<SeedChain>()
    }

    /// Segments of `chain`, in graph order.
    pub fn segments_of(&self, chain: &SeedChain) -> &[SeedSegment] {
        let start = chain.start as usize;
        &self.segments[start..start + chain.count as usize]
    }

    /// Whether an existing chain on `strand` already covers read offset
    /// `query` at node offset `target` on the same diagonal.
    pub fn covers(&self, strand: Strand, node: NodeId, target: u32, query: u32) -> bool {
        let diagonal = target as i64 - query as i64;
        self.chains
            .iter()
            .filter(|chain| chain.strand == strand)
            .flat_map(|chain| self.segments_of(chain))
            .any(|seg| {
                seg.node == node
                    && seg.diagonal() == diagonal
                    && seg.query_start <= query
                    && query < seg.query_end()
            })
    }

    pub(crate) fn sort_chains_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&SeedChain, &[SeedSegment], &SeedChain, &[SeedSegment]) -> std::cmp::Ordering,
    {
        let segments = &self.segments;
        self.chains.sort_by(|a, b| {
            let a_segs = &segments[a.start as usize..(a.start + a.count) as usize];
            let b_segs = &segments[b.start as usize..(b.start + b.count) as usize];
            compare(a, a_segs, b, b_segs)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(node: NodeId, target_start: u32, query_start: u32, len: u32) -> SeedSegment {
        SeedSegment {
            node,
            target_start,
            query_start,
            len,
        }
    }

    #[test]
    fn chains_share_flat_storage() {
        let mut buffer = SeedBuffer::new();
        buffer.push_chain(Strand::Forward, &[seg(0, 2, 0, 4), seg(1, 0, 4, 3)]);
        buffer.push_chain(Strand::Reverse, &[seg(5, 1, 1, 6)]);
        assert_eq!(buffer.len(), 2);
        let first = buffer.chains()[0];
        assert_eq!(first.total_len, 7);
        assert_eq!(first.segment_count(), 2);
        assert_eq!(buffer.segments_of(&first)[1].node, 1);
        assert_eq!(buffer.segments_of(&buffer.chains()[1])[0].len, 6);

        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn covers_checks_strand_node_and_diagonal() {
        let mut buffer = SeedBuffer::new();
        buffer.push_chain(Strand::Forward, &[seg(3, 10, 2, 8)]);
        assert!(buffer.covers(Strand::Forward, 3, 12, 4));
        assert!(!buffer.covers(Strand::Forward, 3, 13, 4));
        assert!(!buffer.covers(Strand::Reverse, 3, 12, 4));
        assert!(!buffer.covers(Strand::Forward, 3, 20, 12));
    }
}
