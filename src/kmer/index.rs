use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::graph::{Graph, NodeId};
use crate::kmer::{MAX_KMER_LEN, MIN_KMER_LEN};

/// Error type returned by k-mer index construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// K-mer length outside the supported range.
    #[error("k-mer length {k} outside [2, 32]")]
    InvalidKmerLength {
        /// Rejected length.
        k: usize,
    },

    /// Stride of zero.
    #[error("index step must be greater than zero")]
    InvalidStep,

    /// Spanning-key cap of zero.
    #[error("spanning k-mer cap must be greater than zero")]
    InvalidSpanningCap,
}

/// Spanning keys collected per start position unless configured otherwise.
pub const DEFAULT_MAX_SPANNING: usize = 1024;

/// Graph position of an indexed k-mer: node and offset of its first base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    /// Node holding the first base.
    pub node: NodeId,
    /// Offset of the first base within the node.
    pub offset: u32,
}

impl Location {
    /// Pack into `(node << 32) | offset`.
    #[inline]
    pub fn pack(self) -> u64 {
        ((self.node as u64) << 32) | self.offset as u64
    }

    /// Inverse of [`pack`](Self::pack).
    #[inline]
    pub fn unpack(packed: u64) -> Self {
        Self {
            node: (packed >> 32) as NodeId,
            offset: packed as u32,
        }
    }
}

/// Summary counters for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    /// K-mer length.
    pub k: usize,
    /// Stride between indexed windows.
    pub step: usize,
    /// Distinct keys.
    pub keys: usize,
    /// Stored locations.
    pub locations: usize,
    /// Locations whose k-mer crosses at least one edge.
    pub spanning: usize,
    /// Start positions whose spanning keys hit the cap.
    pub capped: usize,
}

/// Hash index from k-mer keys to graph locations.
#[derive(Debug, Clone)]
pub struct KmerIndex {
    k: usize,
    step: usize,
    table: FxHashMap<u64, Vec<u64>>,
    locations: usize,
    spanning: usize,
    capped: usize,
    fingerprint: blake3::Hash,
}

#[derive(Debug, Clone, Copy)]
struct SpanFrame {
    node: NodeId,
    key: u64,
    need: usize,
}

impl KmerIndex {
    /// Index every `step`-th window of every node.
    ///
    /// Windows that run past the end of their node are completed with bases
    /// from each successor in turn, so one start position can contribute
    /// several keys. Windows covering an ambiguous base are skipped.
    pub fn build(graph: &Graph, k: usize, step: usize) -> Result<Self, IndexError> {
        Self::build_with_limit(graph, k, step, DEFAULT_MAX_SPANNING)
    }

    /// Like [`build`](Self::build), keeping at most `max_spanning` spanning
    /// keys per start position. Dense runs of small bubbles otherwise grow
    /// the key count exponentially in `k`.
    pub fn build_with_limit(
        graph: &Graph,
        k: usize,
        step: usize,
        max_spanning: usize,
    ) -> Result<Self, IndexError> {
        if !(MIN_KMER_LEN..=MAX_KMER_LEN).contains(&k) {
            return Err(IndexError::InvalidKmerLength { k });
        }
        if step == 0 {
            return Err(IndexError::InvalidStep);
        }
        if max_spanning == 0 {
            return Err(IndexError::InvalidSpanningCap);
        }

        let mut index = Self {
            k,
            step,
            table: FxHashMap::default(),
            locations: 0,
            spanning: 0,
            capped: 0,
            fingerprint: graph.fingerprint(),
        };
        let mut stack = Vec::new();
        let mut spanning_keys = Vec::new();

        for node in graph.nodes() {
            let packed = node.packed();
            let len = node.len();
            for pos in (0..len).step_by(step) {
                let location = Location {
                    node: node.id(),
                    offset: pos as u32,
                };
                if pos + k <= len {
                    if let Some(key) = packed.kmer_at(pos, k) {
                        index.insert(key, location);
                    }
                    continue;
                }

                let tail = len - pos;
                let Some(key) = packed.kmer_at(pos, tail) else {
                    continue;
                };
                spanning_keys.clear();
                stack.clear();
                stack.push(SpanFrame {
                    node: node.id(),
                    key,
                    need: k - tail,
                });
                if !collect_spanning(graph, &mut stack, &mut spanning_keys, max_spanning) {
                    trace!(node = node.id(), offset = pos, "spanning k-mers capped");
                    index.capped += 1;
                }
                spanning_keys.sort_unstable();
                spanning_keys.dedup();
                for &key in &spanning_keys {
                    index.insert(key, location);
                    index.spanning += 1;
                }
            }
        }

        info!(
            k,
            step,
            keys = index.table.len(),
            locations = index.locations,
            spanning = index.spanning,
            "k-mer index built"
        );
        if index.capped > 0 {
            warn!(
                positions = index.capped,
                max_spanning, "spanning k-mers truncated at dense branching"
            );
        }
        Ok(index)
    }

    fn insert(&mut self, key: u64, location: Location) {
        self.table.entry(key).or_default().push(location.pack());
        self.locations += 1;
    }

    /// K-mer length.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Fingerprint of the graph the index was built from.
    pub fn graph_fingerprint(&self) -> blake3::Hash {
        self.fingerprint
    }

    /// Stride used when indexing.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Locations of `key`, in indexing order.
    pub fn lookup(&self, key: u64) -> impl Iterator<Item = Location> + '_ {
        self.table
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&packed| Location::unpack(packed))
    }

    /// Number of locations stored for `key`.
    pub fn hit_count(&self, key: u64) -> usize {
        self.table.get(&key).map(Vec::len).unwrap_or(0)
    }

    /// Counters describing the index.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            k: self.k,
            step: self.step,
            keys: self.table.len(),
            locations: self.locations,
            spanning: self.spanning,
            capped: self.capped,
        }
    }
}

/// Walk successors of the frames on `stack` until each branch has gathered
/// `need` more bases, pushing every completed key into `out`. Returns `false`
/// when `cap` keys were collected before the walk finished.
fn collect_spanning(
    graph: &Graph,
    stack: &mut Vec<SpanFrame>,
    out: &mut Vec<u64>,
    cap: usize,
) -> bool {
    while let Some(frame) = stack.pop() {
        for edge in graph.node(frame.node).next() {
            let next = graph.node(edge.to);
            let take = frame.need.min(next.len());
            if take == 0 {
                continue;
            }
            let Some(part) = next.packed().kmer_at(0, take) else {
                debug!(node = edge.to, "spanning k-mer blocked by ambiguous base");
                continue;
            };
            let key = (frame.key << (2 * take)) | part;
            let need = frame.need - take;
            if need == 0 {
                if out.len() >= cap {
                    return false;
                }
                out.push(key);
            } else {
                stack.push(SpanFrame {
                    node: edge.to,
                    key,
                    need,
                });
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::encode_kmer;

    fn branching_graph() -> Graph {
        let mut builder = Graph::builder();
        let a = builder.add_node("a", b"ACGTAC").unwrap();
        let b = builder.add_node("b", b"GGG").unwrap();
        let c = builder.add_node("c", b"TTT").unwrap();
        builder.add_edge(a, b, 0.5).unwrap();
        builder.add_edge(a, c, 0.5).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn rejects_invalid_configuration() {
        let graph = branching_graph();
        assert_eq!(
            KmerIndex::build(&graph, 1, 1).unwrap_err(),
            IndexError::InvalidKmerLength { k: 1 }
        );
        assert_eq!(
            KmerIndex::build(&graph, 33, 1).unwrap_err(),
            IndexError::InvalidKmerLength { k: 33 }
        );
        assert_eq!(
            KmerIndex::build(&graph, 4, 0).unwrap_err(),
            IndexError::InvalidStep
        );
    }

    #[test]
    fn spanning_kmers_are_indexed_per_branch() {
        let graph = branching_graph();
        let index = KmerIndex::build(&graph, 4, 1).unwrap();

        let via_b: Vec<_> = index.lookup(encode_kmer(b"TACG").unwrap()).collect();
        assert_eq!(via_b, vec![Location { node: 0, offset: 3 }]);

        let into_b = encode_kmer(b"ACGG").unwrap();
        let into_c = encode_kmer(b"ACTT").unwrap();
        assert_eq!(index.lookup(into_b).next(), Some(Location { node: 0, offset: 4 }));
        assert_eq!(index.lookup(into_c).next(), Some(Location { node: 0, offset: 4 }));
    }

    #[test]
    fn dead_end_tails_contribute_nothing() {
        let graph = branching_graph();
        let index = KmerIndex::build(&graph, 4, 1).unwrap();
        // "b" and "c" are shorter than k and have no successors.
        assert_eq!(index.hit_count(encode_kmer(b"GGGA").unwrap()), 0);
        assert!(index
            .lookup(encode_kmer(b"GGGG").unwrap())
            .all(|loc| loc.node != 1));
        let stats = index.stats();
        assert_eq!(stats.keys, stats.locations);
        assert_eq!(stats.spanning, 6);
    }

    #[test]
    fn step_controls_indexed_offsets() {
        let mut builder = Graph::builder();
        builder.add_node("solo", b"ACGTACGTAC").unwrap();
        let graph = builder.build().unwrap();
        let index = KmerIndex::build(&graph, 4, 3).unwrap();
        // Offsets 0, 3, 6 are complete windows; 9 is a dead-end tail.
        assert_eq!(index.stats().locations, 3);
        assert_eq!(
            index.lookup(encode_kmer(b"TACG").unwrap()).collect::<Vec<_>>(),
            vec![Location { node: 0, offset: 3 }]
        );
    }

    /// `head`, then `bubbles` single-base bubbles, then `tail`.
    fn bubble_chain(bubbles: usize) -> Graph {
        let mut builder = Graph::builder();
        let mut previous = builder.add_node("head", b"ACGT").unwrap();
        for idx in 0..bubbles {
            let a = builder.add_node(format!("a{idx}"), b"C").unwrap();
            let g = builder.add_node(format!("g{idx}"), b"G").unwrap();
            let join = builder.add_node(format!("j{idx}"), b"T").unwrap();
            builder.add_edge(previous, a, 0.5).unwrap();
            builder.add_edge(previous, g, 0.5).unwrap();
            builder.add_edge(a, join, 1.0).unwrap();
            builder.add_edge(g, join, 1.0).unwrap();
            previous = join;
        }
        let tail = builder.add_node("tail", b"ACGTACGT").unwrap();
        builder.add_edge(previous, tail, 1.0).unwrap();
        builder.build().unwrap()
    }

    fn locations_at(index: &KmerIndex, node: NodeId, offset: u32) -> usize {
        let wanted = Location { node, offset }.pack();
        index
            .table
            .values()
            .flat_map(|locs| locs.iter())
            .filter(|&&loc| loc == wanted)
            .count()
    }

    #[test]
    fn spanning_keys_are_capped_per_start_position() {
        let graph = bubble_chain(6);
        let full = KmerIndex::build(&graph, 16, 1).unwrap();
        // 4 head bases + 6 bubbles of 2 bases + 0 tail bases span 16 bases.
        assert_eq!(locations_at(&full, 0, 0), 64);
        assert_eq!(full.stats().capped, 0);

        let capped = KmerIndex::build_with_limit(&graph, 16, 1, 8).unwrap();
        assert_eq!(locations_at(&capped, 0, 0), 8);
        assert!(capped.stats().capped > 0);
        assert!(capped.stats().spanning < full.stats().spanning);
        assert_eq!(
            KmerIndex::build_with_limit(&graph, 16, 1, 0).unwrap_err(),
            IndexError::InvalidSpanningCap
        );
    }

    #[test]
    fn index_remembers_its_graph() {
        let graph = branching_graph();
        let index = KmerIndex::build(&graph, 4, 1).unwrap();
        assert_eq!(index.graph_fingerprint(), graph.fingerprint());
        assert_ne!(index.graph_fingerprint(), bubble_chain(1).fingerprint());
    }

    #[test]
    fn location_packing_roundtrips() {
        let loc = Location {
            node: 123_456,
            offset: 7_890,
        };
        assert_eq!(Location::unpack(loc.pack()), loc);
    }
}
