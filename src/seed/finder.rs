use tracing::trace;

use crate::align::AlignError;
use crate::graph::{Graph, NodeId};
use crate::kmer::{bases_match, KmerIndex, KmerWindows, Location};
use crate::seed::{SeedBuffer, SeedSegment};
use crate::types::Strand;

/// Reusable buffers for seed finding.
#[derive(Debug, Default, Clone)]
pub struct SeedScratch {
    windows: KmerWindows,
    buffer: SeedBuffer,
    left: BranchSet,
    right: BranchSet,
    path: Vec<SeedSegment>,
    chain: Vec<SeedSegment>,
    right_stack: Vec<RightFrame>,
    left_stack: Vec<LeftFrame>,
}

impl SeedScratch {
    /// Empty scratch space.
    pub fn new() -> Self {
        Self::default()
    }

    /// Windows of the last read passed to [`find_seeds`].
    pub fn windows(&self) -> &KmerWindows {
        &self.windows
    }

    /// Chains found for the last read.
    pub fn buffer(&self) -> &SeedBuffer {
        &self.buffer
    }

    /// Mutable access to the chains, for ranking.
    pub fn buffer_mut(&mut self) -> &mut SeedBuffer {
        &mut self.buffer
    }

    /// Bytes currently reserved by the scratch buffers.
    pub fn reserved_bytes(&self) -> usize {
        use std::mem::size_of;
        self.windows.reserved_bytes()
            + self.buffer.reserved_bytes()
            + (self.path.capacity() + self.chain.capacity()) * size_of::<SeedSegment>()
            + self.left.reserved_bytes()
            + self.right.reserved_bytes()
            + self.right_stack.capacity() * size_of::<RightFrame>()
            + self.left_stack.capacity() * size_of::<LeftFrame>()
    }
}

/// Alternative extensions of one seed hit in one direction, stored flat.
#[derive(Debug, Default, Clone)]
struct BranchSet {
    segments: Vec<SeedSegment>,
    ranges: Vec<(usize, usize)>,
}

impl BranchSet {
    fn clear(&mut self) {
        self.segments.clear();
        self.ranges.clear();
    }

    fn push(&mut self, path: &[SeedSegment]) {
        let start = self.segments.len();
        self.segments.extend_from_slice(path);
        self.ranges.push((start, self.segments.len()));
    }

    fn len(&self) -> usize {
        self.ranges.len()
    }

    fn get(&self, idx: usize) -> &[SeedSegment] {
        let (start, end) = self.ranges[idx];
        &self.segments[start..end]
    }

    fn reserved_bytes(&self) -> usize {
        self.segments.capacity() * std::mem::size_of::<SeedSegment>()
            + self.ranges.capacity() * std::mem::size_of::<(usize, usize)>()
    }
}

#[derive(Debug, Clone, Copy)]
struct RightFrame {
    node: NodeId,
    target: u32,
    query: u32,
    depth: usize,
}

#[derive(Debug, Clone, Copy)]
struct LeftFrame {
    node: NodeId,
    target_end: u32,
    query_end: u32,
    depth: usize,
}

/// Collect every maximal exact-match chain of `read` (both strands) that
/// contains an indexed k-mer.
///
/// Each index hit is grown base by base in both directions, following every
/// edge whose first (or last) base continues the match. Left and right
/// alternatives are combined pairwise, at most `max_branches` chains per
/// hit. Hits already lying on a chain of the same strand and diagonal are
/// skipped. Results are left in [`SeedScratch::buffer`].
pub fn find_seeds(
    graph: &Graph,
    index: &KmerIndex,
    read: &[u8],
    max_branches: usize,
    scratch: &mut SeedScratch,
) -> Result<(), AlignError> {
    let SeedScratch {
        windows,
        buffer,
        left,
        right,
        path,
        chain,
        right_stack,
        left_stack,
    } = scratch;

    windows.load(read, index.k());
    buffer.clear();
    let cap = max_branches.max(1);

    for strand in Strand::BOTH {
        let seq = match strand {
            Strand::Forward => read,
            Strand::Reverse => windows.reverse_sequence(),
        };
        for offset in 0..windows.len() {
            let Some(key) = windows.key(strand, offset) else {
                continue;
            };
            for hit in index.lookup(key) {
                let query = offset as u32;
                if buffer.covers(strand, hit.node, hit.offset, query) {
                    continue;
                }
                check_hit(graph, hit, offset)?;

                grow_right(graph, seq, hit, query, cap, path, right_stack, right)?;
                grow_left(graph, seq, hit, query, cap, path, left_stack, left)?;

                let mut produced = 0;
                'combine: for l in 0..left.len() {
                    let left_path = left.get(l);
                    for r in 0..right.len() {
                        let right_path = right.get(r);
                        join_branches(left_path, right_path, chain);
                        buffer.push_chain(strand, chain);
                        produced += 1;
                        if produced >= cap {
                            break 'combine;
                        }
                    }
                }
            }
        }
    }

    trace!(chains = buffer.len(), "seed chains collected");
    Ok(())
}

fn check_hit(graph: &Graph, hit: Location, query: usize) -> Result<(), AlignError> {
    match graph.get(hit.node) {
        Some(node) if (hit.offset as usize) < node.len() => Ok(()),
        _ => Err(AlignError::InconsistentSeed {
            node: hit.node,
            offset: hit.offset as usize,
            query,
        }),
    }
}

/// Reverse the left alternative, fuse the two halves at the hit node and
/// append the right alternative.
fn join_branches(left: &[SeedSegment], right: &[SeedSegment], out: &mut Vec<SeedSegment>) {
    out.clear();
    out.extend(left[1..].iter().rev().copied());
    let (head, tail) = (left[0], right[0]);
    out.push(SeedSegment {
        node: tail.node,
        target_start: tail.target_start - head.len,
        query_start: tail.query_start - head.len,
        len: head.len + tail.len,
    });
    out.extend_from_slice(&right[1..]);
}

#[allow(clippy::too_many_arguments)]
fn grow_right(
    graph: &Graph,
    seq: &[u8],
    hit: Location,
    query: u32,
    cap: usize,
    path: &mut Vec<SeedSegment>,
    stack: &mut Vec<RightFrame>,
    out: &mut BranchSet,
) -> Result<(), AlignError> {
    out.clear();
    path.clear();
    stack.clear();
    stack.push(RightFrame {
        node: hit.node,
        target: hit.offset,
        query,
        depth: 0,
    });

    while let Some(frame) = stack.pop() {
        path.truncate(frame.depth);
        let node = graph.node(frame.node);
        let bases = node.sequence();
        let run = bases[frame.target as usize..]
            .iter()
            .zip(&seq[frame.query as usize..])
            .take_while(|&(&t, &q)| bases_match(q, t))
            .count() as u32;
        if run == 0 {
            return Err(AlignError::InconsistentSeed {
                node: frame.node,
                offset: frame.target as usize,
                query: frame.query as usize,
            });
        }
        path.push(SeedSegment {
            node: frame.node,
            target_start: frame.target,
            query_start: frame.query,
            len: run,
        });

        let target_end = (frame.target + run) as usize;
        let query_end = (frame.query + run) as usize;
        let mut continued = false;
        if target_end == bases.len() && query_end < seq.len() {
            let wanted = seq[query_end];
            for edge in node.next().iter().rev() {
                let first = graph
                    .node(edge.to)
                    .sequence()
                    .first()
                    .copied()
                    .ok_or(AlignError::EmptyNode { node: edge.to })?;
                if bases_match(wanted, first) {
                    stack.push(RightFrame {
                        node: edge.to,
                        target: 0,
                        query: query_end as u32,
                        depth: path.len(),
                    });
                    continued = true;
                }
            }
        }

        if !continued {
            out.push(path);
            if out.len() >= cap {
                trace!(node = hit.node, "right seed branches capped");
                break;
            }
        }
    }
    Ok(())
}

/// Like [`grow_right`], but walking predecessors. The first segment of every
/// alternative is the (possibly empty) part of the hit node left of the hit.
#[allow(clippy::too_many_arguments)]
fn grow_left(
    graph: &Graph,
    seq: &[u8],
    hit: Location,
    query: u32,
    cap: usize,
    path: &mut Vec<SeedSegment>,
    stack: &mut Vec<LeftFrame>,
    out: &mut BranchSet,
) -> Result<(), AlignError> {
    out.clear();
    path.clear();
    stack.clear();
    stack.push(LeftFrame {
        node: hit.node,
        target_end: hit.offset,
        query_end: query,
        depth: 0,
    });

    while let Some(frame) = stack.pop() {
        path.truncate(frame.depth);
        let node = graph.node(frame.node);
        let bases = &node.sequence()[..frame.target_end as usize];
        let run = bases
            .iter()
            .rev()
            .zip(seq[..frame.query_end as usize].iter().rev())
            .take_while(|&(&t, &q)| bases_match(q, t))
            .count() as u32;
        let target_start = frame.target_end - run;
        let query_start = frame.query_end - run;
        path.push(SeedSegment {
            node: frame.node,
            target_start,
            query_start,
            len: run,
        });

        let mut continued = false;
        if target_start == 0 && query_start > 0 {
            let wanted = seq[query_start as usize - 1];
            for edge in node.prev().iter().rev() {
                let prev = graph.node(edge.from);
                let last = prev
                    .sequence()
                    .last()
                    .copied()
                    .ok_or(AlignError::EmptyNode { node: edge.from })?;
                if bases_match(wanted, last) {
                    stack.push(LeftFrame {
                        node: edge.from,
                        target_end: prev.len() as u32,
                        query_end: query_start,
                        depth: path.len(),
                    });
                    continued = true;
                }
            }
        }

        if !continued {
            out.push(path);
            if out.len() >= cap {
                trace!(node = hit.node, "left seed branches capped");
                break;
            }
        }
    }
    Ok(())
}
