//! Graph-aware extension of a seed into the unaligned read ends.
//!
//! Target bases are gathered by a depth-first walk from the anchor, one node
//! at a time, until the budget (`query.len() + target_slack`) is met or the
//! graph ends. Every such leaf path is aligned with the anchored banded DP and
//! the best-scoring path is kept; ties keep the first path found.

use tracing::trace;

use crate::align::dp::{DpMatrix, DpResult};
use crate::align::{AlignError, AlignMode, ScoreMatrix};
use crate::graph::{Graph, NodeId};
use crate::types::CigarOp;

/// Knobs shared by every extension of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionLimits {
    /// DP band.
    pub band: usize,
    /// Extra target bases gathered beyond the query length.
    pub target_slack: usize,
    /// Maximum leaf paths aligned per extension.
    pub max_branches: usize,
    /// Local or global end handling.
    pub mode: AlignMode,
}

/// Best alignment of one read end against the graph.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extension {
    /// Operations in graph order.
    pub ops: Vec<CigarOp>,
    /// DP score.
    pub score: i64,
    /// Read bases consumed.
    pub query_len: usize,
    /// Graph bases consumed.
    pub target_len: usize,
    /// Nodes entered beyond the anchor, in graph order.
    pub nodes: Vec<NodeId>,
    /// For a right extension, the end offset (exclusive) in the last node
    /// reached; for a left extension, the start offset in the first node.
    pub offset: usize,
    /// Leaf paths that were aligned.
    pub branches: usize,
}

impl Extension {
    fn empty(offset: usize) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    node: NodeId,
    /// Right: first base to take. Left: one past the last base to take.
    offset: usize,
    target_len: usize,
    depth: usize,
}

/// Reusable buffers for extension.
#[derive(Debug, Default, Clone)]
pub struct ExtendScratch {
    dp: DpMatrix,
    target: Vec<u8>,
    query: Vec<u8>,
    entries: Vec<(NodeId, usize)>,
    best_entries: Vec<(NodeId, usize)>,
    stack: Vec<Frame>,
    ops: Vec<CigarOp>,
    best_ops: Vec<CigarOp>,
}

impl ExtendScratch {
    /// Empty scratch space.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently reserved.
    pub fn reserved_bytes(&self) -> usize {
        use std::mem::size_of;
        self.dp.reserved_bytes()
            + self.target.capacity()
            + self.query.capacity()
            + (self.entries.capacity() + self.best_entries.capacity())
                * size_of::<(NodeId, usize)>()
            + self.stack.capacity() * size_of::<Frame>()
            + (self.ops.capacity() + self.best_ops.capacity()) * size_of::<CigarOp>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Right,
    Left,
}

/// Align `query` (the read suffix after a seed) against the graph starting
/// at `offset` in `anchor`.
pub fn extend_right(
    graph: &Graph,
    anchor: NodeId,
    offset: usize,
    query: &[u8],
    scoring: &ScoreMatrix,
    limits: &ExtensionLimits,
    scratch: &mut ExtendScratch,
) -> Result<Extension, AlignError> {
    if query.is_empty() {
        return Ok(Extension::empty(offset));
    }
    scratch.query.clear();
    scratch.query.extend_from_slice(query);
    extend(graph, anchor, offset, scoring, limits, scratch, Direction::Right)
}

/// Align `query` (the read prefix before a seed) against the graph ending
/// just before `offset` in `anchor`, walking predecessors.
pub fn extend_left(
    graph: &Graph,
    anchor: NodeId,
    offset: usize,
    query: &[u8],
    scoring: &ScoreMatrix,
    limits: &ExtensionLimits,
    scratch: &mut ExtendScratch,
) -> Result<Extension, AlignError> {
    if query.is_empty() {
        return Ok(Extension::empty(offset));
    }
    scratch.query.clear();
    scratch.query.extend(query.iter().rev());
    extend(graph, anchor, offset, scoring, limits, scratch, Direction::Left)
}

fn extend(
    graph: &Graph,
    anchor: NodeId,
    offset: usize,
    scoring: &ScoreMatrix,
    limits: &ExtensionLimits,
    scratch: &mut ExtendScratch,
    direction: Direction,
) -> Result<Extension, AlignError> {
    let ExtendScratch {
        dp,
        target,
        query,
        entries,
        best_entries,
        stack,
        ops,
        best_ops,
    } = scratch;

    let budget = query.len() + limits.target_slack;
    target.clear();
    entries.clear();
    stack.clear();
    stack.push(Frame {
        node: anchor,
        offset,
        target_len: 0,
        depth: 0,
    });

    let mut best: Option<DpResult> = None;
    let mut leaves = 0;

    while let Some(frame) = stack.pop() {
        target.truncate(frame.target_len);
        entries.truncate(frame.depth);
        let node = graph.node(frame.node);
        if frame.depth > 0 && node.is_empty() {
            return Err(AlignError::EmptyNode { node: frame.node });
        }
        entries.push((frame.node, frame.target_len));

        let bases = node.sequence();
        let edges = match direction {
            Direction::Right => {
                let take = (budget - target.len()).min(bases.len() - frame.offset);
                target.extend_from_slice(&bases[frame.offset..frame.offset + take]);
                node.next()
            }
            Direction::Left => {
                let take = (budget - target.len()).min(frame.offset);
                target.extend(bases[frame.offset - take..frame.offset].iter().rev());
                node.prev()
            }
        };

        if target.len() < budget && !edges.is_empty() {
            for edge in edges.iter().rev() {
                let (next, next_offset) = match direction {
                    Direction::Right => (edge.to, 0),
                    Direction::Left => (edge.from, graph.node(edge.from).len()),
                };
                stack.push(Frame {
                    node: next,
                    offset: next_offset,
                    target_len: target.len(),
                    depth: entries.len(),
                });
            }
            continue;
        }

        leaves += 1;
        let result = dp.align(target, query, scoring, limits.band, limits.mode, ops);
        if best.map_or(true, |b| result.score > b.score) {
            best = Some(result);
            std::mem::swap(ops, best_ops);
            best_entries.clear();
            best_entries.extend(
                entries[1..]
                    .iter()
                    .copied()
                    .filter(|&(_, start)| start < result.target_len),
            );
        }
        if leaves >= limits.max_branches {
            trace!(anchor, leaves, "extension branches capped");
            break;
        }
    }

    let Some(best) = best else {
        return Ok(Extension::empty(offset));
    };

    let mut nodes: Vec<NodeId> = best_entries.iter().map(|&(node, _)| node).collect();
    let mut out_ops = best_ops.clone();
    let end = match (direction, best_entries.last()) {
        (Direction::Right, Some(&(_, start))) => best.target_len - start,
        (Direction::Right, None) => offset + best.target_len,
        (Direction::Left, Some(&(node, start))) => {
            graph.node(node).len() - (best.target_len - start)
        }
        (Direction::Left, None) => offset - best.target_len,
    };
    if direction == Direction::Left {
        nodes.reverse();
        out_ops.reverse();
    }

    Ok(Extension {
        ops: out_ops,
        score: best.score,
        query_len: best.query_len,
        target_len: best.target_len,
        nodes,
        offset: end,
        branches: leaves,
    })
}
