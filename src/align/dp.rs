//! Anchored banded dynamic programming.
//!
//! Both sequences start at offset zero (the seed boundary); only the end of
//! the alignment is searched for. Rows follow the target, columns the query,
//! and only cells within `band` of the main diagonal are evaluated.

use crate::align::{AlignMode, ScoreMatrix};
use crate::kmer::bases_match;
use crate::types::{push_op, CigarOp, CigarOpKind};

const NEG_INF: i64 = i64::MIN / 4;

const FROM_NONE: u8 = 0;
const FROM_DIAG: u8 = 1;
const FROM_INS: u8 = 2;
const FROM_DEL: u8 = 3;

/// Outcome of one anchored alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DpResult {
    /// Alignment score.
    pub score: i64,
    /// Target bases consumed from the anchor.
    pub target_len: usize,
    /// Query bases consumed from the anchor.
    pub query_len: usize,
}

/// Score and traceback storage, reused across alignments.
#[derive(Debug, Default, Clone)]
pub struct DpMatrix {
    scores: Vec<i64>,
    trace: Vec<u8>,
    band: usize,
    width: usize,
}

impl DpMatrix {
    /// Empty matrix; storage grows on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently reserved.
    pub fn reserved_bytes(&self) -> usize {
        self.scores.capacity() * std::mem::size_of::<i64>() + self.trace.capacity()
    }

    #[inline]
    fn cell(&self, i: usize, j: usize) -> usize {
        i * self.width + (j + self.band - i)
    }

    #[inline]
    fn get(&self, i: usize, j: usize) -> i64 {
        if i.abs_diff(j) > self.band {
            NEG_INF
        } else {
            self.scores[self.cell(i, j)]
        }
    }

    /// Align `query` against `target`, both anchored at offset zero, writing
    /// the run-length encoded operations into `ops`.
    ///
    /// In [`AlignMode::Local`] the end is the best-scoring cell (first in
    /// row-major order on ties; the empty alignment scores zero). In
    /// [`AlignMode::Global`] the whole query is consumed and the end is the
    /// best cell of the last column, smallest target length on ties; if the
    /// band never reaches that column, the remaining query is inserted.
    ///
    /// Ties between predecessors prefer the diagonal, then insertion, then
    /// deletion.
    pub fn align(
        &mut self,
        target: &[u8],
        query: &[u8],
        scoring: &ScoreMatrix,
        band: usize,
        mode: AlignMode,
        ops: &mut Vec<CigarOp>,
    ) -> DpResult {
        let rows = target.len() + 1;
        let qn = query.len();
        self.band = band;
        self.width = 2 * band + 1;
        self.scores.clear();
        self.scores.resize(rows * self.width, NEG_INF);
        self.trace.clear();
        self.trace.resize(rows * self.width, FROM_NONE);

        let gap = scoring.gap();
        let mut local_best = (0i64, 0usize, 0usize);

        for i in 0..rows {
            let lo = i.saturating_sub(band);
            let hi = (i + band).min(qn);
            if lo > hi {
                break;
            }
            for j in lo..=hi {
                let idx = self.cell(i, j);
                if i == 0 && j == 0 {
                    self.scores[idx] = 0;
                    continue;
                }

                let mut score = NEG_INF;
                let mut from = FROM_NONE;
                if i > 0 && j > 0 {
                    let diag = self.get(i - 1, j - 1);
                    if diag > NEG_INF {
                        score = diag + scoring.score(query[j - 1], target[i - 1]);
                        from = FROM_DIAG;
                    }
                }
                if j > 0 {
                    let left = self.get(i, j - 1);
                    if left > NEG_INF && left + gap > score {
                        score = left + gap;
                        from = FROM_INS;
                    }
                }
                if i > 0 {
                    let up = self.get(i - 1, j);
                    if up > NEG_INF && up + gap > score {
                        score = up + gap;
                        from = FROM_DEL;
                    }
                }

                self.scores[idx] = score;
                self.trace[idx] = from;
                if from != FROM_NONE && score > local_best.0 {
                    local_best = (score, i, j);
                }
            }
        }

        let (score, end_i, end_j, trailing) = match mode {
            AlignMode::Local => (local_best.0, local_best.1, local_best.2, 0),
            AlignMode::Global => self.global_end(rows, qn, gap),
        };

        self.traceback(target, query, end_i, end_j, ops);
        push_op(ops, CigarOpKind::Insertion, trailing as u32);

        DpResult {
            score,
            target_len: end_i,
            query_len: end_j + trailing,
        }
    }

    /// Best end consuming the whole query: `(score, row, column, trailing
    /// insertions)`.
    fn global_end(&self, rows: usize, qn: usize, gap: i64) -> (i64, usize, usize, usize) {
        let mut best: Option<(i64, usize)> = None;
        for i in qn.saturating_sub(self.band)..rows.min(qn + self.band + 1) {
            let score = self.get(i, qn);
            if score > NEG_INF && best.map_or(true, |(b, _)| score > b) {
                best = Some((score, i));
            }
        }
        if let Some((score, i)) = best {
            return (score, i, qn, 0);
        }

        // The target ran out before the band reached the last column.
        let mut fallback = (NEG_INF, 0, 0, qn);
        for i in 0..rows {
            let lo = i.saturating_sub(self.band);
            let hi = (i + self.band).min(qn);
            for j in lo..=hi {
                let score = self.get(i, j);
                if score <= NEG_INF {
                    continue;
                }
                let total = score + (qn - j) as i64 * gap;
                if total > fallback.0 {
                    fallback = (total, i, j, qn - j);
                }
            }
        }
        fallback
    }

    fn traceback(
        &self,
        target: &[u8],
        query: &[u8],
        end_i: usize,
        end_j: usize,
        ops: &mut Vec<CigarOp>,
    ) {
        ops.clear();
        let (mut i, mut j) = (end_i, end_j);
        while i > 0 || j > 0 {
            match self.trace[self.cell(i, j)] {
                FROM_DIAG => {
                    let kind = if bases_match(query[j - 1], target[i - 1]) {
                        CigarOpKind::Match
                    } else {
                        CigarOpKind::Mismatch
                    };
                    push_op(ops, kind, 1);
                    i -= 1;
                    j -= 1;
                }
                FROM_INS => {
                    push_op(ops, CigarOpKind::Insertion, 1);
                    j -= 1;
                }
                FROM_DEL => {
                    push_op(ops, CigarOpKind::Deletion, 1);
                    i -= 1;
                }
                _ => break,
            }
        }
        ops.reverse();
    }
}
