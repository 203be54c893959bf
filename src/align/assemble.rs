//! Joining left extension, seed and right extension into one alignment.

use crate::align::{AlignError, Extension, ScoreMatrix};
use crate::graph::{Graph, NodeId};
use crate::kmer::reverse_complement;
use crate::seed::SeedSegment;
use crate::types::{
    extend_ops, push_op, AlignmentPath, AlignmentRecord, CigarOp, CigarOpKind, Read, Strand,
};

/// Mapping quality of an alignment with no competing locus.
pub const MAX_MAPQ: u8 = 60;

/// Phred-like mapping quality from the best score and the best score found
/// at a different locus.
pub fn mapping_quality(best: i64, second: Option<i64>) -> u8 {
    let Some(second) = second else {
        return MAX_MAPQ;
    };
    if best <= 0 {
        return 0;
    }
    let scaled = MAX_MAPQ as i64 * (best - second) / best;
    scaled.clamp(0, MAX_MAPQ as i64) as u8
}

/// One fully extended seed chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Orientation of the read.
    pub strand: Strand,
    /// Left, seed and right scores summed.
    pub score: i64,
    /// First aligned base of the oriented read.
    pub query_start: usize,
    /// One past the last aligned base of the oriented read.
    pub query_end: usize,
    /// Traversed graph path.
    pub path: AlignmentPath,
    /// Operations of the aligned part, without clips.
    pub ops: Vec<CigarOp>,
}

impl Candidate {
    /// Combine a seed chain with its two extensions.
    ///
    /// `read` is the read in the chain's orientation. Fails when two
    /// consecutive path nodes are not joined by an edge.
    pub fn assemble(
        graph: &Graph,
        strand: Strand,
        read: &[u8],
        segments: &[SeedSegment],
        left: &Extension,
        right: &Extension,
        scoring: &ScoreMatrix,
    ) -> Result<Self, AlignError> {
        let (Some(first), Some(last)) = (segments.first(), segments.last()) else {
            return Err(AlignError::EmptyChain);
        };

        let seed_query = first.query_start as usize..last.query_end() as usize;
        let seed_score: i64 = read[seed_query.clone()]
            .iter()
            .map(|&base| scoring.match_score(base))
            .sum();

        let mut nodes =
            Vec::with_capacity(left.nodes.len() + segments.len() + right.nodes.len());
        nodes.extend_from_slice(&left.nodes);
        nodes.extend(segments.iter().map(|seg| seg.node));
        nodes.extend_from_slice(&right.nodes);
        check_connected(graph, &nodes)?;

        let mut ops = Vec::with_capacity(left.ops.len() + right.ops.len() + 1);
        extend_ops(&mut ops, &left.ops);
        push_op(&mut ops, CigarOpKind::Match, seed_query.len() as u32);
        extend_ops(&mut ops, &right.ops);

        Ok(Self {
            strand,
            score: left.score + seed_score + right.score,
            query_start: seed_query.start - left.query_len,
            query_end: seed_query.end + right.query_len,
            path: AlignmentPath::new(nodes, left.offset, right.offset),
            ops,
        })
    }

    /// Strand, first node and start offset. Candidates sharing a locus are
    /// the same placement.
    pub fn locus(&self) -> (Strand, Option<NodeId>, usize) {
        (self.strand, self.path.nodes.first().copied(), self.path.start)
    }

    /// Final record for `read`, adding soft clips and orienting the read.
    pub fn into_record(self, read: &Read, second: Option<i64>) -> AlignmentRecord {
        let read_len = read.len();
        let mut cigar = Vec::with_capacity(self.ops.len() + 2);
        push_op(&mut cigar, CigarOpKind::SoftClip, self.query_start as u32);
        extend_ops(&mut cigar, &self.ops);
        push_op(
            &mut cigar,
            CigarOpKind::SoftClip,
            read_len.saturating_sub(self.query_end) as u32,
        );

        let (sequence, qualities) = match self.strand {
            Strand::Forward => (read.sequence.clone(), read.qualities.clone()),
            Strand::Reverse => (
                reverse_complement(&read.sequence),
                read.qualities.iter().rev().copied().collect(),
            ),
        };

        let mut notes = Vec::new();
        if let Some(second) = second {
            notes.push(format!("XS:i:{second}"));
        }

        AlignmentRecord {
            name: read.name.clone(),
            strand: self.strand,
            query_start: self.query_start,
            query_end: self.query_end,
            path: self.path,
            cigar,
            score: self.score,
            mapq: mapping_quality(self.score, second),
            sequence,
            qualities,
            notes,
        }
    }
}

fn check_connected(graph: &Graph, nodes: &[NodeId]) -> Result<(), AlignError> {
    for pair in nodes.windows(2) {
        if !graph.has_edge(pair[0], pair[1]) {
            return Err(AlignError::DisconnectedPath {
                from: pair[0],
                to: pair[1],
            });
        }
    }
    Ok(())
}

/// Best candidate of a read plus the best score seen at any other locus.
#[derive(Debug, Default)]
pub(crate) struct Ranking {
    best: Option<Candidate>,
    second: Option<i64>,
}

impl Ranking {
    /// Current best score.
    pub(crate) fn best_score(&self) -> Option<i64> {
        self.best.as_ref().map(|c| c.score)
    }

    /// Consider `candidate`. The best only changes on a strictly higher
    /// score, so the best score never decreases.
    pub(crate) fn offer(&mut self, candidate: Candidate) {
        let Some(best) = &self.best else {
            self.best = Some(candidate);
            return;
        };
        let same_locus = best.locus() == candidate.locus();
        let best_score = best.score;
        if candidate.score > best_score {
            if !same_locus {
                self.raise_second(best_score);
            }
            self.best = Some(candidate);
        } else if !same_locus {
            self.raise_second(candidate.score);
        }
    }

    fn raise_second(&mut self, score: i64) {
        self.second = Some(self.second.map_or(score, |s| s.max(score)));
    }

    pub(crate) fn finish(self) -> (Option<Candidate>, Option<i64>) {
        (self.best, self.second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::cigar_string;

    fn line() -> Graph {
        let mut builder = Graph::builder();
        let a = builder.add_node("a", b"AACCGGTT").unwrap();
        let b = builder.add_node("b", b"ACGTACGT").unwrap();
        builder.add_edge(a, b, 1.0).unwrap();
        builder.build().unwrap()
    }

    fn candidate(strand: Strand, score: i64, node: NodeId, start: usize) -> Candidate {
        Candidate {
            strand,
            score,
            query_start: 0,
            query_end: 0,
            path: AlignmentPath::new(vec![node], start, start),
            ops: Vec::new(),
        }
    }

    #[test]
    fn mapq_scales_with_the_runner_up() {
        assert_eq!(mapping_quality(40, None), 60);
        assert_eq!(mapping_quality(40, Some(40)), 0);
        assert_eq!(mapping_quality(40, Some(20)), 30);
        assert_eq!(mapping_quality(40, Some(-10)), 60);
        assert_eq!(mapping_quality(-5, Some(-8)), 0);
    }

    #[test]
    fn assembly_joins_extensions_around_the_seed() {
        let graph = line();
        // Read "CCGGTTACGT" aligned: left ext "CC", seed "GGTTAC" across
        // the edge, right ext "GT".
        let read = b"CCGGTTACGT";
        let segments = [
            SeedSegment {
                node: 0,
                target_start: 4,
                query_start: 2,
                len: 4,
            },
            SeedSegment {
                node: 1,
                target_start: 0,
                query_start: 6,
                len: 2,
            },
        ];
        let left = Extension {
            ops: vec![CigarOp::new(CigarOpKind::Match, 2)],
            score: 4,
            query_len: 2,
            target_len: 2,
            offset: 2,
            ..Extension::default()
        };
        let right = Extension {
            ops: vec![CigarOp::new(CigarOpKind::Match, 2)],
            score: 4,
            query_len: 2,
            target_len: 2,
            offset: 4,
            ..Extension::default()
        };
        let cand = Candidate::assemble(
            &graph,
            Strand::Forward,
            read,
            &segments,
            &left,
            &right,
            &ScoreMatrix::default(),
        )
        .unwrap();
        assert_eq!(cand.score, 20);
        assert_eq!(cigar_string(&cand.ops), "10=");
        assert_eq!(cand.path.to_string(), "2:0>1:4");
        assert_eq!((cand.query_start, cand.query_end), (0, 10));
    }

    #[test]
    fn disconnected_paths_are_rejected() {
        let graph = line();
        let segments = [SeedSegment {
            node: 1,
            target_start: 0,
            query_start: 0,
            len: 2,
        }];
        let right = Extension {
            nodes: vec![0],
            offset: 1,
            ..Extension::default()
        };
        let err = Candidate::assemble(
            &graph,
            Strand::Forward,
            b"AC",
            &segments,
            &Extension::default(),
            &right,
            &ScoreMatrix::default(),
        )
        .unwrap_err();
        assert_eq!(err, AlignError::DisconnectedPath { from: 1, to: 0 });
    }

    #[test]
    fn records_clip_unaligned_ends_and_orient_reverse_reads() {
        let read = Read::new("r1", b"AACGTT", b"ABCDEF");
        let cand = Candidate {
            strand: Strand::Reverse,
            score: 8,
            query_start: 1,
            query_end: 5,
            path: AlignmentPath::new(vec![0], 0, 4),
            ops: vec![CigarOp::new(CigarOpKind::Match, 4)],
        };
        let record = cand.into_record(&read, Some(2));
        assert_eq!(cigar_string(&record.cigar), "1S4=1S");
        assert_eq!(record.sequence, b"AACGTT".to_vec());
        assert_eq!(record.qualities, b"FEDCBA".to_vec());
        assert_eq!(record.mapq, 45);
        assert_eq!(record.notes, vec!["XS:i:2".to_string()]);
    }

    #[test]
    fn ranking_keeps_the_first_best_and_tracks_other_loci() {
        let mut ranking = Ranking::default();
        ranking.offer(candidate(Strand::Forward, 30, 0, 5));
        ranking.offer(candidate(Strand::Forward, 30, 2, 0));
        ranking.offer(candidate(Strand::Forward, 25, 0, 5));
        assert_eq!(ranking.best_score(), Some(30));
        let (best, second) = ranking.finish();
        assert_eq!(best.unwrap().path.nodes, vec![0]);
        assert_eq!(second, Some(30));
    }

    #[test]
    fn same_locus_is_not_an_alternative() {
        let mut ranking = Ranking::default();
        ranking.offer(candidate(Strand::Reverse, 10, 4, 2));
        ranking.offer(candidate(Strand::Reverse, 12, 4, 2));
        let (best, second) = ranking.finish();
        assert_eq!(best.map(|c| c.score), Some(12));
        assert_eq!(second, None);
    }
}
