use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};

use crate::align::assemble::{Candidate, Ranking};
use crate::align::{extend_left, extend_right, AlignError, AlignMode, ExtensionLimits, Scratch};
use crate::config::{AlignerConfig, ConfigError};
use crate::graph::Graph;
use crate::kmer::{IndexError, KmerIndex};
use crate::seed::{find_seeds, rank_chains, seed_could_be_better};
use crate::types::{AlignmentRecord, Read, Strand};

/// Errors raised while setting up an aligner.
#[derive(Debug, Error)]
pub enum AlignerError {
    /// Rejected configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Failure while building the seed index.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Index built with a different k-mer length than configured.
    #[error("index k-mer length {index} does not match configured {config}")]
    KmerMismatch {
        /// Length stored in the index.
        index: usize,
        /// Configured length.
        config: usize,
    },

    /// Index built from a different graph.
    #[error("index was built for graph {index}, not {graph}")]
    GraphMismatch {
        /// Fingerprint stored in the index.
        index: blake3::Hash,
        /// Fingerprint of the graph being aligned against.
        graph: blake3::Hash,
    },
}

/// Seed-and-extend aligner over a shared graph and index.
///
/// The aligner is immutable and cheap to clone; all per-read state lives in
/// the caller's [`Scratch`], so any number of threads can align through one
/// instance.
#[derive(Debug, Clone)]
pub struct GraphAligner {
    graph: Arc<Graph>,
    index: Arc<KmerIndex>,
    config: AlignerConfig,
    limits: ExtensionLimits,
}

impl GraphAligner {
    /// Validate `config` and index `graph`.
    pub fn new(graph: Arc<Graph>, config: AlignerConfig) -> Result<Self, AlignerError> {
        config.validate()?;
        let index = Arc::new(KmerIndex::build_with_limit(
            &graph,
            config.kmer_len,
            config.step,
            config.max_spanning_keys,
        )?);
        Self::with_index(graph, index, config)
    }

    /// Reuse an index built earlier for the same graph. Fails when the index
    /// was built from another graph or with another k-mer length.
    pub fn with_index(
        graph: Arc<Graph>,
        index: Arc<KmerIndex>,
        config: AlignerConfig,
    ) -> Result<Self, AlignerError> {
        config.validate()?;
        if index.k() != config.kmer_len {
            return Err(AlignerError::KmerMismatch {
                index: index.k(),
                config: config.kmer_len,
            });
        }
        let fingerprint = graph.fingerprint();
        if index.graph_fingerprint() != fingerprint {
            return Err(AlignerError::GraphMismatch {
                index: index.graph_fingerprint(),
                graph: fingerprint,
            });
        }
        Ok(Self::from_parts(graph, index, config))
    }

    /// Pair `index` with `graph` without checking that they belong together.
    #[cfg(test)]
    pub(crate) fn with_unchecked_index(
        graph: Arc<Graph>,
        index: Arc<KmerIndex>,
        config: AlignerConfig,
    ) -> Self {
        Self::from_parts(graph, index, config)
    }

    fn from_parts(graph: Arc<Graph>, index: Arc<KmerIndex>, config: AlignerConfig) -> Self {
        let limits = ExtensionLimits {
            band: config.band,
            target_slack: config.target_slack,
            max_branches: config.max_branches,
            mode: config.mode,
        };
        Self {
            graph,
            index,
            config,
            limits,
        }
    }

    /// Graph being aligned against.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Seed index.
    pub fn index(&self) -> &KmerIndex {
        &self.index
    }

    /// Active configuration.
    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }

    /// Align one read and return its best placement, or an unmapped record
    /// when nothing reaches the minimum score.
    ///
    /// Chains are extended longest first and evaluation stops as soon as the
    /// remaining chains cannot beat the current best. Scratch usage is
    /// recorded whether or not the read fails.
    pub fn align_read(
        &self,
        read: &Read,
        scratch: &mut Scratch,
    ) -> Result<AlignmentRecord, AlignError> {
        let result = self.best_record(read, scratch);
        scratch.finish_read();
        result
    }

    fn best_record(
        &self,
        read: &Read,
        scratch: &mut Scratch,
    ) -> Result<AlignmentRecord, AlignError> {
        let graph = self.graph.as_ref();
        let scoring = &self.config.scoring;
        let seq = read.sequence.as_slice();

        find_seeds(
            graph,
            &self.index,
            seq,
            self.config.max_seed_branches,
            &mut scratch.seeds,
        )?;
        rank_chains(scratch.seeds.buffer_mut());

        let perfect = self.config.perfect_score(seq);
        let match_bound = scoring.max_match();
        let mismatch_bound = match self.config.mode {
            AlignMode::Local => scoring.max_mismatch().max(0),
            AlignMode::Global => scoring.max_mismatch(),
        };

        let seeds = &scratch.seeds;
        let extend = &mut scratch.extend;
        let buffer = seeds.buffer();
        let reverse = seeds.windows().reverse_sequence();
        let mut ranking = Ranking::default();
        let mut evaluated = 0;

        for chain in buffer.chains() {
            let best = ranking.best_score().unwrap_or(i64::MIN);
            if !seed_could_be_better(
                chain.total_len as usize,
                best,
                perfect,
                seq.len(),
                match_bound,
                mismatch_bound,
            ) {
                trace!(read = %read.name, best, seed_len = chain.total_len, "remaining seeds pruned");
                break;
            }

            let oriented = match chain.strand {
                Strand::Forward => seq,
                Strand::Reverse => reverse,
            };
            let segments = buffer.segments_of(chain);
            let (Some(first), Some(last)) = (segments.first(), segments.last()) else {
                return Err(AlignError::EmptyChain);
            };

            let left = extend_left(
                graph,
                first.node,
                first.target_start as usize,
                &oriented[..first.query_start as usize],
                scoring,
                &self.limits,
                extend,
            )?;
            let right = extend_right(
                graph,
                last.node,
                last.target_end() as usize,
                &oriented[last.query_end() as usize..],
                scoring,
                &self.limits,
                extend,
            )?;
            let candidate =
                Candidate::assemble(graph, chain.strand, oriented, segments, &left, &right, scoring)?;
            ranking.offer(candidate);
            evaluated += 1;
        }

        let (best, second) = ranking.finish();
        let record = match best {
            Some(candidate) if candidate.score >= self.config.min_score => {
                candidate.into_record(read, second)
            }
            _ => AlignmentRecord::unmapped(read),
        };
        debug!(
            read = %read.name,
            chains = buffer.len(),
            evaluated,
            score = record.score,
            mapped = record.is_mapped(),
            "read aligned"
        );
        Ok(record)
    }

    /// Align a batch of reads sequentially with one scratch.
    pub fn align_batch<'a, I>(&self, reads: I) -> Vec<Result<AlignmentRecord, AlignError>>
    where
        I: IntoIterator<Item = &'a Read>,
    {
        let mut scratch = Scratch::new();
        reads
            .into_iter()
            .map(|read| self.align_read(read, &mut scratch))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::cigar_string;

    fn aligner(sequence: &[u8], config: AlignerConfig) -> GraphAligner {
        let mut builder = Graph::builder();
        builder.add_node("chr", sequence).unwrap();
        GraphAligner::new(Arc::new(builder.build().unwrap()), config).unwrap()
    }

    fn small_config() -> AlignerConfig {
        AlignerConfig::default()
            .with_kmer_len(8)
            .with_step(1)
            .with_min_score(10)
    }

    const REFERENCE: &[u8] = b"TTGACCATGCAGGTACCTAGGATCCGATTACAGGCATTAGCCTAGTTGCA";

    #[test]
    fn rejects_invalid_configuration() {
        let mut builder = Graph::builder();
        builder.add_node("chr", REFERENCE).unwrap();
        let graph = Arc::new(builder.build().unwrap());
        let err = GraphAligner::new(graph, AlignerConfig::default().with_band(0)).unwrap_err();
        assert!(matches!(err, AlignerError::Config(ConfigError::InvalidBand)));
    }

    #[test]
    fn rejects_index_with_other_k() {
        let mut builder = Graph::builder();
        builder.add_node("chr", REFERENCE).unwrap();
        let graph = Arc::new(builder.build().unwrap());
        let index = Arc::new(KmerIndex::build(&graph, 10, 1).unwrap());
        let err = GraphAligner::with_index(graph, index, small_config()).unwrap_err();
        assert!(matches!(
            err,
            AlignerError::KmerMismatch {
                index: 10,
                config: 8
            }
        ));
    }

    /// Index of a graph whose only real node sits at id 1.
    fn shifted_index() -> Arc<KmerIndex> {
        let mut builder = Graph::builder();
        builder.add_node("pad", b"ACGT").unwrap();
        builder.add_node("chr", REFERENCE).unwrap();
        Arc::new(KmerIndex::build(&builder.build().unwrap(), 8, 1).unwrap())
    }

    #[test]
    fn rejects_index_of_another_graph() {
        let mut builder = Graph::builder();
        builder.add_node("chr", REFERENCE).unwrap();
        let graph = Arc::new(builder.build().unwrap());
        let err = GraphAligner::with_index(graph, shifted_index(), small_config()).unwrap_err();
        assert!(matches!(err, AlignerError::GraphMismatch { .. }));
    }

    #[test]
    fn failed_reads_still_update_scratch_usage() {
        let mut builder = Graph::builder();
        builder.add_node("chr", REFERENCE).unwrap();
        let graph = Arc::new(builder.build().unwrap());
        let aligner = GraphAligner::with_unchecked_index(graph, shifted_index(), small_config());

        let mut scratch = Scratch::new();
        let read = Read::new("stale", &REFERENCE[10..40], &[b'I'; 30]);
        let err = aligner.align_read(&read, &mut scratch).unwrap_err();
        assert!(matches!(err, AlignError::InconsistentSeed { node: 1, .. }));
        let usage = scratch.usage();
        assert_eq!(usage.reads, 1);
        assert!(usage.peak_bytes > 0);
    }

    #[test]
    fn exact_read_maps_with_full_match() {
        let aligner = aligner(REFERENCE, small_config());
        let read = Read::new("exact", &REFERENCE[10..40], &[b'I'; 30]);
        let mut scratch = Scratch::new();
        let record = aligner.align_read(&read, &mut scratch).unwrap();
        assert!(record.is_mapped());
        assert_eq!(record.strand, Strand::Forward);
        assert_eq!(record.score, 60);
        assert_eq!(cigar_string(&record.cigar), "30=");
        assert_eq!(record.path.to_string(), "10:0:40");
        assert_eq!(record.mapq, 60);
        assert_eq!(scratch.usage().reads, 1);
    }

    #[test]
    fn reverse_complement_read_maps_on_reverse_strand() {
        let aligner = aligner(REFERENCE, small_config());
        let forward = &REFERENCE[5..35];
        let read = Read::new(
            "rc",
            &crate::kmer::reverse_complement(forward),
            &[b'I'; 30],
        );
        let record = aligner.align_read(&read, &mut Scratch::new()).unwrap();
        assert_eq!(record.strand, Strand::Reverse);
        assert_eq!(record.sequence, forward.to_vec());
        assert_eq!(record.score, 60);
        assert_eq!(record.path.to_string(), "5:0:35");
    }

    #[test]
    fn unrelated_read_is_unmapped() {
        let aligner = aligner(REFERENCE, small_config());
        let read = Read::new("noise", b"CCCCCCCCCCCCCCCCCCCC", &[b'I'; 20]);
        let record = aligner.align_read(&read, &mut Scratch::new()).unwrap();
        assert!(!record.is_mapped());
        assert_eq!(cigar_string(&record.cigar), "*");
    }

    #[test]
    fn local_mode_clips_a_foreign_tail() {
        let aligner = aligner(REFERENCE, small_config());
        let mut seq = REFERENCE[0..24].to_vec();
        seq.extend_from_slice(b"GGGGGGGG");
        let read = Read::new("tail", &seq, &[b'I'; 32]);
        let record = aligner.align_read(&read, &mut Scratch::new()).unwrap();
        assert_eq!(record.query_start, 0);
        assert_eq!(record.query_end, 24);
        assert_eq!(cigar_string(&record.cigar), "24=8S");
        assert_eq!(record.score, 48);
    }

    #[test]
    fn batch_alignment_preserves_order() {
        let aligner = aligner(REFERENCE, small_config());
        let reads = vec![
            Read::new("a", &REFERENCE[0..20], &[b'I'; 20]),
            Read::new("b", b"CCCCCCCCCCCCCCCCCCCC", &[b'I'; 20]),
        ];
        let records = aligner.align_batch(&reads);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].as_ref().unwrap().name, "a");
        assert!(!records[1].as_ref().unwrap().is_mapped());
    }
}
