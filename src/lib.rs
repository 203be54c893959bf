//! # simplegraph
//!
//! Seed-and-extend alignment of short reads against a reference graph.
//!
//! ## Pipeline
//!
//! 1. **Graph**: nodes carry DNA and weighted directed edges join them
//!    ([`graph::Graph`], loaded from a simple text format).
//! 2. **Index**: every `step`-th k-mer of the graph, including k-mers that
//!    cross node boundaries, is hashed to its start location
//!    ([`kmer::KmerIndex`]).
//! 3. **Seeds**: read k-mers on both strands are looked up and grown into
//!    maximal exact chains that may span several nodes ([`seed`]).
//! 4. **Extension**: the most promising chains are extended in both
//!    directions with banded dynamic programming over graph branches
//!    ([`align`]).
//! 5. **Output**: the best candidate becomes an [`AlignmentRecord`] written
//!    as GIRAF, SAM or BAM ([`io`]), optionally across many worker threads
//!    ([`pipeline`]).
//!
//! ## Usage Example
//!
//! ```
//! use std::sync::Arc;
//! use simplegraph::{AlignerConfig, Graph, GraphAligner, Read, Scratch};
//!
//! let mut builder = Graph::builder();
//! builder.add_node("chr", b"TTGACCATGCAGGTACCTAGGATCCGATTACA").unwrap();
//! let graph = Arc::new(builder.build().unwrap());
//!
//! let config = AlignerConfig::default().with_kmer_len(8).with_step(1).with_min_score(10);
//! let aligner = GraphAligner::new(graph, config).unwrap();
//!
//! let read = Read::new("r1", b"CATGCAGGTACCTAGG", &[b'I'; 16]);
//! let record = aligner.align_read(&read, &mut Scratch::new()).unwrap();
//! assert!(record.is_mapped());
//! assert_eq!(record.score, 32);
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod align; // Banded DP extension and candidate assembly
pub mod config; // Aligner parameters
pub mod graph; // Arena sequence graph and text format
pub mod io; // FASTQ input, GIRAF/SAM/BAM output
pub mod kmer; // 2-bit k-mers and the seed index
pub mod pipeline; // Multi-threaded driver
pub mod seed; // Seed chains
pub mod types; // Reads, CIGARs, paths and records

// Re-exports for convenience
pub use align::{AlignError, AlignMode, AlignerError, GraphAligner, ScoreMatrix, Scratch};
pub use config::{AlignerConfig, ConfigError};
pub use graph::{Graph, GraphBuilder, GraphError, NodeId};
pub use kmer::{IndexError, KmerIndex};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineSummary, RecordSink};
pub use types::{AlignmentPath, AlignmentRecord, CigarOp, CigarOpKind, Read, Strand};
