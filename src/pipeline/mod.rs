//! Concurrent read alignment.
//!
//! A producer thread feeds reads into a bounded channel, a fixed pool of
//! workers aligns them (each with its own [`Scratch`](crate::align::Scratch)),
//! and the calling thread drains a second bounded channel into a
//! [`RecordSink`]. Records arrive in completion order, not input order.

mod worker;

pub use worker::failed_record;

use std::convert::Infallible;
use std::error::Error as StdError;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;
use thiserror::Error;
use tracing::{debug, info};

use crate::align::GraphAligner;
use crate::io::{BamWriter, GirafWriter, SamError, SamWriter};
use crate::types::{AlignmentRecord, Read};

/// Destination for finished records. Runs on the thread calling
/// [`Pipeline::run`], so it does not need to be `Send`.
pub trait RecordSink {
    /// Error raised by the sink.
    type Error: StdError + Send + Sync + 'static;

    /// Consume one record.
    fn write_record(&mut self, record: &AlignmentRecord) -> Result<(), Self::Error>;

    /// Called once after the last record.
    fn finish(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl RecordSink for Vec<AlignmentRecord> {
    type Error = Infallible;

    fn write_record(&mut self, record: &AlignmentRecord) -> Result<(), Self::Error> {
        self.push(record.clone());
        Ok(())
    }
}

impl<W: Write> RecordSink for GirafWriter<W> {
    type Error = io::Error;

    fn write_record(&mut self, record: &AlignmentRecord) -> Result<(), Self::Error> {
        self.write(record)
    }

    fn finish(&mut self) -> Result<(), Self::Error> {
        self.flush()
    }
}

impl<W: Write> RecordSink for SamWriter<'_, W> {
    type Error = SamError;

    fn write_record(&mut self, record: &AlignmentRecord) -> Result<(), Self::Error> {
        self.write(record)
    }

    fn finish(&mut self) -> Result<(), Self::Error> {
        Ok(self.flush()?)
    }
}

impl RecordSink for BamWriter {
    type Error = SamError;

    fn write_record(&mut self, record: &AlignmentRecord) -> Result<(), Self::Error> {
        self.write(record)
    }
}

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The record sink failed.
    #[error("failed to write records: {0}")]
    Sink(#[source] Box<dyn StdError + Send + Sync>),

    /// The read source yielded an error.
    #[error("failed to read input: {0}")]
    Source(#[source] Box<dyn StdError + Send + Sync>),

    /// A worker thread panicked.
    #[error("worker {worker} panicked")]
    WorkerPanicked {
        /// Worker index.
        worker: usize,
    },

    /// The producer thread panicked.
    #[error("read producer panicked")]
    ProducerPanicked,
}

/// Thread and channel sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Worker threads.
    pub workers: usize,
    /// Capacity of the read channel.
    pub read_capacity: usize,
    /// Capacity of the record channel.
    pub record_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            read_capacity: 1024,
            record_capacity: 1024,
        }
    }
}

impl PipelineConfig {
    /// Set the worker count (at least one worker always runs).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set both channel capacities.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.read_capacity = capacity;
        self.record_capacity = capacity;
        self
    }
}

/// Counters of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Reads taken from the source.
    pub reads: usize,
    /// Records handed to the sink.
    pub written: usize,
    /// Records with a graph placement.
    pub mapped: usize,
    /// Records without a placement (including failures).
    pub unmapped: usize,
    /// Reads whose alignment failed internally.
    pub failed: usize,
    /// Largest scratch reservation of any worker, in bytes.
    pub peak_scratch_bytes: usize,
}

/// Multi-threaded driver around a shared [`GraphAligner`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    aligner: Arc<GraphAligner>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Build a pipeline.
    pub fn new(aligner: Arc<GraphAligner>, config: PipelineConfig) -> Self {
        Self { aligner, config }
    }

    /// Shared aligner.
    pub fn aligner(&self) -> &GraphAligner {
        &self.aligner
    }

    /// Align every read of `reads` and write the records into `sink`.
    ///
    /// A failing read becomes an unmapped record with an `XF:Z:` note and is
    /// counted in [`PipelineSummary::failed`]. A source error, sink error or
    /// thread panic stops the run; all threads are joined before returning.
    pub fn run<I, E, S>(&self, reads: I, sink: &mut S) -> Result<PipelineSummary, PipelineError>
    where
        I: IntoIterator<Item = Result<Read, E>>,
        I::IntoIter: Send,
        E: StdError + Send + Sync + 'static,
        S: RecordSink,
    {
        let workers = self.config.workers.max(1);
        let aligner = self.aligner.as_ref();
        let failed = AtomicUsize::new(0);
        let mut summary = PipelineSummary::default();
        info!(workers, "alignment pipeline started");

        let outcome = thread::scope(|scope| {
            let (read_tx, read_rx) = bounded::<Read>(self.config.read_capacity.max(1));
            let (record_tx, record_rx) =
                bounded::<AlignmentRecord>(self.config.record_capacity.max(1));

            let reads = reads.into_iter();
            let producer = scope.spawn(move || -> Result<usize, E> {
                let mut sent = 0;
                for read in reads {
                    if read_tx.send(read?).is_err() {
                        break;
                    }
                    sent += 1;
                }
                Ok(sent)
            });

            let handles: Vec<_> = (0..workers)
                .map(|id| {
                    let reads = read_rx.clone();
                    let records = record_tx.clone();
                    let failed = &failed;
                    scope.spawn(move || worker::run_worker(id, aligner, reads, records, failed))
                })
                .collect();
            drop(read_rx);
            drop(record_tx);

            let mut sink_error = None;
            for record in record_rx.iter() {
                if let Err(err) = sink.write_record(&record) {
                    sink_error = Some(PipelineError::Sink(Box::new(err)));
                    break;
                }
                summary.written += 1;
                if record.is_mapped() {
                    summary.mapped += 1;
                } else {
                    summary.unmapped += 1;
                }
            }
            drop(record_rx);

            let mut first_error = sink_error;
            match producer.join() {
                Ok(Ok(sent)) => summary.reads = sent,
                Ok(Err(err)) => {
                    first_error.get_or_insert(PipelineError::Source(Box::new(err)));
                }
                Err(_) => {
                    first_error.get_or_insert(PipelineError::ProducerPanicked);
                }
            }
            for (worker, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(usage) => {
                        summary.peak_scratch_bytes =
                            summary.peak_scratch_bytes.max(usage.peak_bytes);
                    }
                    Err(_) => {
                        first_error.get_or_insert(PipelineError::WorkerPanicked { worker });
                    }
                }
            }
            first_error
        });

        if let Some(err) = outcome {
            return Err(err);
        }
        sink.finish()
            .map_err(|err| PipelineError::Sink(Box::new(err)))?;

        summary.failed = failed.load(Ordering::Relaxed);
        info!(
            reads = summary.reads,
            mapped = summary.mapped,
            unmapped = summary.unmapped,
            failed = summary.failed,
            "alignment pipeline finished"
        );
        debug!(peak_scratch_bytes = summary.peak_scratch_bytes, "scratch high-water mark");
        Ok(summary)
    }
}
