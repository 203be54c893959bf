use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info_span, warn};

use crate::align::{AlignError, GraphAligner, Scratch, ScratchUsage};
use crate::types::{AlignmentRecord, Read};

/// Unmapped record carrying the failure reason as an `XF:Z:` note.
pub fn failed_record(read: &Read, err: &AlignError) -> AlignmentRecord {
    let mut record = AlignmentRecord::unmapped(read);
    record.notes.push(format!("XF:Z:{err}"));
    record
}

/// Align reads from `reads` until it closes, sending one record per read.
///
/// Stops early when the record channel has no receiver left. Returns the
/// scratch usage of this worker.
pub(crate) fn run_worker(
    id: usize,
    aligner: &GraphAligner,
    reads: Receiver<Read>,
    records: Sender<AlignmentRecord>,
    failed: &AtomicUsize,
) -> ScratchUsage {
    let span = info_span!("worker", id);
    let _guard = span.enter();
    let mut scratch = Scratch::new();

    for read in reads.iter() {
        let record = match aligner.align_read(&read, &mut scratch) {
            Ok(record) => record,
            Err(err) => {
                warn!(read = %read.name, error = %err, "alignment failed");
                failed.fetch_add(1, Ordering::Relaxed);
                failed_record(&read, &err)
            }
        };
        if records.send(record).is_err() {
            debug!("record channel closed, stopping");
            break;
        }
    }

    let usage = scratch.usage();
    debug!(
        reads = usage.reads,
        peak_bytes = usage.peak_bytes,
        "worker finished"
    );
    usage
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_records_are_unmapped_with_reason() {
        let read = Read::new("bad", b"ACGT", b"IIII");
        let record = failed_record(&read, &AlignError::EmptyNode { node: 7 });
        assert!(!record.is_mapped());
        assert_eq!(record.notes, vec!["XF:Z:node 7 has no bases".to_string()]);
    }
}
