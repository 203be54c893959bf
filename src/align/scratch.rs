//! Per-worker scratch space.

use crate::align::ExtendScratch;
use crate::seed::SeedScratch;

/// High-water accounting of scratch memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScratchUsage {
    /// Reads processed with this scratch.
    pub reads: usize,
    /// Bytes reserved after the last read.
    pub current_bytes: usize,
    /// Largest reservation seen.
    pub peak_bytes: usize,
}

impl ScratchUsage {
    fn record(&mut self, bytes: usize) {
        self.reads += 1;
        self.current_bytes = bytes;
        self.peak_bytes = self.peak_bytes.max(bytes);
    }
}

/// Everything one worker reuses between reads: k-mer windows, seed chains,
/// DP matrices and traversal buffers.
///
/// A `Scratch` is never shared; each worker owns one and passes it by
/// mutable reference into [`GraphAligner::align_read`](crate::align::GraphAligner::align_read).
#[derive(Debug, Default, Clone)]
pub struct Scratch {
    pub(crate) seeds: SeedScratch,
    pub(crate) extend: ExtendScratch,
    usage: ScratchUsage,
}

impl Scratch {
    /// Empty scratch; buffers grow to fit the first reads.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently reserved by the seed and extension buffers.
    pub fn reserved_bytes(&self) -> usize {
        self.seeds.reserved_bytes() + self.extend.reserved_bytes()
    }

    /// Usage counters.
    pub fn usage(&self) -> ScratchUsage {
        self.usage
    }

    pub(crate) fn finish_read(&mut self) {
        let bytes = self.reserved_bytes();
        self.usage.record(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_tracks_the_high_water_mark() {
        let mut usage = ScratchUsage::default();
        usage.record(100);
        usage.record(400);
        usage.record(250);
        assert_eq!(usage.reads, 3);
        assert_eq!(usage.current_bytes, 250);
        assert_eq!(usage.peak_bytes, 400);
    }

    #[test]
    fn fresh_scratch_reserves_nothing() {
        let scratch = Scratch::new();
        assert_eq!(scratch.reserved_bytes(), 0);
        assert_eq!(scratch.usage(), ScratchUsage::default());
    }
}
