use crate::kmer::{kmer_mask, reverse_complement_into, BaseCode};
use crate::types::Strand;

/// Precomputed k-mer keys at every offset of a read, on both strands.
///
/// Loading a read is a single rolling pass per strand; afterwards the key of
/// any window is an O(1) lookup. The buffers are kept between reads so a
/// worker can reuse one instance for its whole lifetime.
#[derive(Debug, Default, Clone)]
pub struct KmerWindows {
    k: usize,
    forward: Vec<Option<u64>>,
    reverse: Vec<Option<u64>>,
    reverse_sequence: Vec<u8>,
}

impl KmerWindows {
    /// Create an empty set of windows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute windows for `read` with k-mer length `k`.
    pub fn load(&mut self, read: &[u8], k: usize) {
        self.k = k;
        reverse_complement_into(read, &mut self.reverse_sequence);
        fill_windows(read, k, &mut self.forward);
        fill_windows(&self.reverse_sequence, k, &mut self.reverse);
    }

    /// K-mer length used by the last [`load`](Self::load).
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of window offsets (identical for both strands).
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Whether the read was shorter than `k`.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Key of the window starting at `offset` on `strand`, if it holds no
    /// ambiguous base.
    #[inline]
    pub fn key(&self, strand: Strand, offset: usize) -> Option<u64> {
        let table = match strand {
            Strand::Forward => &self.forward,
            Strand::Reverse => &self.reverse,
        };
        table.get(offset).copied().flatten()
    }

    /// Reverse complement of the last loaded read.
    pub fn reverse_sequence(&self) -> &[u8] {
        &self.reverse_sequence
    }

    /// Bytes currently reserved.
    pub fn reserved_bytes(&self) -> usize {
        (self.forward.capacity() + self.reverse.capacity()) * std::mem::size_of::<Option<u64>>()
            + self.reverse_sequence.capacity()
    }
}

fn fill_windows(seq: &[u8], k: usize, out: &mut Vec<Option<u64>>) {
    out.clear();
    if k == 0 || seq.len() < k {
        return;
    }
    out.resize(seq.len() + 1 - k, None);

    let mask = kmer_mask(k);
    let mut key = 0u64;
    let mut run = 0usize;
    for (idx, &base) in seq.iter().enumerate() {
        match BaseCode::from_ascii(base) {
            Some(code) => {
                key = ((key << 2) | code as u64) & mask;
                run += 1;
            }
            None => {
                key = 0;
                run = 0;
            }
        }
        if run >= k {
            out[idx + 1 - k] = Some(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::encode_kmer;

    #[test]
    fn windows_match_direct_encoding() {
        let read = b"ACGTTGCAAC";
        let mut windows = KmerWindows::new();
        windows.load(read, 4);
        assert_eq!(windows.len(), 7);
        for offset in 0..windows.len() {
            assert_eq!(
                windows.key(Strand::Forward, offset),
                encode_kmer(&read[offset..offset + 4])
            );
            let rev = windows.reverse_sequence();
            assert_eq!(
                windows.key(Strand::Reverse, offset),
                encode_kmer(&rev[offset..offset + 4])
            );
        }
    }

    #[test]
    fn ambiguous_base_invalidates_overlapping_windows() {
        let mut windows = KmerWindows::new();
        windows.load(b"ACGNACGT", 3);
        assert!(windows.key(Strand::Forward, 0).is_some());
        assert!(windows.key(Strand::Forward, 1).is_none());
        assert!(windows.key(Strand::Forward, 3).is_none());
        assert!(windows.key(Strand::Forward, 4).is_some());
    }

    #[test]
    fn short_read_has_no_windows() {
        let mut windows = KmerWindows::new();
        windows.load(b"ACG", 4);
        assert!(windows.is_empty());
        assert_eq!(windows.key(Strand::Forward, 0), None);
    }

    #[test]
    fn reload_reuses_buffers() {
        let mut windows = KmerWindows::new();
        windows.load(b"ACGTACGTACGT", 4);
        windows.load(b"TTTT", 4);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows.key(Strand::Reverse, 0), encode_kmer(b"AAAA"));
    }
}
