use std::fmt;

use bitvec::prelude::*;
use thiserror::Error;

use crate::kmer::{BaseCode, MAX_KMER_LEN};

/// Number of bases encoded per `u64` chunk.
const BASES_PER_WORD: usize = 32;
/// Bits used to encode a single DNA base (A/C/G/T).
const BITS_PER_BASE: usize = 2;

/// Errors that can occur while packing a node sequence.
#[derive(Debug, Error)]
pub enum PackedSequenceError {
    /// Encountered a base that is neither canonical nor `N`.
    #[error("unsupported nucleotide '{0}' at position {1}")]
    UnsupportedBase(char, usize),
}

/// Node sequence packed two bits per base.
///
/// Canonical bases are stored in `data`; ambiguous positions (`N`) are stored
/// as `A` and flagged in the ambiguity mask so decoding restores them and
/// k-mer extraction can reject windows that cover them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedSequence {
    data: Vec<u64>,
    len: usize,
    ambiguity: BitVec,
}

impl PackedSequence {
    /// Pack an ASCII sequence.
    pub fn pack(sequence: &[u8]) -> Result<Self, PackedSequenceError> {
        let len = sequence.len();
        let mut data = vec![0u64; words_for_len(len)];
        let mut ambiguity = bitvec![0; len];

        for (idx, &base) in sequence.iter().enumerate() {
            let code = match BaseCode::from_ascii(base) {
                Some(code) => code as u64,
                None if base == b'N' || base == b'n' => {
                    ambiguity.set(idx, true);
                    0
                }
                None => return Err(PackedSequenceError::UnsupportedBase(base as char, idx)),
            };
            let (word_idx, bit_shift) = word_position(idx);
            data[word_idx] |= code << bit_shift;
        }

        Ok(Self {
            data,
            len,
            ambiguity,
        })
    }

    /// Number of bases.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether any base in `[start, end)` is ambiguous.
    pub fn has_ambiguity(&self, start: usize, end: usize) -> bool {
        let end = end.min(self.len);
        start < end && self.ambiguity[start..end].any()
    }

    /// Two-bit code at `idx`, or `None` for ambiguous or out-of-range positions.
    #[inline]
    pub fn code_at(&self, idx: usize) -> Option<BaseCode> {
        if idx >= self.len || self.ambiguity[idx] {
            return None;
        }
        let (word_idx, bit_shift) = word_position(idx);
        Some(BaseCode::from_bits(self.data[word_idx] >> bit_shift))
    }

    /// Uppercase ASCII base at `idx`.
    pub fn base_at(&self, idx: usize) -> Option<u8> {
        if idx >= self.len {
            return None;
        }
        Some(self.code_at(idx).map(BaseCode::to_ascii).unwrap_or(b'N'))
    }

    /// Key of the k-mer starting at `offset`, if it lies inside the sequence
    /// and holds no ambiguous base.
    pub fn kmer_at(&self, offset: usize, k: usize) -> Option<u64> {
        if k == 0 || k > MAX_KMER_LEN || offset + k > self.len {
            return None;
        }
        if self.has_ambiguity(offset, offset + k) {
            return None;
        }
        let mut key = 0u64;
        for idx in offset..offset + k {
            let (word_idx, bit_shift) = word_position(idx);
            key = (key << 2) | ((self.data[word_idx] >> bit_shift) & 0b11);
        }
        Some(key)
    }

    /// Decode into a newly allocated vector of uppercase ASCII bases.
    pub fn to_vec(&self) -> Vec<u8> {
        (0..self.len).filter_map(|idx| self.base_at(idx)).collect()
    }
}

impl fmt::Display for PackedSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decoded = self.to_vec();
        write!(f, "{}", String::from_utf8_lossy(&decoded))
    }
}

fn words_for_len(len: usize) -> usize {
    (len + BASES_PER_WORD - 1) / BASES_PER_WORD
}

fn word_position(idx: usize) -> (usize, usize) {
    let word_idx = idx / BASES_PER_WORD;
    let bit_shift = (idx % BASES_PER_WORD) * BITS_PER_BASE;
    (word_idx, bit_shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::encode_kmer;

    #[test]
    fn pack_and_decode_roundtrip() {
        let seq = b"ACGTACGTNNACGTTTGCATGCATGCATGCATGCAAACCC";
        let packed = PackedSequence::pack(seq).expect("packing should succeed");
        assert_eq!(packed.len(), seq.len());
        assert_eq!(packed.to_vec(), seq.to_vec());
    }

    #[test]
    fn kmer_at_matches_direct_encoding_across_words() {
        let seq: Vec<u8> = b"GATTACA".iter().copied().cycle().take(80).collect();
        let packed = PackedSequence::pack(&seq).unwrap();
        for offset in [0usize, 20, 30, 31, 48] {
            assert_eq!(
                packed.kmer_at(offset, 32),
                encode_kmer(&seq[offset..offset + 32])
            );
        }
        assert_eq!(packed.kmer_at(60, 32), None);
    }

    #[test]
    fn ambiguous_windows_are_rejected() {
        let packed = PackedSequence::pack(b"ACGTNACGT").unwrap();
        assert!(packed.kmer_at(0, 4).is_some());
        assert!(packed.kmer_at(1, 4).is_none());
        assert!(packed.kmer_at(5, 4).is_some());
        assert_eq!(packed.base_at(4), Some(b'N'));
    }

    #[test]
    fn unsupported_base_returns_error() {
        let result = PackedSequence::pack(b"ACXT");
        assert!(matches!(
            result,
            Err(PackedSequenceError::UnsupportedBase('X', 2))
        ));
    }
}
