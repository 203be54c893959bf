//! K-mer encoding, per-read window precomputation and the graph seed index.
//!
//! Bases are packed two bits each (`A=0, C=1, G=2, T=3`) with the first base
//! of a k-mer in the most significant position, so a k-mer of length `k`
//! occupies the low `2k` bits of a `u64`.

mod index;
mod windows;

pub use index::{IndexError, IndexStats, KmerIndex, Location, DEFAULT_MAX_SPANNING};
pub use windows::KmerWindows;

/// Smallest supported k-mer length.
pub const MIN_KMER_LEN: usize = 2;
/// Largest supported k-mer length (32 bases fill a `u64`).
pub const MAX_KMER_LEN: usize = 32;

/// Two-bit code of a canonical DNA base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BaseCode {
    /// Adenine.
    A = 0,
    /// Cytosine.
    C = 1,
    /// Guanine.
    G = 2,
    /// Thymine/Uracil.
    T = 3,
}

impl BaseCode {
    /// Parse an ASCII base. Ambiguous or unknown bases yield `None`.
    #[inline]
    pub fn from_ascii(base: u8) -> Option<Self> {
        match base {
            b'A' | b'a' => Some(BaseCode::A),
            b'C' | b'c' => Some(BaseCode::C),
            b'G' | b'g' => Some(BaseCode::G),
            b'T' | b't' | b'U' | b'u' => Some(BaseCode::T),
            _ => None,
        }
    }

    /// Decode a two-bit code (only the low two bits are used).
    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        match bits & 0b11 {
            0 => BaseCode::A,
            1 => BaseCode::C,
            2 => BaseCode::G,
            _ => BaseCode::T,
        }
    }

    /// Index into 4×4 tables.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Uppercase ASCII representation.
    #[inline]
    pub fn to_ascii(self) -> u8 {
        match self {
            BaseCode::A => b'A',
            BaseCode::C => b'C',
            BaseCode::G => b'G',
            BaseCode::T => b'T',
        }
    }

    /// Watson-Crick complement.
    #[inline]
    pub fn complement(self) -> Self {
        match self {
            BaseCode::A => BaseCode::T,
            BaseCode::C => BaseCode::G,
            BaseCode::G => BaseCode::C,
            BaseCode::T => BaseCode::A,
        }
    }
}

/// Mask covering the low `2k` bits.
#[inline]
pub fn kmer_mask(k: usize) -> u64 {
    if k >= MAX_KMER_LEN {
        u64::MAX
    } else {
        (1u64 << (2 * k)) - 1
    }
}

/// Encode `seq` into a k-mer key. Returns `None` if the slice is longer than
/// [`MAX_KMER_LEN`] or holds a base outside `ACGT`.
pub fn encode_kmer(seq: &[u8]) -> Option<u64> {
    if seq.len() > MAX_KMER_LEN {
        return None;
    }
    let mut key = 0u64;
    for &base in seq {
        let code = BaseCode::from_ascii(base)?;
        key = (key << 2) | code as u64;
    }
    Some(key)
}

/// Decode a key of length `k` back into uppercase ASCII.
pub fn decode_kmer(key: u64, k: usize) -> Vec<u8> {
    (0..k)
        .map(|i| {
            let shift = 2 * (k - 1 - i);
            BaseCode::from_bits(key >> shift).to_ascii()
        })
        .collect()
}

/// Complement of a single ASCII base; anything outside `ACGT` becomes `N`.
#[inline]
pub fn complement_base(base: u8) -> u8 {
    BaseCode::from_ascii(base)
        .map(|code| code.complement().to_ascii())
        .unwrap_or(b'N')
}

/// Reverse complement of `seq` as a new vector.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len());
    reverse_complement_into(seq, &mut out);
    out
}

/// Reverse complement of `seq` written into `out` (cleared first).
pub fn reverse_complement_into(seq: &[u8], out: &mut Vec<u8>) {
    out.clear();
    out.extend(seq.iter().rev().map(|&base| complement_base(base)));
}

/// Two ASCII bases are an exact match only when both are canonical and equal.
#[inline]
pub fn bases_match(a: u8, b: u8) -> bool {
    match (BaseCode::from_ascii(a), BaseCode::from_ascii(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
