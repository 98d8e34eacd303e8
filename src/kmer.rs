//! Packed 32-mer representation.
//!
//! A k-mer of `K = 32` bases is packed two bits per base into a `u64`, most
//! significant base first, using the codes `C=0`, `A=1`, `T=2`, `G=3`.
//! Query and k-mer list text goes through [`encode`], which also accepts
//! lowercase `c`, `g`, `t`. Reads go through [`windows`], which only knows the
//! uppercase bases, so soft-masked (lowercase) read bases count as `A`. Any
//! other character (including `N`) is encoded as `A` by both.
//!
//! # Example
//!
//! ```rust
//! use kiq::kmer::{decode, encode, K};
//!
//! let text = "ACGT".repeat(K / 4);
//! let packed = encode(text.as_bytes());
//! assert_eq!(decode(packed), text);
//! ```

/// Fixed k-mer length.
pub const K: usize = 32;

/// A k-mer packed into 64 bits.
pub type Kmer = u64;

/// A dense slot in `[0, N)` assigned by a [`KmerIndexer`](crate::indexer::KmerIndexer).
pub type KmerIndex = usize;

const CODE_C: u64 = 0;
const CODE_A: u64 = 1;
const CODE_T: u64 = 2;
const CODE_G: u64 = 3;

/// Returns the 2-bit code of a base in query or k-mer list text.
#[inline]
pub const fn base_code(base: u8) -> u64 {
    match base {
        b'C' | b'c' => CODE_C,
        b'T' | b't' => CODE_T,
        b'G' | b'g' => CODE_G,
        _ => CODE_A,
    }
}

/// Returns the 2-bit code of a read base. Lowercase bases are `A`.
#[inline]
pub const fn read_base_code(base: u8) -> u64 {
    match base {
        b'C' => CODE_C,
        b'T' => CODE_T,
        b'G' => CODE_G,
        _ => CODE_A,
    }
}

const fn code_base(code: u64) -> char {
    match code & 0b11 {
        CODE_C => 'C',
        CODE_T => 'T',
        CODE_G => 'G',
        _ => 'A',
    }
}

/// Packs a sequence of bases into a [`Kmer`].
///
/// Only the last `K` bases survive when `seq` is longer than `K`.
#[inline]
pub fn encode(seq: &[u8]) -> Kmer {
    seq.iter()
        .fold(0, |packed, &base| (packed << 2) | base_code(base))
}

/// Unpacks a [`Kmer`] into its `K`-base string.
pub fn decode(kmer: Kmer) -> String {
    (1..=K)
        .rev()
        .map(|i| code_base(kmer >> (i * 2 - 2)))
        .collect()
}

/// Iterator over every `K`-base window of a sequence, left to right.
///
/// Each step shifts the previous window left by one base and ORs in the new
/// base, letting the `u64` drop the base that fell out of the window.
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    seq: &'a [u8],
    next: usize,
    current: Kmer,
}

/// Returns the rolling `K`-base windows of a read (none if it is shorter than `K`).
///
/// Bases are coded with [`read_base_code`].
pub fn windows(seq: &[u8]) -> Windows<'_> {
    let current = seq.get(..K).map_or(0, |first| {
        first
            .iter()
            .fold(0, |packed, &base| (packed << 2) | read_base_code(base))
    });
    Windows {
        seq,
        next: K,
        current,
    }
}

impl Iterator for Windows<'_> {
    type Item = Kmer;

    fn next(&mut self) -> Option<Kmer> {
        if self.next > self.seq.len() {
            return None;
        }
        let kmer = self.current;
        if let Some(&base) = self.seq.get(self.next) {
            self.current = (self.current << 2) | read_base_code(base);
        }
        self.next += 1;
        Some(kmer)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.seq.len() + 1).saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows<'_> {}
