//! K-mer indexing: a dense slot for every k-mer of the initial set.
//!
//! [`KmerIndexer`] is the contract the rest of the crate consumes. It maps each
//! member of the initial k-mer set to a distinct slot in `[0, N)`. Lookups of
//! k-mers outside the set return an arbitrary in-range slot, so callers must
//! test membership before trusting a lookup.
//!
//! [`HashKmerIndexer`] is the bundled implementation. Slots follow hash order
//! rather than sorted order, and the indexer is persisted to a companion index
//! file next to the database.
//!
//! # Index File Format (Version 1)
//!
//! ```text
//! +--------+---------+--------+-----------------+
//! | MAGIC  | VERSION | COUNT  |     KMERS       |
//! | 4 bytes| 4 bytes | 8 bytes| 8 bytes x COUNT |
//! +--------+---------+--------+-----------------+
//!
//! MAGIC:   "KIQI"
//! VERSION: little-endian u32, currently 1
//! COUNT:   number of k-mers (little-endian u64)
//! KMERS:   packed k-mers in slot order (little-endian u64)
//! ```

use std::fs::File;
use std::hash::BuildHasher;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::error::KiqError;
use crate::kmer::{Kmer, KmerIndex};

/// Magic bytes identifying a kiq index file.
const MAGIC: &[u8; 4] = b"KIQI";

/// Current index format version.
const VERSION: u32 = 1;

/// Maps members of a fixed k-mer set to dense slots.
pub trait KmerIndexer {
    /// Returns the slot of `kmer`.
    ///
    /// Only meaningful for members of the set the indexer was built from.
    fn lookup(&self, kmer: Kmer) -> KmerIndex;

    /// Returns the number of k-mers `N`.
    fn size(&self) -> usize;

    /// Returns true if `kmer` was part of the set the indexer was built from.
    fn contains(&self, kmer: Kmer) -> bool;
}

/// A hash-ordered k-mer indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashKmerIndexer {
    by_slot: Vec<Kmer>,
    slots: FxHashMap<Kmer, KmerIndex>,
}

impl HashKmerIndexer {
    /// Builds an indexer over `kmers`; duplicates are ignored.
    pub fn build(kmers: &[Kmer]) -> Self {
        let hasher = FxBuildHasher;
        let mut by_slot = kmers.to_vec();
        by_slot.sort_unstable_by_key(|&kmer| (hasher.hash_one(kmer), kmer));
        by_slot.dedup();
        Self::from_slots(by_slot)
    }

    fn from_slots(by_slot: Vec<Kmer>) -> Self {
        let slots = by_slot
            .iter()
            .enumerate()
            .map(|(slot, &kmer)| (kmer, slot))
            .collect();
        Self { by_slot, slots }
    }

    /// Saves the indexer to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), KiqError> {
        let path = path.as_ref();
        let io_err = |source| KiqError::IndexWrite {
            source,
            path: path.to_path_buf(),
        };

        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer).map_err(io_err)?;
        writer.flush().map_err(io_err)
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&(self.by_slot.len() as u64).to_le_bytes())?;
        for kmer in &self.by_slot {
            writer.write_all(&kmer.to_le_bytes())?;
        }
        Ok(())
    }

    /// Loads an indexer saved with [`save`](Self::save).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, KiqError> {
        let path = path.as_ref();

        #[cfg(feature = "tracing")]
        tracing::info!(path = ?path, "Reading index");

        let mut data = Vec::new();
        File::open(path)
            .map(BufReader::new)
            .and_then(|mut reader| reader.read_to_end(&mut data))
            .map_err(|source| KiqError::IndexRead {
                source,
                path: path.to_path_buf(),
            })?;

        Self::from_bytes(&data, path)
    }

    fn from_bytes(data: &[u8], path: &Path) -> Result<Self, KiqError> {
        let truncated = |section| KiqError::Truncated {
            section,
            path: path.to_path_buf(),
        };

        let (magic, rest) = split(data, 4).ok_or_else(|| truncated("index magic"))?;
        if magic != MAGIC {
            return Err(KiqError::format(
                "invalid magic bytes (not a kiq index file)",
                path,
            ));
        }

        let (version, rest) = split(rest, 4).ok_or_else(|| truncated("index version"))?;
        let version = u32::from_le_bytes(to_array(version));
        if version != VERSION {
            return Err(KiqError::format(
                format!("unsupported index version {version}"),
                path,
            ));
        }

        let (count, mut rest) = split(rest, 8).ok_or_else(|| truncated("index k-mer count"))?;
        let count = u64::from_le_bytes(to_array(count));

        let mut by_slot = Vec::new();
        for _ in 0..count {
            let (kmer, tail) = split(rest, 8).ok_or_else(|| truncated("index k-mers"))?;
            by_slot.push(u64::from_le_bytes(to_array(kmer)));
            rest = tail;
        }
        if !rest.is_empty() {
            return Err(KiqError::format(
                format!("{} trailing bytes after index k-mers", rest.len()),
                path,
            ));
        }

        let indexer = Self::from_slots(by_slot);
        if indexer.slots.len() != indexer.by_slot.len() {
            return Err(KiqError::format("duplicate k-mers in index", path));
        }
        Ok(indexer)
    }
}

impl KmerIndexer for HashKmerIndexer {
    fn lookup(&self, kmer: Kmer) -> KmerIndex {
        self.slots.get(&kmer).copied().unwrap_or_default()
    }

    fn size(&self) -> usize {
        self.by_slot.len()
    }

    fn contains(&self, kmer: Kmer) -> bool {
        self.slots.contains_key(&kmer)
    }
}

fn split(data: &[u8], at: usize) -> Option<(&[u8], &[u8])> {
    (data.len() >= at).then(|| data.split_at(at))
}

fn to_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut array = [0; N];
    array.copy_from_slice(bytes);
    array
}
