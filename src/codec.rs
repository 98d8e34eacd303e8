//! Binary database files.
//!
//! # Database File Format (Version 2)
//!
//! All integers are little-endian.
//!
//! ```text
//! +--------+---------+
//! | MAGIC  | VERSION |   MAGIC:   "KIQ\n"
//! | 4 bytes| 4 bytes |   VERSION: u32, currently 2
//! +--------+---------+
//!
//! K-mer section
//!   num_kmers: u64
//!   num_kmers times, ascending k-mer order:
//!     kmer: u64, num_exp: u32
//!     num_exp times: exp_id: u32, count: u32
//!
//! Metadata section
//!   label: "METADATA" (8 bytes), num_exp: u64
//!   num_exp times:
//!     exp_id: u32, read_count: u64, name: NUL-terminated,
//!     description: NUL-terminated (version 2 only)
//! ```
//!
//! Version 1 files have no description field and are read with empty
//! descriptions. Files are always written as version 2.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::{debug, info};

use crate::database::{CountMap, Database, Experiment, ExperimentRegistry};
use crate::error::KiqError;
use crate::indexer::KmerIndexer;
use crate::kmer::Kmer;

/// Magic bytes identifying a kiq database file.
pub const MAGIC: &[u8; 4] = b"KIQ\n";

/// Format version written by this crate.
pub const VERSION: u32 = 2;

/// Oldest readable format version.
const MIN_VERSION: u32 = 1;

/// Label opening the metadata section.
pub const METADATA_LABEL: &[u8; 8] = b"METADATA";

/// Writes `db` to `path`, replacing any existing file.
///
/// The file is first written next to `path` and renamed over it once
/// complete, so a failed write leaves the previous database intact.
pub fn write<I, P>(db: &Database, indexer: &I, path: P) -> Result<(), KiqError>
where
    I: KmerIndexer + ?Sized,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    #[cfg(feature = "tracing")]
    info!(
        path = ?path,
        kmers = db.num_kmers(),
        experiments = db.experiments().len(),
        "Writing database"
    );

    replace_file(path, |writer| write_to(db, indexer, writer))
}

/// Writes a fresh database over `initial_kmers` with no experiments.
///
/// `initial_kmers` must already be sorted and deduplicated.
pub fn write_initial<P: AsRef<Path>>(path: P, initial_kmers: &[Kmer]) -> Result<(), KiqError> {
    let path = path.as_ref();

    #[cfg(feature = "tracing")]
    info!(path = ?path, kmers = initial_kmers.len(), "Writing initial database");

    replace_file(path, |writer| {
        write_header(writer, initial_kmers.len())?;
        for kmer in initial_kmers {
            writer.write_all(&kmer.to_le_bytes())?;
            writer.write_all(&0u32.to_le_bytes())?;
        }
        writer.write_all(METADATA_LABEL)?;
        writer.write_all(&0u64.to_le_bytes())
    })
}

/// Serializes `db` to any writer.
pub fn write_to<W, I>(db: &Database, indexer: &I, writer: &mut W) -> io::Result<()>
where
    W: Write,
    I: KmerIndexer + ?Sized,
{
    write_header(writer, db.num_kmers())?;

    for &kmer in db.initial_kmers() {
        writer.write_all(&kmer.to_le_bytes())?;
        match db.counts_at(indexer.lookup(kmer)) {
            Some(counts) => {
                writer.write_all(&(counts.len() as u32).to_le_bytes())?;
                for (id, count) in counts {
                    writer.write_all(&id.to_le_bytes())?;
                    writer.write_all(&count.to_le_bytes())?;
                }
            }
            None => writer.write_all(&0u32.to_le_bytes())?,
        }
    }

    writer.write_all(METADATA_LABEL)?;
    writer.write_all(&(db.experiments().len() as u64).to_le_bytes())?;
    for experiment in db.experiments().iter() {
        writer.write_all(&experiment.id.to_le_bytes())?;
        writer.write_all(&experiment.read_count.to_le_bytes())?;
        writer.write_all(experiment.name.as_bytes())?;
        writer.write_all(&[0])?;
        writer.write_all(experiment.description.as_bytes())?;
        writer.write_all(&[0])?;
    }
    Ok(())
}

fn write_header<W: Write>(writer: &mut W, num_kmers: usize) -> io::Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;
    writer.write_all(&(num_kmers as u64).to_le_bytes())
}

fn replace_file<F>(path: &Path, fill: F) -> Result<(), KiqError>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let io_err = |source| KiqError::DatabaseWrite {
        source,
        path: path.to_path_buf(),
    };
    let temp = temp_path(path);

    let result = File::create(&temp).and_then(|file| {
        let mut writer = BufWriter::new(file);
        fill(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    });
    if let Err(source) = result {
        let _ = fs::remove_file(&temp);
        return Err(io_err(source));
    }
    fs::rename(&temp, path).map_err(io_err)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Reads the database at `path`.
///
/// With `attach_counts` unset only the initial k-mer set is kept; counts and
/// experiments are still validated but dropped.
pub fn read<I, P>(path: P, indexer: &I, attach_counts: bool) -> Result<Database, KiqError>
where
    I: KmerIndexer + ?Sized,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    #[cfg(feature = "tracing")]
    info!(path = ?path, attach_counts, "Reading database");

    let file = File::open(path).map_err(|source| KiqError::DatabaseRead {
        source,
        path: path.to_path_buf(),
    })?;
    read_from(BufReader::new(file), path, indexer, attach_counts)
}

/// Reads a database from any buffered reader. `path` only names the source in
/// errors.
pub fn read_from<R, I>(
    reader: R,
    path: &Path,
    indexer: &I,
    attach_counts: bool,
) -> Result<Database, KiqError>
where
    R: BufRead,
    I: KmerIndexer + ?Sized,
{
    Decoder { reader, path }.database(indexer, attach_counts)
}

struct Decoder<'p, R> {
    reader: R,
    path: &'p Path,
}

impl<R: BufRead> Decoder<'_, R> {
    fn database<I: KmerIndexer + ?Sized>(
        mut self,
        indexer: &I,
        attach_counts: bool,
    ) -> Result<Database, KiqError> {
        let magic: [u8; 4] = self.array("header magic")?;
        if &magic != MAGIC {
            return Err(self.corrupt("invalid magic bytes (not a kiq database)"));
        }
        let version = self.u32("header version")?;
        if !(MIN_VERSION..=VERSION).contains(&version) {
            return Err(self.corrupt(format!("unsupported database version {version}")));
        }

        let num_kmers = self.u64("k-mer count")?;
        let expected = indexer.size() as u64;
        if num_kmers != expected {
            return Err(KiqError::KmerCountMismatch {
                expected,
                found: num_kmers,
                path: self.path.to_path_buf(),
            });
        }

        let n = indexer.size();
        let mut initial_kmers = Vec::with_capacity(n);
        let mut counts: Vec<Option<CountMap>> = vec![None; n];
        let mut taken = vec![false; n];
        let mut referenced = Vec::new();

        for _ in 0..n {
            let kmer = self.u64("k-mer record")?;
            if initial_kmers.last().is_some_and(|&prev| prev >= kmer) {
                return Err(self.corrupt(format!("k-mer {kmer} out of ascending order")));
            }
            if !indexer.contains(kmer) {
                return Err(self.corrupt(format!(
                    "k-mer {kmer} is not in the index; index does not match database"
                )));
            }
            let index = indexer.lookup(kmer);
            if index >= n {
                return Err(self.corrupt(format!(
                    "k-mer {kmer} indexed at {index}, outside 0..{n}"
                )));
            }
            if std::mem::replace(&mut taken[index], true) {
                return Err(self.corrupt(format!(
                    "k-mer {kmer} shares slot {index} with another k-mer; index does not match database"
                )));
            }

            let num_exp = self.u32("k-mer record")?;
            let mut map = CountMap::new();
            for _ in 0..num_exp {
                let id = self.u32("count record")?;
                let count = self.u32("count record")?;
                if map.insert(id, count).is_some() {
                    return Err(self.corrupt(format!(
                        "experiment {id} listed twice for k-mer {kmer}"
                    )));
                }
            }
            map.retain(|_, count| *count > 0);
            if attach_counts && !map.is_empty() {
                referenced.extend(map.keys().copied());
                counts[index] = Some(map);
            }
            initial_kmers.push(kmer);
        }

        #[cfg(feature = "tracing")]
        debug!(kmers = n, "Read k-mer section");

        let label: [u8; 8] = self.array("metadata label")?;
        if &label != METADATA_LABEL {
            return Err(self.corrupt("missing METADATA label"));
        }
        let num_exp = self.u64("metadata count")?;
        let mut experiments = ExperimentRegistry::new();
        for _ in 0..num_exp {
            let id = self.u32("experiment record")?;
            let read_count = self.u64("experiment record")?;
            let name = self.string("experiment name")?;
            let description = if version >= 2 {
                self.string("experiment description")?
            } else {
                String::new()
            };
            if id == 0 {
                return Err(self.corrupt(format!("experiment '{name}' has id 0")));
            }
            let inserted = experiments.insert(Experiment {
                id,
                name,
                description,
                read_count,
            });
            if !inserted {
                return Err(self.corrupt(format!("duplicate experiment id or name (id {id})")));
            }
        }

        #[cfg(feature = "tracing")]
        debug!(experiments = experiments.len(), version, "Read metadata section");

        let trailing = self.reader.fill_buf().map(|rest| !rest.is_empty());
        if trailing.map_err(|e| self.read_error(e, "end of file"))? {
            return Err(self.corrupt("trailing bytes after metadata section"));
        }

        if !attach_counts {
            return Ok(Database::from_parts(
                initial_kmers,
                vec![None; n],
                ExperimentRegistry::new(),
            ));
        }
        if let Some(id) = referenced.into_iter().find(|&id| !experiments.contains_id(id)) {
            return Err(self.corrupt(format!("count record refers to unknown experiment {id}")));
        }
        Ok(Database::from_parts(initial_kmers, counts, experiments))
    }

    fn array<const N: usize>(&mut self, section: &'static str) -> Result<[u8; N], KiqError> {
        let mut buf = [0; N];
        self.reader
            .read_exact(&mut buf)
            .map_err(|e| self.read_error(e, section))?;
        Ok(buf)
    }

    fn u32(&mut self, section: &'static str) -> Result<u32, KiqError> {
        self.array(section).map(u32::from_le_bytes)
    }

    fn u64(&mut self, section: &'static str) -> Result<u64, KiqError> {
        self.array(section).map(u64::from_le_bytes)
    }

    fn string(&mut self, section: &'static str) -> Result<String, KiqError> {
        let mut buf = Vec::new();
        self.reader
            .read_until(0, &mut buf)
            .map_err(|e| self.read_error(e, section))?;
        if buf.pop() != Some(0) {
            return Err(self.truncated(section));
        }
        String::from_utf8(buf).map_err(|_| self.corrupt(format!("{section} is not valid UTF-8")))
    }

    fn read_error(&self, source: io::Error, section: &'static str) -> KiqError {
        if source.kind() == io::ErrorKind::UnexpectedEof {
            self.truncated(section)
        } else {
            KiqError::DatabaseRead {
                source,
                path: self.path.to_path_buf(),
            }
        }
    }

    fn truncated(&self, section: &'static str) -> KiqError {
        KiqError::Truncated {
            section,
            path: self.path.to_path_buf(),
        }
    }

    fn corrupt(&self, details: impl Into<String>) -> KiqError {
        KiqError::format(details, self.path)
    }
}
