//! Ingesting experiments into a database.
//!
//! An experiment is counted by a [`CountingWorkerPool`] and the resulting
//! scratch counts are merged into the database under the experiment's name.
//! Ingesting the same name again adds to its counts and read count.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use bytes::Bytes;

#[cfg(feature = "tracing")]
use tracing::{info, info_span, warn};

use crate::codec;
use crate::config::IngestConfig;
use crate::database::{Database, ReadCount};
use crate::error::KiqError;
use crate::indexer::KmerIndexer;
use crate::pool::{CountingWorkerPool, KmerCounter};
use crate::reader::open_sequences;

/// One line of a sample list: `name<TAB>file[<TAB>description]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleEntry {
    pub name: String,
    pub path: PathBuf,
    pub description: String,
}

impl SampleEntry {
    /// Parses a sample list line.
    ///
    /// Returns `None` for blank lines and lines without a tab or with an empty
    /// name. Everything after the second tab is the description.
    pub fn parse(line: &str) -> Option<Self> {
        let (name, rest) = line.split_once('\t')?;
        if name.is_empty() {
            return None;
        }
        let (path, description) = rest.split_once('\t').unwrap_or((rest, ""));
        Some(Self {
            name: name.to_owned(),
            path: PathBuf::from(path),
            description: description.to_owned(),
        })
    }
}

/// Reads every valid entry of a sample list file.
pub fn read_sample_list<P: AsRef<Path>>(path: P) -> Result<Vec<SampleEntry>, KiqError> {
    let path = path.as_ref();
    let read_err = |source| KiqError::InputRead {
        source,
        path: path.to_path_buf(),
    };

    let reader = BufReader::new(File::open(path).map_err(read_err)?);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(read_err)?;
        let line = line.trim_end_matches('\r');
        match SampleEntry::parse(line) {
            Some(entry) => entries.push(entry),
            None if line.is_empty() => {}
            None => {
                #[cfg(feature = "tracing")]
                warn!(line, "Skipping malformed sample list line");
            }
        }
    }
    Ok(entries)
}

/// Counts one experiment and merges it into `db`.
///
/// The experiment is only registered once counting has succeeded. Returns
/// the number of reads pulled from `sequences`.
pub fn ingest_experiment<I, S>(
    db: &mut Database,
    counter: &KmerCounter<'_, I>,
    name: &str,
    description: &str,
    sequences: S,
    config: &IngestConfig,
) -> Result<ReadCount, KiqError>
where
    I: KmerIndexer + Sync + ?Sized,
    S: IntoIterator<Item = Result<Bytes, KiqError>>,
{
    #[cfg(feature = "tracing")]
    let _span = info_span!("ingest", experiment = name).entered();

    let run = CountingWorkerPool::new(config).run(counter, sequences)?;
    let reads = run.reads();
    let _id = db.merge_run(name, description, &run.scratch, reads);

    #[cfg(feature = "tracing")]
    info!(id = _id, reads, "Merged experiment counts");

    Ok(reads)
}

/// Outcome of [`ingest_samples`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Experiments counted, in sample list order.
    pub ingested: Vec<String>,
    /// Experiments skipped because they were already in the database.
    pub skipped: Vec<String>,
}

/// Ingests every sample of a list, saving the database after each one.
///
/// In append mode, samples whose name is already in the database are skipped
/// with a warning.
pub fn ingest_samples<I, P>(
    db: &mut Database,
    indexer: &I,
    samples: &[SampleEntry],
    config: &IngestConfig,
    db_path: P,
) -> Result<IngestSummary, KiqError>
where
    I: KmerIndexer + Sync + ?Sized,
    P: AsRef<Path>,
{
    let counter = KmerCounter::new(indexer, db.initial_kmers());
    let mut summary = IngestSummary::default();

    for sample in samples {
        if config.append() && db.experiments().contains_name(&sample.name) {
            #[cfg(feature = "tracing")]
            warn!(experiment = %sample.name, "Experiment is already in database, skipping");
            summary.skipped.push(sample.name.clone());
            continue;
        }

        #[cfg(feature = "tracing")]
        info!(experiment = %sample.name, path = ?sample.path, "Counting k-mers");

        let sequences = open_sequences(&sample.path)?;
        ingest_experiment(
            db,
            &counter,
            &sample.name,
            &sample.description,
            sequences,
            config,
        )?;
        codec::write(db, indexer, db_path.as_ref())?;
        summary.ingested.push(sample.name.clone());
    }
    Ok(summary)
}
