//! Point and intersection queries over a loaded database.
//!
//! A point query reports, for one k-mer, every experiment whose count and
//! reads-per-million both strictly exceed the [`Thresholds`]. An intersection
//! query reports the experiments that pass for every k-mer of a list.

use std::collections::BTreeSet;
use std::io::Write;

use serde::{Serialize, Serializer};

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

use crate::config::Thresholds;
use crate::database::{Database, ExperimentId, KmerCount, ReadCount};
use crate::error::KiqError;
use crate::indexer::KmerIndexer;
use crate::kmer::{encode, Kmer, K};

/// Placeholder printed for an empty description.
pub const NO_DESCRIPTION: &str = "NA";

/// Returns `description`, or [`NO_DESCRIPTION`] if it is empty.
pub fn or_na(description: &str) -> &str {
    if description.is_empty() {
        NO_DESCRIPTION
    } else {
        description
    }
}

/// Reads per million: `count / reads * 1e6`.
///
/// An experiment without reads has an infinite rate.
pub fn rpm(count: KmerCount, reads: ReadCount) -> f64 {
    f64::from(count) / reads as f64 * 1e6
}

/// One experiment reported by a point query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub name: String,
    pub count: KmerCount,
    pub rpm: f64,
    #[serde(rename = "desc", serialize_with = "serialize_description")]
    pub description: String,
}

fn serialize_description<S>(description: &str, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(or_na(description))
}

/// Outcome of a point query.
#[derive(Debug, Clone, PartialEq)]
pub enum PointQuery {
    /// The k-mer is not in the initial k-mer set.
    NotIndexed,
    /// The k-mer is indexed but no experiment has counted it.
    Unrecorded,
    /// Experiments passing the thresholds, in id order. May be empty.
    Recorded(Vec<QueryHit>),
}

impl PointQuery {
    /// The passing experiments; empty unless [`Recorded`](Self::Recorded).
    pub fn hits(&self) -> &[QueryHit] {
        match self {
            Self::Recorded(hits) => hits,
            Self::NotIndexed | Self::Unrecorded => &[],
        }
    }
}

/// Read-only query access to a database and its indexer.
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine<'a, I: ?Sized> {
    db: &'a Database,
    indexer: &'a I,
}

impl<'a, I: KmerIndexer + ?Sized> QueryEngine<'a, I> {
    pub const fn new(db: &'a Database, indexer: &'a I) -> Self {
        Self { db, indexer }
    }

    /// Looks up a single k-mer given as text.
    ///
    /// # Errors
    ///
    /// Returns [`KiqError::InvalidQueryLength`] unless `text` has exactly `K`
    /// bases.
    pub fn point_query(
        &self,
        text: &str,
        thresholds: Thresholds,
    ) -> Result<PointQuery, KiqError> {
        let kmer = parse_query(text)?;
        if !self.db.contains(kmer) {
            return Ok(PointQuery::NotIndexed);
        }
        let Some(counts) = self.db.counts_at(self.indexer.lookup(kmer)) else {
            return Ok(PointQuery::Unrecorded);
        };

        let hits = counts
            .iter()
            .filter_map(|(&id, &count)| {
                let experiment = self.db.experiments().get(id)?;
                let rpm = rpm(count, experiment.read_count);
                thresholds.passes(count, rpm).then(|| QueryHit {
                    name: experiment.name.clone(),
                    count,
                    rpm,
                    description: experiment.description.clone(),
                })
            })
            .collect();
        Ok(PointQuery::Recorded(hits))
    }

    /// Ids of the experiments passing the thresholds for `kmer`.
    ///
    /// Empty for k-mers outside the initial set.
    pub fn passing_experiments(
        &self,
        kmer: Kmer,
        thresholds: Thresholds,
    ) -> BTreeSet<ExperimentId> {
        if !self.db.contains(kmer) {
            return BTreeSet::new();
        }
        self.db
            .counts_at(self.indexer.lookup(kmer))
            .into_iter()
            .flatten()
            .filter(|&(id, &count)| {
                self.db
                    .experiments()
                    .get(*id)
                    .is_some_and(|e| thresholds.passes(count, rpm(count, e.read_count)))
            })
            .map(|(&id, _)| id)
            .collect()
    }

    /// Ids of the experiments passing the thresholds for every k-mer in
    /// `texts`.
    ///
    /// K-mers of the wrong length are skipped with a warning. Stops early once
    /// the intersection is empty.
    pub fn intersect_query<S: AsRef<str>>(
        &self,
        texts: &[S],
        thresholds: Thresholds,
    ) -> BTreeSet<ExperimentId> {
        let mut result: Option<BTreeSet<ExperimentId>> = None;

        for text in texts {
            let text = text.as_ref();
            let kmer = match parse_query(text) {
                Ok(kmer) => kmer,
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    warn!(query = text, "Skipping query k-mer: {_err}");
                    continue;
                }
            };

            let passing = self.passing_experiments(kmer, thresholds);

            #[cfg(feature = "tracing")]
            debug!(query = text, passing = passing.len(), "Intersecting");

            let current = match result {
                Some(previous) => previous.intersection(&passing).copied().collect(),
                None => passing,
            };
            if current.is_empty() {
                return current;
            }
            result = Some(current);
        }
        result.unwrap_or_default()
    }
}

/// Encodes a query k-mer, rejecting text that is not exactly `K` bases long.
pub fn parse_query(text: &str) -> Result<Kmer, KiqError> {
    if text.len() == K {
        Ok(encode(text.as_bytes()))
    } else {
        Err(KiqError::InvalidQueryLength {
            query: text.to_owned(),
            length: text.len(),
        })
    }
}

/// Point query results for one query k-mer, as written in JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryReport {
    pub query: String,
    pub experiments: Vec<QueryHit>,
}

#[derive(Serialize)]
struct Results<'r> {
    results: &'r [QueryReport],
}

#[derive(Serialize)]
struct Intersection<'e> {
    experiments: Vec<ExperimentSummary<'e>>,
}

#[derive(Serialize)]
struct ExperimentSummary<'e> {
    name: &'e str,
    desc: &'e str,
}

/// Writes point query hits as `query name count rpm desc` lines.
pub fn write_hits_tsv<W: Write>(
    out: &mut W,
    query: &str,
    hits: &[QueryHit],
) -> Result<(), KiqError> {
    for hit in hits {
        writeln!(
            out,
            "{query}\t{}\t{}\t{:.6}\t{}",
            hit.name,
            hit.count,
            hit.rpm,
            or_na(&hit.description)
        )?;
    }
    Ok(())
}

/// Writes point query reports as a JSON `results` document.
///
/// JSON has no infinity, so the rpm of an experiment without reads is `null`.
pub fn write_reports_json<W: Write>(
    out: &mut W,
    reports: &[QueryReport],
) -> Result<(), KiqError> {
    serde_json::to_writer_pretty(&mut *out, &Results { results: reports })?;
    writeln!(out)?;
    Ok(())
}

/// Writes the experiments of an intersection as `name desc` lines or JSON.
pub fn write_intersection<W: Write>(
    out: &mut W,
    db: &Database,
    ids: &BTreeSet<ExperimentId>,
    json: bool,
) -> Result<(), KiqError> {
    let experiments: Vec<_> = ids
        .iter()
        .filter_map(|&id| db.experiments().get(id))
        .map(|e| ExperimentSummary {
            name: &e.name,
            desc: or_na(&e.description),
        })
        .collect();

    if json {
        serde_json::to_writer_pretty(&mut *out, &Intersection { experiments })?;
        writeln!(out)?;
    } else {
        for experiment in experiments {
            writeln!(out, "{}\t{}", experiment.name, experiment.desc)?;
        }
    }
    Ok(())
}
