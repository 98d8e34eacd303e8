//! Command runners.
//!
//! Each subcommand loads the index and database it needs, performs its work
//! through the library modules and writes results to stdout.

use std::fs::File;
use std::io::{stdout, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use rayon::slice::ParallelSliceMut;

#[cfg(feature = "tracing")]
use tracing::{info, warn};

use crate::cli::{Args, Command, DbArgs, DumpArgs, IndexArgs, ModifyArgs, QueryArgs};
use crate::codec;
use crate::config::{IngestConfig, Thresholds};
use crate::dump::dump;
use crate::error::KiqError;
use crate::indexer::HashKmerIndexer;
use crate::ingest::{ingest_samples, read_sample_list};
use crate::kmer::{encode, Kmer, K};
use crate::modify::apply_file;
#[cfg(feature = "tracing")]
use crate::query::PointQuery;
use crate::query::{
    write_hits_tsv, write_intersection, write_reports_json, QueryEngine, QueryReport,
};

/// Runs the parsed command line.
pub fn run(args: Args) -> Result<(), KiqError> {
    match args.command {
        Command::Index(args) => run_index(&args),
        Command::Db(args) => run_db(&args),
        Command::Query(args) => run_query(&args),
        Command::Dump(args) => run_dump(&args),
        Command::Modify(args) => run_modify(&args),
    }
}

/// Reads a k-mer list, one k-mer per line.
///
/// Blank lines are ignored and lines that are not exactly `K` characters long
/// are skipped with a warning. Returns the k-mers sorted and deduplicated.
pub fn read_kmer_list<P: AsRef<Path>>(path: P) -> Result<Vec<Kmer>, KiqError> {
    let path = path.as_ref();
    let read_err = |source| KiqError::InputRead {
        source,
        path: path.to_path_buf(),
    };

    #[cfg(feature = "tracing")]
    info!(path = ?path, "Reading k-mers");

    let reader = BufReader::new(File::open(path).map_err(read_err)?);
    let mut kmers = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(read_err)?;
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        if line.len() != K {
            #[cfg(feature = "tracing")]
            warn!(line, length = line.len(), "Skipping k-mer of wrong length");
            continue;
        }
        kmers.push(encode(line.as_bytes()));
    }

    kmers.par_sort_unstable();
    kmers.dedup();
    Ok(kmers)
}

/// Builds the index and an empty database over the k-mers in `kmer_list`.
///
/// Returns the number of distinct k-mers indexed.
pub fn build_index<P, Q, R>(kmer_list: P, index_path: Q, db_path: R) -> Result<usize, KiqError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    let kmers = read_kmer_list(kmer_list)?;

    #[cfg(feature = "tracing")]
    info!(kmers = kmers.len(), "Building index");

    let indexer = HashKmerIndexer::build(&kmers);
    codec::write_initial(db_path, &kmers)?;
    indexer.save(index_path)?;
    Ok(kmers.len())
}

fn run_index(args: &IndexArgs) -> Result<(), KiqError> {
    build_index(&args.kmers, &args.files.index, &args.files.database).map(|_| ())
}

fn run_db(args: &DbArgs) -> Result<(), KiqError> {
    let config = IngestConfig::new(args.threads, args.queue_capacity, args.append)?;
    let indexer = HashKmerIndexer::load(&args.files.index)?;
    let mut db = codec::read(&args.files.database, &indexer, config.append())?;
    let samples = read_sample_list(&args.samples)?;

    let _summary = ingest_samples(&mut db, &indexer, &samples, &config, &args.files.database)?;

    #[cfg(feature = "tracing")]
    info!(
        ingested = _summary.ingested.len(),
        skipped = _summary.skipped.len(),
        "Finished"
    );
    Ok(())
}

fn run_query(args: &QueryArgs) -> Result<(), KiqError> {
    let indexer = HashKmerIndexer::load(&args.files.index)?;
    let db = codec::read(&args.files.database, &indexer, true)?;
    let engine = QueryEngine::new(&db, &indexer);
    let thresholds = Thresholds::new(args.threshold, args.rpm);
    let queries = match &args.query_file {
        Some(path) => read_queries(path)?,
        None => args.kmers.clone(),
    };

    let mut out = BufWriter::new(stdout().lock());

    if args.all {
        let ids = engine.intersect_query(&queries, thresholds);
        write_intersection(&mut out, &db, &ids, args.json)?;
    } else {
        let mut reports = Vec::new();
        for query in queries {
            let result = match engine.point_query(&query, thresholds) {
                Ok(result) => result,
                Err(_err @ KiqError::InvalidQueryLength { .. }) => {
                    #[cfg(feature = "tracing")]
                    warn!("Skipping query: {_err}");
                    continue;
                }
                Err(err) => return Err(err),
            };

            #[cfg(feature = "tracing")]
            log_outcome(&query, &result);

            if args.json {
                reports.push(QueryReport {
                    query,
                    experiments: result.hits().to_vec(),
                });
            } else {
                write_hits_tsv(&mut out, &query, result.hits())?;
            }
        }
        if args.json {
            write_reports_json(&mut out, &reports)?;
        }
    }

    out.flush()?;
    Ok(())
}

#[cfg(feature = "tracing")]
fn log_outcome(query: &str, result: &PointQuery) {
    match result {
        PointQuery::NotIndexed => info!(query, "K-mer is not in the initial k-mer set"),
        PointQuery::Unrecorded => info!(query, "K-mer was not found in any experiment"),
        PointQuery::Recorded(hits) => info!(query, hits = hits.len(), "K-mer found"),
    }
}

fn read_queries(path: &Path) -> Result<Vec<String>, KiqError> {
    let read_err = |source| KiqError::InputRead {
        source,
        path: path.to_path_buf(),
    };
    let reader = BufReader::new(File::open(path).map_err(read_err)?);
    let mut queries = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(read_err)?;
        let line = line.trim_end_matches('\r');
        if !line.is_empty() {
            queries.push(line.to_owned());
        }
    }
    Ok(queries)
}

fn run_dump(args: &DumpArgs) -> Result<(), KiqError> {
    let indexer = HashKmerIndexer::load(&args.files.index)?;
    let db = codec::read(&args.files.database, &indexer, true)?;
    let mut out = BufWriter::new(stdout().lock());
    dump(&mut out, &db, &indexer, args.mode)?;
    out.flush()?;
    Ok(())
}

fn run_modify(args: &ModifyArgs) -> Result<(), KiqError> {
    let indexer = HashKmerIndexer::load(&args.files.index)?;
    let mut db = codec::read(&args.files.database, &indexer, true)?;
    apply_file(&mut db, &args.commands)?;
    codec::write(&db, &indexer, &args.files.database)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::KmerIndexer;
    use tempfile::tempdir;

    #[test]
    fn kmer_list_is_filtered_sorted_and_deduplicated() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("kmers.txt");
        let a = "A".repeat(K);
        let c = "C".repeat(K);
        std::fs::write(&list, format!("{a}\n{c}\n\nACGT\n{a}\r\n{c}G\n")).unwrap();

        let kmers = read_kmer_list(&list).unwrap();
        assert_eq!(kmers, vec![encode(c.as_bytes()), encode(a.as_bytes())]);
    }

    #[test]
    fn build_index_writes_matching_files() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("kmers.txt");
        let index = dir.path().join("kiq.idx");
        let database = dir.path().join("kiq.db");
        std::fs::write(&list, format!("{}\n{}\n", "G".repeat(K), "T".repeat(K))).unwrap();

        assert_eq!(build_index(&list, &index, &database).unwrap(), 2);

        let indexer = HashKmerIndexer::load(&index).unwrap();
        assert_eq!(indexer.size(), 2);
        let db = codec::read(&database, &indexer, true).unwrap();
        assert_eq!(db.num_kmers(), 2);
        assert!(db.experiments().is_empty());
    }
}
