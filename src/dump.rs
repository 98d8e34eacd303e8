//! Text dumps of a database.

use std::io::Write;

use clap::ValueEnum;

use crate::database::Database;
use crate::error::KiqError;
use crate::indexer::KmerIndexer;
use crate::kmer::decode;
use crate::query::{or_na, rpm};

/// What to dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DumpMode {
    /// One line per k-mer: k-mer, number of experiments, `id=.. count=..` pairs
    Db,
    /// One line per recorded (k-mer, experiment) pair: k-mer, name, count, rpm
    Long,
    /// One line per experiment: id, name, read count, description
    Metadata,
    /// Summary counts
    Stats,
}

/// Writes `db` to `out` in the given mode.
pub fn dump<W, I>(
    out: &mut W,
    db: &Database,
    indexer: &I,
    mode: DumpMode,
) -> Result<(), KiqError>
where
    W: Write,
    I: KmerIndexer + ?Sized,
{
    match mode {
        DumpMode::Db => {
            for &kmer in db.initial_kmers() {
                let counts = db.counts_at(indexer.lookup(kmer));
                write!(out, "{}\t{}", decode(kmer), counts.map_or(0, |c| c.len()))?;
                for (id, count) in counts.into_iter().flatten() {
                    write!(out, "\tid={id} count={count}")?;
                }
                writeln!(out)?;
            }
        }
        DumpMode::Long => {
            for &kmer in db.initial_kmers() {
                let Some(counts) = db.counts_at(indexer.lookup(kmer)) else {
                    continue;
                };
                let text = decode(kmer);
                for (&id, &count) in counts {
                    if let Some(experiment) = db.experiments().get(id) {
                        let rpm = rpm(count, experiment.read_count);
                        writeln!(out, "{text}\t{}\t{count}\t{rpm:.6}", experiment.name)?;
                    }
                }
            }
        }
        DumpMode::Metadata => {
            for experiment in db.experiments().iter() {
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    experiment.id,
                    experiment.name,
                    experiment.read_count,
                    or_na(&experiment.description)
                )?;
            }
        }
        DumpMode::Stats => {
            writeln!(out, "Number of experiments\t{}", db.experiments().len())?;
            writeln!(out, "Number of k-mers\t{}", db.num_kmers())?;
            writeln!(out, "K-mers with experiments\t{}", db.recorded_kmers())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Experiment;
    use crate::indexer::HashKmerIndexer;

    fn fixture() -> (Database, HashKmerIndexer) {
        let kmers = [1, 2];
        let indexer = HashKmerIndexer::build(&kmers);
        let mut db = Database::new(kmers.to_vec(), &indexer).unwrap();
        db.experiments_mut().insert(Experiment {
            id: 1,
            name: "liver".into(),
            description: "adult".into(),
            read_count: 4_000_000,
        });
        db.experiments_mut().insert(Experiment {
            id: 2,
            name: "brain".into(),
            description: String::new(),
            read_count: 1000,
        });
        db.add_count(indexer.lookup(2), 1, 8);
        db.add_count(indexer.lookup(2), 2, 3);
        (db, indexer)
    }

    fn render(mode: DumpMode) -> String {
        let (db, indexer) = fixture();
        let mut out = Vec::new();
        dump(&mut out, &db, &indexer, mode).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn db_mode() {
        insta::assert_snapshot!(render(DumpMode::Db), @r"
        CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCA	0
        CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCT	2	id=1 count=8	id=2 count=3
        ");
    }

    #[test]
    fn long_mode() {
        insta::assert_snapshot!(render(DumpMode::Long), @r"
        CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCT	liver	8	2.000000
        CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCT	brain	3	3000.000000
        ");
    }

    #[test]
    fn metadata_mode() {
        insta::assert_snapshot!(render(DumpMode::Metadata), @r"
        1	liver	4000000	adult
        2	brain	1000	NA
        ");
    }

    #[test]
    fn stats_mode() {
        insta::assert_snapshot!(render(DumpMode::Stats), @r"
        Number of experiments	2
        Number of k-mers	2
        K-mers with experiments	1
        ");
    }
}
