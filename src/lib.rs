//! # kiq
//!
//! An append-only database of 32-mer counts across sequencing experiments.
//!
//! A fixed set of k-mers is indexed once. Experiments (FASTA or FASTQ files)
//! are then counted against that set and merged into the database under
//! their name, and the database can be queried for the experiments in which a
//! k-mer occurs above a count and reads-per-million threshold.
//!
//! ## Library usage
//!
//! ```no_run
//! use kiq::codec;
//! use kiq::config::{IngestConfig, Thresholds};
//! use kiq::indexer::HashKmerIndexer;
//! use kiq::ingest::ingest_experiment;
//! use kiq::pool::KmerCounter;
//! use kiq::query::QueryEngine;
//! use kiq::reader::open_sequences;
//!
//! fn main() -> Result<(), kiq::error::KiqError> {
//!     let indexer = HashKmerIndexer::load("kmers.idx")?;
//!     let mut db = codec::read("kmers.kiq", &indexer, true)?;
//!
//!     let counter = KmerCounter::new(&indexer, db.initial_kmers());
//!     let reads = open_sequences("liver.fq.gz")?;
//!     ingest_experiment(&mut db, &counter, "liver", "adult liver", reads, &IngestConfig::default())?;
//!     codec::write(&db, &indexer, "kmers.kiq")?;
//!
//!     let engine = QueryEngine::new(&db, &indexer);
//!     let result = engine.point_query("CATGCATGCATGCATGCATGCATGCATGCATG", Thresholds::new(5, 1.0))?;
//!     for hit in result.hits() {
//!         println!("{}\t{}\t{:.6}", hit.name, hit.count, hit.rpm);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `tracing` (default): log events through the `tracing` crate
//! - `gzip`: read gzip-compressed sequence files

pub mod cli;
pub mod codec;
pub mod config;
pub mod database;
pub mod dump;
pub mod error;
pub mod format;
pub mod indexer;
pub mod ingest;
pub mod kmer;
pub mod modify;
pub mod pool;
pub mod progress;
pub mod query;
pub mod queue;
pub mod reader;
pub mod run;
