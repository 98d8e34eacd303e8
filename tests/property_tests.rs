//! Property-based tests using proptest.
//!
//! These tests verify invariants that should hold across all valid inputs,
//! catching edge cases that might be missed by example-based tests.

use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use kiq::codec;
use kiq::config::{IngestConfig, Thresholds};
use kiq::database::Database;
use kiq::error::KiqError;
use kiq::indexer::{HashKmerIndexer, KmerIndexer};
use kiq::kmer::{decode, encode, windows, Kmer, K};
use kiq::pool::{CountingWorkerPool, KmerCounter, ScratchCounts};
use kiq::query::QueryEngine;
use kiq::queue::BoundedWorkQueue;
use proptest::prelude::*;

/// Strategy for generating DNA sequences over `ACGT`.
fn dna_sequence(min_len: usize, max_len: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![Just('A'), Just('C'), Just('G'), Just('T')],
        min_len..=max_len,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

/// Strategy for a sorted, deduplicated initial k-mer set.
fn kmer_set(max: usize) -> impl Strategy<Value = Vec<Kmer>> {
    proptest::collection::btree_set(any::<u64>(), 1..=max).prop_map(|set| set.into_iter().collect())
}

/// Per experiment: read count and `(k-mer position, count)` pairs.
type ExperimentPlan = (u64, Vec<(usize, u32)>);

fn experiment_plans() -> impl Strategy<Value = Vec<ExperimentPlan>> {
    proptest::collection::vec(
        (
            0u64..5_000,
            proptest::collection::vec((0usize..64, 0u32..50), 0..12),
        ),
        0..5,
    )
}

/// Builds a database whose experiments follow `plans`.
fn populated(kmers: &[Kmer], plans: &[ExperimentPlan]) -> (Database, HashKmerIndexer) {
    let indexer = HashKmerIndexer::build(kmers);
    let mut db = Database::new(kmers.to_vec(), &indexer).expect("sorted k-mers");
    for (n, (reads, counts)) in plans.iter().enumerate() {
        let scratch = ScratchCounts::new(indexer.size());
        for &(position, count) in counts {
            let slot = indexer.lookup(kmers[position % kmers.len()]);
            for _ in 0..count {
                scratch.increment(slot);
            }
        }
        db.merge_run(&format!("exp{n}"), &format!("desc {n}"), &scratch, *reads);
    }
    (db, indexer)
}

fn reads_of(seqs: &[String]) -> Vec<Result<Bytes, KiqError>> {
    seqs.iter().map(|s| Ok(Bytes::from(s.clone()))).collect()
}

proptest! {
    /// Encoding and decoding a 32-base k-mer over ACGT is the identity.
    #[test]
    fn encode_decode_roundtrip(seq in dna_sequence(K, K)) {
        prop_assert_eq!(decode(encode(seq.as_bytes())), seq);
    }

    /// Rolling windows agree with encoding each window from scratch.
    #[test]
    fn windows_match_direct_encoding(seq in dna_sequence(0, 80)) {
        let rolled: Vec<Kmer> = windows(seq.as_bytes()).collect();
        let direct: Vec<Kmer> = seq
            .as_bytes()
            .windows(K)
            .map(encode)
            .collect();
        prop_assert_eq!(rolled, direct);
    }

    /// The worker count never changes the totals, and the totals equal a
    /// sequential count.
    #[test]
    fn parallel_counts_match_sequential(
        seqs in proptest::collection::vec(dna_sequence(0, 70), 0..40),
        workers in 1usize..6,
        capacity in 1usize..8,
    ) {
        let mut expected: HashMap<Kmer, u32> = HashMap::new();
        for seq in &seqs {
            for kmer in windows(seq.as_bytes()) {
                *expected.entry(kmer).or_default() += 1;
            }
        }
        // Every window that occurs, plus one that never does.
        let mut kmers: Vec<Kmer> = expected.keys().copied().collect();
        kmers.push(u64::MAX);
        kmers.sort_unstable();
        kmers.dedup();

        let indexer = HashKmerIndexer::build(&kmers);
        let counter = KmerCounter::new(&indexer, &kmers);
        let config = IngestConfig::new(workers, capacity, false).expect("valid config");
        let run = CountingWorkerPool::new(&config)
            .run(&counter, reads_of(&seqs))
            .expect("in-memory reads");

        prop_assert_eq!(run.reads(), seqs.len() as u64);
        for &kmer in &kmers {
            let want = expected.get(&kmer).copied().unwrap_or(0);
            prop_assert_eq!(run.scratch.get(indexer.lookup(kmer)), want);
        }
    }

    /// Writing and reading a database reproduces it exactly.
    #[test]
    fn database_roundtrip(kmers in kmer_set(64), plans in experiment_plans()) {
        let (db, indexer) = populated(&kmers, &plans);
        let mut bytes = Vec::new();
        codec::write_to(&db, &indexer, &mut bytes).expect("in-memory write");

        let loaded = codec::read_from(Cursor::new(bytes), Path::new("mem"), &indexer, true)
            .expect("valid encoding");
        prop_assert_eq!(loaded, db);
    }

    /// Every truncation of a valid database is rejected.
    #[test]
    fn truncated_database_is_rejected(
        kmers in kmer_set(8),
        plans in experiment_plans(),
        cut in any::<prop::sample::Index>(),
    ) {
        let (db, indexer) = populated(&kmers, &plans);
        let mut bytes = Vec::new();
        codec::write_to(&db, &indexer, &mut bytes).expect("in-memory write");
        let len = cut.index(bytes.len());
        bytes.truncate(len);

        let result = codec::read_from(Cursor::new(bytes), Path::new("mem"), &indexer, true);
        prop_assert!(result.is_err());
    }

    /// Point query hits pass both thresholds strictly.
    #[test]
    fn hits_pass_thresholds(
        kmers in kmer_set(16),
        plans in experiment_plans(),
        count in 0u32..30,
        rpm in 0.0f64..20_000.0,
    ) {
        let (db, indexer) = populated(&kmers, &plans);
        let engine = QueryEngine::new(&db, &indexer);
        let thresholds = Thresholds::new(count, rpm);

        for &kmer in &kmers {
            let result = engine.point_query(&decode(kmer), thresholds).expect("valid length");
            for hit in result.hits() {
                prop_assert!(hit.count > count);
                prop_assert!(hit.rpm > rpm);
            }
        }
    }

    /// The intersection is contained in every single-k-mer result and
    /// never grows when more k-mers are added.
    #[test]
    fn intersection_is_monotone(
        kmers in kmer_set(16),
        plans in experiment_plans(),
        count in 0u32..10,
    ) {
        let (db, indexer) = populated(&kmers, &plans);
        let engine = QueryEngine::new(&db, &indexer);
        let thresholds = Thresholds::new(count, 0.0);
        let texts: Vec<String> = kmers.iter().map(|&k| decode(k)).collect();

        let mut previous: Option<BTreeSet<u32>> = None;
        for n in 1..=texts.len() {
            let current = engine.intersect_query(&texts[..n], thresholds);
            let single = engine.passing_experiments(kmers[n - 1], thresholds);
            prop_assert!(current.is_subset(&single));
            if let Some(previous) = &previous {
                prop_assert!(current.is_subset(previous));
            }
            previous = Some(current);
        }
    }

    /// Every pushed item is popped exactly once and the queue never holds
    /// more than its capacity.
    #[test]
    fn queue_delivers_each_item_once(
        items in 0usize..500,
        capacity in 1usize..16,
        consumers in 1usize..5,
    ) {
        let queue = Arc::new(BoundedWorkQueue::new(capacity).expect("positive capacity"));

        let handles: Vec<_> = (0..consumers)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(item) = queue.pop() {
                        seen.push(item);
                    }
                    seen
                })
            })
            .collect();

        let mut max_len = 0;
        for item in 0..items {
            queue.push(item);
            max_len = max_len.max(queue.len());
        }
        queue.mark_finished();

        let mut popped: Vec<usize> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("consumer panicked"))
            .collect();
        popped.sort_unstable();
        prop_assert!(max_len <= capacity);
        prop_assert_eq!(popped, (0..items).collect::<Vec<_>>());
    }
}
