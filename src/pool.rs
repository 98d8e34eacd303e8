//! Parallel k-mer counting.
//!
//! One producer (the calling thread) pulls reads from a sequence source and
//! pushes them onto a [`BoundedWorkQueue`]. A fixed number of scoped worker
//! threads pop reads, slide a 32-base window over each one and, for every
//! window in the known k-mer set, atomically bump that k-mer's slot in a
//! shared [`ScratchCounts`] array. The scope joins every worker before the
//! counts are handed back for merging.

use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use bytes::Bytes;
use rustc_hash::FxHashSet;

use crate::config::IngestConfig;
use crate::database::{KmerCount, ReadCount};
use crate::error::KiqError;
use crate::indexer::KmerIndexer;
use crate::kmer::{windows, Kmer, KmerIndex, K};
use crate::progress::{OccupancyAverage, Progress, ProgressTracker};
use crate::queue::BoundedWorkQueue;

#[cfg(feature = "tracing")]
use tracing::{debug, info, info_span};

/// Reads between two queue occupancy samples.
const SAMPLE_INTERVAL: u64 = 100_000;

/// Smoothing factor of the queue occupancy average.
const OCCUPANCY_ALPHA: f64 = 0.7;

/// One counter per k-mer slot, shared by all workers of a run.
#[derive(Debug)]
pub struct ScratchCounts(Box<[AtomicU32]>);

impl ScratchCounts {
    /// Allocates `n` zeroed counters.
    pub fn new(n: usize) -> Self {
        Self((0..n).map(|_| AtomicU32::new(0)).collect())
    }

    #[inline]
    pub fn increment(&self, index: KmerIndex) {
        self.0[index].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, index: KmerIndex) -> KmerCount {
        self.0[index].load(Ordering::Relaxed)
    }

    /// Slots with a non-zero count, in slot order.
    pub fn nonzero(&self) -> impl Iterator<Item = (KmerIndex, KmerCount)> + '_ {
        self.0
            .iter()
            .map(|counter| counter.load(Ordering::Relaxed))
            .enumerate()
            .filter(|&(_, count)| count > 0)
    }

    /// Plain counts, mainly for comparing runs.
    pub fn to_vec(&self) -> Vec<KmerCount> {
        self.0.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }
}

/// Counts the known k-mers of single reads.
///
/// Holds the indexer and a membership set built once from the initial k-mers;
/// both are read-only while workers run.
#[derive(Debug)]
pub struct KmerCounter<'a, I: ?Sized> {
    indexer: &'a I,
    members: FxHashSet<Kmer>,
}

impl<'a, I: KmerIndexer + Sync + ?Sized> KmerCounter<'a, I> {
    pub fn new(indexer: &'a I, initial_kmers: &[Kmer]) -> Self {
        Self {
            indexer,
            members: initial_kmers.iter().copied().collect(),
        }
    }

    /// Number of slots a scratch array for this counter needs.
    pub fn slots(&self) -> usize {
        self.indexer.size()
    }

    /// Adds every known k-mer of `seq` to `scratch`.
    pub fn count_sequence(&self, seq: &[u8], scratch: &ScratchCounts) {
        for kmer in windows(seq) {
            if self.members.contains(&kmer) {
                scratch.increment(self.indexer.lookup(kmer));
            }
        }
    }
}

/// Result of one counting run.
#[derive(Debug)]
pub struct CountingRun {
    pub scratch: ScratchCounts,
    pub progress: Progress,
}

impl CountingRun {
    /// Number of reads pulled from the source.
    pub const fn reads(&self) -> ReadCount {
        self.progress.sequences_read
    }
}

/// A fixed-size pool of counting workers fed through a bounded queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountingWorkerPool {
    workers: usize,
    queue_capacity: usize,
}

impl CountingWorkerPool {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            workers: config.workers(),
            queue_capacity: config.queue_capacity(),
        }
    }

    /// Counts the known k-mers of every read in `sequences`.
    ///
    /// Reads shorter than `K` are counted as reads but never queued. If the
    /// source yields an error, the queue is marked finished, the workers drain
    /// what was already queued, and the error is returned.
    pub fn run<I, S>(
        &self,
        counter: &KmerCounter<'_, I>,
        sequences: S,
    ) -> Result<CountingRun, KiqError>
    where
        I: KmerIndexer + Sync + ?Sized,
        S: IntoIterator<Item = Result<Bytes, KiqError>>,
    {
        #[cfg(feature = "tracing")]
        let _span = info_span!("count_kmers", workers = self.workers).entered();

        let queue = BoundedWorkQueue::<Bytes>::new(self.queue_capacity)?;
        let scratch = ScratchCounts::new(counter.slots());
        let tracker = ProgressTracker::new();

        let produced = thread::scope(|s| {
            for _ in 0..self.workers {
                s.spawn(|| {
                    while let Some(seq) = queue.pop() {
                        counter.count_sequence(&seq, &scratch);
                        tracker.record_counted();
                    }
                });
            }

            let produced = produce(&queue, &tracker, sequences);
            queue.mark_finished();
            produced
        });
        produced?;

        let progress = tracker.snapshot();

        #[cfg(feature = "tracing")]
        info!(
            sequences = progress.sequences_read,
            counted = progress.sequences_counted,
            "Processed sequences"
        );

        Ok(CountingRun { scratch, progress })
    }
}

fn produce<S>(
    queue: &BoundedWorkQueue<Bytes>,
    tracker: &ProgressTracker,
    sequences: S,
) -> Result<(), KiqError>
where
    S: IntoIterator<Item = Result<Bytes, KiqError>>,
{
    let mut occupancy = OccupancyAverage::new(OCCUPANCY_ALPHA);

    for seq in sequences {
        let seq = seq?;
        let read = tracker.record_read();
        if seq.len() >= K {
            tracker.record_queued(seq.len() as u64);
            queue.push(seq);
        }
        if read % SAMPLE_INTERVAL == 0 {
            let _average = occupancy.update(queue.len());

            #[cfg(feature = "tracing")]
            debug!(
                reads = read,
                queue_average = _average,
                capacity = queue.capacity(),
                "Queue occupancy"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::HashKmerIndexer;
    use crate::kmer::{decode, encode};

    fn ok(seqs: &[&str]) -> Vec<Result<Bytes, KiqError>> {
        seqs.iter()
            .map(|s| Ok(Bytes::copy_from_slice(s.as_bytes())))
            .collect()
    }

    fn pool(workers: usize, capacity: usize) -> CountingWorkerPool {
        CountingWorkerPool::new(&IngestConfig::new(workers, capacity, false).unwrap())
    }

    #[test]
    fn counts_known_kmers_only() {
        let known = decode(222);
        let extended = format!("{known}G");
        let indexer = HashKmerIndexer::build(&[222, 3_333_222]);
        let counter = KmerCounter::new(&indexer, &[222, 3_333_222]);

        let reads = ok(&[known.as_str(), known.as_str(), extended.as_str(), "ACGT"]);
        let run = pool(2, 4).run(&counter, reads).unwrap();

        assert_eq!(run.scratch.get(indexer.lookup(222)), 3);
        assert_eq!(run.scratch.get(indexer.lookup(3_333_222)), 0);
        assert_eq!(run.reads(), 4);
        assert_eq!(run.progress.sequences_queued, 3);
        assert_eq!(run.progress.sequences_counted, 3);
    }

    #[test]
    fn overlapping_windows_are_all_counted() {
        let seq = "A".repeat(40);
        let kmer = encode("A".repeat(K).as_bytes());
        let indexer = HashKmerIndexer::build(&[kmer]);
        let counter = KmerCounter::new(&indexer, &[kmer]);

        let run = pool(1, 1).run(&counter, ok(&[seq.as_str()])).unwrap();
        assert_eq!(run.scratch.get(0), 9);
    }

    #[test]
    fn soft_masked_read_counts_as_all_a() {
        let all_c = encode("C".repeat(K).as_bytes());
        let all_a = encode("A".repeat(K).as_bytes());
        let kmers = [all_c, all_a];
        let indexer = HashKmerIndexer::build(&kmers);
        let counter = KmerCounter::new(&indexer, &kmers);

        let lower = "c".repeat(K);
        let run = pool(1, 1).run(&counter, ok(&[lower.as_str()])).unwrap();
        assert_eq!(run.scratch.get(indexer.lookup(all_a)), 1);
        assert_eq!(run.scratch.get(indexer.lookup(all_c)), 0);
    }

    #[test]
    fn worker_count_does_not_change_totals() {
        let kmers: Vec<Kmer> = ["ACGT", "GGCA", "TTAC"]
            .iter()
            .map(|s| encode(s.repeat(K / 4).as_bytes()))
            .collect();
        let indexer = HashKmerIndexer::build(&kmers);
        let counter = KmerCounter::new(&indexer, &kmers);
        let reads: Vec<String> = (0..300)
            .map(|i| match i % 3 {
                0 => "ACGT".repeat(10),
                1 => "GGCA".repeat(9) + "TTAC".repeat(9).as_str(),
                _ => "TTAC".repeat(20),
            })
            .collect();
        let refs: Vec<&str> = reads.iter().map(String::as_str).collect();

        let single = pool(1, 7).run(&counter, ok(&refs)).unwrap();
        let many = pool(8, 7).run(&counter, ok(&refs)).unwrap();
        assert_eq!(single.scratch.to_vec(), many.scratch.to_vec());
        assert!(single.scratch.nonzero().count() > 0);
    }

    #[test]
    fn source_error_stops_run_without_hanging() {
        let indexer = HashKmerIndexer::build(&[1]);
        let counter = KmerCounter::new(&indexer, &[1]);
        let read = "C".repeat(K);
        let mut reads = ok(&[read.as_str(); 5]);
        reads.push(Err(KiqError::SequenceParse {
            details: "bad record".into(),
            path: "reads.fq".into(),
        }));
        reads.extend(ok(&[read.as_str()]));

        let err = pool(3, 2).run(&counter, reads).unwrap_err();
        assert!(matches!(err, KiqError::SequenceParse { .. }));
    }

    #[test]
    fn empty_source_yields_zero_counts() {
        let indexer = HashKmerIndexer::build(&[1, 2]);
        let counter = KmerCounter::new(&indexer, &[1, 2]);
        let run = pool(2, 2).run(&counter, Vec::new()).unwrap();
        assert_eq!(run.reads(), 0);
        assert_eq!(run.scratch.to_vec(), vec![0, 0]);
    }
}
