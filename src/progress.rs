//! Progress tracking for counting runs.
//!
//! The producer records every read it pulls from the sequence source and every
//! read it queues; workers record every read they finish counting. All three
//! counters are atomic so a snapshot can be taken from any thread while the
//! run is in flight.

use std::sync::atomic::{AtomicU64, Ordering};

/// Progress snapshot of a counting run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    /// Reads pulled from the sequence source, including reads shorter than `K`.
    pub sequences_read: u64,
    /// Reads long enough to be queued for counting.
    pub sequences_queued: u64,
    /// Reads the workers have finished counting.
    pub sequences_counted: u64,
    /// Bases in the queued reads.
    pub bases_queued: u64,
}

/// Thread-safe progress tracker using atomic counters.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    read: AtomicU64,
    queued: AtomicU64,
    counted: AtomicU64,
    bases: AtomicU64,
}

impl ProgressTracker {
    /// Create a new progress tracker with zero counts.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            read: AtomicU64::new(0),
            queued: AtomicU64::new(0),
            counted: AtomicU64::new(0),
            bases: AtomicU64::new(0),
        }
    }

    /// Record that a read was pulled from the source; returns the running total.
    pub fn record_read(&self) -> u64 {
        self.read.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record that a read of `bases` bases was queued for counting.
    pub fn record_queued(&self, bases: u64) {
        self.queued.fetch_add(1, Ordering::Relaxed);
        self.bases.fetch_add(bases, Ordering::Relaxed);
    }

    /// Record that a worker finished counting a read.
    pub fn record_counted(&self) {
        self.counted.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of the current progress.
    ///
    /// The returned values represent the state at a point in time and may
    /// change immediately after this call returns.
    pub fn snapshot(&self) -> Progress {
        Progress {
            sequences_read: self.read.load(Ordering::Relaxed),
            sequences_queued: self.queued.load(Ordering::Relaxed),
            sequences_counted: self.counted.load(Ordering::Relaxed),
            bases_queued: self.bases.load(Ordering::Relaxed),
        }
    }
}

/// Exponential moving average of the queue occupancy, as logged by the producer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OccupancyAverage {
    alpha: f64,
    value: f64,
}

impl OccupancyAverage {
    /// Starts an average with smoothing factor `alpha`.
    pub const fn new(alpha: f64) -> Self {
        Self { alpha, value: 1.0 }
    }

    /// Folds in a new sample and returns the updated average.
    pub fn update(&mut self, sample: usize) -> f64 {
        self.value = self.value * (1.0 - self.alpha) + sample as f64 * self.alpha;
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_starts_at_zero() {
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.snapshot(), Progress::default());
    }

    #[test]
    fn tracker_records_reads_and_queued() {
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.record_read(), 1);
        assert_eq!(tracker.record_read(), 2);
        tracker.record_queued(100);
        tracker.record_counted();

        let progress = tracker.snapshot();
        assert_eq!(progress.sequences_read, 2);
        assert_eq!(progress.sequences_queued, 1);
        assert_eq!(progress.sequences_counted, 1);
        assert_eq!(progress.bases_queued, 100);
    }

    #[test]
    fn occupancy_average_moves_toward_samples() {
        let mut average = OccupancyAverage::new(0.7);
        let first = average.update(11);
        assert!((first - 8.0).abs() < 1e-9);
        let second = average.update(11);
        assert!(second > first && second < 11.0);
    }
}
