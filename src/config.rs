//! Run configuration, built once at the command boundary.

use crate::error::KiqError;

/// Default number of counting workers.
pub const DEFAULT_WORKERS: usize = 5;

/// Default capacity of the read queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 9999;

/// Settings for ingesting experiments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    workers: usize,
    queue_capacity: usize,
    append: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            append: false,
        }
    }
}

impl IngestConfig {
    /// Validates and builds a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`KiqError::InvalidArgument`] if `workers` or `queue_capacity` is zero.
    pub fn new(workers: usize, queue_capacity: usize, append: bool) -> Result<Self, KiqError> {
        if workers == 0 {
            return Err(KiqError::InvalidArgument {
                details: "number of counting threads must be at least 1".into(),
            });
        }
        if queue_capacity == 0 {
            return Err(KiqError::InvalidArgument {
                details: "queue capacity must be at least 1".into(),
            });
        }
        Ok(Self {
            workers,
            queue_capacity,
            append,
        })
    }

    /// Number of counting worker threads.
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Capacity of the read queue.
    pub const fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Whether experiments already in the database are skipped.
    pub const fn append(&self) -> bool {
        self.append
    }
}

/// Absolute-count and reads-per-million thresholds for queries.
///
/// An experiment passes when both values are strictly exceeded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Thresholds {
    pub count: u32,
    pub rpm: f64,
}

impl Thresholds {
    pub const fn new(count: u32, rpm: f64) -> Self {
        Self { count, rpm }
    }

    /// Returns true if `count` and `rpm` both exceed the thresholds.
    #[inline]
    pub fn passes(&self, count: u32, rpm: f64) -> bool {
        count > self.count && rpm > self.rpm
    }
}
