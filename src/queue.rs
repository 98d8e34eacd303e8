//! A bounded producer/consumer queue.
//!
//! [`BoundedWorkQueue`] hands reads from the producer thread to the counting
//! workers. Producers block while the queue is full and consumers block while
//! it is empty, until the producer calls [`mark_finished`](BoundedWorkQueue::mark_finished).
//!
//! Consumers are only woken by a push once the queue is more than 4/5 full,
//! which avoids constant switching between the producer and the workers when
//! reading is slower than counting.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::error::KiqError;

/// Fill fraction above which a push wakes a waiting consumer.
const NOTIFY_FILL_FACTOR: f64 = 4.0 / 5.0;

#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    finished: bool,
}

/// A thread-safe FIFO queue with a fixed capacity.
#[derive(Debug)]
pub struct BoundedWorkQueue<T> {
    state: Mutex<State<T>>,
    capacity: usize,
    notify_above: usize,
    producers: Condvar,
    consumers: Condvar,
}

impl<T> BoundedWorkQueue<T> {
    /// Creates a queue holding at most `capacity` items.
    ///
    /// # Errors
    ///
    /// Returns [`KiqError::InvalidArgument`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, KiqError> {
        if capacity == 0 {
            return Err(KiqError::InvalidArgument {
                details: "queue capacity must be at least 1".into(),
            });
        }
        Ok(Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                finished: false,
            }),
            capacity,
            notify_above: (capacity as f64 * NOTIFY_FILL_FACTOR).floor() as usize,
            producers: Condvar::new(),
            consumers: Condvar::new(),
        })
    }

    /// Appends `item`, blocking while the queue is full.
    pub fn push(&self, item: T) {
        let mut state = self.state.lock();
        while state.items.len() >= self.capacity {
            self.producers.wait(&mut state);
        }
        state.items.push_back(item);
        let len = state.items.len();
        drop(state);

        if len > self.notify_above {
            self.consumers.notify_one();
        }
    }

    /// Removes the oldest item, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue is finished and drained; from then on it
    /// never blocks again.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.producers.notify_one();
                return Some(item);
            }
            if state.finished {
                return None;
            }
            self.consumers.wait(&mut state);
        }
    }

    /// Marks the end of production and wakes every waiting consumer.
    pub fn mark_finished(&self) {
        self.state.lock().finished = true;
        self.consumers.notify_all();
    }

    /// Returns true once [`mark_finished`](Self::mark_finished) has been called.
    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Current number of queued items. Advisory only.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns true if no items are queued. Advisory only.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued items.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
