use std::collections::{vec_deque, VecDeque};

/// Fixed capacity ring of measurement samples.
///
/// Pushing into a full buffer drops the oldest sample. The buffer has no
/// internal locking; the owner serializes producer and consumer.
#[derive(Debug, Clone)]
pub struct CircularBuffer<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T> CircularBuffer<T> {
    /// Creates an empty buffer holding up to `capacity` samples.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a sample, overwriting the oldest one when full.
    pub fn push_back(&mut self, sample: T) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Returns the earliest unread sample.
    pub fn oldest(&self) -> Option<&T> {
        self.samples.front()
    }

    /// Returns the most recently pushed sample.
    pub fn latest(&self) -> Option<&T> {
        self.samples.back()
    }

    /// Removes the earliest unread sample.
    pub fn discard(&mut self) -> Option<T> {
        self.samples.pop_front()
    }

    /// Removes every sample, keeping the capacity.
    pub fn flush(&mut self) {
        self.samples.clear();
    }

    pub fn available(&self) -> usize {
        self.samples.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterates from the oldest to the latest sample.
    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.samples.iter()
    }
}
