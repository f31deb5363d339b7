use rand::{seq::SliceRandom, thread_rng};

use crate::ds::RingBuffer;

use super::{Exp, ExpBatch};

/// A fixed-size memory storage for recorded transitions
///
/// Backed by a [`RingBuffer`], so the oldest experience is evicted first once the
/// memory is at capacity.
pub struct ReplayMemory {
    memory: RingBuffer<Exp>,
    pub batch_size: usize,
}

impl ReplayMemory {
    /// **Panics** if `capacity` is zero
    pub fn new(capacity: usize, batch_size: usize) -> Self {
        Self {
            memory: RingBuffer::new(capacity),
            batch_size,
        }
    }

    /// Add a new experience to the memory
    pub fn push(&mut self, exp: Exp) {
        self.memory.push(exp);
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.memory.capacity()
    }

    /// Iterate over stored experiences from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Exp> {
        self.memory.iter()
    }

    pub fn clear(&mut self) {
        self.memory.clear();
    }

    /// Sample a uniform random batch without replacement and zip it
    ///
    /// ### Returns
    /// - `Some(batch)` if `batch_size` is less than or equal to the buffer length
    /// - `None` otherwise
    pub fn sample_zipped(&self) -> Option<ExpBatch> {
        if self.batch_size == 0 || self.batch_size > self.memory.len() {
            return None;
        }
        let experiences = self
            .memory
            .view()
            .choose_multiple(&mut thread_rng(), self.batch_size);
        Some(ExpBatch::from_iter(experiences, self.batch_size))
    }
}
