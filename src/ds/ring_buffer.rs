use std::ops::Index;

/// A fixed-capacity ring buffer that overwrites its oldest element once full
///
/// Indexing and iteration are chronological: index `0` is the oldest retained
/// element and index `len() - 1` the newest.
#[derive(Debug, Default, Clone)]
pub struct RingBuffer<T> {
    buffer: Vec<T>,
    ix: usize,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// **Panics** if `capacity` is zero
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be non-zero");
        Self {
            buffer: Vec::<T>::with_capacity(capacity),
            ix: 0,
            capacity,
        }
    }

    /// Returns the number of retained elements
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    /// Insert an element into the buffer, overwriting the oldest element, and return the write index
    pub fn push(&mut self, item: T) -> usize {
        let ix = self.ix;
        if ix >= self.len() {
            self.buffer.push(item);
        } else {
            self.buffer[ix] = item;
        }
        self.ix = (ix + 1) % self.capacity;
        ix
    }

    /// Get a slice view of the internal buffer in storage order
    pub fn view(&self) -> &[T] {
        &self.buffer
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        // While filling, `ix == len` and the first half is empty
        let split = self.ix.min(self.buffer.len());
        self.buffer[split..].iter().chain(self.buffer[..split].iter())
    }

    /// Element at chronological position `index`
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len() {
            return None;
        }
        let start = if self.is_full() { self.ix } else { 0 };
        self.buffer.get((start + index) % self.len())
    }

    pub fn oldest(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn newest(&self) -> Option<&T> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.ix = 0;
    }
}

impl<T: PartialEq> RingBuffer<T> {
    /// Number of retained elements equal to `item`
    pub fn count(&self, item: &T) -> usize {
        self.buffer.iter().filter(|x| *x == item).count()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.buffer.contains(item)
    }
}

impl<T> Index<usize> for RingBuffer<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.get(index).expect("RingBuffer index out of range")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ringbuffer_functional() {
        let mut buf = RingBuffer::new(4);
        assert_eq!(buf.len(), 0, "initialized empty");
        assert!(buf.oldest().is_none(), "no oldest when empty");

        for i in 0..4 {
            buf.push(i * 2);
        }

        assert_eq!(buf.len(), 4, "length correct");
        assert!(buf.is_full(), "full at capacity");
        assert_eq!(buf.view(), [0, 2, 4, 6], "contents correct");

        buf.push(1);
        let ix = buf.push(3);
        assert_eq!(ix, 1, "write index is correct");
        assert_eq!(buf.len(), 4, "length unchanged");
        assert_eq!(buf.view(), [1, 3, 4, 6], "contents overwritten correctly");
        assert_eq!(
            buf.iter().copied().collect::<Vec<_>>(),
            [4, 6, 1, 3],
            "iteration is chronological"
        );
        assert_eq!(buf[0], 4, "index 0 is oldest");
        assert_eq!(buf.newest(), Some(&3), "newest is last pushed");
    }

    #[test]
    fn ringbuffer_partial_fill_order() {
        let mut buf = RingBuffer::new(5);
        buf.push('a');
        buf.push('b');
        assert_eq!(buf.oldest(), Some(&'a'));
        assert_eq!(buf.newest(), Some(&'b'));
        assert_eq!(buf.iter().rev().copied().collect::<String>(), "ba");
    }

    #[test]
    fn ringbuffer_count_and_clear() {
        let mut buf = RingBuffer::new(3);
        for x in [7, 7, 1, 7] {
            buf.push(x);
        }
        assert_eq!(buf.count(&7), 2, "evicted element not counted");
        assert!(buf.contains(&1));

        buf.clear();
        assert!(buf.is_empty(), "cleared");
        buf.push(9);
        assert_eq!(buf.oldest(), Some(&9), "write index reset on clear");
    }
}
