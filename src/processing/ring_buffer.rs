//! Fixed-capacity sample ring buffer.
//!
//! Backs both the display window (W) and the spectral window (F). Inserts
//! are O(1) through a circular write index; reads come back in arrival
//! order.

/// Most recent `capacity` values in arrival order.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Vec<f64>,
    /// Next write position
    head: usize,
    len: usize,
}

/// Display window of the most recent W accepted samples.
pub type SlidingWindow = RingBuffer;

/// Spectral window of the most recent F accepted samples.
pub type SpectrumBuffer = RingBuffer;

impl RingBuffer {
    /// Create an empty buffer. A zero capacity is bumped to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    /// Append a value, evicting the oldest once full.
    pub fn push(&mut self, value: f64) {
        let cap = self.data.len();
        self.data[self.head] = value;
        self.head = (self.head + 1) % cap;
        if self.len < cap {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    /// Most recently pushed value.
    pub fn last(&self) -> Option<f64> {
        if self.len == 0 {
            return None;
        }
        let cap = self.data.len();
        Some(self.data[(self.head + cap - 1) % cap])
    }

    /// Drop all contents and zero the storage.
    pub fn clear(&mut self) {
        self.data.iter_mut().for_each(|v| *v = 0.0);
        self.head = 0;
        self.len = 0;
    }

    /// Iterate held values, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let cap = self.data.len();
        let start = (self.head + cap - self.len) % cap;
        (0..self.len).map(move |i| self.data[(start + i) % cap])
    }

    /// Held values, oldest first.
    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }

    /// Exactly `capacity` values: leading zeros for slots not yet filled,
    /// followed by the held values oldest first.
    ///
    /// Matches a buffer that starts all-zero and shifts each new value in at
    /// the end.
    pub fn padded(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.data.len() - self.len];
        out.extend(self.iter());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_then_evicts_oldest() {
        let mut rb = RingBuffer::new(3);
        rb.push(1.0);
        rb.push(2.0);
        assert_eq!(rb.to_vec(), vec![1.0, 2.0]);
        assert!(!rb.is_full());

        rb.push(3.0);
        rb.push(4.0);
        assert_eq!(rb.len(), 3);
        assert_eq!(rb.to_vec(), vec![2.0, 3.0, 4.0]);
        assert_eq!(rb.last(), Some(4.0));
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let mut rb = RingBuffer::new(5);
        for i in 0..1_000 {
            rb.push(i as f64);
            assert!(rb.len() <= 5);
        }
        assert_eq!(rb.to_vec(), vec![995.0, 996.0, 997.0, 998.0, 999.0]);
    }

    #[test]
    fn test_padded_left_fills_zeros() {
        let mut rb = RingBuffer::new(4);
        rb.push(7.0);
        rb.push(8.0);
        assert_eq!(rb.padded(), vec![0.0, 0.0, 7.0, 8.0]);
    }

    #[test]
    fn test_clear_resets() {
        let mut rb = RingBuffer::new(2);
        rb.push(1.0);
        rb.push(2.0);
        rb.clear();
        assert!(rb.is_empty());
        assert_eq!(rb.last(), None);
        assert_eq!(rb.padded(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_zero_capacity_bumped() {
        let mut rb = RingBuffer::new(0);
        rb.push(3.0);
        assert_eq!(rb.capacity(), 1);
        assert_eq!(rb.to_vec(), vec![3.0]);
    }
}
