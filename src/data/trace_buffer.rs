//! Rolling trace window for the continuous lock-in view.
//!
//! A fixed-capacity circular buffer of `(x, y)` channel pairs. The buffer
//! length is constant after construction: it starts zero-filled and new
//! samples overwrite the oldest, preserving a moving time window. The time
//! axis depends only on capacity and sample rate, so it is computed once at
//! (re)construction and never per tick.

/// Fixed-window circular buffer of two-channel samples.
#[derive(Debug, Clone)]
pub struct TraceBuffer {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Index of the oldest sample; also the next write position.
    cursor: usize,
    times_s: Vec<f64>,
}

impl TraceBuffer {
    /// Create a zero-filled window.
    ///
    /// Capacity is `round(window_seconds * sample_rate_hz)`, clamped to at
    /// least one sample. The time axis is `k / sample_rate_hz` for
    /// `k = 0..capacity`.
    pub fn new(sample_rate_hz: f64, window_seconds: f64) -> Self {
        let capacity = ((window_seconds * sample_rate_hz).round() as usize).max(1);
        let times_s = (0..capacity).map(|k| k as f64 / sample_rate_hz).collect();
        Self {
            x: vec![0.0; capacity],
            y: vec![0.0; capacity],
            cursor: 0,
            times_s,
        }
    }

    /// Window capacity in samples. Constant for the buffer's lifetime.
    pub fn capacity(&self) -> usize {
        self.x.len()
    }

    /// Roll a block of samples into the window, oldest-first.
    ///
    /// Blocks longer than the window are truncated to their newest
    /// `capacity()` samples before writing.
    pub fn push_block(&mut self, block: &[(f64, f64)]) {
        let capacity = self.capacity();
        let skip = block.len().saturating_sub(capacity);
        for &(x, y) in &block[skip..] {
            self.x[self.cursor] = x;
            self.y[self.cursor] = y;
            self.cursor = (self.cursor + 1) % capacity;
        }
    }

    /// Time axis in seconds, aligned with [`TraceBuffer::snapshot`].
    pub fn times(&self) -> &[f64] {
        &self.times_s
    }

    /// Copy of both channel windows in time order, oldest sample first.
    pub fn snapshot(&self) -> (Vec<f64>, Vec<f64>) {
        let mut x = Vec::with_capacity(self.capacity());
        let mut y = Vec::with_capacity(self.capacity());
        x.extend_from_slice(&self.x[self.cursor..]);
        x.extend_from_slice(&self.x[..self.cursor]);
        y.extend_from_slice(&self.y[self.cursor..]);
        y.extend_from_slice(&self.y[..self.cursor]);
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_follows_rate_and_window() {
        let buf = TraceBuffer::new(10.0, 30.0);
        assert_eq!(buf.capacity(), 300);
        assert_eq!(buf.times().len(), 300);
        assert!((buf.times()[299] - 29.9).abs() < 1e-12);
    }

    #[test]
    fn capacity_never_below_one() {
        let buf = TraceBuffer::new(0.5, 0.1);
        assert_eq!(buf.capacity(), 1);
    }

    #[test]
    fn new_samples_overwrite_oldest() {
        let mut buf = TraceBuffer::new(1.0, 4.0); // capacity 4
        buf.push_block(&[(1.0, -1.0), (2.0, -2.0)]);
        buf.push_block(&[(3.0, -3.0), (4.0, -4.0), (5.0, -5.0)]);

        let (x, y) = buf.snapshot();
        assert_eq!(x, vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(y, vec![-2.0, -3.0, -4.0, -5.0]);
        assert_eq!(buf.capacity(), 4);
    }

    #[test]
    fn oversized_block_keeps_newest_window() {
        let mut buf = TraceBuffer::new(1.0, 3.0); // capacity 3
        let block: Vec<(f64, f64)> = (0..10).map(|k| (k as f64, 0.0)).collect();
        buf.push_block(&block);

        let (x, _) = buf.snapshot();
        assert_eq!(x, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn partially_filled_window_keeps_leading_zeros() {
        let mut buf = TraceBuffer::new(1.0, 4.0);
        buf.push_block(&[(9.0, 9.0)]);
        let (x, _) = buf.snapshot();
        assert_eq!(x, vec![0.0, 0.0, 0.0, 9.0]);
    }
}
