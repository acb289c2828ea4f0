//! Rolling window buffers backing the feature engine's statistics.
//!
//! A window only reports a statistic once it holds `capacity` values, and
//! reports NaN while any value inside it is NaN. Rolling columns therefore
//! start with `capacity - 1` NaNs, plus one more for every NaN in the input.

use std::collections::VecDeque;

/// A generic rolling buffer with fixed capacity.
///
/// Uses a circular buffer implementation to efficiently maintain
/// a sliding window of data without reallocations.
#[derive(Debug, Clone)]
pub struct RollingBuffer<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingBuffer<T> {
    /// Create a new rolling buffer with the specified capacity.
    ///
    /// # Example
    /// ```
    /// use price_overlay::RollingBuffer;
    /// let buffer: RollingBuffer<f64> = RollingBuffer::new(20);
    /// assert_eq!(buffer.capacity(), 20);
    /// ```
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a new element to the buffer.
    ///
    /// If the buffer is at capacity, removes the oldest element.
    pub fn push(&mut self, value: T) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    /// Get the current number of elements in the buffer.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if the buffer is at full capacity.
    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.capacity
    }

    /// Get the buffer capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get an iterator over all elements (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }
}

impl RollingBuffer<f64> {
    /// Whether the window is full and free of NaNs.
    fn is_complete(&self) -> bool {
        self.is_full() && self.capacity > 0 && self.buffer.iter().all(|v| !v.is_nan())
    }

    /// Arithmetic mean of the window, or NaN if the window is incomplete.
    pub fn mean(&self) -> f64 {
        if !self.is_complete() {
            return f64::NAN;
        }
        self.buffer.iter().sum::<f64>() / self.capacity as f64
    }

    /// Sample standard deviation (n - 1 denominator) of the window.
    ///
    /// NaN if the window is incomplete or holds fewer than two values.
    pub fn sample_std(&self) -> f64 {
        if !self.is_complete() || self.capacity < 2 {
            return f64::NAN;
        }
        let mean = self.mean();
        let sum_sq: f64 = self.buffer.iter().map(|v| (v - mean) * (v - mean)).sum();
        (sum_sq / (self.capacity - 1) as f64).sqrt()
    }
}
