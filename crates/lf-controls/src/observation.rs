//! Bounded error history for settling detection.

use std::collections::VecDeque;

use crate::settings::OBSERVE_HISTORY_LEN;

/// FIFO of the most recent error samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl Default for ObservationBuffer {
    fn default() -> Self {
        Self::with_capacity(OBSERVE_HISTORY_LEN)
    }
}

impl ObservationBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest when full. Non-finite samples are dropped.
    pub fn push(&mut self, error: f64) {
        if !error.is_finite() {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(error);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Population standard deviation, `None` when empty.
    pub fn std_dev(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let n = self.samples.len() as f64;
        let mean = self.samples.iter().sum::<f64>() / n;
        let var = self.samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        Some(var.sqrt())
    }
}
