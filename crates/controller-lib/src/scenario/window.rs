//! Bounded history of combined-load samples

use std::collections::VecDeque;

/// Default number of samples kept per service
pub const DEFAULT_WINDOW_CAPACITY: usize = 10;

/// Fixed-capacity ring buffer of combined-load samples.
///
/// Pushing past capacity evicts the oldest sample.
#[derive(Debug, Clone)]
pub struct LoadWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl LoadWindow {
    /// Create a window; a zero capacity is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, load: f64) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(load);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Population variance; 0 for an empty window
    pub fn variance(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        self.samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.samples.len() as f64
    }
}

impl Default for LoadWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}
