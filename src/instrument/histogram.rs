//! Reservoir-sampled histogram of integer observations.
//!
//! Count, sum, min and max are exact and tracked with atomics. Distribution
//! statistics (variance, percentiles) are computed over a uniform reservoir
//! maintained with Vitter's algorithm R.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use parking_lot::Mutex;
use rand::Rng;

/// Reservoir capacity; yields a 99.9% confidence level with a 5% margin of
/// error assuming a normal distribution.
pub const DEFAULT_RESERVOIR_SIZE: usize = 1028;

/// Histogram over `i64` observations.
#[derive(Debug)]
pub struct Histogram {
    count: AtomicU64,
    sum: AtomicI64,
    min: AtomicI64,
    max: AtomicI64,
    reservoir: Mutex<Vec<i64>>,
    capacity: usize,
}

impl Histogram {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RESERVOIR_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            count: AtomicU64::new(0),
            sum: AtomicI64::new(0),
            min: AtomicI64::new(i64::MAX),
            max: AtomicI64::new(i64::MIN),
            reservoir: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Record one observation.
    ///
    /// `count` is published last with release ordering, so a reader that
    /// observes a non-zero count also observes min and max set.
    pub fn update(&self, value: i64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.min.fetch_min(value, Ordering::Relaxed);
        self.max.fetch_max(value, Ordering::Relaxed);
        let seen = self.count.fetch_add(1, Ordering::Release) + 1;

        let mut reservoir = self.reservoir.lock();
        if reservoir.len() < self.capacity {
            reservoir.push(value);
        } else {
            let slot = rand::thread_rng().gen_range(0..seen);
            if (slot as usize) < self.capacity {
                reservoir[slot as usize] = value;
            }
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    pub fn sum(&self) -> i64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn min(&self) -> i64 {
        if self.count() == 0 {
            0
        } else {
            self.min.load(Ordering::Relaxed)
        }
    }

    pub fn max(&self) -> i64 {
        if self.count() == 0 {
            0
        } else {
            self.max.load(Ordering::Relaxed)
        }
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        self.sum() as f64 / count as f64
    }

    pub fn variance(&self) -> f64 {
        self.snapshot().variance()
    }

    pub fn std_dev(&self) -> f64 {
        self.snapshot().std_dev()
    }

    /// Percentile over the reservoir; `p` is clamped into `[0, 1]`.
    pub fn percentile(&self, p: f64) -> f64 {
        self.snapshot().percentile(p)
    }

    /// Consistent copy of the reservoir with sorted values.
    pub fn snapshot(&self) -> HistogramSnapshot {
        let mut values = self.reservoir.lock().clone();
        values.sort_unstable();
        HistogramSnapshot {
            count: self.count(),
            sum: self.sum(),
            min: self.min(),
            max: self.max(),
            values,
        }
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a histogram.
#[derive(Debug, Clone)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: i64,
    pub min: i64,
    pub max: i64,
    /// Sorted reservoir values.
    pub values: Vec<i64>,
}

impl HistogramSnapshot {
    fn sample_mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().map(|&v| v as f64).sum::<f64>() / self.values.len() as f64
    }

    pub fn variance(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.sample_mean();
        let squares: f64 = self
            .values
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum();
        squares / self.values.len() as f64
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Linear interpolation between the closest ranks.
    pub fn percentile(&self, p: f64) -> f64 {
        let n = self.values.len();
        if n == 0 {
            return 0.0;
        }
        let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
        let pos = p * (n as f64 + 1.0);
        if pos < 1.0 {
            self.values[0] as f64
        } else if pos >= n as f64 {
            self.values[n - 1] as f64
        } else {
            let lower = self.values[pos as usize - 1] as f64;
            let upper = self.values[pos as usize] as f64;
            lower + (pos - pos.floor()) * (upper - lower)
        }
    }
}
