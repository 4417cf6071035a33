//! Monotonically adjustable integer counter.

use std::sync::atomic::{AtomicI64, Ordering};

/// Lock-free signed counter.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to the counter.
    pub fn inc(&self, delta: i64) {
        self.count.fetch_add(delta, Ordering::Relaxed);
    }

    /// Subtract `delta` from the counter.
    pub fn dec(&self, delta: i64) {
        self.count.fetch_sub(delta, Ordering::Relaxed);
    }

    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Reset the counter to zero.
    pub fn clear(&self) {
        self.count.store(0, Ordering::Relaxed);
    }

    /// Remove an already-reported amount, keeping increments that raced in
    /// after it was read.
    pub fn take(&self, reported: i64) {
        self.count.fetch_sub(reported, Ordering::Relaxed);
    }
}
