//! Timer: a histogram of durations fused with a rate meter.
//!
//! Durations are stored in nanoseconds. Conversion to display units happens
//! in the registry getters.

use std::time::{Duration, Instant};

use super::histogram::{Histogram, HistogramSnapshot};
use super::meter::Meter;

#[derive(Debug, Default)]
pub struct Timer {
    histogram: Histogram,
    meter: Meter,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one duration sample.
    pub fn update(&self, elapsed: Duration) {
        let nanos = i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX);
        self.histogram.update(nanos);
        self.meter.mark(1);
    }

    /// Record the time elapsed since `start`.
    pub fn update_since(&self, start: Instant) {
        self.update(start.elapsed());
    }

    /// Time a unit of work. The sample is recorded even if `f` panics.
    pub fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = TimerGuard {
            timer: self,
            start: Instant::now(),
        };
        f()
    }

    pub fn count(&self) -> u64 {
        self.histogram.count()
    }

    pub fn max(&self) -> i64 {
        self.histogram.max()
    }

    pub fn min(&self) -> i64 {
        self.histogram.min()
    }

    pub fn mean(&self) -> f64 {
        self.histogram.mean()
    }

    pub fn sum(&self) -> i64 {
        self.histogram.sum()
    }

    pub fn std_dev(&self) -> f64 {
        self.histogram.std_dev()
    }

    pub fn variance(&self) -> f64 {
        self.histogram.variance()
    }

    pub fn percentile(&self, p: f64) -> f64 {
        self.histogram.percentile(p)
    }

    pub fn rate1(&self) -> f64 {
        self.meter.rate1()
    }

    pub fn rate5(&self) -> f64 {
        self.meter.rate5()
    }

    pub fn rate15(&self) -> f64 {
        self.meter.rate15()
    }

    pub fn rate_mean(&self) -> f64 {
        self.meter.rate_mean()
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        self.histogram.snapshot()
    }
}

struct TimerGuard<'a> {
    timer: &'a Timer,
    start: Instant,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.update_since(self.start);
    }
}
