//! Registry-backed adapters, one per extraction policy.

use std::sync::Arc;

use parking_lot::Mutex;

use super::Metric;
use crate::registry::{HistogramStat, MeterStat, MetricError, Registry, TimerStat};

/// Fields shared by every registry-backed adapter.
#[derive(Debug, Clone)]
struct Binding {
    registry: Arc<Registry>,
    key: String,
    path: String,
    units: String,
}

impl Binding {
    fn new(registry: &Arc<Registry>, key: &str, path: &str, units: &str) -> Self {
        Self {
            registry: Arc::clone(registry),
            key: key.to_string(),
            path: path.to_string(),
            units: units.to_string(),
        }
    }
}

macro_rules! binding_accessors {
    () => {
        fn name(&self) -> &str {
            &self.binding.path
        }

        fn units(&self) -> &str {
            &self.binding.units
        }
    };
}

/// Reads a counter. After a successful push the reported amount is removed
/// from the counter so shipped totals are not re-reported.
#[derive(Debug)]
pub struct CounterMetric {
    binding: Binding,
    last_read: Mutex<Option<i64>>,
}

impl CounterMetric {
    pub fn new(registry: &Arc<Registry>, key: &str, path: &str, units: &str) -> Self {
        Self {
            binding: Binding::new(registry, key, path, units),
            last_read: Mutex::new(None),
        }
    }
}

impl Metric for CounterMetric {
    binding_accessors!();

    fn value(&self) -> Result<f64, MetricError> {
        let counter = self.binding.registry.counter(&self.binding.key)?;
        let count = counter.count();
        *self.last_read.lock() = Some(count);
        Ok(count as f64)
    }

    fn peek(&self) -> Result<f64, MetricError> {
        Ok(self.binding.registry.counter(&self.binding.key)?.count() as f64)
    }

    fn clear_sent_data(&self) {
        let Ok(counter) = self.binding.registry.counter(&self.binding.key) else {
            return;
        };
        match self.last_read.lock().take() {
            Some(reported) => counter.take(reported),
            None => counter.clear(),
        }
    }
}

/// Reads a gauge as-is.
#[derive(Debug)]
pub struct GaugeMetric {
    binding: Binding,
}

impl GaugeMetric {
    pub fn new(registry: &Arc<Registry>, key: &str, path: &str, units: &str) -> Self {
        Self {
            binding: Binding::new(registry, key, path, units),
        }
    }
}

impl Metric for GaugeMetric {
    binding_accessors!();

    fn value(&self) -> Result<f64, MetricError> {
        self.binding.registry.get_gauge_value(&self.binding.key)
    }
}

/// Reports the change of a gauge since the previous read.
///
/// The baseline starts at zero, so the first read reports the full current
/// value. Read and baseline update happen under one lock.
#[derive(Debug)]
pub struct GaugeDeltaMetric {
    binding: Binding,
    previous: Mutex<f64>,
}

impl GaugeDeltaMetric {
    pub fn new(registry: &Arc<Registry>, key: &str, path: &str, units: &str) -> Self {
        Self {
            binding: Binding::new(registry, key, path, units),
            previous: Mutex::new(0.0),
        }
    }
}

impl Metric for GaugeDeltaMetric {
    binding_accessors!();

    fn value(&self) -> Result<f64, MetricError> {
        let mut previous = self.previous.lock();
        let current = self.binding.registry.get_gauge_value(&self.binding.key)?;
        let delta = current - *previous;
        *previous = current;
        Ok(delta)
    }

    fn peek(&self) -> Result<f64, MetricError> {
        let previous = self.previous.lock();
        let current = self.binding.registry.get_gauge_value(&self.binding.key)?;
        Ok(current - *previous)
    }
}

/// Histogram statistic in raw recorded units.
#[derive(Debug)]
pub struct HistogramMetric {
    binding: Binding,
    stat: HistogramStat,
}

impl HistogramMetric {
    pub fn new(
        registry: &Arc<Registry>,
        key: &str,
        path: &str,
        units: &str,
        stat: HistogramStat,
    ) -> Self {
        Self {
            binding: Binding::new(registry, key, path, units),
            stat,
        }
    }

    pub fn percentile(
        registry: &Arc<Registry>,
        key: &str,
        path: &str,
        units: &str,
        percentile: f64,
    ) -> Self {
        Self::new(registry, key, path, units, HistogramStat::Percentile(percentile))
    }
}

impl Metric for HistogramMetric {
    binding_accessors!();

    fn value(&self) -> Result<f64, MetricError> {
        self.binding
            .registry
            .get_histogram_value(&self.binding.key, self.stat)
    }
}

/// Meter count or rate.
#[derive(Debug)]
pub struct MeterMetric {
    binding: Binding,
    stat: MeterStat,
}

impl MeterMetric {
    pub fn new(
        registry: &Arc<Registry>,
        key: &str,
        path: &str,
        units: &str,
        stat: MeterStat,
    ) -> Self {
        Self {
            binding: Binding::new(registry, key, path, units),
            stat,
        }
    }
}

impl Metric for MeterMetric {
    binding_accessors!();

    fn value(&self) -> Result<f64, MetricError> {
        self.binding
            .registry
            .get_meter_value(&self.binding.key, self.stat)
    }
}

/// Timer statistic; durations in milliseconds.
#[derive(Debug)]
pub struct TimerMetric {
    binding: Binding,
    stat: TimerStat,
}

impl TimerMetric {
    pub fn new(
        registry: &Arc<Registry>,
        key: &str,
        path: &str,
        units: &str,
        stat: TimerStat,
    ) -> Self {
        Self {
            binding: Binding::new(registry, key, path, units),
            stat,
        }
    }

    pub fn percentile(
        registry: &Arc<Registry>,
        key: &str,
        path: &str,
        units: &str,
        percentile: f64,
    ) -> Self {
        Self::new(registry, key, path, units, TimerStat::Percentile(percentile))
    }
}

impl Metric for TimerMetric {
    binding_accessors!();

    fn value(&self) -> Result<f64, MetricError> {
        self.binding
            .registry
            .get_timer_value(&self.binding.key, self.stat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::Instrument;

    #[test]
    fn test_gauge_delta_error_keeps_baseline() {
        let registry = Arc::new(Registry::new());
        let metric = GaugeDeltaMetric::new(&registry, "late", "Late/Gauge", "bytes");
        assert!(metric.value().is_err());

        registry.register("late", Instrument::gauge()).unwrap();
        registry.update_gauge_for_key("late", 12);
        assert_eq!(metric.value().unwrap(), 12.0);
    }

    #[test]
    fn test_counter_clear_without_read_resets() {
        let registry = Arc::new(Registry::new());
        registry.register("c", Instrument::counter()).unwrap();
        registry.inc_counter_for_key("c", 9);
        let metric = CounterMetric::new(&registry, "c", "C", "count");
        metric.clear_sent_data();
        assert_eq!(metric.value().unwrap(), 0.0);
    }

    #[test]
    fn test_counter_clear_keeps_increments_after_read() {
        let registry = Arc::new(Registry::new());
        registry.register("c", Instrument::counter()).unwrap();
        let metric = CounterMetric::new(&registry, "c", "C", "count");
        registry.inc_counter_for_key("c", 5);
        assert_eq!(metric.value().unwrap(), 5.0);
        registry.inc_counter_for_key("c", 2);
        metric.clear_sent_data();
        assert_eq!(metric.value().unwrap(), 2.0);
    }
}
