//! Instrument registry: the uniform data source every adapter reads from.
//!
//! Keys are bound once and never removed. Typed getters fail with
//! `NotRegistered` or `TypeMismatch`; update-by-key helpers silently ignore
//! absent or mismatched keys so producers can never fail a request because
//! an optional metric is not configured.

mod error;
mod stats;

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::instrument::{Counter, Gauge, Histogram, Instrument, InstrumentKind, Meter, Timer};

pub use error::MetricError;
pub(crate) use stats::check_percentile;
pub use stats::{HistogramStat, MeterStat, TimerStat};

const NANOS_PER_MILLI: f64 = 1_000_000.0;

fn nanos_to_millis(nanos: f64) -> f64 {
    nanos / NANOS_PER_MILLI
}

/// Concurrent `key -> Instrument` mapping.
#[derive(Debug, Default)]
pub struct Registry {
    instruments: DashMap<String, Instrument>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to `instrument` for the life of the registry.
    pub fn register(
        &self,
        key: impl Into<String>,
        instrument: impl Into<Instrument>,
    ) -> Result<(), MetricError> {
        match self.instruments.entry(key.into()) {
            Entry::Occupied(entry) => Err(MetricError::AlreadyRegistered(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(instrument.into());
                Ok(())
            }
        }
    }

    /// Return the instrument bound to `key`, binding `make()` first if the
    /// key is free. The existing binding wins, whatever its kind.
    pub fn get_or_register<F>(&self, key: &str, make: F) -> Instrument
    where
        F: FnOnce() -> Instrument,
    {
        if let Some(existing) = self.get(key) {
            return existing;
        }
        self.instruments
            .entry(key.to_string())
            .or_insert_with(make)
            .value()
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<Instrument> {
        self.instruments.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.instruments.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Sorted list of registered keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.instruments.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    fn lookup(&self, key: &str) -> Result<Instrument, MetricError> {
        self.get(key)
            .ok_or_else(|| MetricError::NotRegistered(key.to_string()))
    }

    fn mismatch(key: &str, expected: InstrumentKind, found: &Instrument) -> MetricError {
        MetricError::TypeMismatch {
            key: key.to_string(),
            expected,
            found: found.kind(),
        }
    }

    pub fn counter(&self, key: &str) -> Result<Arc<Counter>, MetricError> {
        match self.lookup(key)? {
            Instrument::Counter(counter) => Ok(counter),
            other => Err(Self::mismatch(key, InstrumentKind::Counter, &other)),
        }
    }

    pub fn gauge(&self, key: &str) -> Result<Arc<Gauge>, MetricError> {
        match self.lookup(key)? {
            Instrument::Gauge(gauge) => Ok(gauge),
            other => Err(Self::mismatch(key, InstrumentKind::Gauge, &other)),
        }
    }

    pub fn histogram(&self, key: &str) -> Result<Arc<Histogram>, MetricError> {
        match self.lookup(key)? {
            Instrument::Histogram(histogram) => Ok(histogram),
            other => Err(Self::mismatch(key, InstrumentKind::Histogram, &other)),
        }
    }

    pub fn meter(&self, key: &str) -> Result<Arc<Meter>, MetricError> {
        match self.lookup(key)? {
            Instrument::Meter(meter) => Ok(meter),
            other => Err(Self::mismatch(key, InstrumentKind::Meter, &other)),
        }
    }

    pub fn timer(&self, key: &str) -> Result<Arc<Timer>, MetricError> {
        match self.lookup(key)? {
            Instrument::Timer(timer) => Ok(timer),
            other => Err(Self::mismatch(key, InstrumentKind::Timer, &other)),
        }
    }

    // ---------------------------------------------------------------------
    // Typed statistic getters
    // ---------------------------------------------------------------------

    pub fn get_counter_value(&self, key: &str) -> Result<f64, MetricError> {
        Ok(self.counter(key)?.count() as f64)
    }

    pub fn get_gauge_value(&self, key: &str) -> Result<f64, MetricError> {
        Ok(self.gauge(key)?.value() as f64)
    }

    /// Histogram statistics in raw recorded units.
    pub fn get_histogram_value(&self, key: &str, stat: HistogramStat) -> Result<f64, MetricError> {
        let histogram = self.histogram(key)?;
        let value = match stat {
            HistogramStat::Count => histogram.count() as f64,
            HistogramStat::Max => histogram.max() as f64,
            HistogramStat::Mean => histogram.mean(),
            HistogramStat::Min => histogram.min() as f64,
            HistogramStat::Percentile(p) => histogram.percentile(check_percentile(p)?),
            HistogramStat::StdDev => histogram.std_dev(),
            HistogramStat::Sum => histogram.sum() as f64,
            HistogramStat::Variance => histogram.variance(),
        };
        Ok(value)
    }

    /// Meter statistics; rates are events per second.
    pub fn get_meter_value(&self, key: &str, stat: MeterStat) -> Result<f64, MetricError> {
        let meter = self.meter(key)?;
        let value = match stat {
            MeterStat::Count => meter.count() as f64,
            MeterStat::Rate1 => meter.rate1(),
            MeterStat::Rate5 => meter.rate5(),
            MeterStat::Rate15 => meter.rate15(),
            MeterStat::RateMean => meter.rate_mean(),
        };
        Ok(value)
    }

    /// Timer statistics. Durations are reported in milliseconds (variance in
    /// ms²), rates in events per second.
    pub fn get_timer_value(&self, key: &str, stat: TimerStat) -> Result<f64, MetricError> {
        let timer = self.timer(key)?;
        let value = match stat {
            TimerStat::Count => timer.count() as f64,
            TimerStat::Max => nanos_to_millis(timer.max() as f64),
            TimerStat::Mean => nanos_to_millis(timer.mean()),
            TimerStat::Min => nanos_to_millis(timer.min() as f64),
            TimerStat::Percentile(p) => nanos_to_millis(timer.percentile(check_percentile(p)?)),
            TimerStat::Rate1 => timer.rate1(),
            TimerStat::Rate5 => timer.rate5(),
            TimerStat::Rate15 => timer.rate15(),
            TimerStat::RateMean => timer.rate_mean(),
            TimerStat::StdDev => nanos_to_millis(timer.std_dev()),
            TimerStat::Sum => nanos_to_millis(timer.sum() as f64),
            TimerStat::Variance => timer.variance() / (NANOS_PER_MILLI * NANOS_PER_MILLI),
        };
        Ok(value)
    }

    // ---------------------------------------------------------------------
    // Update by key (never fails outward)
    // ---------------------------------------------------------------------

    pub fn inc_counter_for_key(&self, key: &str, delta: i64) {
        if let Ok(counter) = self.counter(key) {
            counter.inc(delta);
        }
    }

    pub fn update_gauge_for_key(&self, key: &str, value: i64) {
        if let Ok(gauge) = self.gauge(key) {
            gauge.update(value);
        }
    }

    pub fn update_histogram_for_key(&self, key: &str, value: i64) {
        if let Ok(histogram) = self.histogram(key) {
            histogram.update(value);
        }
    }

    pub fn mark_meter_for_key(&self, key: &str, events: i64) {
        if let Ok(meter) = self.meter(key) {
            meter.mark(events);
        }
    }

    pub fn update_timer_for_key(&self, key: &str, elapsed: Duration) {
        if let Ok(timer) = self.timer(key) {
            timer.update(elapsed);
        }
    }

    pub fn update_timer_since_for_key(&self, key: &str, start: Instant) {
        if let Ok(timer) = self.timer(key) {
            timer.update_since(start);
        }
    }

    /// Run `f`, timing it when `key` is bound to a timer. `f` runs either way.
    pub fn time_for_key<F, R>(&self, key: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        match self.timer(key) {
            Ok(timer) => timer.time(f),
            Err(_) => f(),
        }
    }
}
