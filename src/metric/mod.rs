//! Metric adapters: named, unit-tagged views over registry entries.
//!
//! An adapter pairs a registry key with an extraction policy. Adapters are
//! what a [`Component`](crate::component::Component) enumerates on every
//! harvest tick.

mod adapters;
mod timer_set;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::registry::MetricError;

pub use adapters::{
    CounterMetric, GaugeDeltaMetric, GaugeMetric, HistogramMetric, MeterMetric, TimerMetric,
};
pub use timer_set::{timer_duration_metrics, timer_metrics, timer_rate_metrics};

/// A reportable metric.
pub trait Metric: Send + Sync {
    /// Slash-separated display path, e.g. `Runtime/Memory/InUse/Heap`.
    fn name(&self) -> &str;

    /// Free-form display units (`bytes`, `ms`, `rps`, ...).
    fn units(&self) -> &str;

    /// Current value. Delta adapters advance their baseline on every call.
    fn value(&self) -> Result<f64, MetricError>;

    /// Current value without touching delta baselines or last-read state.
    fn peek(&self) -> Result<f64, MetricError> {
        self.value()
    }

    /// Invoked after a batch containing this metric was pushed successfully.
    fn clear_sent_data(&self) {}
}

impl fmt::Debug for dyn Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.name())
            .field("units", &self.units())
            .finish()
    }
}

/// One harvested `(name, units, value)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub name: String,
    pub units: String,
    pub value: f64,
}

/// Join a base path and a leaf with exactly one `/` between them.
pub fn join_path(base: &str, leaf: &str) -> String {
    let base = base.trim_end_matches('/');
    let leaf = leaf.trim_start_matches('/');
    if base.is_empty() {
        leaf.to_string()
    } else if leaf.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, leaf)
    }
}

type Sampler = dyn Fn() -> Result<f64, MetricError> + Send + Sync;

/// Metric backed by a closure sampled at read time.
pub struct FnMetric {
    name: String,
    units: String,
    sample: Box<Sampler>,
}

impl FnMetric {
    pub fn new<F>(name: impl Into<String>, units: impl Into<String>, sample: F) -> Self
    where
        F: Fn() -> Result<f64, MetricError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            units: units.into(),
            sample: Box::new(sample),
        }
    }

    pub fn shared<F>(name: impl Into<String>, units: impl Into<String>, sample: F) -> Arc<dyn Metric>
    where
        F: Fn() -> Result<f64, MetricError> + Send + Sync + 'static,
    {
        Arc::new(Self::new(name, units, sample))
    }
}

impl Metric for FnMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn units(&self) -> &str {
        &self.units
    }

    fn value(&self) -> Result<f64, MetricError> {
        (self.sample)()
    }
}
