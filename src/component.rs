//! Component: an ordered group of metrics reported together.
//!
//! The metric list is append-only and guarded by a `parking_lot::RwLock`.
//! Harvest copies the list under the read lock and reads values without
//! holding it, so slow adapters never block registration.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::metric::{Metric, MetricValue};
use crate::registry::MetricError;

/// A metric whose read failed during harvest.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestFailure {
    pub name: String,
    pub error: MetricError,
}

/// Values read on one harvest tick.
#[derive(Debug, Clone, Default)]
pub struct Harvest {
    pub values: Vec<MetricValue>,
    pub failures: Vec<HarvestFailure>,
}

pub struct Component {
    name: String,
    guid: String,
    metrics: RwLock<Vec<Arc<dyn Metric>>>,
}

impl Component {
    pub fn new(name: impl Into<String>, guid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guid: guid.into(),
            metrics: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn guid(&self) -> &str {
        &self.guid
    }

    pub fn add_metric(&self, metric: Arc<dyn Metric>) {
        self.metrics.write().push(metric);
    }

    pub fn add_metrics<I>(&self, metrics: I)
    where
        I: IntoIterator<Item = Arc<dyn Metric>>,
    {
        self.metrics.write().extend(metrics);
    }

    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }

    /// Copy of the current metric list.
    pub fn metrics(&self) -> Vec<Arc<dyn Metric>> {
        self.metrics.read().clone()
    }

    pub fn metric_names(&self) -> Vec<String> {
        self.metrics
            .read()
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }

    /// Read every metric. Failing metrics are collected separately and never
    /// abort the rest of the batch.
    pub fn harvest(&self) -> Harvest {
        self.read_all(|metric| metric.value())
    }

    /// Like [`Component::harvest`] but through [`Metric::peek`], so delta
    /// baselines and pending clears are left for the next report.
    pub fn peek(&self) -> Harvest {
        self.read_all(|metric| metric.peek())
    }

    fn read_all<F>(&self, read: F) -> Harvest
    where
        F: Fn(&dyn Metric) -> Result<f64, MetricError>,
    {
        let metrics = self.metrics();
        let mut harvest = Harvest {
            values: Vec::with_capacity(metrics.len()),
            failures: Vec::new(),
        };
        for metric in metrics {
            match read(metric.as_ref()) {
                Ok(value) => harvest.values.push(MetricValue {
                    name: metric.name().to_string(),
                    units: metric.units().to_string(),
                    value,
                }),
                Err(error) => harvest.failures.push(HarvestFailure {
                    name: metric.name().to_string(),
                    error,
                }),
            }
        }
        harvest
    }

    /// Notify every metric that its last value was delivered.
    pub fn clear_sent_data(&self) {
        for metric in self.metrics() {
            metric.clear_sent_data();
        }
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("guid", &self.guid)
            .field("metrics", &self.len())
            .finish()
    }
}
