//! Scheduler and process-wide counters sampled at read time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::metric::{FnMetric, Metric};
use crate::registry::MetricError;

static FOREIGN_CALLS: AtomicU64 = AtomicU64::new(0);

/// Count one call across an FFI boundary.
pub fn record_foreign_call() {
    FOREIGN_CALLS.fetch_add(1, Ordering::Relaxed);
}

pub fn foreign_call_count() -> u64 {
    FOREIGN_CALLS.load(Ordering::Relaxed)
}

/// Foreign calls since the previous read.
#[derive(Default)]
pub struct ForeignCallsMetric {
    last: Mutex<u64>,
}

impl ForeignCallsMetric {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for ForeignCallsMetric {
    fn name(&self) -> &str {
        "Runtime/General/NOForeignCalls"
    }

    fn units(&self) -> &str {
        "calls"
    }

    fn value(&self) -> Result<f64, MetricError> {
        let mut last = self.last.lock();
        let current = foreign_call_count();
        let delta = current.saturating_sub(*last);
        *last = current;
        Ok(delta as f64)
    }

    fn peek(&self) -> Result<f64, MetricError> {
        let last = self.last.lock();
        Ok(foreign_call_count().saturating_sub(*last) as f64)
    }
}

/// Alive tasks and workers of the runtime behind `handle`, the foreign-call
/// delta and the CPU count.
pub fn general_metrics(handle: Handle) -> Vec<Arc<dyn Metric>> {
    let tasks = handle.clone();
    vec![
        FnMetric::shared("Runtime/General/NOTasks", "tasks", move || {
            Ok(tasks.metrics().num_alive_tasks() as f64)
        }),
        FnMetric::shared("Runtime/General/NOWorkers", "workers", move || {
            Ok(handle.metrics().num_workers() as f64)
        }),
        Arc::new(ForeignCallsMetric::new()),
        FnMetric::shared("Runtime/System/CPUs", "cpus", || Ok(num_cpus::get() as f64)),
    ]
}
