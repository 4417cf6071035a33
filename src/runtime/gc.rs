//! Collector pause statistics.
//!
//! Rust has no tracing collector of its own; hosts that embed one (a
//! scripting runtime, an arena compactor) report each pause into a
//! [`GcRecorder`]. A sampler task copies the recorder into the registry on
//! the poll interval.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::instrument::Instrument;
use crate::metric::{GaugeMetric, HistogramMetric, Metric};
use crate::registry::{HistogramStat, MetricError, Registry};

pub const GC_CALLS_SINCE_KEY: &str = "runtime.gc.calls_since";
pub const GC_NUM_KEY: &str = "runtime.gc.num_gc";
pub const GC_PAUSE_TOTAL_KEY: &str = "runtime.gc.pause_total_ns";
pub const GC_PAUSE_KEY: &str = "runtime.gc.pause_ns";

/// Pending pauses kept between polls; older ones are dropped first.
const MAX_PENDING_PAUSES: usize = 4096;

/// Collection pauses reported by the host.
#[derive(Debug, Default)]
pub struct GcRecorder {
    collections: AtomicU64,
    pause_total_ns: AtomicU64,
    pending: Mutex<VecDeque<u64>>,
}

impl GcRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pause(&self, pause: Duration) {
        let nanos = u64::try_from(pause.as_nanos()).unwrap_or(u64::MAX);
        self.collections.fetch_add(1, Ordering::Relaxed);
        self.pause_total_ns.fetch_add(nanos, Ordering::Relaxed);

        let mut pending = self.pending.lock();
        if pending.len() >= MAX_PENDING_PAUSES {
            pending.pop_front();
        }
        pending.push_back(nanos);
    }

    pub fn collections(&self) -> u64 {
        self.collections.load(Ordering::Relaxed)
    }

    pub fn pause_total(&self) -> Duration {
        Duration::from_nanos(self.pause_total_ns.load(Ordering::Relaxed))
    }

    fn drain_pauses(&self) -> VecDeque<u64> {
        std::mem::take(&mut *self.pending.lock())
    }
}

/// Bind the collector instruments. Existing bindings are kept.
pub fn register_gc_instruments(registry: &Registry) {
    registry.get_or_register(GC_CALLS_SINCE_KEY, Instrument::gauge);
    registry.get_or_register(GC_NUM_KEY, Instrument::gauge);
    registry.get_or_register(GC_PAUSE_TOTAL_KEY, Instrument::gauge);
    registry.get_or_register(GC_PAUSE_KEY, Instrument::histogram);
}

/// Copy the recorder into the registry. `last_collections` is the count seen
/// by the previous capture and is advanced.
pub fn capture_gc_stats(
    registry: &Registry,
    recorder: &GcRecorder,
    last_collections: &mut u64,
) -> Result<(), MetricError> {
    let collections = recorder.collections();
    let since = collections.saturating_sub(*last_collections);
    *last_collections = collections;

    registry.gauge(GC_CALLS_SINCE_KEY)?.update(saturating_i64(since));
    registry.gauge(GC_NUM_KEY)?.update(saturating_i64(collections));
    registry
        .gauge(GC_PAUSE_TOTAL_KEY)?
        .update(saturating_i64(recorder.pause_total_ns.load(Ordering::Relaxed)));

    let pauses = registry.histogram(GC_PAUSE_KEY)?;
    for pause in recorder.drain_pauses() {
        pauses.update(saturating_i64(pause));
    }
    Ok(())
}

/// Poll `recorder` every `interval` until `cancel` fires.
pub fn spawn_gc_sampler(
    registry: Arc<Registry>,
    recorder: Arc<GcRecorder>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_collections = 0;
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = capture_gc_stats(&registry, &recorder, &mut last_collections) {
                        debug!(error = %e, "Collector capture skipped");
                    }
                }
            }
        }
    })
}

/// `Runtime/GC/*` adapters. Pause times are reported in nanoseconds.
pub fn gc_metrics(registry: &Arc<Registry>) -> Vec<Arc<dyn Metric>> {
    let base = "Runtime/GC";
    let pause_base = "Runtime/GC/GCTime";
    let mut metrics: Vec<Arc<dyn Metric>> = vec![
        Arc::new(GaugeMetric::new(registry, GC_CALLS_SINCE_KEY, &format!("{}/Calls", base), "calls")),
        Arc::new(GaugeMetric::new(registry, GC_NUM_KEY, &format!("{}/TotalCalls", base), "calls")),
        Arc::new(GaugeMetric::new(
            registry,
            GC_PAUSE_TOTAL_KEY,
            &format!("{}/PauseTotalTime", base),
            "nanos",
        )),
    ];
    for (leaf, stat) in [
        ("Max", HistogramStat::Max),
        ("Mean", HistogramStat::Mean),
        ("Min", HistogramStat::Min),
        ("Percentile95", HistogramStat::Percentile(0.95)),
    ] {
        metrics.push(Arc::new(HistogramMetric::new(
            registry,
            GC_PAUSE_KEY,
            &format!("{}/{}", pause_base, leaf),
            "nanos",
            stat,
        )));
    }
    metrics
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
