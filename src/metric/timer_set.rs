//! Standard adapter sets over one timer.

use std::sync::Arc;

use super::{join_path, Metric, TimerMetric};
use crate::registry::{Registry, TimerStat};

/// Percentile reported by the duration set.
pub const DURATION_PERCENTILE: f64 = 0.95;

/// `Rate1`, `Rate5`, `Rate15` and `RateMean` under `base`.
pub fn timer_rate_metrics(
    registry: &Arc<Registry>,
    key: &str,
    base: &str,
    units: &str,
) -> Vec<Arc<dyn Metric>> {
    [
        ("Rate1", TimerStat::Rate1),
        ("Rate5", TimerStat::Rate5),
        ("Rate15", TimerStat::Rate15),
        ("RateMean", TimerStat::RateMean),
    ]
    .into_iter()
    .map(|(leaf, stat)| {
        Arc::new(TimerMetric::new(registry, key, &join_path(base, leaf), units, stat))
            as Arc<dyn Metric>
    })
    .collect()
}

/// `Max`, `Mean`, `Min` and `Percentile95` under `base`, in milliseconds.
pub fn timer_duration_metrics(
    registry: &Arc<Registry>,
    key: &str,
    base: &str,
) -> Vec<Arc<dyn Metric>> {
    [
        ("Max", TimerStat::Max),
        ("Mean", TimerStat::Mean),
        ("Min", TimerStat::Min),
        ("Percentile95", TimerStat::Percentile(DURATION_PERCENTILE)),
    ]
    .into_iter()
    .map(|(leaf, stat)| {
        Arc::new(TimerMetric::new(registry, key, &join_path(base, leaf), "ms", stat))
            as Arc<dyn Metric>
    })
    .collect()
}

/// Rate set followed by the duration set.
pub fn timer_metrics(
    registry: &Arc<Registry>,
    key: &str,
    base: &str,
    rate_units: &str,
) -> Vec<Arc<dyn Metric>> {
    let mut metrics = timer_rate_metrics(registry, key, base, rate_units);
    metrics.extend(timer_duration_metrics(registry, key, base));
    metrics
}
