//! OS process-status metrics.
//!
//! On Linux values come from `/proc/self/status`, re-read at most once per
//! refresh interval. Other platforms report `PlatformUnsupported` for every
//! key.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::metric::Metric;
use crate::registry::MetricError;

pub const SYSTEM_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Keys whose values carry a size suffix (`kB`, `mB`, `gB`).
const SIZED_KEYS: [&str; 4] = ["VmSize", "VmPeak", "VmHWM", "VmRSS"];

/// `(status key, display path, units)` for every reported value.
const SYSTEM_METRICS: [(&str, &str, &str); 6] = [
    ("Threads", "Runtime/System/Threads", "Threads"),
    ("FDSize", "Runtime/System/FDSize", "fd"),
    ("VmPeak", "Runtime/System/Memory/VmPeakSize", "bytes"),
    ("VmSize", "Runtime/System/Memory/VmCurrent", "bytes"),
    ("VmHWM", "Runtime/System/Memory/RssPeak", "bytes"),
    ("VmRSS", "Runtime/System/Memory/RssCurrent", "bytes"),
];

/// Key/value view of the operating system's status for this process.
pub trait SystemSource: Send + Sync {
    fn value(&self, key: &str) -> Result<f64, MetricError>;
}

/// Parse `Key:\tvalue` lines. Lines without exactly one `:` are skipped.
pub fn parse_status_table(raw: &str) -> HashMap<String, String> {
    raw.lines()
        .filter_map(|line| {
            let mut parts = line.split(':');
            let key = parts.next()?;
            let value = parts.next()?;
            if parts.next().is_some() {
                return None;
            }
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Convert one status value to a number, scaling sized keys to bytes.
pub fn parse_status_value(key: &str, raw: &str) -> Result<f64, MetricError> {
    let invalid = || MetricError::SystemData(format!("invalid value for {}: {:?}", key, raw));

    if SIZED_KEYS.contains(&key) {
        let mut parts = raw.split_whitespace();
        let (number, suffix) = match (parts.next(), parts.next(), parts.next()) {
            (Some(number), Some(suffix), None) => (number, suffix),
            _ => return Err(invalid()),
        };
        let number: f64 = number.parse().map_err(|_| invalid())?;
        let scale = match suffix {
            "kB" => (1u64 << 10) as f64,
            "mB" => (1u64 << 20) as f64,
            "gB" => (1u64 << 30) as f64,
            _ => 1.0,
        };
        return Ok(number * scale);
    }

    raw.trim().parse().map_err(|_| invalid())
}

struct StatusCache {
    last_update: Option<Instant>,
    data: HashMap<String, String>,
}

/// Reads a `/proc/<pid>/status` style file.
pub struct ProcStatusSource {
    path: PathBuf,
    refresh: Duration,
    cache: Mutex<StatusCache>,
}

impl ProcStatusSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            refresh: SYSTEM_REFRESH_INTERVAL,
            cache: Mutex::new(StatusCache {
                last_update: None,
                data: HashMap::new(),
            }),
        }
    }

    pub fn for_current_process() -> Self {
        Self::new("/proc/self/status")
    }

    pub fn with_refresh(mut self, refresh: Duration) -> Self {
        self.refresh = refresh;
        self
    }

    fn refresh_if_stale(&self, cache: &mut StatusCache) -> Result<(), MetricError> {
        let now = Instant::now();
        let stale = cache
            .last_update
            .map_or(true, |last| now.duration_since(last) >= self.refresh);
        if !stale {
            return Ok(());
        }

        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            MetricError::SystemData(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        cache.data.extend(parse_status_table(&raw));
        cache.last_update = Some(now);
        Ok(())
    }
}

impl SystemSource for ProcStatusSource {
    fn value(&self, key: &str) -> Result<f64, MetricError> {
        let mut cache = self.cache.lock();
        self.refresh_if_stale(&mut cache)?;
        let raw = cache
            .data
            .get(key)
            .ok_or_else(|| MetricError::SystemData(format!("system data with key {} was not found", key)))?;
        parse_status_value(key, raw)
    }
}

/// Source for platforms without a status table.
#[derive(Debug, Default)]
pub struct UnsupportedSystemSource;

impl SystemSource for UnsupportedSystemSource {
    fn value(&self, key: &str) -> Result<f64, MetricError> {
        Err(MetricError::PlatformUnsupported {
            key: key.to_string(),
            platform: std::env::consts::OS,
        })
    }
}

pub fn default_system_source() -> Arc<dyn SystemSource> {
    if cfg!(target_os = "linux") {
        Arc::new(ProcStatusSource::for_current_process())
    } else {
        Arc::new(UnsupportedSystemSource)
    }
}

struct SystemMetric {
    source_key: &'static str,
    name: &'static str,
    units: &'static str,
    source: Arc<dyn SystemSource>,
}

impl Metric for SystemMetric {
    fn name(&self) -> &str {
        self.name
    }

    fn units(&self) -> &str {
        self.units
    }

    fn value(&self) -> Result<f64, MetricError> {
        self.source.value(self.source_key)
    }
}

/// Threads, FD table size and virtual/resident memory.
pub fn system_metrics(source: Arc<dyn SystemSource>) -> Vec<Arc<dyn Metric>> {
    SYSTEM_METRICS
        .iter()
        .map(|&(source_key, name, units)| {
            Arc::new(SystemMetric {
                source_key,
                name,
                units,
                source: Arc::clone(&source),
            }) as Arc<dyn Metric>
        })
        .collect()
}
