//! Heap allocator statistics.
//!
//! Install [`CountingAllocator`] as the process `#[global_allocator]` to feed
//! [`AllocatorStats`]. Without it every counter stays at zero. Hosts with
//! their own accounting implement [`MemoryStatsSource`] instead.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::instrument::Instrument;
use crate::metric::{GaugeDeltaMetric, GaugeMetric, Metric};
use crate::registry::{MetricError, Registry};

pub const MEMORY_IN_USE_KEY: &str = "runtime.memory.in_use";
pub const MEMORY_TOTAL_ALLOC_KEY: &str = "runtime.memory.total_alloc";
pub const MEMORY_PEAK_KEY: &str = "runtime.memory.peak";
pub const MEMORY_ALLOCATIONS_KEY: &str = "runtime.memory.allocations";
pub const MEMORY_DEALLOCATIONS_KEY: &str = "runtime.memory.deallocations";
pub const MEMORY_REALLOCATIONS_KEY: &str = "runtime.memory.reallocations";

static IN_USE: AtomicU64 = AtomicU64::new(0);
static PEAK: AtomicU64 = AtomicU64::new(0);
static TOTAL_ALLOCATED: AtomicU64 = AtomicU64::new(0);
static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);
static DEALLOCATIONS: AtomicU64 = AtomicU64::new(0);
static REALLOCATIONS: AtomicU64 = AtomicU64::new(0);

fn on_alloc(size: usize) {
    let size = size as u64;
    ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
    TOTAL_ALLOCATED.fetch_add(size, Ordering::Relaxed);
    let in_use = IN_USE.fetch_add(size, Ordering::Relaxed) + size;
    PEAK.fetch_max(in_use, Ordering::Relaxed);
}

fn on_dealloc(size: usize) {
    DEALLOCATIONS.fetch_add(1, Ordering::Relaxed);
    IN_USE.fetch_sub(size as u64, Ordering::Relaxed);
}

fn on_realloc(old_size: usize, new_size: usize) {
    REALLOCATIONS.fetch_add(1, Ordering::Relaxed);
    if new_size >= old_size {
        let grown = (new_size - old_size) as u64;
        TOTAL_ALLOCATED.fetch_add(grown, Ordering::Relaxed);
        let in_use = IN_USE.fetch_add(grown, Ordering::Relaxed) + grown;
        PEAK.fetch_max(in_use, Ordering::Relaxed);
    } else {
        IN_USE.fetch_sub((old_size - new_size) as u64, Ordering::Relaxed);
    }
}

/// `System` allocator that counts allocations into process-wide atomics.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountingAllocator;

// SAFETY: every call is forwarded unchanged to `System`; the bookkeeping
// only touches atomics and never allocates.
unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            on_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            on_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        on_dealloc(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            on_realloc(layout.size(), new_size);
        }
        new_ptr
    }
}

/// Point-in-time allocator counters. Sizes in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub in_use: u64,
    pub peak: u64,
    pub total_allocated: u64,
    pub allocations: u64,
    pub deallocations: u64,
    pub reallocations: u64,
}

pub trait MemoryStatsSource: Send + Sync {
    fn stats(&self) -> MemoryStats;
}

/// Reads the counters maintained by [`CountingAllocator`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AllocatorStats;

impl MemoryStatsSource for AllocatorStats {
    fn stats(&self) -> MemoryStats {
        MemoryStats {
            in_use: IN_USE.load(Ordering::Relaxed),
            peak: PEAK.load(Ordering::Relaxed),
            total_allocated: TOTAL_ALLOCATED.load(Ordering::Relaxed),
            allocations: ALLOCATIONS.load(Ordering::Relaxed),
            deallocations: DEALLOCATIONS.load(Ordering::Relaxed),
            reallocations: REALLOCATIONS.load(Ordering::Relaxed),
        }
    }
}

const MEMORY_GAUGE_KEYS: [&str; 6] = [
    MEMORY_IN_USE_KEY,
    MEMORY_TOTAL_ALLOC_KEY,
    MEMORY_PEAK_KEY,
    MEMORY_ALLOCATIONS_KEY,
    MEMORY_DEALLOCATIONS_KEY,
    MEMORY_REALLOCATIONS_KEY,
];

pub fn register_memory_instruments(registry: &Registry) {
    for key in MEMORY_GAUGE_KEYS {
        registry.get_or_register(key, Instrument::gauge);
    }
}

/// Copy one snapshot of `source` into the memory gauges.
pub fn capture_memory_stats(
    registry: &Registry,
    source: &dyn MemoryStatsSource,
) -> Result<(), MetricError> {
    let stats = source.stats();
    for (key, value) in [
        (MEMORY_IN_USE_KEY, stats.in_use),
        (MEMORY_TOTAL_ALLOC_KEY, stats.total_allocated),
        (MEMORY_PEAK_KEY, stats.peak),
        (MEMORY_ALLOCATIONS_KEY, stats.allocations),
        (MEMORY_DEALLOCATIONS_KEY, stats.deallocations),
        (MEMORY_REALLOCATIONS_KEY, stats.reallocations),
    ] {
        registry
            .gauge(key)?
            .update(i64::try_from(value).unwrap_or(i64::MAX));
    }
    Ok(())
}

pub fn spawn_memory_sampler(
    registry: Arc<Registry>,
    source: Arc<dyn MemoryStatsSource>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; the agent already captured once.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = capture_memory_stats(&registry, source.as_ref()) {
                        debug!(error = %e, "Memory capture skipped");
                    }
                }
            }
        }
    })
}

/// `Runtime/Memory/InUse/*` gauges and `Runtime/Memory/Operations/*` deltas.
pub fn memory_metrics(registry: &Arc<Registry>) -> Vec<Arc<dyn Metric>> {
    let in_use = "Runtime/Memory/InUse";
    let operations = "Runtime/Memory/Operations";
    vec![
        Arc::new(GaugeMetric::new(registry, MEMORY_TOTAL_ALLOC_KEY, &format!("{}/TotalAlloc", in_use), "bytes")),
        Arc::new(GaugeMetric::new(registry, MEMORY_IN_USE_KEY, &format!("{}/Heap", in_use), "bytes")),
        Arc::new(GaugeMetric::new(registry, MEMORY_PEAK_KEY, &format!("{}/Peak", in_use), "bytes")),
        Arc::new(GaugeDeltaMetric::new(
            registry,
            MEMORY_ALLOCATIONS_KEY,
            &format!("{}/NoMallocs", operations),
            "mallocs",
        )),
        Arc::new(GaugeDeltaMetric::new(
            registry,
            MEMORY_DEALLOCATIONS_KEY,
            &format!("{}/NoFrees", operations),
            "frees",
        )),
        Arc::new(GaugeDeltaMetric::new(
            registry,
            MEMORY_REALLOCATIONS_KEY,
            &format!("{}/NoReallocs", operations),
            "reallocs",
        )),
    ]
}
