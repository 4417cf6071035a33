//! Process runtime metric families.
//!
//! - `general`: scheduler task/worker counts, foreign calls, CPUs
//! - `gc`: collector pauses reported by the host
//! - `memory`: heap allocator counters
//! - `system`: OS process status (threads, FDs, virtual/resident memory)

mod gc;
mod general;
mod memory;
mod system;

pub use gc::{
    capture_gc_stats, gc_metrics, register_gc_instruments, spawn_gc_sampler, GcRecorder,
    GC_CALLS_SINCE_KEY, GC_NUM_KEY, GC_PAUSE_KEY, GC_PAUSE_TOTAL_KEY,
};
pub use general::{foreign_call_count, general_metrics, record_foreign_call, ForeignCallsMetric};
pub use memory::{
    capture_memory_stats, memory_metrics, register_memory_instruments, spawn_memory_sampler,
    AllocatorStats, CountingAllocator, MemoryStats, MemoryStatsSource, MEMORY_ALLOCATIONS_KEY,
    MEMORY_DEALLOCATIONS_KEY, MEMORY_IN_USE_KEY, MEMORY_PEAK_KEY, MEMORY_REALLOCATIONS_KEY,
    MEMORY_TOTAL_ALLOC_KEY,
};
pub use system::{
    default_system_source, parse_status_table, parse_status_value, system_metrics,
    ProcStatusSource, SystemSource, UnsupportedSystemSource, SYSTEM_REFRESH_INTERVAL,
};
