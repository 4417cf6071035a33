//! Agent self-telemetry through the `metrics` facade.
//!
//! These describe the harvester itself (ticks, push outcomes, skipped
//! adapters), not the host's instruments. Without an installed recorder the
//! calls are no-ops.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

pub const HARVEST_TICKS: &str = "harvest_agent.harvest.ticks";
pub const HARVEST_BATCH_SIZE: &str = "harvest_agent.harvest.batch_size";
pub const HARVEST_READ_FAILURES: &str = "harvest_agent.harvest.read_failures";
pub const PUSH_SUCCESS: &str = "harvest_agent.push.success";
pub const PUSH_FAILURE: &str = "harvest_agent.push.failure";
pub const PUSH_LATENCY_MS: &str = "harvest_agent.push.latency_ms";
pub const TRACE_TRANSACTIONS: &str = "harvest_agent.trace.transactions";

/// Register metric descriptions with the installed recorder.
pub fn init_metrics() {
    describe_counter!(HARVEST_TICKS, "Harvest ticks executed");
    describe_gauge!(HARVEST_BATCH_SIZE, "Values in the most recent batch");
    describe_counter!(HARVEST_READ_FAILURES, "Adapter reads skipped due to errors");
    describe_counter!(PUSH_SUCCESS, "Batches accepted by the reporting sink");
    describe_counter!(PUSH_FAILURE, "Batches rejected or failed by the reporting sink");
    describe_histogram!(PUSH_LATENCY_MS, "Reporting sink push latency in milliseconds");
    describe_counter!(TRACE_TRANSACTIONS, "Trace transactions materialized");
}

pub fn record_harvest(values: usize, failures: usize) {
    counter!(HARVEST_TICKS).increment(1);
    gauge!(HARVEST_BATCH_SIZE).set(values as f64);
    if failures > 0 {
        counter!(HARVEST_READ_FAILURES).increment(failures as u64);
    }
}

pub fn record_push_success(latency: Duration) {
    counter!(PUSH_SUCCESS).increment(1);
    histogram!(PUSH_LATENCY_MS).record(latency.as_secs_f64() * 1000.0);
}

pub fn record_push_failure(reason: &str) {
    counter!(PUSH_FAILURE, "reason" => reason.to_string()).increment(1);
}

pub fn record_trace_materialized() {
    counter!(TRACE_TRANSACTIONS).increment(1);
}
