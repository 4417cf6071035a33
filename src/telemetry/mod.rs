//! Telemetry for the agent itself.
//!
//! Provides logging setup, harvest spans, and self-metrics through the
//! `metrics` facade.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    init_metrics, record_harvest, record_push_failure, record_push_success,
    record_trace_materialized,
};
pub use spans::{HarvestSpan, SpanExt};
