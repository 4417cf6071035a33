//! Span helpers for the harvest pipeline.

use tracing::{info_span, Span};

/// Extension trait for recording an outcome into a span.
pub trait SpanExt {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for the span wrapping one push to the reporting sink.
pub struct HarvestSpan;

impl HarvestSpan {
    /// Fields:
    /// - `component`: component name
    /// - `metrics`: number of values in the batch
    /// - `failures`: adapters skipped this tick
    /// - `status` / `error.message`: filled by `SpanExt::record_result`
    pub fn new(component: &str, metrics: usize, failures: usize) -> Span {
        info_span!(
            "harvest_push",
            component = %component,
            metrics = metrics,
            failures = failures,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    }
}
