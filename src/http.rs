//! HTTP handler instrumentation.
//!
//! The agent does not depend on an HTTP server. Servers adapt their
//! response type to [`ResponseWriter`] and their handlers to
//! [`HttpHandler`]; [`InstrumentedHandler`] then records one throughput
//! sample per request and, optionally, one status-code count.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use crate::instrument::{Counter, Instrument, Timer};
use crate::metric::{timer_metrics, CounterMetric, Metric};
use crate::registry::Registry;

pub const HTTP_THROUGHPUT_KEY: &str = "harvest.http.throughput";
pub const HTTP_STATUS_KEY_PREFIX: &str = "harvest.http.status.";

/// Status codes with a dedicated counter. Others are not counted.
pub const HTTP_STATUSES: [u16; 41] = [
    100, 101, //
    200, 201, 202, 203, 204, 205, 206, //
    300, 301, 302, 303, 304, 305, 307, //
    400, 401, 402, 403, 404, 405, 406, 407, 408, 409, 410, 411, 412, 413, 414, 415, 416, 417,
    418, //
    500, 501, 502, 503, 504, 505,
];

pub fn status_key(status: u16) -> String {
    format!("{}{}", HTTP_STATUS_KEY_PREFIX, status)
}

/// Minimal response surface the wrapper needs to observe.
pub trait ResponseWriter {
    fn write_header(&mut self, status: u16);
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

pub trait HttpHandler<Req>: Send + Sync {
    fn serve(&self, writer: &mut dyn ResponseWriter, req: Req);
}

impl<Req, F> HttpHandler<Req> for F
where
    F: Fn(&mut dyn ResponseWriter, Req) + Send + Sync,
{
    fn serve(&self, writer: &mut dyn ResponseWriter, req: Req) {
        self(writer, req)
    }
}

/// In-memory response, for tests and buffering servers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordedResponse {
    pub status: Option<u16>,
    pub body: Vec<u8>,
}

impl ResponseWriter for RecordedResponse {
    fn write_header(&mut self, status: u16) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(200);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }
}

pub type StatusCounters = Arc<HashMap<u16, Arc<Counter>>>;

/// Bind the shared throughput timer, keeping an existing binding.
pub fn register_throughput_timer(registry: &Registry) -> Arc<Timer> {
    match registry.get_or_register(HTTP_THROUGHPUT_KEY, Instrument::timer) {
        Instrument::Timer(timer) => timer,
        other => {
            tracing::warn!(
                key = HTTP_THROUGHPUT_KEY,
                found = %other.kind(),
                "Throughput key bound to another instrument; samples will not be reported"
            );
            Arc::new(Timer::new())
        }
    }
}

/// Bind one counter per known status and return them by code.
pub fn register_status_counters(registry: &Registry) -> StatusCounters {
    let counters = HTTP_STATUSES
        .iter()
        .filter_map(|&status| {
            match registry.get_or_register(&status_key(status), Instrument::counter) {
                Instrument::Counter(counter) => Some((status, counter)),
                _ => None,
            }
        })
        .collect();
    Arc::new(counters)
}

/// `HTTP/Throughput/*` rate (rps) and duration (ms) adapters.
pub fn http_throughput_metrics(registry: &Arc<Registry>) -> Vec<Arc<dyn Metric>> {
    timer_metrics(registry, HTTP_THROUGHPUT_KEY, "HTTP/Throughput", "rps")
}

/// `HTTP/Status/<code>` counters.
pub fn http_status_metrics(registry: &Arc<Registry>) -> Vec<Arc<dyn Metric>> {
    HTTP_STATUSES
        .iter()
        .map(|&status| {
            Arc::new(CounterMetric::new(
                registry,
                &status_key(status),
                &format!("HTTP/Status/{}", status),
                "count",
            )) as Arc<dyn Metric>
        })
        .collect()
}

/// Handler wrapper produced by `Agent::wrap_http_handler`.
pub struct InstrumentedHandler<H> {
    inner: H,
    timer: Arc<Timer>,
    statuses: Option<StatusCounters>,
}

impl<H> InstrumentedHandler<H> {
    pub fn new(inner: H, timer: Arc<Timer>, statuses: Option<StatusCounters>) -> Self {
        Self {
            inner,
            timer,
            statuses,
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<Req, H> HttpHandler<Req> for InstrumentedHandler<H>
where
    H: HttpHandler<Req>,
{
    fn serve(&self, writer: &mut dyn ResponseWriter, req: Req) {
        let _timing = TimingGuard {
            timer: &self.timer,
            started: Instant::now(),
        };
        match &self.statuses {
            Some(counters) => {
                let mut recorder = StatusRecorder {
                    inner: writer,
                    counters,
                    recorded: false,
                };
                self.inner.serve(&mut recorder, req);
            }
            None => self.inner.serve(writer, req),
        }
    }
}

impl<H> std::fmt::Debug for InstrumentedHandler<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedHandler")
            .field("statuses", &self.statuses.is_some())
            .finish()
    }
}

struct TimingGuard<'a> {
    timer: &'a Timer,
    started: Instant,
}

impl Drop for TimingGuard<'_> {
    fn drop(&mut self) {
        self.timer.update_since(self.started);
    }
}

/// Counts the first status of a response exactly once.
struct StatusRecorder<'a, W: ResponseWriter + ?Sized> {
    inner: &'a mut W,
    counters: &'a HashMap<u16, Arc<Counter>>,
    recorded: bool,
}

impl<W: ResponseWriter + ?Sized> StatusRecorder<'_, W> {
    fn record(&mut self, status: u16) {
        if self.recorded {
            return;
        }
        self.recorded = true;
        if let Some(counter) = self.counters.get(&status) {
            counter.inc(1);
        }
    }
}

impl<W: ResponseWriter + ?Sized> ResponseWriter for StatusRecorder<'_, W> {
    fn write_header(&mut self, status: u16) {
        self.record(status);
        self.inner.write_header(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.record(200);
        self.inner.write(buf)
    }
}

impl<W: ResponseWriter + ?Sized> Drop for StatusRecorder<'_, W> {
    fn drop(&mut self) {
        // A handler that unwinds before responding is counted as a server error.
        let status = if std::thread::panicking() { 500 } else { 200 };
        self.record(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters() -> (Arc<Registry>, StatusCounters) {
        let registry = Arc::new(Registry::new());
        let counters = register_status_counters(&registry);
        (registry, counters)
    }

    #[test]
    fn test_status_list_and_keys() {
        assert_eq!(HTTP_STATUSES.len(), 41);
        assert_eq!(status_key(404), "harvest.http.status.404");
        let (registry, counters) = counters();
        assert_eq!(counters.len(), 41);
        assert!(registry.counter("harvest.http.status.418").is_ok());
    }

    #[test]
    fn test_recorder_counts_once() {
        let (registry, counters) = counters();
        let mut response = RecordedResponse::default();
        {
            let mut recorder = StatusRecorder {
                inner: &mut response,
                counters: &counters,
                recorded: false,
            };
            recorder.write_header(201);
            recorder.write_header(500);
            recorder.write(b"ok").unwrap();
        }
        assert_eq!(registry.get_counter_value(&status_key(201)).unwrap(), 1.0);
        assert_eq!(registry.get_counter_value(&status_key(500)).unwrap(), 0.0);
        assert_eq!(registry.get_counter_value(&status_key(200)).unwrap(), 0.0);
        assert_eq!(response.status, Some(201));
    }

    #[test]
    fn test_implicit_ok_without_write() {
        let (registry, counters) = counters();
        let mut response = RecordedResponse::default();
        drop(StatusRecorder {
            inner: &mut response,
            counters: &counters,
            recorded: false,
        });
        assert_eq!(registry.get_counter_value(&status_key(200)).unwrap(), 1.0);
    }

    #[test]
    fn test_unknown_status_ignored() {
        let (registry, counters) = counters();
        let timer = Arc::new(Timer::new());
        let handler = InstrumentedHandler::new(
            |w: &mut dyn ResponseWriter, _req: ()| w.write_header(299),
            Arc::clone(&timer),
            Some(counters),
        );
        let mut response = RecordedResponse::default();
        handler.serve(&mut response, ());

        assert_eq!(timer.count(), 1);
        let total: f64 = HTTP_STATUSES
            .iter()
            .map(|&s| registry.get_counter_value(&status_key(s)).unwrap())
            .sum();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn test_metric_paths() {
        let registry = Arc::new(Registry::new());
        let throughput = http_throughput_metrics(&registry);
        assert_eq!(throughput.len(), 8);
        assert_eq!(throughput[0].name(), "HTTP/Throughput/Rate1");
        assert_eq!(throughput[0].units(), "rps");

        let statuses = http_status_metrics(&registry);
        assert_eq!(statuses[0].name(), "HTTP/Status/100");
        assert_eq!(statuses[0].units(), "count");
    }
}
