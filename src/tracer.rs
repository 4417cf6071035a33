//! Named timing spans.
//!
//! The first `begin_trace` for a name creates a timer under `trace.<name>`
//! and adds its duration and rate adapters to the component under
//! `Trace/<name>`. Later calls reuse the same transaction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::component::Component;
use crate::instrument::{Instrument, Timer};
use crate::metric::{timer_duration_metrics, timer_rate_metrics};
use crate::registry::Registry;
use crate::telemetry;

pub const TRACE_PATH_PREFIX: &str = "Trace";
pub const TRACE_KEY_PREFIX: &str = "trace.";
const TRACE_RATE_UNITS: &str = "rps";

/// A materialized trace name and its timer.
#[derive(Debug)]
pub struct TraceTransaction {
    name: String,
    path: String,
    key: String,
    timer: Arc<Timer>,
}

impl TraceTransaction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn timer(&self) -> &Arc<Timer> {
        &self.timer
    }
}

#[derive(Default)]
struct TracerState {
    index: HashMap<String, usize>,
    transactions: Vec<Arc<TraceTransaction>>,
}

pub struct Tracer {
    registry: Arc<Registry>,
    component: Arc<Component>,
    state: Mutex<TracerState>,
}

impl Tracer {
    pub fn new(registry: Arc<Registry>, component: Arc<Component>) -> Self {
        Self {
            registry,
            component,
            state: Mutex::new(TracerState::default()),
        }
    }

    /// Start timing `name`. The sample is recorded by [`Trace::end_trace`]
    /// or when the returned guard is dropped.
    pub fn begin_trace(&self, name: &str) -> Trace {
        Trace {
            transaction: self.transaction_for(name),
            started: Instant::now(),
            ended: false,
        }
    }

    /// Time `f` under `name`. Records even if `f` panics.
    pub fn trace<F, R>(&self, name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _trace = self.begin_trace(name);
        f()
    }

    pub fn transaction_count(&self) -> usize {
        self.state.lock().transactions.len()
    }

    pub fn transaction(&self, name: &str) -> Option<Arc<TraceTransaction>> {
        let path = trace_path(normalize(name));
        let state = self.state.lock();
        state
            .index
            .get(&path)
            .map(|&idx| Arc::clone(&state.transactions[idx]))
    }

    fn transaction_for(&self, name: &str) -> Arc<TraceTransaction> {
        let name = normalize(name);
        let path = trace_path(name);

        let mut state = self.state.lock();
        if let Some(&idx) = state.index.get(&path) {
            return Arc::clone(&state.transactions[idx]);
        }

        let transaction = Arc::new(self.materialize(name, path.clone()));
        let idx = state.transactions.len();
        state.transactions.push(Arc::clone(&transaction));
        state.index.insert(path, idx);
        transaction
    }

    fn materialize(&self, name: &str, path: String) -> TraceTransaction {
        let key = format!("{}{}", TRACE_KEY_PREFIX, name);
        let timer = match self.registry.get_or_register(&key, Instrument::timer) {
            Instrument::Timer(timer) => {
                self.component
                    .add_metrics(timer_duration_metrics(&self.registry, &key, &path));
                self.component
                    .add_metrics(timer_rate_metrics(&self.registry, &key, &path, TRACE_RATE_UNITS));
                timer
            }
            other => {
                warn!(
                    key = %key,
                    found = %other.kind(),
                    "Trace key bound to another instrument; samples will not be reported"
                );
                Arc::new(Timer::new())
            }
        };

        telemetry::record_trace_materialized();
        debug!(path = %path, key = %key, "Trace transaction created");

        TraceTransaction {
            name: name.to_string(),
            path,
            key,
            timer,
        }
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("transactions", &self.transaction_count())
            .finish()
    }
}

/// In-flight span. Records exactly one sample.
#[must_use = "a trace records when ended or dropped"]
#[derive(Debug)]
pub struct Trace {
    transaction: Arc<TraceTransaction>,
    started: Instant,
    ended: bool,
}

impl Trace {
    pub fn transaction(&self) -> &Arc<TraceTransaction> {
        &self.transaction
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn end_trace(mut self) {
        self.record();
    }

    fn record(&mut self) {
        if !self.ended {
            self.ended = true;
            self.transaction.timer.update_since(self.started);
        }
    }
}

impl Drop for Trace {
    fn drop(&mut self) {
        self.record();
    }
}

fn normalize(name: &str) -> &str {
    name.trim_matches('/')
}

fn trace_path(name: &str) -> String {
    format!("{}/{}", TRACE_PATH_PREFIX, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracer() -> (Arc<Registry>, Arc<Component>, Tracer) {
        let registry = Arc::new(Registry::new());
        let component = Arc::new(Component::new("test", "guid"));
        let tracer = Tracer::new(Arc::clone(&registry), Arc::clone(&component));
        (registry, component, tracer)
    }

    #[test]
    fn test_begin_trace_materializes_once() {
        let (registry, component, tracer) = tracer();
        tracer.begin_trace("checkout").end_trace();
        tracer.begin_trace("/checkout/").end_trace();

        assert_eq!(tracer.transaction_count(), 1);
        assert!(registry.contains("trace.checkout"));
        assert_eq!(component.len(), 8);
        assert_eq!(registry.timer("trace.checkout").unwrap().count(), 2);
    }

    #[test]
    fn test_component_paths() {
        let (_, component, tracer) = tracer();
        tracer.trace("db/query", || ());
        let names = component.metric_names();
        assert!(names.contains(&"Trace/db/query/Max".to_string()));
        assert!(names.contains(&"Trace/db/query/Percentile95".to_string()));
        assert!(names.contains(&"Trace/db/query/Rate1".to_string()));
    }

    #[test]
    fn test_drop_records_once() {
        let (registry, _, tracer) = tracer();
        {
            let _trace = tracer.begin_trace("drop");
        }
        assert_eq!(registry.timer("trace.drop").unwrap().count(), 1);
    }

    #[test]
    fn test_panic_still_records() {
        let (registry, _, tracer) = tracer();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tracer.trace("boom", || panic!("fail"))
        }));
        assert!(result.is_err());
        assert_eq!(registry.timer("trace.boom").unwrap().count(), 1);
    }

    #[test]
    fn test_conflicting_key_uses_private_timer() {
        let (registry, _, tracer) = tracer();
        registry
            .register("trace.taken", Instrument::counter())
            .unwrap();
        tracer.trace("taken", || ());
        let transaction = tracer.transaction("taken").unwrap();
        assert_eq!(transaction.timer().count(), 1);
        assert!(registry.timer("trace.taken").is_err());
    }
}
