//! Integration tests for named trace transactions.

use std::sync::Arc;
use std::thread;

use harvest_agent::{Component, Instrument, Registry, TimerStat, Tracer};

fn tracer() -> (Arc<Registry>, Arc<Component>, Arc<Tracer>) {
    let registry = Arc::new(Registry::new());
    let component = Arc::new(Component::new("app", "com.example.app"));
    let tracer = Arc::new(Tracer::new(Arc::clone(&registry), Arc::clone(&component)));
    (registry, component, tracer)
}

// === Materialization ===

#[test]
fn first_trace_adds_duration_and_rate_metrics() {
    let (registry, component, tracer) = tracer();
    tracer.trace("checkout", || ());

    assert!(registry.timer("trace.checkout").is_ok());
    assert_eq!(
        component.metric_names(),
        vec![
            "Trace/checkout/Max",
            "Trace/checkout/Mean",
            "Trace/checkout/Min",
            "Trace/checkout/Percentile95",
            "Trace/checkout/Rate1",
            "Trace/checkout/Rate5",
            "Trace/checkout/Rate15",
            "Trace/checkout/RateMean",
        ]
    );
}

#[test]
fn concurrent_first_use_materializes_once() {
    let (registry, component, tracer) = tracer();
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let tracer = Arc::clone(&tracer);
            thread::spawn(move || {
                let trace = tracer.begin_trace("checkout");
                trace.end_trace();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(tracer.transaction_count(), 1);
    assert_eq!(component.len(), 8);
    assert_eq!(registry.get_timer_value("trace.checkout", TimerStat::Count).unwrap(), 16.0);
}

#[test]
fn surrounding_slashes_name_the_same_transaction() {
    let (_registry, component, tracer) = tracer();
    tracer.trace("/search/", || ());
    tracer.trace("search", || ());

    assert_eq!(tracer.transaction_count(), 1);
    assert_eq!(component.len(), 8);
    let transaction = tracer.transaction("search").unwrap();
    assert_eq!(transaction.path(), "Trace/search");
    assert_eq!(transaction.key(), "trace.search");
}

#[test]
fn distinct_names_get_distinct_transactions() {
    let (_registry, component, tracer) = tracer();
    tracer.trace("a", || ());
    tracer.trace("b", || ());
    assert_eq!(tracer.transaction_count(), 2);
    assert_eq!(component.len(), 16);
    assert!(tracer.transaction("c").is_none());
}

// === Sampling ===

#[test]
fn each_call_records_one_sample() {
    let (registry, _component, tracer) = tracer();
    for _ in 0..5 {
        tracer.trace("loop", || ());
    }
    let trace = tracer.begin_trace("loop");
    drop(trace);

    assert_eq!(registry.get_timer_value("trace.loop", TimerStat::Count).unwrap(), 6.0);
}

#[test]
fn trace_returns_closure_value() {
    let (_registry, _component, tracer) = tracer();
    let value = tracer.trace("compute", || 6 * 7);
    assert_eq!(value, 42);
}

#[test]
fn panicking_closure_still_records() {
    let (registry, _component, tracer) = tracer();
    let tracer_clone = Arc::clone(&tracer);
    let result = thread::spawn(move || {
        tracer_clone.trace("explode", || panic!("boom"));
    })
    .join();

    assert!(result.is_err());
    assert_eq!(registry.get_timer_value("trace.explode", TimerStat::Count).unwrap(), 1.0);
}

#[test]
fn harvest_reports_trace_durations() {
    let (_registry, component, tracer) = tracer();
    tracer.trace("quick", || ());

    let harvest = component.harvest();
    assert!(harvest.failures.is_empty());
    let max = harvest
        .values
        .iter()
        .find(|v| v.name == "Trace/quick/Max")
        .unwrap();
    assert_eq!(max.units, "ms");
    assert!(max.value >= 0.0);
}

// === Key conflicts ===

#[test]
fn key_bound_to_other_kind_keeps_binding() {
    let (registry, component, tracer) = tracer();
    registry.register("trace.busy", Instrument::counter()).unwrap();

    tracer.trace("busy", || ());
    tracer.trace("busy", || ());

    assert!(component.is_empty());
    assert!(component.harvest().failures.is_empty());

    assert!(registry.counter("trace.busy").is_ok());
    assert_eq!(registry.get_counter_value("trace.busy").unwrap(), 0.0);
    let transaction = tracer.transaction("busy").unwrap();
    assert_eq!(transaction.timer().count(), 2);
}
