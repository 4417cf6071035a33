//! Integration tests for the agent lifecycle and reporting loop.

use std::sync::Arc;
use std::time::Duration;

use harvest_agent::metric::CounterMetric;
use harvest_agent::runtime::{GcRecorder, MemoryStats, MemoryStatsSource, UnsupportedSystemSource};
use harvest_agent::{
    Agent, AgentConfig, AgentError, FnMetric, HarvestBatch, HttpHandler, Instrument,
    JsonLinesSink, MemorySink, RecordedResponse, ResponseWriter,
};

const REPORT_INTERVAL: Duration = Duration::from_secs(60);

fn config() -> AgentConfig {
    AgentConfig {
        name: "checkout-service".to_string(),
        guid: "com.example.checkout".to_string(),
        license: "test-license".to_string(),
        report_interval: REPORT_INTERVAL,
        collect_gc: false,
        collect_memory: false,
        ..AgentConfig::default()
    }
}

fn agent(config: AgentConfig) -> Arc<Agent> {
    Arc::new(Agent::new(config).with_system_source(Arc::new(UnsupportedSystemSource)))
}

struct FixedMemory(MemoryStats);

impl MemoryStatsSource for FixedMemory {
    fn stats(&self) -> MemoryStats {
        self.0
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn shutdown_pushes_final_batch() {
    let agent = agent(config());
    let sink = Arc::new(MemorySink::new());
    let reporter = agent.start(sink.clone()).unwrap();
    assert!(agent.is_running());

    agent.shutdown();
    reporter.await.unwrap();

    assert_eq!(sink.len(), 1);
    assert!(!agent.is_running());
}

#[tokio::test(start_paused = true)]
async fn reports_once_per_interval() {
    let agent = agent(config());
    let sink = Arc::new(MemorySink::new());
    let reporter = agent.start(sink.clone()).unwrap();

    tokio::time::sleep(REPORT_INTERVAL / 2).await;
    assert!(sink.is_empty());

    tokio::time::sleep(REPORT_INTERVAL * 2).await;
    assert_eq!(sink.len(), 2);

    agent.shutdown();
    reporter.await.unwrap();
    assert_eq!(sink.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn run_returns_after_shutdown() {
    let agent = agent(config());
    let sink = Arc::new(MemorySink::new());

    let runner = {
        let agent = Arc::clone(&agent);
        let sink = sink.clone();
        tokio::spawn(async move { agent.run(sink).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    agent.shutdown();

    runner.await.unwrap().unwrap();
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn missing_license_starts_nothing() {
    let agent = agent(AgentConfig {
        license: "  ".to_string(),
        ..config()
    });
    let err = agent.start(Arc::new(MemorySink::new())).unwrap_err();
    assert!(matches!(err, AgentError::Configuration(_)));
    assert!(agent.component().is_empty());
}

#[tokio::test]
async fn oversized_interval_starts_nothing() {
    let agent = agent(AgentConfig {
        report_interval: Duration::from_secs(u64::MAX),
        ..config()
    });
    let err = agent.start(Arc::new(MemorySink::new())).unwrap_err();
    assert!(matches!(err, AgentError::Configuration(_)));
    assert!(!agent.is_running());
    assert!(agent.component().is_empty());
}

// ============================================================================
// Batch contents
// ============================================================================

#[tokio::test(start_paused = true)]
async fn batch_carries_component_identity() {
    let agent = agent(config());
    let sink = Arc::new(MemorySink::new());
    let reporter = agent.start(sink.clone()).unwrap();
    agent.shutdown();
    reporter.await.unwrap();

    let batch = sink.last().unwrap();
    assert_eq!(batch.component, "checkout-service");
    assert_eq!(batch.guid, "com.example.checkout");
    assert_eq!(batch.duration_secs, 60);
    assert_eq!(batch.instance_id, agent.instance_id());
    assert_eq!(batch.agent_version, env!("CARGO_PKG_VERSION"));
    assert!(batch.value("Runtime/General/NOWorkers").is_some());
    assert!(batch.value("Runtime/System/CPUs").unwrap() >= 1.0);
    // Unsupported OS metrics are skipped, not reported as zero.
    assert!(batch.value("Runtime/System/Threads").is_none());
}

#[tokio::test(start_paused = true)]
async fn custom_metrics_before_and_after_start_are_reported() {
    let agent = agent(config());
    agent.add_custom_metric(FnMetric::shared("Custom/Early", "things", || Ok(1.0)));
    assert!(agent.component().is_empty());

    let sink = Arc::new(MemorySink::new());
    let reporter = agent.start(sink.clone()).unwrap();
    agent.add_custom_metric(FnMetric::shared("Custom/Late", "things", || Ok(2.0)));

    tokio::time::sleep(REPORT_INTERVAL + Duration::from_secs(1)).await;
    let batch = sink.last().unwrap();
    assert_eq!(batch.value("Custom/Early"), Some(1.0));
    assert_eq!(batch.value("Custom/Late"), Some(2.0));

    agent.shutdown();
    reporter.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_push_keeps_counts_until_delivered() {
    let agent = agent(config());
    agent.registry().register("orders", Instrument::counter()).unwrap();
    agent.add_custom_metric(Arc::new(CounterMetric::new(
        agent.registry(),
        "orders",
        "Custom/Orders",
        "orders",
    )));

    let sink = Arc::new(MemorySink::new());
    sink.set_rejecting(true);
    let reporter = agent.start(sink.clone()).unwrap();

    agent.registry().inc_counter_for_key("orders", 5);
    tokio::time::sleep(REPORT_INTERVAL + Duration::from_secs(1)).await;
    assert!(sink.is_empty());
    assert_eq!(agent.registry().get_counter_value("orders").unwrap(), 5.0);

    sink.set_rejecting(false);
    agent.registry().inc_counter_for_key("orders", 3);
    tokio::time::sleep(REPORT_INTERVAL).await;
    assert_eq!(sink.last().unwrap().value("Custom/Orders"), Some(8.0));
    assert_eq!(agent.registry().get_counter_value("orders").unwrap(), 0.0);

    agent.shutdown();
    reporter.await.unwrap();
    assert_eq!(sink.last().unwrap().value("Custom/Orders"), Some(0.0));
}

#[tokio::test(start_paused = true)]
async fn traces_are_reported_under_trace_path() {
    let agent = agent(config());
    let sink = Arc::new(MemorySink::new());
    let reporter = agent.start(sink.clone()).unwrap();

    agent.tracer().trace("checkout", || ());
    agent.shutdown();
    reporter.await.unwrap();

    let batch = sink.last().unwrap();
    assert!(batch.value("Trace/checkout/Max").is_some());
    assert!(batch.value("Trace/checkout/RateMean").is_some());
}

// ============================================================================
// Runtime families
// ============================================================================

#[tokio::test(start_paused = true)]
async fn collector_pauses_flow_into_batch() {
    let recorder = Arc::new(GcRecorder::new());
    recorder.record_pause(Duration::from_millis(2));
    recorder.record_pause(Duration::from_millis(4));

    let agent = Arc::new(
        Agent::new(AgentConfig {
            collect_gc: true,
            ..config()
        })
        .with_system_source(Arc::new(UnsupportedSystemSource))
        .with_gc_recorder(Arc::clone(&recorder)),
    );
    let sink = Arc::new(MemorySink::new());
    let reporter = agent.start(sink.clone()).unwrap();

    tokio::time::sleep(REPORT_INTERVAL + Duration::from_secs(1)).await;
    let batch = sink.last().unwrap();
    assert_eq!(batch.value("Runtime/GC/TotalCalls"), Some(2.0));
    assert_eq!(batch.value("Runtime/GC/PauseTotalTime"), Some(6_000_000.0));
    assert_eq!(batch.value("Runtime/GC/GCTime/Max"), Some(4_000_000.0));
    assert_eq!(batch.value("Runtime/GC/GCTime/Min"), Some(2_000_000.0));
    // Later polls saw no new collections.
    assert_eq!(batch.value("Runtime/GC/Calls"), Some(0.0));

    agent.shutdown();
    reporter.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn memory_stats_are_captured_at_start() {
    let stats = MemoryStats {
        in_use: 4096,
        peak: 8192,
        total_allocated: 16384,
        allocations: 10,
        deallocations: 6,
        reallocations: 2,
    };
    let agent = Arc::new(
        Agent::new(AgentConfig {
            collect_memory: true,
            ..config()
        })
        .with_system_source(Arc::new(UnsupportedSystemSource))
        .with_memory_source(Arc::new(FixedMemory(stats))),
    );
    let sink = Arc::new(MemorySink::new());
    let reporter = agent.start(sink.clone()).unwrap();
    agent.shutdown();
    reporter.await.unwrap();

    let batch = sink.last().unwrap();
    assert_eq!(batch.value("Runtime/Memory/InUse/Heap"), Some(4096.0));
    assert_eq!(batch.value("Runtime/Memory/InUse/Peak"), Some(8192.0));
    assert_eq!(batch.value("Runtime/Memory/InUse/TotalAlloc"), Some(16384.0));
    assert_eq!(batch.value("Runtime/Memory/Operations/NoMallocs"), Some(10.0));
    assert_eq!(batch.value("Runtime/Memory/Operations/NoFrees"), Some(6.0));
    assert_eq!(batch.value("Runtime/Memory/Operations/NoReallocs"), Some(2.0));
}

// ============================================================================
// HTTP family
// ============================================================================

#[tokio::test(start_paused = true)]
async fn wrapping_after_start_adds_throughput_family() {
    let agent = agent(config());
    let sink = Arc::new(MemorySink::new());
    let reporter = agent.start(sink.clone()).unwrap();
    assert!(agent.harvest_once().value("HTTP/Throughput/Max").is_none());

    let handler = agent.wrap_http_handler(|w: &mut dyn ResponseWriter, _req: ()| {
        w.write_header(200);
    });
    handler.serve(&mut RecordedResponse::default(), ());
    let _again = agent.wrap_http_handler(|_w: &mut dyn ResponseWriter, _req: ()| {});

    let batch = agent.harvest_once();
    let throughput: Vec<_> = batch
        .metrics
        .iter()
        .filter(|m| m.name.starts_with("HTTP/Throughput/"))
        .collect();
    assert_eq!(throughput.len(), 8);

    agent.shutdown();
    reporter.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn status_family_registered_at_start() {
    let agent = agent(AgentConfig {
        collect_http: true,
        collect_http_statuses: true,
        ..config()
    });
    let sink = Arc::new(MemorySink::new());
    let reporter = agent.start(sink.clone()).unwrap();

    let handler = agent.wrap_http_handler(|w: &mut dyn ResponseWriter, _req: ()| {
        w.write_header(503);
    });
    handler.serve(&mut RecordedResponse::default(), ());

    agent.shutdown();
    reporter.await.unwrap();

    let batch = sink.last().unwrap();
    assert_eq!(batch.value("HTTP/Status/503"), Some(1.0));
    assert_eq!(batch.value("HTTP/Status/200"), Some(0.0));
    assert!(batch.value("HTTP/Throughput/Rate1").is_some());
}

// ============================================================================
// Sinks
// ============================================================================

#[tokio::test]
async fn json_lines_sink_receives_final_batch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.jsonl");
    let agent = agent(config());
    agent.add_custom_metric(FnMetric::shared("Custom/Value", "units", || Ok(3.5)));

    let reporter = agent.start(Arc::new(JsonLinesSink::new(&path))).unwrap();
    agent.shutdown();
    reporter.await.unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1);
    let batch: HarvestBatch = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(batch.component, "checkout-service");
    assert_eq!(batch.value("Custom/Value"), Some(3.5));
}
