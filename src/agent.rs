//! The agent: owns one component, drives the samplers, and pushes a
//! harvest to the reporting sink on every report interval.
//!
//! Lifecycle: construct from an [`AgentConfig`], share behind `Arc`, call
//! [`Agent::start`] (or [`Agent::run`]) once, and stop with
//! [`Agent::shutdown`]. A final harvest is pushed on shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument as _};
use uuid::Uuid;

use crate::component::{Component, Harvest};
use crate::config::AgentConfig;
use crate::http::{
    http_status_metrics, http_throughput_metrics, register_status_counters,
    register_throughput_timer, InstrumentedHandler, StatusCounters,
};
use crate::instrument::Timer;
use crate::metric::Metric;
use crate::registry::Registry;
use crate::runtime::{
    capture_memory_stats, default_system_source, gc_metrics, general_metrics, memory_metrics,
    register_gc_instruments, register_memory_instruments, spawn_gc_sampler, spawn_memory_sampler,
    system_metrics, AllocatorStats, GcRecorder, MemoryStatsSource, SystemSource,
};
use crate::sink::{HarvestBatch, ReportSink, SinkError};
use crate::telemetry::{self, HarvestSpan, SpanExt};
use crate::tracer::Tracer;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Invalid agent configuration: {0}")]
    Configuration(String),

    #[error("Agent is already running")]
    AlreadyRunning,

    #[error("No async runtime available: {0}")]
    Runtime(String),
}

pub struct Agent {
    config: AgentConfig,
    registry: Arc<Registry>,
    component: Arc<Component>,
    tracer: Tracer,
    gc_recorder: Arc<GcRecorder>,
    memory_source: Arc<dyn MemoryStatsSource>,
    system_source: Arc<dyn SystemSource>,
    custom_metrics: Mutex<Vec<Arc<dyn Metric>>>,
    started: AtomicBool,
    running: AtomicBool,
    http_wrapped: AtomicBool,
    http_family_added: AtomicBool,
    http_timer: OnceLock<Arc<Timer>>,
    status_counters: OnceLock<StatusCounters>,
    samplers: Mutex<Vec<JoinHandle<()>>>,
    instance_id: Uuid,
    host: String,
    cancel: CancellationToken,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        let registry = Arc::new(Registry::new());
        let component = Arc::new(Component::new(config.name.clone(), config.guid.clone()));
        let tracer = Tracer::new(Arc::clone(&registry), Arc::clone(&component));
        Self {
            config,
            registry,
            component,
            tracer,
            gc_recorder: Arc::new(GcRecorder::new()),
            memory_source: Arc::new(AllocatorStats),
            system_source: default_system_source(),
            custom_metrics: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            running: AtomicBool::new(false),
            http_wrapped: AtomicBool::new(false),
            http_family_added: AtomicBool::new(false),
            http_timer: OnceLock::new(),
            status_counters: OnceLock::new(),
            samplers: Mutex::new(Vec::new()),
            instance_id: Uuid::new_v4(),
            host: local_host_name(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_memory_source(mut self, source: Arc<dyn MemoryStatsSource>) -> Self {
        self.memory_source = source;
        self
    }

    pub fn with_system_source(mut self, source: Arc<dyn SystemSource>) -> Self {
        self.system_source = source;
        self
    }

    pub fn with_gc_recorder(mut self, recorder: Arc<GcRecorder>) -> Self {
        self.gc_recorder = recorder;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn component(&self) -> &Arc<Component> {
        &self.component
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn gc_recorder(&self) -> &Arc<GcRecorder> {
        &self.gc_recorder
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Register the metric families, start the samplers and spawn the
    /// reporting loop on the current tokio runtime.
    ///
    /// # Errors
    /// `Configuration` if the license is empty or an interval exceeds
    /// [`crate::config::MAX_INTERVAL_SECS`], `AlreadyRunning` on a second
    /// call, `Runtime` outside a tokio runtime. Nothing is started on error.
    pub fn start(self: &Arc<Self>, sink: Arc<dyn ReportSink>) -> Result<JoinHandle<()>, AgentError> {
        if self.config.license.trim().is_empty() {
            return Err(AgentError::Configuration(
                "a license key is required to report".to_string(),
            ));
        }
        let interval_errors = self.config.interval_errors();
        if !interval_errors.is_empty() {
            return Err(AgentError::Configuration(interval_errors.join("; ")));
        }
        let handle = Handle::try_current().map_err(|e| AgentError::Runtime(e.to_string()))?;
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(AgentError::AlreadyRunning);
        }

        self.component.add_metrics(general_metrics(handle));
        self.component
            .add_metrics(system_metrics(Arc::clone(&self.system_source)));

        if self.config.collect_gc {
            self.start_gc_collection();
        }
        if self.config.collect_memory {
            self.start_memory_collection();
        }
        if self.config.collect_http || self.http_wrapped.load(Ordering::SeqCst) {
            self.ensure_http_family();
        }
        if self.config.collect_http_statuses {
            self.status_counters();
            self.component
                .add_metrics(http_status_metrics(&self.registry));
            self.debug("Init HTTP status metrics collection");
        }

        {
            let mut pending = self.custom_metrics.lock();
            for metric in pending.drain(..) {
                self.debug(&format!("Init {} metric collection", metric.name()));
                self.component.add_metric(metric);
            }
            self.running.store(true, Ordering::SeqCst);
        }
        // A handler wrapped while the families above were registering.
        if self.http_wrapped.load(Ordering::SeqCst) {
            self.ensure_http_family();
        }

        info!(
            component = %self.config.name,
            guid = %self.config.guid,
            report_interval_secs = self.config.report_interval.as_secs(),
            metrics = self.component.len(),
            "Agent started"
        );

        let agent = Arc::clone(self);
        Ok(tokio::spawn(async move { agent.report_loop(sink).await }))
    }

    /// Start and wait until [`Agent::shutdown`] completes the final push.
    pub async fn run(self: &Arc<Self>, sink: Arc<dyn ReportSink>) -> Result<(), AgentError> {
        let reporter = self.start(sink)?;
        reporter
            .await
            .map_err(|e| AgentError::Runtime(format!("reporting task failed: {}", e)))
    }

    /// Stop the samplers and the reporting loop.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            self.debug("Agent shutdown requested");
            self.cancel.cancel();
        }
    }

    /// Add a metric to the reported component. Before start it is queued;
    /// after start it appears in the next harvest.
    pub fn add_custom_metric(&self, metric: Arc<dyn Metric>) {
        let mut pending = self.custom_metrics.lock();
        if self.running.load(Ordering::SeqCst) {
            self.debug(&format!("Init {} metric collection", metric.name()));
            self.component.add_metric(metric);
        } else {
            pending.push(metric);
        }
    }

    /// Wrap `handler` so each request records throughput and, when enabled,
    /// its status code.
    pub fn wrap_http_handler<H>(&self, handler: H) -> InstrumentedHandler<H> {
        self.http_wrapped.store(true, Ordering::SeqCst);
        let timer = Arc::clone(self.http_timer());
        let statuses = self
            .config
            .collect_http_statuses
            .then(|| Arc::clone(self.status_counters()));
        if self.running.load(Ordering::SeqCst) {
            self.ensure_http_family();
        }
        InstrumentedHandler::new(handler, timer, statuses)
    }

    /// Read every metric once into a batch without disturbing the reporting
    /// loop: delta baselines and counter clears are left for the next report.
    pub fn harvest_once(&self) -> HarvestBatch {
        self.collect(self.component.peek()).0
    }

    fn collect(&self, harvest: Harvest) -> (HarvestBatch, usize) {
        for failure in &harvest.failures {
            warn!(metric = %failure.name, error = %failure.error, "Skipping metric");
        }
        telemetry::record_harvest(harvest.values.len(), harvest.failures.len());

        let batch = HarvestBatch {
            component: self.component.name().to_string(),
            guid: self.component.guid().to_string(),
            agent_version: self.config.version.clone(),
            instance_id: self.instance_id,
            host: self.host.clone(),
            timestamp: Utc::now(),
            duration_secs: self.config.report_interval.as_secs(),
            metrics: harvest.values,
        };
        (batch, harvest.failures.len())
    }

    /// Harvest and push once. Sent data is cleared only after a successful
    /// push.
    pub async fn report(&self, sink: &dyn ReportSink) -> Result<(), SinkError> {
        let (batch, failures) = self.collect(self.component.harvest());
        let span = HarvestSpan::new(&batch.component, batch.len(), failures);
        let pushed_at = Instant::now();

        let result = sink.push(&batch).instrument(span.clone()).await;
        span.record_result(&result);

        match &result {
            Ok(()) => {
                self.component.clear_sent_data();
                telemetry::record_push_success(pushed_at.elapsed());
                self.debug(&format!("Pushed {} metrics", batch.len()));
            }
            Err(e) => {
                warn!(error = %e, metrics = batch.len(), "Failed to push harvest");
                telemetry::record_push_failure(e.kind());
            }
        }
        result
    }

    async fn report_loop(&self, sink: Arc<dyn ReportSink>) {
        let period = self.config.report_interval;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let _ = self.report(sink.as_ref()).await;
                }
            }
        }

        let samplers: Vec<JoinHandle<()>> = self.samplers.lock().drain(..).collect();
        for sampler in samplers {
            let _ = sampler.await;
        }
        let _ = self.report(sink.as_ref()).await;
        self.running.store(false, Ordering::SeqCst);
        info!(component = %self.config.name, "Agent stopped");
    }

    fn start_gc_collection(&self) {
        register_gc_instruments(&self.registry);
        self.component.add_metrics(gc_metrics(&self.registry));
        let sampler = spawn_gc_sampler(
            Arc::clone(&self.registry),
            Arc::clone(&self.gc_recorder),
            self.config.gc_poll_interval,
            self.cancel.clone(),
        );
        self.samplers.lock().push(sampler);
        self.debug(&format!(
            "Init GC metrics collection. Poll interval {} seconds",
            self.config.gc_poll_interval.as_secs()
        ));
    }

    fn start_memory_collection(&self) {
        register_memory_instruments(&self.registry);
        if let Err(e) = capture_memory_stats(&self.registry, self.memory_source.as_ref()) {
            warn!(error = %e, "Initial memory capture failed");
        }
        self.component.add_metrics(memory_metrics(&self.registry));
        let sampler = spawn_memory_sampler(
            Arc::clone(&self.registry),
            Arc::clone(&self.memory_source),
            self.config.memory_poll_interval,
            self.cancel.clone(),
        );
        self.samplers.lock().push(sampler);
        self.debug(&format!(
            "Init memory allocator metrics collection. Poll interval {} seconds",
            self.config.memory_poll_interval.as_secs()
        ));
    }

    fn ensure_http_family(&self) {
        if self.http_family_added.swap(true, Ordering::SeqCst) {
            return;
        }
        self.http_timer();
        self.component
            .add_metrics(http_throughput_metrics(&self.registry));
        self.debug("Init HTTP metrics collection");
    }

    fn http_timer(&self) -> &Arc<Timer> {
        self.http_timer
            .get_or_init(|| register_throughput_timer(&self.registry))
    }

    fn status_counters(&self) -> &StatusCounters {
        self.status_counters
            .get_or_init(|| register_status_counters(&self.registry))
    }

    fn debug(&self, message: &str) {
        if self.config.verbose {
            debug!(component = %self.config.name, "{}", message);
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.config.name)
            .field("guid", &self.config.guid)
            .field("instance_id", &self.instance_id)
            .field("running", &self.is_running())
            .field("metrics", &self.component.len())
            .finish()
    }
}

fn local_host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
