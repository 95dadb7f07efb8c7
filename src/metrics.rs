//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

/// Process-wide creation metrics
pub struct Metrics {
    registry: Registry,

    // Counters
    pub runs_started: IntCounter,
    pub runs_succeeded: IntCounter,
    pub runs_failed: IntCounterVec,
    pub steps_confirmed: IntCounter,
    pub steps_failed: IntCounter,
    pub endpoint_probes: IntCounterVec,

    // Histograms
    pub step_latency: Histogram,
    pub run_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let runs_started = IntCounter::with_opts(Opts::new(
            "creation_runs_started_total",
            "Number of token creation runs started",
        ))?;

        let runs_succeeded = IntCounter::with_opts(Opts::new(
            "creation_runs_succeeded_total",
            "Number of token creation runs where every step confirmed",
        ))?;

        let runs_failed = IntCounterVec::new(
            Opts::new(
                "creation_runs_failed_total",
                "Number of failed token creation runs by error category",
            ),
            &["category"],
        )?;

        let steps_confirmed = IntCounter::with_opts(Opts::new(
            "transaction_steps_confirmed_total",
            "Number of transaction steps confirmed",
        ))?;

        let steps_failed = IntCounter::with_opts(Opts::new(
            "transaction_steps_failed_total",
            "Number of transaction steps that failed to confirm",
        ))?;

        let endpoint_probes = IntCounterVec::new(
            Opts::new("endpoint_probes_total", "RPC endpoint liveness probes by outcome"),
            &["outcome"],
        )?;

        let step_latency = Histogram::with_opts(
            HistogramOpts::new(
                "transaction_step_latency_seconds",
                "Submit-to-confirmation latency of one step",
            )
            .buckets(vec![0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        )?;

        let run_latency = Histogram::with_opts(
            HistogramOpts::new("creation_run_latency_seconds", "End-to-end run latency")
                .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(runs_started.clone()))?;
        registry.register(Box::new(runs_succeeded.clone()))?;
        registry.register(Box::new(runs_failed.clone()))?;
        registry.register(Box::new(steps_confirmed.clone()))?;
        registry.register(Box::new(steps_failed.clone()))?;
        registry.register(Box::new(endpoint_probes.clone()))?;
        registry.register(Box::new(step_latency.clone()))?;
        registry.register(Box::new(run_latency.clone()))?;

        Ok(Self {
            registry,
            runs_started,
            runs_succeeded,
            runs_failed,
            steps_confirmed,
            steps_failed,
            endpoint_probes,
            step_latency,
            run_latency,
        })
    }

    /// Render every metric in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.start.elapsed().as_secs_f64());
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
