//! Observability infrastructure for the watcher
//!
//! Provides:
//! - Prometheus metrics (cycle latency, sessions observed, kills, failures)
//! - Structured logging of significant events with tracing

use crate::models::RawSession;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Encoder, Histogram, IntCounter,
    IntGauge, TextEncoder,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for cycle latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PslMetricsInner> = OnceLock::new();

struct PslMetricsInner {
    cycles: IntCounter,
    cycle_latency_seconds: Histogram,
    sessions_observed: IntGauge,
    sessions_killed: IntCounter,
    kill_failures: IntCounter,
    audit_failures: IntCounter,
    reconnects: IntCounter,
}

impl PslMetricsInner {
    fn new() -> Self {
        Self {
            cycles: register_int_counter!("mypsl_cycles_total", "Number of completed poll cycles")
                .expect("Failed to register cycles_total"),

            cycle_latency_seconds: register_histogram!(
                "mypsl_cycle_latency_seconds",
                "Time spent in one fetch/classify/act cycle",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            sessions_observed: register_int_gauge!(
                "mypsl_sessions_observed",
                "Sessions matched by the process list query in the last cycle"
            )
            .expect("Failed to register sessions_observed"),

            sessions_killed: register_int_counter!(
                "mypsl_sessions_killed_total",
                "Sessions terminated by the watcher"
            )
            .expect("Failed to register sessions_killed_total"),

            kill_failures: register_int_counter!(
                "mypsl_kill_failures_total",
                "Kill requests rejected by the server"
            )
            .expect("Failed to register kill_failures_total"),

            audit_failures: register_int_counter!(
                "mypsl_audit_failures_total",
                "Kills that could not be written to the audit log"
            )
            .expect("Failed to register audit_failures_total"),

            reconnects: register_int_counter!(
                "mypsl_reconnects_total",
                "Reconnects after a lost server connection"
            )
            .expect("Failed to register reconnects_total"),
        }
    }
}

/// Handle to the process-wide metrics. Clones share the same metrics.
#[derive(Clone)]
pub struct PslMetrics {
    _private: (),
}

impl Default for PslMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PslMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PslMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PslMetricsInner {
        GLOBAL_METRICS.get_or_init(PslMetricsInner::new)
    }

    /// Record a completed cycle and its duration
    pub fn observe_cycle(&self, duration_secs: f64, sessions: usize) {
        let inner = self.inner();
        inner.cycles.inc();
        inner.cycle_latency_seconds.observe(duration_secs);
        inner.sessions_observed.set(sessions as i64);
    }

    pub fn inc_sessions_killed(&self) {
        self.inner().sessions_killed.inc();
    }

    pub fn inc_kill_failures(&self) {
        self.inner().kill_failures.inc();
    }

    pub fn inc_audit_failures(&self) {
        self.inner().audit_failures.inc();
    }

    pub fn inc_reconnects(&self) {
        self.inner().reconnects.inc();
    }

    /// Render every registered metric in the text exposition format
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Write metrics for a node-exporter style textfile collector.
    ///
    /// Writes to a sibling temp file first so scrapers never see a partial file.
    pub fn write_textfile(&self, path: &Path) -> std::io::Result<()> {
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, self.render())?;
        std::fs::rename(&tmp, path)
    }
}

/// Structured logger for watcher events
#[derive(Clone)]
pub struct StructuredLogger {
    host: String,
}

impl StructuredLogger {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Log watcher startup
    pub fn log_startup(&self, version: &str, mode: &str, interval_secs: u64) {
        info!(
            event = "watcher_started",
            host = %self.host,
            version = %version,
            mode = %mode,
            interval_secs = interval_secs,
            "Process list watcher started"
        );
    }

    /// Log watcher shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "watcher_shutdown",
            host = %self.host,
            reason = %reason,
            "Process list watcher shutting down"
        );
    }

    /// Log a terminated session
    pub fn log_kill(&self, session: &RawSession) {
        warn!(
            event = "session_killed",
            host = %self.host,
            session_id = session.id,
            user = %session.principal,
            origin = %session.origin,
            db = ?session.database,
            command = %session.command,
            elapsed_secs = session.elapsed_seconds,
            info = ?session.info,
            "Killed session"
        );
    }

    /// Log a completed cycle
    pub fn log_cycle(&self, sessions: usize, killed: Option<usize>, elapsed_ms: u128) {
        info!(
            event = "cycle_complete",
            host = %self.host,
            sessions = sessions,
            killed = ?killed,
            elapsed_ms = elapsed_ms,
            "Cycle complete"
        );
    }

    /// Log a reconnect attempt after a lost connection
    pub fn log_reconnect(&self, succeeded: bool) {
        if succeeded {
            info!(event = "reconnect", host = %self.host, success = true, "Reconnected to server");
        } else {
            warn!(event = "reconnect", host = %self.host, success = false, "Reconnect failed");
        }
    }
}
