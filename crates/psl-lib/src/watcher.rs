//! One watcher cycle
//!
//! Fetches the snapshot, then either kills, prints ids, or classifies and
//! summarizes for display. All output leaves through [`Renderer`]; the
//! engine never formats for a terminal.

use crate::classify::classify;
use crate::config::WatchMode;
use crate::diagnostic::{Diagnostic, DiagnosticSink};
use crate::error::QueryError;
use crate::kill::{authorize, FileAuditSink, KillThreshold, TerminationExecutor};
use crate::models::{ClassifiedSession, RawSession};
use crate::observability::{PslMetrics, StructuredLogger};
use crate::poll::PollCycle;
use crate::source::{ProcessListQuery, ProcessListSource};
use crate::summary::{summarize, AggregateSummary};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Everything the display path produces for one cycle
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotReport {
    pub host: String,
    pub at: DateTime<Local>,
    pub connected_threads: u64,
    pub long_query_time_secs: u64,
    pub sessions: Vec<ClassifiedSession>,
    pub summary: AggregateSummary,
    pub processing_time: Duration,
}

/// Result of a kill cycle that terminated at least one session
#[derive(Debug, Clone, Serialize)]
pub struct KillReport {
    pub host: String,
    pub at: DateTime<Local>,
    pub killed: usize,
    pub criteria: String,
}

/// Presentation layer for cycle results and diagnostics
pub trait Renderer: DiagnosticSink {
    fn snapshot(&mut self, report: &SnapshotReport);
    fn ids(&mut self, ids: &[u64]);
    fn kills(&mut self, report: &KillReport);
}

/// What a cycle does with a non-empty snapshot
pub enum CycleMode {
    Display,
    IdOnly,
    Kill {
        threshold: KillThreshold,
        executor: TerminationExecutor,
    },
}

impl CycleMode {
    /// Build the cycle mode for a configured watch mode, auditing kills to
    /// the configured log file
    pub fn from_watch_mode(mode: &WatchMode, host: &str) -> Self {
        match mode {
            WatchMode::Display => CycleMode::Display,
            WatchMode::IdOnly => CycleMode::IdOnly,
            WatchMode::Kill(settings) => CycleMode::Kill {
                threshold: settings.threshold.clone(),
                executor: TerminationExecutor::new(
                    Box::new(FileAuditSink::new(&settings.log_path)),
                    host,
                    settings.kill_all,
                ),
            },
        }
    }
}

/// Runs cycles against one source and one renderer
pub struct Watcher<S, R> {
    source: S,
    renderer: R,
    query: ProcessListQuery,
    mode: CycleMode,
    host: String,
    logger: StructuredLogger,
    metrics: PslMetrics,
    metrics_file: Option<PathBuf>,
}

impl<S, R> Watcher<S, R>
where
    S: ProcessListSource,
    R: Renderer,
{
    pub fn new(
        source: S,
        renderer: R,
        query: ProcessListQuery,
        mode: CycleMode,
        host: impl Into<String>,
    ) -> Self {
        let host = host.into();
        Self {
            source,
            renderer,
            query,
            mode,
            logger: StructuredLogger::new(&host),
            host,
            metrics: PslMetrics::new(),
            metrics_file: None,
        }
    }

    /// Also write metrics to a textfile after every cycle
    pub fn with_metrics_file(mut self, path: Option<PathBuf>) -> Self {
        self.metrics_file = path;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Release the connection
    pub async fn shutdown(&mut self, reason: &str) {
        self.source.close().await;
        self.logger.log_shutdown(reason);
    }

    async fn kill_cycle(&mut self, sessions: &[RawSession]) -> Result<usize, QueryError> {
        let connected = self.source.connected_threads().await?;
        let CycleMode::Kill { threshold, executor } = &self.mode else {
            return Ok(0);
        };

        let verdict = authorize(connected, threshold);
        debug!(connected, threshold = %threshold, authorized = verdict.authorized, "Kill gate");

        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let killed = executor
            .terminate(&mut self.source, sessions, &verdict, &mut diagnostics)
            .await;
        for diagnostic in diagnostics {
            self.renderer.diagnostic(diagnostic);
        }

        if killed > 0 {
            self.renderer.kills(&KillReport {
                host: self.host.clone(),
                at: Local::now(),
                killed,
                criteria: self.query.describe_criteria(),
            });
        }
        Ok(killed)
    }

    async fn display_cycle(
        &mut self,
        sessions: Vec<RawSession>,
        start: Instant,
    ) -> Result<(), QueryError> {
        let connected_threads = self.source.connected_threads().await?;
        let long_query_time_secs = self.source.long_query_time().await?;

        let classified: Vec<ClassifiedSession> = sessions
            .into_iter()
            .map(|raw| classify(raw, long_query_time_secs))
            .collect();
        let summary = summarize(&classified);

        self.renderer.snapshot(&SnapshotReport {
            host: self.host.clone(),
            at: Local::now(),
            connected_threads,
            long_query_time_secs,
            sessions: classified,
            summary,
            processing_time: start.elapsed(),
        });
        Ok(())
    }

    async fn cycle(&mut self, start: Instant) -> Result<bool, QueryError> {
        let sessions = self.source.snapshot(&self.query).await?;
        let count = sessions.len();
        if sessions.is_empty() {
            self.finish_cycle(start, 0, None);
            return Ok(false);
        }

        let killed = match self.mode {
            CycleMode::Kill { .. } => Some(self.kill_cycle(&sessions).await?),
            CycleMode::IdOnly => {
                let ids: Vec<u64> = sessions.iter().map(|s| s.id).collect();
                self.renderer.ids(&ids);
                None
            }
            CycleMode::Display => {
                self.display_cycle(sessions, start).await?;
                None
            }
        };

        self.finish_cycle(start, count, killed);
        Ok(true)
    }

    fn finish_cycle(&self, start: Instant, sessions: usize, killed: Option<usize>) {
        let elapsed = start.elapsed();
        self.metrics.observe_cycle(elapsed.as_secs_f64(), sessions);
        if sessions > 0 {
            self.logger.log_cycle(sessions, killed, elapsed.as_millis());
        }
        if let Some(path) = &self.metrics_file {
            if let Err(e) = self.metrics.write_textfile(path) {
                warn!(error = %e, path = %path.display(), "Failed to write metrics file");
            }
        }
    }
}

#[async_trait]
impl<S, R> PollCycle for Watcher<S, R>
where
    S: ProcessListSource,
    R: Renderer,
{
    async fn run_cycle(&mut self) -> Result<bool, QueryError> {
        match self.cycle(Instant::now()).await {
            Ok(produced) => Ok(produced),
            Err(e) if e.is_connection_lost() => Err(e),
            Err(e) => {
                // Aborted cycle; still counts as output so it does not feed the heartbeat
                self.renderer
                    .diagnostic(Diagnostic::QueryFailed { error: e.to_string() });
                Ok(true)
            }
        }
    }

    fn still_looking(&mut self) {
        self.renderer.diagnostic(Diagnostic::StillLooking {
            host: self.host.clone(),
            at: Local::now(),
        });
    }

    fn nothing_found(&mut self) {
        self.renderer.diagnostic(Diagnostic::NothingFound {
            host: self.host.clone(),
            at: Local::now(),
        });
    }
}
