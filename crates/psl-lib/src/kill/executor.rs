//! Termination executor
//!
//! Applies the kill gate verdict and the per-row eligibility rule, issues
//! the kills one by one and records each success in the audit sink.

use super::{AuditSink, KillVerdict, VerdictReason};
use crate::classify::starts_with_ignore_case;
use crate::diagnostic::{Diagnostic, DiagnosticSink};
use crate::error::QueryError;
use crate::models::{KillLogEntry, RawSession};
use crate::observability::{PslMetrics, StructuredLogger};
use async_trait::async_trait;
use tracing::debug;

/// Anything that can terminate a server session by id
#[async_trait]
pub trait SessionTerminator: Send {
    async fn kill(&mut self, session_id: u64) -> Result<(), QueryError>;
}

/// Without kill-all only read statements are eligible, even though the
/// snapshot may contain writes.
pub fn is_eligible(session: &RawSession, kill_all: bool) -> bool {
    kill_all
        || session
            .info
            .as_deref()
            .map_or(false, |info| starts_with_ignore_case(info, "select"))
}

/// Issues kills for authorized cycles
pub struct TerminationExecutor {
    audit: Box<dyn AuditSink>,
    host: String,
    kill_all: bool,
    logger: StructuredLogger,
    metrics: PslMetrics,
}

impl TerminationExecutor {
    pub fn new(audit: Box<dyn AuditSink>, host: impl Into<String>, kill_all: bool) -> Self {
        let host = host.into();
        Self {
            audit,
            logger: StructuredLogger::new(&host),
            host,
            kill_all,
            metrics: PslMetrics::new(),
        }
    }

    /// Terminate eligible sessions and return how many were killed.
    ///
    /// A refused verdict is a no-op that only reports why. Failed kills are
    /// skipped; failed audit writes are reported but still counted.
    pub async fn terminate(
        &self,
        terminator: &mut dyn SessionTerminator,
        sessions: &[RawSession],
        verdict: &KillVerdict,
        diagnostics: &mut dyn DiagnosticSink,
    ) -> usize {
        if !verdict.authorized {
            match &verdict.reason {
                VerdictReason::BelowThreshold { observed, required } => {
                    diagnostics.diagnostic(Diagnostic::BelowKillThreshold {
                        observed: *observed,
                        required: *required,
                    })
                }
                VerdictReason::Misconfigured { value } => {
                    diagnostics.diagnostic(Diagnostic::MalformedKillThreshold {
                        value: value.clone(),
                    })
                }
                VerdictReason::ThresholdMet { .. } | VerdictReason::Unconditional => {}
            }
            return 0;
        }

        let mut killed = 0;
        for session in sessions {
            if !is_eligible(session, self.kill_all) {
                debug!(session_id = session.id, "Skipping session not eligible for kill");
                continue;
            }

            if let Err(e) = terminator.kill(session.id).await {
                self.metrics.inc_kill_failures();
                diagnostics.diagnostic(Diagnostic::KillFailed {
                    session_id: session.id,
                    error: e.to_string(),
                });
                continue;
            }

            killed += 1;
            self.metrics.inc_sessions_killed();
            self.logger.log_kill(session);

            let entry = KillLogEntry::new(self.host.clone(), session.clone());
            if let Err(e) = self.audit.append(&entry) {
                self.metrics.inc_audit_failures();
                diagnostics.diagnostic(Diagnostic::AuditWriteFailed {
                    session_id: session.id,
                    error: e.to_string(),
                });
            }
        }

        killed
    }
}
