//! Operator-facing diagnostics
//!
//! Diagnostics travel on a channel separate from the tabular output so the
//! primary output can be redirected on its own.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;

/// Timestamp layout used in every operator-facing line
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Kill mode is active but the server is under the connection threshold
    BelowKillThreshold { observed: u64, required: i64 },
    /// Threshold is neither an integer nor "off"
    MalformedKillThreshold { value: String },
    /// The server refused or failed a single termination
    KillFailed { session_id: u64, error: String },
    /// Termination happened but could not be recorded
    AuditWriteFailed { session_id: u64, error: String },
    /// Periodic heartbeat while consecutive cycles find nothing
    StillLooking { host: String, at: DateTime<Local> },
    /// A one-shot run found nothing
    NothingFound { host: String, at: DateTime<Local> },
    /// The cycle was aborted by a non-connection query failure
    QueryFailed { error: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::BelowKillThreshold { observed, required } => write!(
                f,
                "Connected threads: {}, Kill threshold: {}. Not killing at this time",
                observed, required
            ),
            Diagnostic::MalformedKillThreshold { value } => write!(
                f,
                "Kill threshold '{}' is neither a number nor 'off'. Not killing at this time",
                value
            ),
            Diagnostic::KillFailed { session_id, error } => {
                write!(f, "Unable to kill {}: {}", session_id, error)
            }
            Diagnostic::AuditWriteFailed { session_id, error } => {
                write!(f, "Killed {} but could not record it: {}", session_id, error)
            }
            Diagnostic::StillLooking { host, at } => {
                write!(f, "{} :: ({}) :: Still looking...", at.format(TIMESTAMP_FORMAT), host)
            }
            Diagnostic::NothingFound { host, at } => write!(
                f,
                "{} :: ({}) :: No matching sessions",
                at.format(TIMESTAMP_FORMAT),
                host
            ),
            Diagnostic::QueryFailed { error } => write!(f, "Query failed: {}", error),
        }
    }
}

/// Receiver for diagnostics emitted during a cycle
pub trait DiagnosticSink: Send {
    fn diagnostic(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn diagnostic(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_messages() {
        let below = Diagnostic::BelowKillThreshold {
            observed: 12,
            required: 100,
        };
        assert_eq!(
            below.to_string(),
            "Connected threads: 12, Kill threshold: 100. Not killing at this time"
        );

        let at = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let looking = Diagnostic::StillLooking {
            host: "db01".to_string(),
            at,
        };
        assert_eq!(looking.to_string(), "2024-01-02 03:04:05 :: (db01) :: Still looking...");
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let failed = Diagnostic::KillFailed {
            session_id: 7,
            error: "Unknown thread id: 7".to_string(),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["kind"], "kill_failed");
        assert_eq!(json["session_id"], 7);
    }
}
