//! Append-only audit log for terminated sessions

use crate::error::AuditError;
use crate::models::KillLogEntry;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Default location of the kill log
pub const DEFAULT_KILL_LOG: &str = "/var/log/killed_queries.log";

/// Destination for kill audit records
pub trait AuditSink: Send + Sync {
    /// Append one record. Failures are reported, never retried.
    fn append(&self, entry: &KillLogEntry) -> Result<(), AuditError>;
}

/// Audit sink writing one line per kill to a file, created on first use
#[derive(Debug, Clone)]
pub struct FileAuditSink {
    path: PathBuf,
}

impl FileAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AuditSink for FileAuditSink {
    fn append(&self, entry: &KillLogEntry) -> Result<(), AuditError> {
        let wrap = |source| AuditError {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(wrap)?;

        writeln!(file, "{}", entry).map_err(wrap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawSession;
    use tempfile::TempDir;

    fn entry(id: u64) -> KillLogEntry {
        KillLogEntry::new(
            "db01",
            RawSession {
                id,
                principal: "app".to_string(),
                origin: "10.0.0.9".to_string(),
                database: Some("shop".to_string()),
                command: "Query".to_string(),
                elapsed_seconds: 40,
                state: Some("Sending data".to_string()),
                info: Some("select * from orders".to_string()),
            },
        )
    }

    #[test]
    fn test_creates_and_appends() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("killed.log");
        let sink = FileAuditSink::new(&path);

        sink.append(&entry(1)).unwrap();
        sink.append(&entry(2)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(":: db01 :: id: 1, user: app"));
        assert!(lines[1].contains("id: 2,"));
        assert!(lines[1].ends_with("info: select * from orders"));
    }

    #[test]
    fn test_unwritable_path_reports_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing-dir").join("killed.log");
        let sink = FileAuditSink::new(&path);

        let err = sink.append(&entry(1)).unwrap_err();
        assert_eq!(err.path, path);
    }
}
