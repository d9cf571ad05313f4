//! Core data models for the process list watcher

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of the server process list, as returned by the snapshot source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSession {
    pub id: u64,
    pub principal: String,
    pub origin: String,
    pub database: Option<String>,
    pub command: String,
    pub elapsed_seconds: u64,
    pub state: Option<String>,
    pub info: Option<String>,
}

/// Session with the port stripped from its origin and empty strings in
/// place of absent `state`/`info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedSession {
    pub id: u64,
    pub principal: String,
    pub origin: String,
    pub database: Option<String>,
    pub command: String,
    pub elapsed_seconds: u64,
    pub state: String,
    pub info: String,
}

/// Semantic tags derived from one session. Every flag is independent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationTags {
    pub is_read: bool,
    pub is_write: bool,
    pub is_locked: bool,
    pub is_opening_table: bool,
    pub is_closing_table: bool,
    pub is_sleeping: bool,
    pub is_past_long_query_threshold: bool,
}

/// A normalized session paired with its tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedSession {
    pub session: NormalizedSession,
    pub tags: ClassificationTags,
}

/// Audit record written for every session that was terminated
#[derive(Debug, Clone, Serialize)]
pub struct KillLogEntry {
    pub timestamp: DateTime<Local>,
    pub host: String,
    pub session: RawSession,
}

impl KillLogEntry {
    pub fn new(host: impl Into<String>, session: RawSession) -> Self {
        Self {
            timestamp: Local::now(),
            host: host.into(),
            session,
        }
    }
}

fn or_none(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("None")
}

impl fmt::Display for KillLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.session;
        write!(
            f,
            "{} :: {} :: id: {}, user: {}, host: {}, db: {}, command: {}, time: {}, state: {}, info: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.host,
            s.id,
            s.principal,
            s.origin,
            or_none(&s.database),
            s.command,
            s.elapsed_seconds,
            or_none(&s.state),
            or_none(&s.info),
        )
    }
}
