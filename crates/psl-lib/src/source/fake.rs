//! In-memory source for tests

use super::{ProcessListQuery, ProcessListSource};
use crate::error::QueryError;
use crate::kill::SessionTerminator;
use crate::models::RawSession;
use async_trait::async_trait;
use std::collections::VecDeque;

#[derive(Default)]
pub(crate) struct FakeSource {
    pub snapshots: VecDeque<Result<Vec<RawSession>, QueryError>>,
    pub connected_threads: u64,
    pub long_query_time: u64,
    pub hostname: Option<String>,
    pub refuse_kill: Vec<u64>,
    pub killed: Vec<u64>,
    pub queries_seen: Vec<String>,
    pub closed: bool,
}

impl FakeSource {
    pub fn with_snapshots(snapshots: Vec<Vec<RawSession>>) -> Self {
        Self {
            snapshots: snapshots.into_iter().map(Ok).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SessionTerminator for FakeSource {
    async fn kill(&mut self, session_id: u64) -> Result<(), QueryError> {
        if self.refuse_kill.contains(&session_id) {
            return Err(QueryError::Failed(format!("Unknown thread id: {}", session_id)));
        }
        self.killed.push(session_id);
        Ok(())
    }
}

#[async_trait]
impl ProcessListSource for FakeSource {
    async fn snapshot(&mut self, query: &ProcessListQuery) -> Result<Vec<RawSession>, QueryError> {
        self.queries_seen.push(query.sql().to_string());
        self.snapshots.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn connected_threads(&mut self) -> Result<u64, QueryError> {
        Ok(self.connected_threads)
    }

    async fn long_query_time(&mut self) -> Result<u64, QueryError> {
        Ok(self.long_query_time)
    }

    async fn server_hostname(&mut self) -> Result<Option<String>, QueryError> {
        Ok(self.hostname.clone())
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

pub(crate) fn session(id: u64, user: &str, command: &str, state: &str, info: &str, elapsed: u64) -> RawSession {
    RawSession {
        id,
        principal: user.to_string(),
        origin: format!("10.0.0.{}:{}", id, 40000 + id),
        database: Some("shop".to_string()),
        command: command.to_string(),
        elapsed_seconds: elapsed,
        state: (!state.is_empty()).then(|| state.to_string()),
        info: (!info.is_empty()).then(|| info.to_string()),
    }
}
