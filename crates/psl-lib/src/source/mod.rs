//! Process list snapshot sources
//!
//! This module provides the query builder for the server process list, the
//! MySQL-backed source with its one-shot reconnect, local socket discovery
//! and host identity resolution.

mod host;
mod mysql;
mod query;
mod socket;

#[cfg(test)]
pub(crate) mod fake;

pub use host::resolve_host_identity;
pub use mysql::MysqlSource;
pub use query::{
    parse_order_by, BindValue, OrderTerm, ProcessListQuery, ProcessListQueryBuilder,
    SortDirection, ALLOWED_COLUMNS,
};
pub use socket::{parse_defaults_option, resolve_local_socket, MY_CNF_LOCATIONS};

use crate::error::QueryError;
use crate::kill::SessionTerminator;
use crate::models::RawSession;
use async_trait::async_trait;

/// Trait for process list snapshot implementations
#[async_trait]
pub trait ProcessListSource: SessionTerminator {
    /// Current sessions matching the query
    async fn snapshot(&mut self, query: &ProcessListQuery) -> Result<Vec<RawSession>, QueryError>;

    /// Server-wide connected thread count
    async fn connected_threads(&mut self) -> Result<u64, QueryError>;

    /// Server long query time rounded to whole seconds
    async fn long_query_time(&mut self) -> Result<u64, QueryError>;

    /// Hostname reported by the server itself
    async fn server_hostname(&mut self) -> Result<Option<String>, QueryError>;

    /// Release the connection. Further calls fail with `ConnectionLost`.
    async fn close(&mut self);
}
