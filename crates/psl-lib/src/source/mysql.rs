//! MySQL-backed process list source
//!
//! Owns the single server connection for the lifetime of the process. A
//! statement that fails with a lost connection is retried exactly once on a
//! fresh connection; a second failure is returned to the caller.

use super::{BindValue, ProcessListQuery, ProcessListSource};
use crate::config::ConnectionParams;
use crate::error::QueryError;
use crate::kill::SessionTerminator;
use crate::models::RawSession;
use crate::observability::{PslMetrics, StructuredLogger};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Connection, Executor, Row};
use tracing::{debug, warn};

/// Schema the connection is opened against
const DEFAULT_SCHEMA: &str = "information_schema";

const THREADS_CONNECTED_SQL: &str = "SHOW GLOBAL STATUS LIKE 'Threads_connected'";
const LONG_QUERY_TIME_SQL: &str = "SHOW GLOBAL VARIABLES LIKE 'long_query_time'";
const HOSTNAME_SQL: &str = "SELECT @@hostname";

/// Row shape produced by the process list query
#[derive(Debug, sqlx::FromRow)]
struct ProcessListRow {
    id: u64,
    user: Option<String>,
    host: Option<String>,
    db: Option<String>,
    command: Option<String>,
    time: Option<i64>,
    state: Option<String>,
    info: Option<String>,
}

impl From<ProcessListRow> for RawSession {
    fn from(row: ProcessListRow) -> Self {
        RawSession {
            id: row.id,
            principal: row.user.unwrap_or_default(),
            origin: row.host.unwrap_or_default(),
            database: row.db,
            command: row.command.unwrap_or_default(),
            elapsed_seconds: row.time.unwrap_or(0).max(0) as u64,
            state: row.state,
            info: row.info,
        }
    }
}

/// One statement the source knows how to run (and re-run after a reconnect)
enum Statement<'q> {
    Snapshot(&'q ProcessListQuery),
    /// `SHOW ... LIKE` returning `Variable_name, Value`
    Variable(&'static str),
    Scalar(&'static str),
    Kill(u64),
}

enum Outcome {
    Rows(Vec<RawSession>),
    Value(Option<String>),
    Done,
}

impl Outcome {
    fn unexpected() -> QueryError {
        QueryError::Failed("unexpected statement result".to_string())
    }
}

/// Opens connections and runs single statements on them
#[async_trait]
trait Connector: Send + Sync {
    type Conn: Send;

    async fn open(&self) -> Result<Self::Conn, QueryError>;

    async fn run_once(&self, conn: &mut Self::Conn, stmt: &Statement<'_>)
        -> Result<Outcome, QueryError>;

    async fn shutdown(&self, conn: Self::Conn);
}

struct MysqlConnector {
    options: MySqlConnectOptions,
}

#[async_trait]
impl Connector for MysqlConnector {
    type Conn = MySqlConnection;

    async fn open(&self) -> Result<MySqlConnection, QueryError> {
        Ok(MySqlConnection::connect_with(&self.options).await?)
    }

    async fn run_once(
        &self,
        conn: &mut MySqlConnection,
        stmt: &Statement<'_>,
    ) -> Result<Outcome, QueryError> {
        match stmt {
            Statement::Snapshot(query) => {
                let mut prepared = sqlx::query_as::<_, ProcessListRow>(query.sql());
                for bind in query.binds() {
                    prepared = match bind {
                        BindValue::Text(s) => prepared.bind(s.as_str()),
                        BindValue::Unsigned(n) => prepared.bind(*n),
                    };
                }
                let rows = prepared.fetch_all(&mut *conn).await?;
                Ok(Outcome::Rows(rows.into_iter().map(RawSession::from).collect()))
            }
            Statement::Variable(sql) => {
                // Plain &str runs over the text protocol; SHOW cannot always be prepared
                let row: Option<MySqlRow> = conn.fetch_optional(*sql).await?;
                let value = row.map(|r| r.try_get::<String, _>(1)).transpose()?;
                Ok(Outcome::Value(value))
            }
            Statement::Scalar(sql) => {
                let row: Option<MySqlRow> = conn.fetch_optional(*sql).await?;
                let value = row.map(|r| r.try_get::<String, _>(0)).transpose()?;
                Ok(Outcome::Value(value))
            }
            Statement::Kill(id) => {
                // id is a typed integer, never operator text
                conn.execute(format!("KILL {}", id).as_str()).await?;
                Ok(Outcome::Done)
            }
        }
    }

    async fn shutdown(&self, conn: MySqlConnection) {
        if let Err(e) = conn.close().await {
            debug!(error = %e, "Error while closing connection");
        }
    }
}

fn closed_error() -> QueryError {
    QueryError::ConnectionLost("connection closed".to_string())
}

/// One live connection with the reconnect-once policy
struct Link<C: Connector> {
    connector: C,
    conn: Option<C::Conn>,
    closed: bool,
    logger: StructuredLogger,
    metrics: PslMetrics,
}

impl<C: Connector> Link<C> {
    async fn open(connector: C, logger: StructuredLogger) -> Result<Self, QueryError> {
        let conn = connector.open().await?;
        Ok(Self {
            connector,
            conn: Some(conn),
            closed: false,
            logger,
            metrics: PslMetrics::new(),
        })
    }

    async fn reconnect(&mut self) -> Result<(), QueryError> {
        self.metrics.inc_reconnects();
        match self.connector.open().await {
            Ok(conn) => {
                self.conn = Some(conn);
                self.logger.log_reconnect(true);
                Ok(())
            }
            Err(e) => {
                self.conn = None;
                self.logger.log_reconnect(false);
                Err(QueryError::ConnectionLost(e.to_string()))
            }
        }
    }

    /// Run a statement; a lost connection is reopened and the statement
    /// retried exactly once
    async fn run(&mut self, stmt: Statement<'_>) -> Result<Outcome, QueryError> {
        if self.closed {
            return Err(closed_error());
        }

        let first = match self.conn.as_mut() {
            Some(conn) => self.connector.run_once(conn, &stmt).await,
            None => Err(closed_error()),
        };

        match first {
            Err(e) if e.is_connection_lost() => {
                warn!(error = %e, "Lost connection, reconnecting once");
                self.reconnect().await?;
                let conn = self.conn.as_mut().ok_or_else(closed_error)?;
                self.connector.run_once(conn, &stmt).await
            }
            other => other,
        }
    }

    async fn close(&mut self) {
        self.closed = true;
        if let Some(conn) = self.conn.take() {
            self.connector.shutdown(conn).await;
        }
    }
}

/// Process list source backed by a single MySQL connection
pub struct MysqlSource {
    link: Link<MysqlConnector>,
}

impl MysqlSource {
    /// Connect with the given parameters
    pub async fn connect(params: &ConnectionParams) -> Result<Self, QueryError> {
        let connector = MysqlConnector {
            options: connect_options(params),
        };
        let link = Link::open(connector, StructuredLogger::new(&params.host)).await?;
        debug!(host = %params.host, port = params.port, socket = ?params.socket, "Connected to server");

        Ok(Self { link })
    }

    async fn variable(&mut self, sql: &'static str) -> Result<Option<String>, QueryError> {
        match self.link.run(Statement::Variable(sql)).await? {
            Outcome::Value(value) => Ok(value),
            _ => Err(Outcome::unexpected()),
        }
    }
}

fn connect_options(params: &ConnectionParams) -> MySqlConnectOptions {
    let options = MySqlConnectOptions::new()
        .username(&params.user)
        .password(&params.password)
        .charset(&params.charset)
        .database(DEFAULT_SCHEMA);

    match &params.socket {
        Some(socket) => options.socket(socket),
        None => options.host(&params.host).port(params.port),
    }
}

/// Parse a `Threads_connected` value
fn parse_count(value: Option<String>) -> u64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

/// Parse a `long_query_time` value such as `10.000000`, rounded to seconds
fn parse_seconds(value: Option<String>) -> u64 {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map(|secs| secs.max(0.0).round() as u64)
        .unwrap_or(0)
}

#[async_trait]
impl SessionTerminator for MysqlSource {
    async fn kill(&mut self, session_id: u64) -> Result<(), QueryError> {
        self.link.run(Statement::Kill(session_id)).await.map(|_| ())
    }
}

#[async_trait]
impl ProcessListSource for MysqlSource {
    async fn snapshot(&mut self, query: &ProcessListQuery) -> Result<Vec<RawSession>, QueryError> {
        match self.link.run(Statement::Snapshot(query)).await? {
            Outcome::Rows(rows) => Ok(rows),
            _ => Err(Outcome::unexpected()),
        }
    }

    async fn connected_threads(&mut self) -> Result<u64, QueryError> {
        Ok(parse_count(self.variable(THREADS_CONNECTED_SQL).await?))
    }

    async fn long_query_time(&mut self) -> Result<u64, QueryError> {
        Ok(parse_seconds(self.variable(LONG_QUERY_TIME_SQL).await?))
    }

    async fn server_hostname(&mut self) -> Result<Option<String>, QueryError> {
        match self.link.run(Statement::Scalar(HOSTNAME_SQL)).await? {
            Outcome::Value(value) => Ok(value),
            _ => Err(Outcome::unexpected()),
        }
    }

    async fn close(&mut self) {
        self.link.close().await;
    }
}
