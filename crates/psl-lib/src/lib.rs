//! Process list watcher library
//!
//! This crate provides the core functionality for:
//! - Sampling the server process list through a parameterized query
//! - Classifying sessions and aggregating health signals
//! - Safety-gated termination of matching sessions with an audit trail
//! - The poll loop that drives repeated cycles
//! - Metrics and structured logging

pub mod classify;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod kill;
pub mod models;
pub mod observability;
pub mod poll;
pub mod source;
pub mod summary;
pub mod watcher;

pub use classify::classify;
pub use error::{ConfigError, QueryError};
pub use models::*;
pub use observability::{PslMetrics, StructuredLogger};
pub use summary::{summarize, AggregateSummary};
pub use diagnostic::{Diagnostic, DiagnosticSink};
pub use watcher::{CycleMode, KillReport, Renderer, SnapshotReport, Watcher};
