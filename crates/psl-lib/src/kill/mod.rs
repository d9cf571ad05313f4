//! Guarded session termination
//!
//! This module provides:
//! - The kill gate deciding whether termination is authorized this cycle
//! - The executor that applies the per-row eligibility rule and kills
//! - The append-only audit sink for terminated sessions

mod audit;
mod executor;
mod gate;

pub use audit::{AuditSink, FileAuditSink, DEFAULT_KILL_LOG};
pub use executor::{is_eligible, SessionTerminator, TerminationExecutor};
pub use gate::{authorize, KillThreshold, KillVerdict, VerdictReason, DEFAULT_KILL_THRESHOLD};
