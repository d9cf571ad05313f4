//! Kill gate
//!
//! Decides, from the global connected-thread count and the configured
//! threshold, whether termination is authorized for the current cycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Threshold used when the operator does not supply one
pub const DEFAULT_KILL_THRESHOLD: i64 = 100;

/// Parsed kill threshold setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillThreshold {
    /// Kill only once this many threads are connected
    Count(i64),
    /// Kill regardless of the connection count
    Off,
    /// Neither an integer nor "off"; never authorizes
    Invalid(String),
}

impl KillThreshold {
    /// Parse an operator-supplied value. Never fails: unrecognized input
    /// becomes [`KillThreshold::Invalid`].
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if let Ok(count) = trimmed.parse::<i64>() {
            KillThreshold::Count(count)
        } else if trimmed.eq_ignore_ascii_case("off") {
            KillThreshold::Off
        } else {
            KillThreshold::Invalid(value.to_string())
        }
    }
}

impl Default for KillThreshold {
    fn default() -> Self {
        KillThreshold::Count(DEFAULT_KILL_THRESHOLD)
    }
}

impl fmt::Display for KillThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KillThreshold::Count(n) => write!(f, "{}", n),
            KillThreshold::Off => write!(f, "off"),
            KillThreshold::Invalid(raw) => write!(f, "{}", raw),
        }
    }
}

/// Why the gate decided the way it did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictReason {
    ThresholdMet { observed: u64, required: i64 },
    BelowThreshold { observed: u64, required: i64 },
    Unconditional,
    Misconfigured { value: String },
}

/// Per-cycle authorization decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KillVerdict {
    pub authorized: bool,
    pub reason: VerdictReason,
}

/// Decide whether killing is authorized this cycle.
///
/// `connected_threads` is the server-wide count, not the size of the
/// filtered snapshot.
pub fn authorize(connected_threads: u64, threshold: &KillThreshold) -> KillVerdict {
    match threshold {
        KillThreshold::Count(required) => {
            let required = *required;
            // A negative threshold is always met
            let met = required <= 0 || connected_threads >= required as u64;
            let reason = if met {
                VerdictReason::ThresholdMet {
                    observed: connected_threads,
                    required,
                }
            } else {
                VerdictReason::BelowThreshold {
                    observed: connected_threads,
                    required,
                }
            };
            KillVerdict {
                authorized: met,
                reason,
            }
        }
        KillThreshold::Off => KillVerdict {
            authorized: true,
            reason: VerdictReason::Unconditional,
        },
        KillThreshold::Invalid(value) => KillVerdict {
            authorized: false,
            reason: VerdictReason::Misconfigured {
                value: value.clone(),
            },
        },
    }
}
