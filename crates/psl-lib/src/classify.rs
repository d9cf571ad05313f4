//! Session classification
//!
//! Maps one raw process list row to a normalized session plus a set of
//! semantic tags describing what the session appears to be doing.

use crate::models::{ClassificationTags, ClassifiedSession, NormalizedSession, RawSession};

/// Statement prefixes that mark a read
const READ_PREFIXES: &[&str] = &["show", "select", "desc"];

/// Statement prefixes that mark a write
const WRITE_PREFIXES: &[&str] = &[
    "insert", "update", "create", "alter", "replace", "rename", "delete",
];

/// State prefixes that mark a session waiting on a lock
const LOCKED_PREFIXES: &[&str] = &[
    "locked",
    "waiting for table level lock",
    "waiting for table metadata lock",
];

/// Write-amplifying state that never shows up in the statement text
const TMP_TABLE_ON_DISK_STATE: &str = "Copying to tmp table on disk";

/// Case-insensitive, start-anchored prefix test
pub(crate) fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack
        .get(..prefix.len())
        .map_or(false, |head| head.eq_ignore_ascii_case(prefix))
}

fn starts_with_any(haystack: &str, prefixes: &[&str]) -> bool {
    prefixes
        .iter()
        .any(|prefix| starts_with_ignore_case(haystack, prefix))
}

/// Drop a trailing `:port` from a client address
pub fn strip_port(origin: &str) -> &str {
    origin.split(':').next().unwrap_or(origin)
}

/// Normalize a raw row and compute its tags
///
/// # Arguments
/// * `raw` - Row from the snapshot source
/// * `long_query_threshold_secs` - Server long query time, in whole seconds
pub fn classify(raw: RawSession, long_query_threshold_secs: u64) -> ClassifiedSession {
    let info = raw.info.unwrap_or_default();
    let state = raw.state.unwrap_or_default();

    let tags = ClassificationTags {
        is_read: starts_with_any(&info, READ_PREFIXES),
        is_write: starts_with_any(&info, WRITE_PREFIXES) || state == TMP_TABLE_ON_DISK_STATE,
        is_locked: starts_with_any(&state, LOCKED_PREFIXES),
        is_opening_table: starts_with_ignore_case(&state, "opening table"),
        is_closing_table: starts_with_ignore_case(&state, "closing table"),
        // Looser than the other rules: sleep markers show up anywhere
        is_sleeping: raw.command.contains("Sleep") || state.contains("sleep"),
        is_past_long_query_threshold: raw.elapsed_seconds > long_query_threshold_secs,
    };

    let session = NormalizedSession {
        id: raw.id,
        origin: strip_port(&raw.origin).to_string(),
        principal: raw.principal,
        database: raw.database,
        command: raw.command,
        elapsed_seconds: raw.elapsed_seconds,
        state,
        info,
    };

    ClassifiedSession { session, tags }
}
