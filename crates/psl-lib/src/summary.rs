//! Aggregate summary of one classified snapshot

use crate::models::ClassifiedSession;
use serde::Serialize;
use std::collections::HashMap;

/// Per-cycle counts over a batch of classified sessions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateSummary {
    pub num_reads: usize,
    pub num_writes: usize,
    pub num_locked: usize,
    pub num_opening: usize,
    pub num_closing: usize,
    pub num_sleeping: usize,
    pub num_past_long_query_threshold: usize,
    pub num_processes: usize,
    /// Principal occurrence counts, highest first; ties keep discovery order
    pub principal_counts: Vec<(String, usize)>,
}

/// Fold a batch of classified sessions into an [`AggregateSummary`].
///
/// An empty batch is the normal "nothing matched" case and yields all zeros.
pub fn summarize(sessions: &[ClassifiedSession]) -> AggregateSummary {
    let mut summary = AggregateSummary {
        num_processes: sessions.len(),
        ..Default::default()
    };
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for classified in sessions {
        let tags = &classified.tags;
        summary.num_reads += usize::from(tags.is_read);
        summary.num_writes += usize::from(tags.is_write);
        summary.num_locked += usize::from(tags.is_locked);
        summary.num_opening += usize::from(tags.is_opening_table);
        summary.num_closing += usize::from(tags.is_closing_table);
        summary.num_sleeping += usize::from(tags.is_sleeping);
        summary.num_past_long_query_threshold += usize::from(tags.is_past_long_query_threshold);

        let principal = classified.session.principal.as_str();
        match positions.get(principal) {
            Some(&idx) => summary.principal_counts[idx].1 += 1,
            None => {
                positions.insert(principal, summary.principal_counts.len());
                summary.principal_counts.push((principal.to_string(), 1));
            }
        }
    }

    // sort_by is stable, so equal counts stay in discovery order
    summary.principal_counts.sort_by(|a, b| b.1.cmp(&a.1));
    summary
}
