//! Candidate filter: prefix buckets over the triaged pool.
//!
//! Full fuzzy comparison across untriaged x triaged is too expensive, so
//! candidates are first narrowed to those whose failure reason starts with
//! the same `prefix_len` characters as the current failure's. The width is
//! a tuning knob: short enough to bucket effectively, long enough that
//! generic prefixes do not produce false negatives.

use crate::domain::FailureRecord;

/// Indices into `pool` (order preserved; scan order is significant) of the
/// candidates sharing the current failure's reason prefix. An empty current
/// reason cannot prefix-match anything, so the whole pool passes through.
pub fn narrow(pool: &[FailureRecord], current: &FailureRecord, prefix_len: usize) -> Vec<usize> {
    let prefix: Vec<char> = current.failure_reason.chars().take(prefix_len).collect();
    if prefix.is_empty() {
        return (0..pool.len()).collect();
    }

    pool.iter()
        .enumerate()
        .filter(|(_, candidate)| {
            candidate
                .failure_reason
                .chars()
                .take(prefix_len)
                .eq(prefix.iter().copied())
        })
        .map(|(idx, _)| idx)
        .collect()
}
