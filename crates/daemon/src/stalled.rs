//! Stalled download detection and the removal threshold gate.
//!
//! Detection and removal are two separate steps: a record past the percent
//! threshold is still detected as stalled, it is just never removed.

use crate::models::QueueRecord;

/// Whether a queue record is a removal candidate.
///
/// A record qualifies when it is a warning whose error message mentions
/// "stalled", or when it is queued with a size of zero.
pub fn is_stalled(record: &QueueRecord) -> bool {
    let status = record.status.trim();

    if status.eq_ignore_ascii_case("warning") {
        return record
            .error_message
            .as_deref()
            .map(|msg| msg.to_lowercase().contains("stalled"))
            .unwrap_or(false);
    }

    status.eq_ignore_ascii_case("queued") && record.size == 0.0
}

/// Outcome of the threshold gate for a stalled record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemovalDecision {
    /// At or below the threshold: delete and re-search.
    Remove { percent: f64 },
    /// Progress is past the threshold: leave it alone.
    Keep { percent: f64 },
}

/// Apply the percent threshold. A record exactly at the threshold is removed.
pub fn decide_removal(record: &QueueRecord, percent_threshold: u8) -> RemovalDecision {
    let percent = record.percent_downloaded();
    if percent > f64::from(percent_threshold) {
        RemovalDecision::Keep { percent }
    } else {
        RemovalDecision::Remove { percent }
    }
}
