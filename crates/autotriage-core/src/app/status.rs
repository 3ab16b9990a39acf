//! Per-run summary counters.

use serde::{Deserialize, Serialize};

use crate::domain::{ScanOutcome, TriageSource};

/// What happened to a batch, for logging and the dashboard wrapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageRunSummary {
    /// Untriaged records handed to the engine.
    pub processed: usize,

    /// Skipped before scanning (infra noise, excluded tests).
    pub excluded: usize,

    /// Matched on text similarity alone.
    pub matched_suggested: usize,

    /// Matched and confirmed visually.
    pub matched_confirmed: usize,

    /// New tickets minted.
    pub created: usize,

    /// Unmatched records left alone because the creation cap was reached.
    pub throttled: usize,

    /// Candidates or creations that errored and were skipped.
    pub errors: usize,
}

impl TriageRunSummary {
    pub fn record(&mut self, outcome: &ScanOutcome) {
        self.processed += 1;
        match outcome {
            ScanOutcome::Excluded => self.excluded += 1,
            ScanOutcome::Matched(d) => match d.source {
                TriageSource::SuggestionAutoTriage => self.matched_suggested += 1,
                TriageSource::AutoTriage => self.matched_confirmed += 1,
            },
            ScanOutcome::Created(_) => self.created += 1,
            ScanOutcome::Throttled => self.throttled += 1,
        }
    }

    pub fn matched(&self) -> usize {
        self.matched_suggested + self.matched_confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RunUuid, TicketKey, TriageDecision};

    #[test]
    fn outcomes_land_in_the_right_buckets() {
        let mut summary = TriageRunSummary::default();
        summary.record(&ScanOutcome::Excluded);
        summary.record(&ScanOutcome::Throttled);
        summary.record(&ScanOutcome::Created(TriageDecision::new_ticket(
            RunUuid::new("r1"),
            TicketKey::new("T-1"),
        )));

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.excluded, 1);
        assert_eq!(summary.throttled, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.matched(), 0);
    }
}
