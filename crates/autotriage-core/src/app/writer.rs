//! Triage write-back.

use std::sync::Arc;

use tracing::info;

use crate::domain::TriageDecision;
use crate::ports::results_store::{TriageUpdate, TriageWriteBack};

/// Applies an engine decision by handing it to the write-back collaborator.
///
/// Idempotent from this side: identical decisions produce identical updates,
/// and the write-back sets fields keyed by run uuid, so upstream retries
/// re-invoking this land in the same end state. No acknowledgment is
/// consumed beyond logging.
pub struct TriageWriter {
    write_back: Arc<dyn TriageWriteBack>,
}

impl TriageWriter {
    pub fn new(write_back: Arc<dyn TriageWriteBack>) -> Self {
        Self { write_back }
    }

    pub async fn apply(&self, decision: &TriageDecision) {
        let update = TriageUpdate {
            run_uuid: decision.run_uuid.clone(),
            triage_l1: decision.triage_l1.clone(),
            triage_l2: decision.triage_l2.clone(),
            ticket: decision.ticket.clone(),
            triaged_by: decision.source.into(),
        };
        self.write_back.record_triage(&update).await;
        info!(
            run = %update.run_uuid,
            ticket = %update.ticket,
            source = %decision.source,
            "triage recorded"
        );
    }
}
