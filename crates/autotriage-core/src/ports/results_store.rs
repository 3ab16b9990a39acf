//! Results store port: the test-results query backend and its write-back.

use async_trait::async_trait;

use crate::domain::{FailureRecord, RunUuid, TicketKey, TriagedBy};

/// Read side of the test-results store.
///
/// Resilience contract: implementations return an empty collection on query
/// failure instead of erroring. The pipeline treats "no data" and "backend
/// down" identically and simply has nothing to do.
#[async_trait]
pub trait ResultsStore: Send + Sync {
    /// Failed executions for `feature` with no linked ticket yet, in the
    /// order the backend produced them (typically reverse-chronological).
    /// That order is load-bearing: it is the scan order of the batch.
    async fn untriaged_failures(&self, feature: &str) -> Vec<FailureRecord>;

    /// The recently triaged corpus used as the candidate pool, again in
    /// backend order.
    async fn triaged_failures(&self, window: chrono::Duration) -> Vec<FailureRecord>;
}

/// One triage outcome headed back to the results store.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TriageUpdate {
    pub run_uuid: RunUuid,
    pub triage_l1: String,
    pub triage_l2: String,
    pub ticket: TicketKey,
    pub triaged_by: TriagedBy,
}

/// Write side: a fire-and-forget RPC. No acknowledgment is awaited and the
/// pipeline consumes nothing beyond its own logging.
#[async_trait]
pub trait TriageWriteBack: Send + Sync {
    async fn record_triage(&self, update: &TriageUpdate);
}
