//! Ticket creation port.

use async_trait::async_trait;

use crate::config::TriageRoute;
use crate::domain::{FailureRecord, TicketKey};
use crate::ports::tracker::TrackerError;

/// Creates a tracker ticket for an untriaged failure.
///
/// Summary/description templating, screenshot attachment, and custom-field
/// plumbing all live in implementations; the engine only needs the key of
/// the ticket that came out.
#[async_trait]
pub trait TicketFactory: Send + Sync {
    async fn create_for(
        &self,
        failure: &FailureRecord,
        route: Option<&TriageRoute>,
    ) -> Result<TicketKey, TrackerError>;
}
