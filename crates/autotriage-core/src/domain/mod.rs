//! Domain model (identifiers, failure records, triage decisions).

pub mod decision;
pub mod errors;
pub mod ids;
pub mod location;
pub mod record;

pub use decision::{ScanOutcome, TriageDecision, TriageSource, UNDETERMINED_L2, UNKNOWN_L1};
pub use errors::TriageError;
pub use ids::{RunUuid, TicketKey, TriageRunId};
pub use location::{FailureLocation, LocationExtractor};
pub use record::{FailureRecord, TriagedBy};
