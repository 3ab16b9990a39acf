//! The matching pipeline: candidate filtering, status caching, creation
//! throttling, and the per-record scan loop that ties them together.

pub mod filter;
pub mod match_engine;
pub mod status_cache;
pub mod throttle;

pub use self::match_engine::{EnginePorts, MatchEngine};
pub use self::status_cache::TicketStatusCache;
pub use self::throttle::TicketThrottle;
