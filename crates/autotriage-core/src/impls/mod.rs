//! Port implementations shipped with the crate.
//!
//! `reauth` is part of the production wiring (it implements the
//! reauthenticate-once retry policy around any tracker). The in-memory
//! adapters exist for development and tests; production adapters for the
//! results store, tracker, blob storage, and webhook live elsewhere.

pub mod inmem_store;
pub mod inmem_tracker;
pub mod reauth;

pub use self::inmem_store::{
    InMemoryResultsStore, RecordingNotifier, RecordingWriteBack, ScriptedBundleStatus,
    StaticEmbedder, StaticImageStore,
};
pub use self::inmem_tracker::{InMemoryTicketFactory, InMemoryTracker};
pub use self::reauth::{NoopAuth, ReauthTracker};
