//! Bundle execution-status port.

use async_trait::async_trait;

/// Local bookkeeping of bundle execution progress.
///
/// `min_progress` of zero asks "has the bundle reported at all"; higher
/// values gate on how far execution has advanced.
#[async_trait]
pub trait BundleStatusStore: Send + Sync {
    async fn bundle_ready(&self, bundle: &str, min_progress: u32) -> bool;
}
