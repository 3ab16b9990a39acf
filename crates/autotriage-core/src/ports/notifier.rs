//! Notification webhook port.

use async_trait::async_trait;

/// Fire-and-forget notification that a feature's batch is nearly triaged.
/// Delivery failures are swallowed by implementations; nothing retries.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, feature: &str);
}
