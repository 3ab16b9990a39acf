//! Blob/image store port.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Fetches screenshots out of blob storage into a local directory.
///
/// Implementations retry a bounded number of times and re-fetch files that
/// fail image-decode validation. `None` covers every failure mode (empty
/// locator, missing blob, retries exhausted) because the pipeline degrades
/// to text-only matching either way.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn fetch_image(
        &self,
        remote_ref: &str,
        local_dir: &Path,
        filename: &str,
    ) -> Option<PathBuf>;
}
