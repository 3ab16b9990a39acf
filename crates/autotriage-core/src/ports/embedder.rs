//! Image embedding port.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("could not load image {0}")]
    Load(String),

    #[error("embedding model failure: {0}")]
    Model(String),
}

/// Produces embedding vectors for screenshots via a vision-language model.
///
/// Model load is expensive; implementations are expected to load it once
/// and reuse it for the process lifetime. Callers treat any error as "cannot
/// compare", never as fatal.
#[async_trait]
pub trait ImageEmbedder: Send + Sync {
    async fn embed(&self, image: &Path) -> Result<Vec<f32>, EmbedError>;
}
