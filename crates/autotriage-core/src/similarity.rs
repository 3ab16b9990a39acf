//! Text and image similarity scoring.
//!
//! Text uses a fuzzy partial ratio: the shorter string is slid over
//! same-length windows of the longer one and the best normalized-Levenshtein
//! similarity wins. Partial containment, not full-string edit distance, so a
//! long stack trace still scores high against a short prefix of itself.
//!
//! Images compare as cosine similarity between embedding vectors produced by
//! the `ImageEmbedder` collaborator (a vision-language model; loading it is
//! expensive and implementations cache it for the process lifetime). Every
//! failure on the image path collapses to "not similar": a missed upgrade is
//! cheaper than a wrong ticket merge.
//!
//! All thresholds are caller-supplied; nothing here hardcodes one.

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::ports::embedder::ImageEmbedder;

/// Fuzzy partial-ratio score in [0, 100]. Symmetric; 0 when either input is
/// empty.
pub fn partial_ratio(a: &str, b: &str) -> u32 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    // Shorter string is the needle regardless of argument order, which is
    // what makes the score symmetric.
    let (needle, hay) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let hay_chars: Vec<char> = hay.chars().collect();
    let len = needle.chars().count();

    let mut best = 0.0f64;
    for start in 0..=(hay_chars.len() - len) {
        let window: String = hay_chars[start..start + len].iter().collect();
        let score = strsim::normalized_levenshtein(needle, &window);
        if score > best {
            best = score;
            if best >= 1.0 {
                break;
            }
        }
    }
    (best * 100.0).round() as u32
}

/// True iff the partial ratio reaches `threshold`. Empty input never
/// matches and never panics.
pub fn text_similar(a: &str, b: &str, threshold: u32) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    partial_ratio(a, b) >= threshold
}

/// Cosine similarity of two embedding vectors. Mismatched or degenerate
/// inputs score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Screenshot comparison over the embedding collaborator.
pub struct ImageSimilarity {
    embedder: Arc<dyn ImageEmbedder>,
}

impl ImageSimilarity {
    pub fn new(embedder: Arc<dyn ImageEmbedder>) -> Self {
        Self { embedder }
    }

    /// True iff both images embed successfully and their cosine similarity
    /// exceeds `threshold`. Load or model failures return false.
    pub async fn images_similar(&self, a: &Path, b: &Path, threshold: f32) -> bool {
        let embedded_a = match self.embedder.embed(a).await {
            Ok(v) => v,
            Err(e) => {
                warn!(image = %a.display(), error = %e, "embedding failed; not similar");
                return false;
            }
        };
        let embedded_b = match self.embedder.embed(b).await {
            Ok(v) => v,
            Err(e) => {
                warn!(image = %b.display(), error = %e, "embedding failed; not similar");
                return false;
            }
        };
        cosine_similarity(&embedded_a, &embedded_b) > threshold
    }
}
