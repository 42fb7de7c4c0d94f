//! Embedding generation
//!
//! This module provides an abstraction over embedding providers with:
//! - A trait covering both modalities (text embedding, image captioning)
//! - An OpenAI-compatible HTTP backend
//!
//! Image content is collapsed into the text embedding space by captioning
//! first and embedding the caption, so one nearest-neighbor query ranks
//! paragraphs and image descriptions together. Every vector handed out by a
//! provider is unit-normalized, which makes cosine and dot-product ranking
//! coincide in the store.

mod openai;

pub use openai::OpenAiEmbedder;

use crate::error::{Error, Result};
use async_trait::async_trait;

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text, returning a unit-normalized vector
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Produce a retrieval-oriented caption for raw image bytes
    async fn describe_image(&self, bytes: &[u8], mime: &str) -> Result<String>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Scale a vector to unit L2 norm
///
/// A zero vector cannot be normalized and is treated as a provider fault.
pub fn l2_normalize(mut vector: Vec<f32>) -> Result<Vec<f32>> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(Error::Embedding(format!(
            "cannot normalize embedding with norm {}",
            norm
        )));
    }
    for v in &mut vector {
        *v /= norm;
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let normalized = l2_normalize(vec![3.0, 4.0]).unwrap();
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);

        let norm: f32 = normalized.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_is_idempotent() {
        let once = l2_normalize(vec![0.2, -0.7, 0.5]).unwrap();
        let twice = l2_normalize(once.clone()).unwrap();
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_l2_normalize_rejects_zero_vector() {
        assert!(l2_normalize(vec![0.0, 0.0, 0.0]).is_err());
    }
}
