//! Embedding service trait and the deterministic hash-based backend.
//!
//! `HashEmbedding` derives unit vectors from a hash of the input text, so
//! identical text always embeds identically and no model artifact is
//! required. A semantic backend can be dropped in behind the same trait
//! without touching the store or the context manager.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tandem_core::error::{Result, TandemError};

/// Service for generating text embeddings.
///
/// Implementations convert text into fixed-dimensional vectors used both
/// when archiving utterances and when querying the reference store.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>>> + Send;

    /// Dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

/// Deterministic hash-derived embedding backend.
///
/// Each dimension hashes the text together with the dimension index; the
/// result is L2-normalized so cosine similarity of identical texts is 1.0.
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dim: usize,
}

impl HashEmbedding {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut result = Vec::with_capacity(self.dim);
        for i in 0..self.dim {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let h = hasher.finish();
            let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
            result.push(val as f32);
        }

        // L2-normalize to unit length so identical texts score exactly 1.0.
        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }

        result
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new(384)
    }
}

impl EmbeddingService for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(TandemError::Validation(
                "cannot embed empty text".to_string(),
            ));
        }
        Ok(self.hash_to_vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embedding_dimension() {
        let service = HashEmbedding::new(384);
        let vec = service.embed("hello world").await.unwrap();
        assert_eq!(vec.len(), 384);
        assert_eq!(service.dimensions(), 384);
    }

    #[tokio::test]
    async fn test_embedding_deterministic() {
        let service = HashEmbedding::new(64);
        let v1 = service.embed("same text").await.unwrap();
        let v2 = service.embed("same text").await.unwrap();
        assert_eq!(v1, v2);
    }

    #[tokio::test]
    async fn test_embedding_differs_by_input() {
        let service = HashEmbedding::new(64);
        let v1 = service.embed("text one").await.unwrap();
        let v2 = service.embed("text two").await.unwrap();
        assert_ne!(v1, v2);
    }

    #[tokio::test]
    async fn test_embedding_unit_length() {
        let service = HashEmbedding::new(128);
        let vec = service.embed("normalize me").await.unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_embedding_empty_text_rejected() {
        let service = HashEmbedding::default();
        assert!(service.embed("").await.is_err());
    }
}
