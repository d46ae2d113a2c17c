//! Embedding provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Turns text into a fixed-length vector.
///
/// The same provider must serve ingestion and query; mixing embedding
/// models silently degrades every downstream ranking, so the retriever
/// cross-checks dimensionality against the index.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts.
    ///
    /// The default calls `embed` sequentially; implementations with a
    /// cheaper batch path should override. The returned vector has one
    /// embedding per input, in order, so a batch failure is attributable
    /// to the text it belongs to.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Embedding dimensionality, fixed per deployment
    fn dimensions(&self) -> usize;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
