//! Question-driven retrieval over the per-user index

use std::sync::Arc;
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::index::{IndexManager, ScoredChunk};
use crate::pipeline::DocumentRegistry;
use crate::providers::EmbeddingProvider;
use crate::types::Chunk;

/// A chunk retrieved for a question, with its similarity and rank
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// The retrieved chunk
    pub chunk: Chunk,
    /// Cosine similarity to the question (0.0-1.0)
    pub score: f32,
    /// Position among the returned results, from 0
    pub rank: usize,
}

/// Embeds a question and pulls the most similar chunks from one user's
/// partition
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn IndexManager>,
    registry: Arc<dyn DocumentRegistry>,
    config: RetrievalConfig,
}

impl Retriever {
    /// Create a new retriever
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn IndexManager>,
        registry: Arc<dyn DocumentRegistry>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            registry,
            config,
        }
    }

    /// Retrieve up to `k` chunks relevant to the question.
    ///
    /// Chunks below the similarity threshold are dropped even when that
    /// leaves fewer than `k` results; an empty list beats low-relevance
    /// noise. With de-duplication enabled, at most one of two adjacent
    /// chunks from the same document survives.
    pub async fn retrieve(
        &self,
        user_id: &str,
        question: &str,
        k: usize,
        document_filter: Option<&[Uuid]>,
    ) -> Result<Vec<RetrievedChunk>> {
        let query_embedding = self.embedder.embed(question).await?;

        // The question must live in the same embedding space as the
        // index; a length mismatch means a different model produced it.
        if query_embedding.len() != self.index.dimensions() {
            return Err(Error::DimensionMismatch {
                expected: self.index.dimensions(),
                actual: query_embedding.len(),
            });
        }

        // over-fetch so filtering can still fill k results
        let fetch = k.saturating_mul(2).max(k);
        let mut results = self
            .index
            .query(user_id, &query_embedding, fetch, document_filter)
            .await?;

        // A document is queryable only once ready. Chunks of a document
        // that is still indexing, failed, or pending cleanup never
        // surface, so a result set is always complete and consistent.
        results.retain(|r| {
            self.registry
                .get(user_id, &r.chunk.document_id)
                .map_or(false, |doc| doc.is_ready())
        });

        results.retain(|r| r.score >= self.config.similarity_threshold);
        if results.is_empty() {
            tracing::debug!(
                "no chunks above threshold {} for user {}",
                self.config.similarity_threshold,
                user_id
            );
            return Ok(Vec::new());
        }

        if self.config.dedupe_adjacent {
            results = dedupe_adjacent(results);
        }
        results.truncate(k);

        Ok(results
            .into_iter()
            .enumerate()
            .map(|(rank, r)| RetrievedChunk {
                chunk: r.chunk,
                score: r.score,
                rank,
            })
            .collect())
    }
}

/// Keep at most one of two results that are adjacent ordinals of the
/// same document. Input is ranked, so the earlier (higher-scoring) one
/// wins.
fn dedupe_adjacent(results: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
    let mut kept: Vec<ScoredChunk> = Vec::with_capacity(results.len());
    for candidate in results {
        let redundant = kept.iter().any(|existing| {
            existing.chunk.document_id == candidate.chunk.document_id
                && existing.chunk.ordinal.abs_diff(candidate.chunk.ordinal) == 1
        });
        if !redundant {
            kept.push(candidate);
        }
    }
    kept
}
