//! Per-user vector index management
//!
//! The index manager owns the logical, per-user partition of the vector
//! store. Isolation is enforced at this boundary: every query and delete
//! carries a server-side user filter attached to the request itself. A
//! vector's own metadata is never the only thing keeping one user's
//! results out of another's.

pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::Chunk;

pub use memory::MemoryIndex;
pub use qdrant::QdrantIndex;

/// A chunk returned from a similarity query
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// The matched chunk
    pub chunk: Chunk,
    /// Cosine similarity (0.0-1.0, higher is more similar)
    pub score: f32,
}

/// Per-user partition of the vector store.
///
/// One implementation per backing store, selected at startup; the rest
/// of the system depends only on this trait.
#[async_trait]
pub trait IndexManager: Send + Sync {
    /// Upsert chunk vectors into the user's partition.
    ///
    /// Idempotent: the chunk id is the point id, so re-upserting
    /// replaces the vector and metadata instead of duplicating.
    async fn upsert(&self, user_id: &str, chunks: &[Chunk]) -> Result<()>;

    /// Nearest chunks to a query vector by cosine similarity, scoped to
    /// one user and optionally to a set of documents. Returns at most
    /// `k` results; ties break toward the lower chunk ordinal so
    /// rankings are reproducible.
    async fn query(
        &self,
        user_id: &str,
        vector: &[f32],
        k: usize,
        document_filter: Option<&[Uuid]>,
    ) -> Result<Vec<ScoredChunk>>;

    /// Remove every vector belonging to one document, as a single
    /// filtered removal. Concurrent queries see either all of the
    /// document's chunks or none of them.
    async fn delete_document(&self, user_id: &str, document_id: &Uuid) -> Result<()>;

    /// Stored dimensionality of the partition
    fn dimensions(&self) -> usize;

    /// Check if the backing store is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Rank results: score descending, then ordinal ascending, then document
/// id, so equal-score results come back in a stable order.
pub(crate) fn rank(results: &mut [ScoredChunk]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.ordinal.cmp(&b.chunk.ordinal))
            .then_with(|| a.chunk.document_id.cmp(&b.chunk.document_id))
    });
}
