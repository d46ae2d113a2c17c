//! In-process index for development and tests

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::Chunk;

use super::{rank, IndexManager, ScoredChunk};

/// In-memory cosine-similarity index, partitioned by user id
pub struct MemoryIndex {
    dimensions: usize,
    partitions: RwLock<HashMap<String, HashMap<Uuid, Chunk>>>,
}

impl MemoryIndex {
    /// Create a new empty index
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            partitions: RwLock::new(HashMap::new()),
        }
    }

    /// Total vectors stored across all partitions
    pub fn len(&self) -> usize {
        self.partitions.read().values().map(|p| p.len()).sum()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cosine similarity of two vectors; 0.0 when either has zero magnitude
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl IndexManager for MemoryIndex {
    async fn upsert(&self, user_id: &str, chunks: &[Chunk]) -> Result<()> {
        for chunk in chunks {
            if chunk.embedding.len() != self.dimensions {
                return Err(Error::index_write(format!(
                    "chunk {} has {} dimensions, index stores {}",
                    chunk.id,
                    chunk.embedding.len(),
                    self.dimensions
                )));
            }
            if chunk.user_id != user_id {
                return Err(Error::index_write(format!(
                    "chunk {} belongs to another user",
                    chunk.id
                )));
            }
        }

        let mut partitions = self.partitions.write();
        let partition = partitions.entry(user_id.to_string()).or_default();
        for chunk in chunks {
            partition.insert(chunk.id, chunk.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        user_id: &str,
        vector: &[f32],
        k: usize,
        document_filter: Option<&[Uuid]>,
    ) -> Result<Vec<ScoredChunk>> {
        let partitions = self.partitions.read();
        let Some(partition) = partitions.get(user_id) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<ScoredChunk> = partition
            .values()
            .filter(|c| document_filter.map_or(true, |ids| ids.contains(&c.document_id)))
            .map(|c| ScoredChunk {
                score: cosine_similarity(&c.embedding, vector),
                chunk: c.clone(),
            })
            .collect();

        rank(&mut results);
        results.truncate(k);
        Ok(results)
    }

    async fn delete_document(&self, user_id: &str, document_id: &Uuid) -> Result<()> {
        let mut partitions = self.partitions.write();
        if let Some(partition) = partitions.get_mut(user_id) {
            partition.retain(|_, c| c.document_id != *document_id);
        }
        Ok(())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Document, MediaType};

    fn chunk_with_embedding(doc: &Document, ordinal: u32, embedding: Vec<f32>) -> Chunk {
        let mut chunk = Chunk::new(doc, ordinal, format!("chunk {}", ordinal), 0, 8);
        chunk.embedding = embedding;
        chunk
    }

    #[tokio::test]
    async fn test_query_never_crosses_users() {
        let index = MemoryIndex::new(3);
        let doc_a = Document::new("alice", "a.txt", MediaType::Text);
        let doc_b = Document::new("bob", "b.txt", MediaType::Text);

        // identical vectors for both users
        let v = vec![1.0, 0.0, 0.0];
        index
            .upsert("alice", &[chunk_with_embedding(&doc_a, 0, v.clone())])
            .await
            .unwrap();
        index
            .upsert("bob", &[chunk_with_embedding(&doc_b, 0, v.clone())])
            .await
            .unwrap();

        let results = index.query("alice", &v, 10, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.user_id, "alice");
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let index = MemoryIndex::new(2);
        let doc = Document::new("alice", "a.txt", MediaType::Text);
        let chunk = chunk_with_embedding(&doc, 0, vec![1.0, 0.0]);

        index.upsert("alice", &[chunk.clone()]).await.unwrap();
        let mut replaced = chunk.clone();
        replaced.embedding = vec![0.0, 1.0];
        index.upsert("alice", &[replaced]).await.unwrap();

        assert_eq!(index.len(), 1);
        let results = index.query("alice", &[0.0, 1.0], 10, None).await.unwrap();
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_ties_break_toward_lower_ordinal() {
        let index = MemoryIndex::new(2);
        let doc = Document::new("alice", "a.txt", MediaType::Text);
        let v = vec![1.0, 0.0];

        // insert in reverse so ordering cannot come from insertion order
        index
            .upsert(
                "alice",
                &[
                    chunk_with_embedding(&doc, 2, v.clone()),
                    chunk_with_embedding(&doc, 0, v.clone()),
                    chunk_with_embedding(&doc, 1, v.clone()),
                ],
            )
            .await
            .unwrap();

        let results = index.query("alice", &v, 3, None).await.unwrap();
        let ordinals: Vec<u32> = results.iter().map(|r| r.chunk.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_document_filter() {
        let index = MemoryIndex::new(2);
        let doc_a = Document::new("alice", "a.txt", MediaType::Text);
        let doc_b = Document::new("alice", "b.txt", MediaType::Text);
        let v = vec![1.0, 0.0];

        index
            .upsert(
                "alice",
                &[
                    chunk_with_embedding(&doc_a, 0, v.clone()),
                    chunk_with_embedding(&doc_b, 0, v.clone()),
                ],
            )
            .await
            .unwrap();

        let results = index
            .query("alice", &v, 10, Some(&[doc_b.id]))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.document_id, doc_b.id);
    }

    #[tokio::test]
    async fn test_delete_document_removes_all_its_chunks() {
        let index = MemoryIndex::new(2);
        let doc_a = Document::new("alice", "a.txt", MediaType::Text);
        let doc_b = Document::new("alice", "b.txt", MediaType::Text);
        let v = vec![1.0, 0.0];

        index
            .upsert(
                "alice",
                &[
                    chunk_with_embedding(&doc_a, 0, v.clone()),
                    chunk_with_embedding(&doc_a, 1, v.clone()),
                    chunk_with_embedding(&doc_b, 0, v.clone()),
                ],
            )
            .await
            .unwrap();

        index.delete_document("alice", &doc_a.id).await.unwrap();

        let results = index.query("alice", &v, 10, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.document_id, doc_b.id);
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimensions() {
        let index = MemoryIndex::new(3);
        let doc = Document::new("alice", "a.txt", MediaType::Text);
        let err = index
            .upsert("alice", &[chunk_with_embedding(&doc, 0, vec![1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IndexWrite(_)));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
