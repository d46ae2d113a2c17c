//! Qdrant-backed index over its HTTP API
//!
//! Each user gets their own collection, and every query and delete still
//! carries a `user_id` payload filter. The collection boundary alone is
//! not what isolation rests on.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkStatus};

use super::{rank, IndexManager, ScoredChunk};

/// Index manager backed by Qdrant
pub struct QdrantIndex {
    client: Client,
    base_url: String,
    collection_prefix: String,
    dimensions: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    payload: Option<serde_json::Map<String, serde_json::Value>>,
}

impl QdrantIndex {
    /// Create a new Qdrant index manager
    pub fn new(config: &VectorDbConfig, dimensions: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.url.clone(),
            collection_prefix: config.collection_prefix.clone(),
            dimensions,
        }
    }

    /// Collection name for a user's partition
    fn collection(&self, user_id: &str) -> String {
        format!("{}{}_chunks", self.collection_prefix, user_id)
    }

    /// Create the user's collection if it does not exist yet
    async fn ensure_collection(&self, name: &str) -> Result<()> {
        let url = format!("{}/collections/{}", self.base_url, name);

        let response = self.client.get(&url).send().await?;
        if response.status().is_success() {
            return Ok(());
        }

        let body = json!({
            "vectors": { "size": self.dimensions, "distance": "Cosine" }
        });
        let response = self.client.put(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::index_write(format!(
                "could not create collection '{}' ({}): {}",
                name, status, text
            )));
        }

        tracing::debug!("created collection {} ({} dims)", name, self.dimensions);
        Ok(())
    }

    /// Filter scoping a request to one user, and optionally to a set of
    /// documents. Attached server-side to every query and delete.
    fn scope_filter(user_id: &str, document_filter: Option<&[Uuid]>) -> serde_json::Value {
        let mut must = vec![json!({ "key": "user_id", "match": { "value": user_id } })];
        if let Some(ids) = document_filter {
            let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
            must.push(json!({ "key": "document_id", "match": { "any": ids } }));
        }
        json!({ "must": must })
    }
}

/// Chunk metadata stored alongside the vector
fn chunk_payload(chunk: &Chunk) -> serde_json::Value {
    json!({
        "chunk_id": chunk.id.to_string(),
        "document_id": chunk.document_id.to_string(),
        "user_id": chunk.user_id,
        "filename": chunk.filename,
        "ordinal": chunk.ordinal,
        "text": chunk.text,
        "char_start": chunk.char_start,
        "char_end": chunk.char_end,
    })
}

/// Rebuild a chunk from stored payload
fn payload_to_chunk(payload: &serde_json::Map<String, serde_json::Value>) -> Option<Chunk> {
    let id = payload
        .get("chunk_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())?;
    let document_id = payload
        .get("document_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())?;
    let user_id = payload.get("user_id").and_then(|v| v.as_str())?.to_string();

    Some(Chunk {
        id,
        document_id,
        user_id,
        filename: payload
            .get("filename")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string(),
        ordinal: payload.get("ordinal").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        text: payload
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        char_start: payload
            .get("char_start")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize,
        char_end: payload
            .get("char_end")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize,
        embedding: Vec::new(),
        status: ChunkStatus::Indexed,
    })
}

#[async_trait]
impl IndexManager for QdrantIndex {
    async fn upsert(&self, user_id: &str, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let collection = self.collection(user_id);
        self.ensure_collection(&collection).await?;

        let points: Vec<serde_json::Value> = chunks
            .iter()
            .map(|chunk| {
                json!({
                    "id": chunk.id.to_string(),
                    "vector": chunk.embedding,
                    "payload": chunk_payload(chunk),
                })
            })
            .collect();

        let url = format!(
            "{}/collections/{}/points?wait=true",
            self.base_url, collection
        );
        let response = self
            .client
            .put(&url)
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::index_write(format!(
                "upsert of {} points failed ({}): {}",
                chunks.len(),
                status,
                text
            )));
        }

        tracing::debug!("upserted {} points into {}", chunks.len(), collection);
        Ok(())
    }

    async fn query(
        &self,
        user_id: &str,
        vector: &[f32],
        k: usize,
        document_filter: Option<&[Uuid]>,
    ) -> Result<Vec<ScoredChunk>> {
        let collection = self.collection(user_id);
        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, collection
        );
        let body = json!({
            "vector": vector,
            "limit": k,
            "with_payload": true,
            "filter": Self::scope_filter(user_id, document_filter),
        });

        let response = self.client.post(&url).json(&body).send().await?;

        // a user who has never ingested anything has no collection yet
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::IndexQuery(format!(
                "search failed ({}): {}",
                status, text
            )));
        }

        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::IndexQuery(format!("invalid search response: {}", e)))?;

        let mut results: Vec<ScoredChunk> = search
            .result
            .into_iter()
            .filter_map(|point| {
                let payload = point.payload?;
                let chunk = payload_to_chunk(&payload)?;
                // belt on top of the server-side filter
                if chunk.user_id != user_id {
                    tracing::warn!("dropped foreign chunk {} from results", chunk.id);
                    return None;
                }
                Some(ScoredChunk {
                    chunk,
                    score: point.score,
                })
            })
            .collect();

        rank(&mut results);
        results.truncate(k);
        Ok(results)
    }

    async fn delete_document(&self, user_id: &str, document_id: &Uuid) -> Result<()> {
        let collection = self.collection(user_id);
        let url = format!(
            "{}/collections/{}/points/delete?wait=true",
            self.base_url, collection
        );
        let mut filter = Self::scope_filter(user_id, None);
        if let Some(must) = filter.get_mut("must").and_then(|m| m.as_array_mut()) {
            must.push(json!({ "key": "document_id", "match": { "value": document_id.to_string() } }));
        }

        let response = self
            .client
            .post(&url)
            .json(&json!({ "filter": filter }))
            .send()
            .await?;

        // nothing to delete is not a failure
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::index_write(format!(
                "delete of document {} not confirmed ({}): {}",
                document_id, status, text
            )));
        }

        tracing::debug!("deleted vectors of document {} from {}", document_id, collection);
        Ok(())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        match self
            .client
            .get(format!("{}/collections", self.base_url))
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Document, MediaType};

    #[test]
    fn test_scope_filter_always_carries_the_user() {
        let filter = QdrantIndex::scope_filter("alice", None);
        let must = filter["must"].as_array().unwrap();
        assert_eq!(must.len(), 1);
        assert_eq!(must[0]["key"], "user_id");
        assert_eq!(must[0]["match"]["value"], "alice");
    }

    #[test]
    fn test_scope_filter_adds_document_restriction() {
        let doc_id = Uuid::new_v4();
        let filter = QdrantIndex::scope_filter("alice", Some(&[doc_id]));
        let must = filter["must"].as_array().unwrap();
        assert_eq!(must.len(), 2);
        assert_eq!(must[1]["key"], "document_id");
        assert_eq!(must[1]["match"]["any"][0], doc_id.to_string());
    }

    #[test]
    fn test_payload_round_trip() {
        let doc = Document::new("alice", "report.pdf", MediaType::Pdf);
        let chunk = Chunk::new(&doc, 3, "body text".to_string(), 120, 129);

        let payload = chunk_payload(&chunk);
        let map = payload.as_object().unwrap();
        let rebuilt = payload_to_chunk(map).unwrap();

        assert_eq!(rebuilt.id, chunk.id);
        assert_eq!(rebuilt.document_id, chunk.document_id);
        assert_eq!(rebuilt.user_id, "alice");
        assert_eq!(rebuilt.ordinal, 3);
        assert_eq!(rebuilt.text, "body text");
        assert_eq!((rebuilt.char_start, rebuilt.char_end), (120, 129));
    }
}
