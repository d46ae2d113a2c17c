//! Document ingestion pipeline
//!
//! Drives one document through extraction, chunking, embedding, and
//! indexing as an explicit state machine. A failure at any stage marks
//! the document failed and rolls back every vector already written, so
//! that a ready document always has a complete chunk set in the index.

mod registry;
mod worker;

pub use registry::{DocumentRegistry, InMemoryRegistry};
pub use worker::{IngestJob, IngestWorker};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

use crate::chunker::TextChunker;
use crate::config::ProcessingConfig;
use crate::error::{Error, Result, Stage};
use crate::extract::Extractor;
use crate::index::IndexManager;
use crate::providers::EmbeddingProvider;
use crate::types::{Chunk, ChunkStatus, Document, IngestStatus};

/// Orchestrates ingestion for one document at a time
pub struct IngestionPipeline {
    extractor: Extractor,
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn IndexManager>,
    registry: Arc<dyn DocumentRegistry>,
    config: ProcessingConfig,
    embed_batch_size: usize,
}

impl IngestionPipeline {
    /// Create a new pipeline
    pub fn new(
        extractor: Extractor,
        chunker: TextChunker,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn IndexManager>,
        registry: Arc<dyn DocumentRegistry>,
        config: ProcessingConfig,
        embed_batch_size: usize,
    ) -> Self {
        Self {
            extractor,
            chunker,
            embedder,
            index,
            registry,
            config,
            embed_batch_size: embed_batch_size.max(1),
        }
    }

    /// Run the full state machine for one document.
    ///
    /// On success the document ends `Ready` and all of its chunks are
    /// indexed. On failure it ends `Failed` with the reason, and any
    /// vectors written before the failure are removed again.
    pub async fn ingest(&self, document: &Document, data: &[u8]) -> Result<()> {
        match self.run_stages(document, data).await {
            Ok(total_chunks) => {
                self.registry.set_total_chunks(&document.id, total_chunks)?;
                self.registry.advance(&document.id, IngestStatus::Ready)?;
                tracing::info!(
                    "[{}] ready: {} chunks indexed for user {}",
                    document.filename,
                    total_chunks,
                    document.user_id
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!("[{}] ingestion failed: {}", document.filename, e);
                if let Err(reg_err) = self.registry.mark_failed(&document.id, &e.to_string()) {
                    tracing::error!("could not record failure for {}: {}", document.id, reg_err);
                }
                self.rollback(document).await;
                Err(e)
            }
        }
    }

    async fn run_stages(&self, document: &Document, data: &[u8]) -> Result<u32> {
        self.registry.advance(&document.id, IngestStatus::Extracting)?;
        let extraction_budget = Duration::from_secs(self.config.extraction_timeout_secs);
        let extracted = self
            .with_retry(Stage::Extraction, extraction_budget, || {
                self.extractor
                    .extract(&document.filename, data, &document.media_type)
            })
            .await?;
        self.registry
            .set_content_hash(&document.id, &extracted.content_hash)?;

        self.registry.advance(&document.id, IngestStatus::Chunking)?;
        let spans = self.chunker.chunk(&extracted.content);
        if spans.is_empty() {
            return Err(Error::extraction(&document.filename, "extracted text was empty"));
        }
        let mut chunks: Vec<Chunk> = spans
            .into_iter()
            .enumerate()
            .map(|(i, span)| Chunk::new(document, i as u32, span.text, span.char_start, span.char_end))
            .collect();
        tracing::info!(
            "[{}] {} chunks from {} chars",
            document.filename,
            chunks.len(),
            extracted.content.len()
        );

        self.registry.advance(&document.id, IngestStatus::Indexing)?;
        let embed_budget = Duration::from_secs(self.config.embed_timeout_secs);
        for batch in chunks.chunks_mut(self.embed_batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self
                .with_retry(Stage::Embedding, embed_budget, || {
                    self.embedder.embed_batch(&texts)
                })
                .await?;
            if embeddings.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }
            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                if embedding.len() != self.index.dimensions() {
                    return Err(Error::DimensionMismatch {
                        expected: self.index.dimensions(),
                        actual: embedding.len(),
                    });
                }
                chunk.embedding = embedding;
            }
        }

        let index_budget = Duration::from_secs(self.config.index_timeout_secs);
        for batch in chunks.chunks(self.embed_batch_size) {
            self.with_retry(Stage::Indexing, index_budget, || {
                self.index.upsert(&document.user_id, batch)
            })
            .await?;
        }
        for chunk in &mut chunks {
            chunk.status = ChunkStatus::Indexed;
        }

        Ok(chunks.len() as u32)
    }

    /// Run an operation under a per-call budget, with one bounded
    /// backoff retry for transient failures. Semantic failures are never
    /// retried.
    async fn with_retry<T, F, Fut>(&self, stage: Stage, budget: Duration, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error: Option<Error> = None;

        for attempt in 0..=self.config.max_retries {
            let result = match timeout(budget, operation()).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout {
                    stage,
                    secs: budget.as_secs(),
                }),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let transient = e.is_transient();
                    if !transient || attempt >= self.config.max_retries {
                        return Err(e);
                    }
                    let delay = Duration::from_secs(2u64.pow(attempt));
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}, retrying in {:?}",
                        stage,
                        attempt + 1,
                        self.config.max_retries + 1,
                        e,
                        delay
                    );
                    last_error = Some(e);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::internal("retry loop ended without an error")))
    }

    /// Remove whatever the failed ingestion already wrote to the index.
    /// When the removal itself fails, the document keeps its vectors for
    /// the moment and gets flagged so `reconcile` retries later.
    async fn rollback(&self, document: &Document) {
        match self
            .index
            .delete_document(&document.user_id, &document.id)
            .await
        {
            Ok(()) => {
                tracing::info!("[{}] rolled back partial index writes", document.filename);
            }
            Err(e) => {
                tracing::error!(
                    "[{}] rollback failed, flagging for reconciliation: {}",
                    document.filename,
                    e
                );
                if let Err(reg_err) = self.registry.mark_needs_cleanup(&document.id) {
                    tracing::error!("could not flag document {}: {}", document.id, reg_err);
                }
            }
        }
    }

    /// Retry index cleanup for documents whose rollback previously failed
    pub async fn reconcile(&self) {
        for document in self.registry.needing_cleanup() {
            match self
                .index
                .delete_document(&document.user_id, &document.id)
                .await
            {
                Ok(()) => {
                    if let Err(e) = self.registry.clear_needs_cleanup(&document.id) {
                        tracing::error!("could not clear cleanup flag for {}: {}", document.id, e);
                    } else {
                        tracing::info!("reconciled leftover vectors of document {}", document.id);
                    }
                }
                Err(e) => {
                    tracing::warn!("reconciliation of document {} still failing: {}", document.id, e);
                }
            }
        }
    }

    /// Delete a document and its vectors.
    ///
    /// The index removal is one filtered delete and must be confirmed
    /// before the registry entry goes away; until then the document is
    /// not considered deleted.
    pub async fn delete(&self, user_id: &str, document_id: &Uuid) -> Result<()> {
        let document = self
            .registry
            .get(user_id, document_id)
            .ok_or(Error::DocumentNotFound(*document_id))?;

        self.index.delete_document(user_id, document_id).await?;
        self.registry.remove(user_id, document_id)?;

        tracing::info!("deleted document {} ({})", document_id, document.filename);
        Ok(())
    }

    /// The registry this pipeline records state in
    pub fn registry(&self) -> &Arc<dyn DocumentRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::config::ExtractionConfig;
    use crate::index::{MemoryIndex, ScoredChunk};
    use crate::providers::ocr::OcrProvider;
    use crate::types::MediaType;

    const DIMS: usize = 8;

    /// Deterministic embedding from byte content
    fn embed_text(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMS];
        for (i, b) in text.bytes().enumerate() {
            v[i % DIMS] += b as f32;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }

    struct MockEmbedder {
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
    }

    impl MockEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on_call: None,
            }
        }

        fn failing_on(call: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on_call: Some(call),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(embed_text(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_call == Some(call) {
                return Err(Error::embedding("induced batch failure"));
            }
            Ok(texts.iter().map(|t| embed_text(t)).collect())
        }

        fn dimensions(&self) -> usize {
            DIMS
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    struct NoOcr;

    #[async_trait]
    impl OcrProvider for NoOcr {
        async fn recognize(&self, _data: &[u8], _mime: &str, _language: &str) -> Result<String> {
            Ok(String::new())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "none"
        }
    }

    /// Index wrapper that fails the nth upsert call
    struct FlakyIndex {
        inner: MemoryIndex,
        upserts: AtomicUsize,
        fail_on_upsert: usize,
    }

    impl FlakyIndex {
        fn new(fail_on_upsert: usize) -> Self {
            Self {
                inner: MemoryIndex::new(DIMS),
                upserts: AtomicUsize::new(0),
                fail_on_upsert,
            }
        }
    }

    #[async_trait]
    impl IndexManager for FlakyIndex {
        async fn upsert(&self, user_id: &str, chunks: &[Chunk]) -> Result<()> {
            let call = self.upserts.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.fail_on_upsert {
                return Err(Error::index_write("induced upsert failure"));
            }
            self.inner.upsert(user_id, chunks).await
        }

        async fn query(
            &self,
            user_id: &str,
            vector: &[f32],
            k: usize,
            document_filter: Option<&[Uuid]>,
        ) -> Result<Vec<ScoredChunk>> {
            self.inner.query(user_id, vector, k, document_filter).await
        }

        async fn delete_document(&self, user_id: &str, document_id: &Uuid) -> Result<()> {
            self.inner.delete_document(user_id, document_id).await
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn pipeline_with(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn IndexManager>,
        batch_size: usize,
    ) -> IngestionPipeline {
        let registry: Arc<dyn DocumentRegistry> = Arc::new(InMemoryRegistry::new());
        let extractor = Extractor::new(Arc::new(NoOcr), ExtractionConfig::default());
        IngestionPipeline::new(
            extractor,
            TextChunker::new(2000, 200),
            embedder,
            index,
            registry,
            ProcessingConfig::default(),
            batch_size,
        )
    }

    fn registered(pipeline: &IngestionPipeline, user_id: &str, filename: &str) -> Document {
        let document = Document::new(user_id, filename, MediaType::Text);
        pipeline.registry().create(document.clone()).unwrap();
        document
    }

    #[tokio::test]
    async fn test_ingest_reaches_ready_with_complete_chunk_set() {
        let index: Arc<dyn IndexManager> = Arc::new(MemoryIndex::new(DIMS));
        let pipeline = pipeline_with(Arc::new(MockEmbedder::new()), Arc::clone(&index), 4);
        let document = registered(&pipeline, "alice", "big.txt");

        let data = "a".repeat(5000);
        pipeline.ingest(&document, data.as_bytes()).await.unwrap();

        let stored = pipeline.registry().get("alice", &document.id).unwrap();
        assert_eq!(stored.status, IngestStatus::Ready);
        assert_eq!(stored.total_chunks, 3);
        assert!(stored.content_hash.is_some());

        let results = index
            .query("alice", &embed_text(&"a".repeat(2000)), 10, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);

        // spans cover the text with no gap beyond the overlap
        let mut spans: Vec<(usize, usize)> = results
            .iter()
            .map(|r| (r.chunk.char_start, r.chunk.char_end))
            .collect();
        spans.sort();
        assert_eq!(spans, vec![(0, 2000), (1800, 3800), (3600, 5000)]);
    }

    #[tokio::test]
    async fn test_embedding_failure_rolls_back_and_marks_failed() {
        let index: Arc<dyn IndexManager> = Arc::new(MemoryIndex::new(DIMS));
        // second embedding batch fails
        let pipeline = pipeline_with(Arc::new(MockEmbedder::failing_on(2)), Arc::clone(&index), 1);
        let document = registered(&pipeline, "alice", "big.txt");

        let data = "a".repeat(5000);
        let err = pipeline.ingest(&document, data.as_bytes()).await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));

        let stored = pipeline.registry().get("alice", &document.id).unwrap();
        assert_eq!(stored.status, IngestStatus::Failed);
        assert!(stored.failure_reason.is_some());

        // zero chunks of the failed document are queryable
        let results = index
            .query("alice", &embed_text(&"a".repeat(2000)), 10, None)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_partial_upsert_failure_leaves_nothing_queryable() {
        let index: Arc<dyn IndexManager> = Arc::new(FlakyIndex::new(2));
        let pipeline = pipeline_with(Arc::new(MockEmbedder::new()), Arc::clone(&index), 1);
        let document = registered(&pipeline, "alice", "big.txt");

        let data = "a".repeat(5000);
        let err = pipeline.ingest(&document, data.as_bytes()).await.unwrap_err();
        assert!(matches!(err, Error::IndexWrite(_)));

        // the first batch made it in before the failure; rollback removed it
        let results = index
            .query("alice", &embed_text(&"a".repeat(2000)), 10, None)
            .await
            .unwrap();
        assert!(results.is_empty());

        let stored = pipeline.registry().get("alice", &document.id).unwrap();
        assert_eq!(stored.status, IngestStatus::Failed);
        assert!(!stored.needs_cleanup);
    }

    #[tokio::test]
    async fn test_empty_extraction_fails_instead_of_indexing_nothing() {
        let index: Arc<dyn IndexManager> = Arc::new(MemoryIndex::new(DIMS));
        let pipeline = pipeline_with(Arc::new(MockEmbedder::new()), index, 4);
        let document = registered(&pipeline, "alice", "empty.txt");

        let err = pipeline.ingest(&document, b"   \n  ").await.unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));

        let stored = pipeline.registry().get("alice", &document.id).unwrap();
        assert_eq!(stored.status, IngestStatus::Failed);
    }

    #[tokio::test]
    async fn test_reingestion_after_delete_is_identical() {
        let index: Arc<dyn IndexManager> = Arc::new(MemoryIndex::new(DIMS));
        let pipeline = pipeline_with(Arc::new(MockEmbedder::new()), Arc::clone(&index), 4);
        let data = "Sentence one. Sentence two follows it. ".repeat(200);

        let first = registered(&pipeline, "alice", "notes.txt");
        pipeline.ingest(&first, data.as_bytes()).await.unwrap();
        let first_doc = pipeline.registry().get("alice", &first.id).unwrap();
        let first_spans: Vec<(usize, usize)> = {
            let mut results = index
                .query("alice", &embed_text(&data[..100]), 100, None)
                .await
                .unwrap();
            results.sort_by_key(|r| r.chunk.ordinal);
            results
                .iter()
                .map(|r| (r.chunk.char_start, r.chunk.char_end))
                .collect()
        };

        pipeline.delete("alice", &first.id).await.unwrap();

        let second = registered(&pipeline, "alice", "notes.txt");
        pipeline.ingest(&second, data.as_bytes()).await.unwrap();
        let second_doc = pipeline.registry().get("alice", &second.id).unwrap();
        let second_spans: Vec<(usize, usize)> = {
            let mut results = index
                .query("alice", &embed_text(&data[..100]), 100, None)
                .await
                .unwrap();
            results.sort_by_key(|r| r.chunk.ordinal);
            results
                .iter()
                .map(|r| (r.chunk.char_start, r.chunk.char_end))
                .collect()
        };

        assert_eq!(first_doc.total_chunks, second_doc.total_chunks);
        assert_eq!(first_doc.content_hash, second_doc.content_hash);
        assert_eq!(first_spans, second_spans);
    }

    #[tokio::test]
    async fn test_delete_then_query_returns_nothing() {
        let index: Arc<dyn IndexManager> = Arc::new(MemoryIndex::new(DIMS));
        let pipeline = pipeline_with(Arc::new(MockEmbedder::new()), Arc::clone(&index), 4);
        let document = registered(&pipeline, "alice", "notes.txt");

        let data = "a".repeat(5000);
        pipeline.ingest(&document, data.as_bytes()).await.unwrap();
        pipeline.delete("alice", &document.id).await.unwrap();

        assert!(pipeline.registry().get("alice", &document.id).is_none());
        let results = index
            .query("alice", &embed_text(&"a".repeat(2000)), 10, None)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_owner_scoped() {
        let index: Arc<dyn IndexManager> = Arc::new(MemoryIndex::new(DIMS));
        let pipeline = pipeline_with(Arc::new(MockEmbedder::new()), index, 4);
        let document = registered(&pipeline, "alice", "notes.txt");
        pipeline.ingest(&document, b"some text here").await.unwrap();

        let err = pipeline.delete("bob", &document.id).await.unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound(_)));
        assert!(pipeline.registry().get("alice", &document.id).is_some());
    }
}
