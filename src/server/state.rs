//! Application state for the HTTP server

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::chunker::TextChunker;
use crate::config::{IndexBackend, RagConfig};
use crate::error::{Error, Result};
use crate::extract::Extractor;
use crate::generation::AnswerComposer;
use crate::index::{IndexManager, MemoryIndex, QdrantIndex};
use crate::pipeline::{DocumentRegistry, IngestJob, IngestWorker, IngestionPipeline, InMemoryRegistry};
use crate::providers::{EmbeddingProvider, HttpOcr, LlmProvider, OcrProvider, OllamaEmbedder, OllamaLlm};
use crate::retrieval::Retriever;

/// How often leftover vectors from failed rollbacks are retried
const RECONCILE_INTERVAL: Duration = Duration::from_secs(300);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    registry: Arc<dyn DocumentRegistry>,
    pipeline: Arc<IngestionPipeline>,
    retriever: Retriever,
    composer: AnswerComposer,
    jobs: mpsc::Sender<IngestJob>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    index: Arc<dyn IndexManager>,
}

impl AppState {
    /// Wire up providers, index backend, pipeline, and the background
    /// worker from configuration
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("initializing application state");

        let ocr: Arc<dyn OcrProvider> = Arc::new(HttpOcr::new(&config.extraction));
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OllamaEmbedder::new(
            &config.llm,
            config.embeddings.dimensions,
        ));
        let llm: Arc<dyn LlmProvider> = Arc::new(OllamaLlm::new(&config.llm));

        // one index implementation per backing store, chosen at startup
        let index: Arc<dyn IndexManager> = match config.vector_db.backend {
            IndexBackend::Qdrant => Arc::new(QdrantIndex::new(
                &config.vector_db,
                config.embeddings.dimensions,
            )),
            IndexBackend::Memory => Arc::new(MemoryIndex::new(config.embeddings.dimensions)),
        };
        tracing::info!(
            "index backend: {} ({} dims)",
            index.name(),
            index.dimensions()
        );

        let registry: Arc<dyn DocumentRegistry> = Arc::new(InMemoryRegistry::new());

        let pipeline = Arc::new(IngestionPipeline::new(
            Extractor::new(Arc::clone(&ocr), config.extraction.clone()),
            TextChunker::new(config.chunking.max_chunk_chars, config.chunking.overlap_chars),
            Arc::clone(&embedder),
            Arc::clone(&index),
            Arc::clone(&registry),
            config.processing.clone(),
            config.embeddings.batch_size,
        ));

        let retriever = Retriever::new(
            Arc::clone(&embedder),
            Arc::clone(&index),
            Arc::clone(&registry),
            config.retrieval.clone(),
        );
        let composer = AnswerComposer::new(Arc::clone(&llm));

        let (jobs, receiver) = mpsc::channel(config.processing.queue_capacity.max(1));
        let worker = IngestWorker::new(Arc::clone(&pipeline), config.processing.parallel_documents);
        tokio::spawn(worker.run(receiver));

        // retry cleanup of documents whose rollback failed
        {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(RECONCILE_INTERVAL);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    pipeline.reconcile().await;
                }
            });
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                registry,
                pipeline,
                retriever,
                composer,
                jobs,
                embedder,
                llm,
                index,
            }),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get the document registry
    pub fn registry(&self) -> &Arc<dyn DocumentRegistry> {
        &self.inner.registry
    }

    /// Get the ingestion pipeline
    pub fn pipeline(&self) -> &Arc<IngestionPipeline> {
        &self.inner.pipeline
    }

    /// Get the retriever
    pub fn retriever(&self) -> &Retriever {
        &self.inner.retriever
    }

    /// Get the answer composer
    pub fn composer(&self) -> &AnswerComposer {
        &self.inner.composer
    }

    /// Enqueue a document for background ingestion
    pub async fn submit(&self, job: IngestJob) -> Result<()> {
        self.inner
            .jobs
            .send(job)
            .await
            .map_err(|_| Error::internal("ingestion queue is closed"))
    }

    /// Whether the external capabilities respond
    pub async fn is_ready(&self) -> bool {
        let embeddings = self.inner.embedder.health_check().await.unwrap_or(false);
        let llm = self.inner.llm.health_check().await.unwrap_or(false);
        let index = self.inner.index.health_check().await.unwrap_or(false);
        embeddings && llm && index
    }
}
