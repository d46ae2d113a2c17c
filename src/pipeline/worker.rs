//! Background worker draining the ingestion queue
//!
//! Documents are independent, so jobs run concurrently up to a
//! semaphore-bounded limit. Stages inside one document stay strictly
//! sequential in the pipeline itself.

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

use super::IngestionPipeline;
use crate::types::Document;

/// One queued ingestion: the registered document plus its raw bytes
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub document: Document,
    pub data: Bytes,
}

/// Worker for processing documents in the background
pub struct IngestWorker {
    pipeline: Arc<IngestionPipeline>,
    parallel_documents: usize,
}

impl IngestWorker {
    /// Create a new worker
    pub fn new(pipeline: Arc<IngestionPipeline>, parallel_documents: Option<usize>) -> Self {
        let parallel_documents = parallel_documents.unwrap_or_else(|| num_cpus::get().min(4));
        tracing::info!("ingest worker configured: {} parallel documents", parallel_documents);

        Self {
            pipeline,
            parallel_documents,
        }
    }

    /// Drain jobs from the queue until the sending side closes
    pub async fn run(self, mut receiver: mpsc::Receiver<IngestJob>) {
        let semaphore = Arc::new(Semaphore::new(self.parallel_documents));

        while let Some(job) = receiver.recv().await {
            let pipeline = Arc::clone(&self.pipeline);
            let semaphore = Arc::clone(&semaphore);

            tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("ingest semaphore closed");

                tracing::info!(
                    "[{}] starting ingestion ({} bytes) for user {}",
                    job.document.filename,
                    job.data.len(),
                    job.document.user_id
                );

                // failures are already recorded on the document
                if let Err(e) = pipeline.ingest(&job.document, &job.data).await {
                    tracing::debug!("[{}] ingestion task ended in error: {}", job.document.filename, e);
                }
            });
        }

        tracing::info!("ingest worker shutting down");
    }
}
