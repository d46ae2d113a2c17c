//! Response types for the upload and query boundaries

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::{Document, IngestStatus, MediaType};

/// Response to a document upload. Ingestion proceeds asynchronously;
/// poll the status endpoint with the returned id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Document ID
    pub document_id: Uuid,
    /// Ingestion state at accept time (always `pending`)
    pub status: IngestStatus,
}

/// Current ingestion state of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStatusResponse {
    /// Document ID
    pub id: Uuid,
    /// Original filename
    pub filename: String,
    /// Declared media type
    pub media_type: MediaType,
    /// Current ingestion state
    pub status: IngestStatus,
    /// Why ingestion failed, when it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Number of chunks indexed
    pub total_chunks: u32,
    /// Upload timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Last state change
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Document> for DocumentStatusResponse {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename.clone(),
            media_type: doc.media_type.clone(),
            status: doc.status,
            failure_reason: doc.failure_reason.clone(),
            total_chunks: doc.total_chunks,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

/// Response for listing a user's documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentListResponse {
    /// Documents owned by the user
    pub documents: Vec<DocumentStatusResponse>,
    /// Total count
    pub total_count: usize,
}

/// A chunk cited by an answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitedChunk {
    /// Document ID
    pub document_id: Uuid,
    /// Chunk ID
    pub chunk_id: Uuid,
    /// Position of the chunk within the document
    pub ordinal: u32,
    /// Offset span in the extracted text
    pub char_start: usize,
    pub char_end: usize,
    /// Similarity score (0.0-1.0)
    pub score: f32,
    /// Source filename
    pub filename: String,
}

/// Response from a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Generated answer, or the fixed no-grounding text
    pub answer: String,
    /// Chunks whose text was included in the prompt, in packed order
    pub citations: Vec<CitedChunk>,
    /// False when no chunk cleared the relevance threshold. The answer
    /// is only constrained to document content when this is true.
    pub grounded: bool,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}
