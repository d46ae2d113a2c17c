//! Document and chunk types with ingestion state tracking

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Media types accepted at the upload boundary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Plain text
    Text,
    /// Markdown
    Markdown,
    /// CSV (ingested as plain text)
    Csv,
    /// PDF document, extracted page by page with OCR fallback
    Pdf,
    /// Raster image, sent straight to OCR. Carries the mime type.
    Image(String),
    /// Anything we cannot ingest
    Unknown,
}

impl MediaType {
    /// Resolve from the declared content type, falling back to the
    /// filename extension when the declaration is missing or generic.
    pub fn detect(content_type: Option<&str>, filename: &str) -> Self {
        if let Some(declared) = content_type {
            let essence = declared
                .split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_ascii_lowercase();

            match essence.as_str() {
                "application/pdf" => return Self::Pdf,
                "text/plain" => return Self::Text,
                "text/markdown" => return Self::Markdown,
                "text/csv" => return Self::Csv,
                _ if essence.starts_with("image/") => return Self::Image(essence),
                _ if essence.starts_with("text/") => return Self::Text,
                _ => {}
            }
        }

        Self::from_extension(filename)
    }

    /// Detect from the filename extension
    pub fn from_extension(filename: &str) -> Self {
        let ext = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "txt" | "text" | "log" => Self::Text,
            "md" | "markdown" => Self::Markdown,
            "csv" => Self::Csv,
            "pdf" => Self::Pdf,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "tif" | "tiff" => {
                let mime = mime_guess::from_path(filename)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string();
                Self::Image(mime)
            }
            _ => Self::Unknown,
        }
    }

    /// Check if this is a media type we can ingest
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Get display name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Text => "Text",
            Self::Markdown => "Markdown",
            Self::Csv => "CSV",
            Self::Pdf => "PDF",
            Self::Image(_) => "Image",
            Self::Unknown => "Unknown",
        }
    }
}

/// Ingestion state of a document.
///
/// Transitions run strictly forward through
/// `Pending -> Extracting -> Chunking -> Indexing -> Ready`; any
/// non-terminal state may transition to `Failed`. A document is
/// queryable only once `Ready`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Pending,
    Extracting,
    Chunking,
    Indexing,
    Ready,
    Failed,
}

impl IngestStatus {
    /// Whether moving to `next` is a legal transition
    pub fn can_transition_to(self, next: IngestStatus) -> bool {
        use IngestStatus::*;
        match (self, next) {
            (Pending, Extracting)
            | (Extracting, Chunking)
            | (Chunking, Indexing)
            | (Indexing, Ready) => true,
            (Ready, _) | (Failed, _) => false,
            (_, Failed) => true,
            _ => false,
        }
    }

    /// Whether this state admits no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

impl std::fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Extracting => "extracting",
            Self::Chunking => "chunking",
            Self::Indexing => "indexing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// An uploaded document and its ingestion state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Owning user. Every operation on the document is scoped to this.
    pub user_id: String,
    /// Original filename as uploaded
    pub filename: String,
    /// Declared media type
    pub media_type: MediaType,
    /// Current ingestion state
    pub status: IngestStatus,
    /// Human-readable reason when `status` is `Failed`
    pub failure_reason: Option<String>,
    /// Set when rolling back partial index writes failed; a
    /// reconciliation pass retries the deletion later.
    pub needs_cleanup: bool,
    /// Number of chunks created (set once indexing completes)
    pub total_chunks: u32,
    /// Hash of the extracted text (set after extraction)
    pub content_hash: Option<String>,
    /// Upload timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Last state change
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    /// Create a new document in `Pending` state
    pub fn new(user_id: impl Into<String>, filename: impl Into<String>, media_type: MediaType) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            filename: filename.into(),
            media_type,
            status: IngestStatus::Pending,
            failure_reason: None,
            needs_cleanup: false,
            total_chunks: 0,
            content_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to the next ingestion state, rejecting illegal transitions
    pub fn advance(&mut self, next: IngestStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = chrono::Utc::now();
        Ok(())
    }

    /// Mark the document failed with a reason. No-op once terminal.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = IngestStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.updated_at = chrono::Utc::now();
    }

    /// Whether the document is queryable
    pub fn is_ready(&self) -> bool {
        self.status == IngestStatus::Ready
    }
}

/// Indexing state of a chunk
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    #[default]
    Unindexed,
    Indexed,
}

/// A bounded segment of a document's extracted text.
///
/// Chunk ids are globally unique so concurrent ingestion never needs to
/// coordinate id spaces. A chunk is never mutated after reaching
/// `Indexed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Parent document ID
    pub document_id: Uuid,
    /// Owning user, always equal to the parent document's
    pub user_id: String,
    /// Source filename, carried for citations
    pub filename: String,
    /// Position within the document, contiguous from 0
    pub ordinal: u32,
    /// Text content
    pub text: String,
    /// Offset span in the extracted text
    pub char_start: usize,
    pub char_end: usize,
    /// Embedding vector, empty until computed
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    /// Indexing state
    #[serde(default)]
    pub status: ChunkStatus,
}

impl Chunk {
    /// Create a new chunk for a document
    pub fn new(
        document: &Document,
        ordinal: u32,
        text: String,
        char_start: usize,
        char_end: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id: document.id,
            user_id: document.user_id.clone(),
            filename: document.filename.clone(),
            ordinal,
            text,
            char_start,
            char_end,
            embedding: Vec::new(),
            status: ChunkStatus::Unindexed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_advances_forward() {
        let mut doc = Document::new("alice", "notes.txt", MediaType::Text);
        assert!(doc.advance(IngestStatus::Extracting).is_ok());
        assert!(doc.advance(IngestStatus::Chunking).is_ok());
        assert!(doc.advance(IngestStatus::Indexing).is_ok());
        assert!(doc.advance(IngestStatus::Ready).is_ok());
        assert!(doc.is_ready());
    }

    #[test]
    fn test_status_rejects_skips_and_reversals() {
        let mut doc = Document::new("alice", "notes.txt", MediaType::Text);
        assert!(doc.advance(IngestStatus::Chunking).is_err());
        assert!(doc.advance(IngestStatus::Extracting).is_ok());
        assert!(doc.advance(IngestStatus::Ready).is_err());
        assert!(doc.advance(IngestStatus::Pending).is_err());
    }

    #[test]
    fn test_any_active_state_can_fail() {
        let mut doc = Document::new("alice", "scan.pdf", MediaType::Pdf);
        doc.advance(IngestStatus::Extracting).unwrap();
        doc.fail("no text on any page");
        assert_eq!(doc.status, IngestStatus::Failed);
        assert_eq!(doc.failure_reason.as_deref(), Some("no text on any page"));
    }

    #[test]
    fn test_terminal_states_stay_terminal() {
        let mut doc = Document::new("alice", "notes.txt", MediaType::Text);
        doc.advance(IngestStatus::Extracting).unwrap();
        doc.advance(IngestStatus::Chunking).unwrap();
        doc.advance(IngestStatus::Indexing).unwrap();
        doc.advance(IngestStatus::Ready).unwrap();
        assert!(doc.advance(IngestStatus::Failed).is_err());
        doc.fail("too late");
        assert!(doc.is_ready());
    }

    #[test]
    fn test_media_type_prefers_declared_type() {
        assert_eq!(
            MediaType::detect(Some("application/pdf"), "scan.bin"),
            MediaType::Pdf
        );
        assert_eq!(
            MediaType::detect(Some("image/tiff; charset=binary"), "page.dat"),
            MediaType::Image("image/tiff".to_string())
        );
        assert_eq!(MediaType::detect(Some("text/x-readme"), "README"), MediaType::Text);
    }

    #[test]
    fn test_media_type_falls_back_to_extension() {
        assert_eq!(
            MediaType::detect(Some("application/octet-stream"), "notes.md"),
            MediaType::Markdown
        );
        assert_eq!(MediaType::detect(None, "photo.JPG"), MediaType::Image("image/jpeg".to_string()));
        assert_eq!(MediaType::detect(None, "archive.zip"), MediaType::Unknown);
    }

    #[test]
    fn test_chunk_inherits_document_owner() {
        let doc = Document::new("bob", "report.pdf", MediaType::Pdf);
        let chunk = Chunk::new(&doc, 0, "hello".to_string(), 0, 5);
        assert_eq!(chunk.user_id, doc.user_id);
        assert_eq!(chunk.document_id, doc.id);
        assert_eq!(chunk.status, ChunkStatus::Unindexed);
    }
}
