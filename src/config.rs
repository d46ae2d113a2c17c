//! Configuration for the ingestion and retrieval pipeline

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Extraction and OCR configuration
    pub extraction: ExtractionConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// LLM configuration
    pub llm: LlmConfig,
    /// Vector store configuration
    pub vector_db: VectorDbConfig,
    /// Background processing configuration
    pub processing: ProcessingConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("invalid config file: {}", e)))
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024,
        }
    }
}

/// Extraction and OCR configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Base URL of the OCR service
    pub ocr_url: String,
    /// Language hint passed to the OCR engine
    pub ocr_language: String,
    /// Per-call OCR timeout in seconds
    pub ocr_timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_url: "http://localhost:8884".to_string(),
            ocr_language: "eng".to_string(),
            ocr_timeout_secs: 30,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub max_chunk_chars: usize,
    /// Overlap between consecutive chunks in characters.
    /// Clamped to half the chunk size at construction.
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 1000,
            overlap_chars: 200,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding dimensions (768 for nomic-embed-text)
    pub dimensions: usize,
    /// Number of chunks embedded per batch
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: 768,
            batch_size: 32,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Default number of chunks to retrieve
    pub top_k: usize,
    /// Minimum cosine similarity for a chunk to be returned (0.0-1.0)
    pub similarity_threshold: f32,
    /// Keep at most one of two adjacent chunks from the same document.
    /// Off by default: the neighbors of a strong hit usually carry the
    /// surrounding context an answer needs.
    pub dedupe_adjacent: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.25,
            dedupe_adjacent: false,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for transient failures
    pub max_retries: u32,
    /// Default context budget for answer composition, in characters
    pub max_context_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            generate_model: "llama3".to_string(),
            temperature: 0.3,
            timeout_secs: 120,
            max_retries: 1,
            max_context_chars: 8000,
        }
    }
}

/// Which index backend to run against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// Qdrant over its HTTP API
    #[default]
    Qdrant,
    /// In-process store for development and tests
    Memory,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Backend selection
    pub backend: IndexBackend,
    /// Qdrant base URL
    pub url: String,
    /// Prefix for per-user collection names
    pub collection_prefix: String,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Qdrant,
            url: "http://localhost:6333".to_string(),
            collection_prefix: "user_".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Background processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of documents ingested concurrently (default: CPU count, max 4)
    pub parallel_documents: Option<usize>,
    /// Budget for the whole extraction stage of one document, in seconds.
    /// Covers any OCR calls the stage makes.
    pub extraction_timeout_secs: u64,
    /// Budget per embedding batch, in seconds
    pub embed_timeout_secs: u64,
    /// Budget per index write, in seconds
    pub index_timeout_secs: u64,
    /// Bounded retries for transient stage failures
    pub max_retries: u32,
    /// Capacity of the ingestion queue
    pub queue_capacity: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_documents: None,
            extraction_timeout_secs: 120,
            embed_timeout_secs: 60,
            index_timeout_secs: 30,
            max_retries: 1,
            queue_capacity: 256,
        }
    }
}
