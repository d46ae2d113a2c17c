//! Error types for the ingestion and retrieval pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage a timeout is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extraction,
    Ocr,
    Embedding,
    Indexing,
    Retrieval,
    Generation,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Extraction => "extraction",
            Self::Ocr => "ocr",
            Self::Embedding => "embedding",
            Self::Indexing => "indexing",
            Self::Retrieval => "retrieval",
            Self::Generation => "generation",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the ingestion and retrieval pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration or request validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Declared media type (or extension) is not one we can ingest
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Text extraction produced nothing usable
    #[error("Failed to extract text from '{filename}': {message}")]
    Extraction { filename: String, message: String },

    /// OCR engine error
    #[error("OCR failed: {0}")]
    Ocr(String),

    /// Embedding generation failed
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Query embedding does not live in the index's embedding space
    #[error("Embedding dimensionality mismatch: got {actual}, index stores {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector store write or delete could not be confirmed
    #[error("Index write failed: {0}")]
    IndexWrite(String),

    /// Vector store query failed
    #[error("Index query failed: {0}")]
    IndexQuery(String),

    /// Language model call failed
    #[error("Answer generation failed: {0}")]
    Generation(String),

    /// An external call exceeded its per-call budget
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: Stage, secs: u64 },

    /// Document does not exist (or belongs to another user)
    #[error("Document not found: {0}")]
    DocumentNotFound(uuid::Uuid),

    /// Ingestion state machine violation
    #[error("Invalid ingestion state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an extraction error
    pub fn extraction(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create an index write error
    pub fn index_write(message: impl Into<String>) -> Self {
        Self::IndexWrite(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether a bounded retry with backoff is worth attempting.
    ///
    /// Only network-style failures qualify. Semantic failures (unsupported
    /// format, empty extraction, dimension mismatch) never do.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Http(_))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            Error::Config(msg) => (StatusCode::BAD_REQUEST, "config_error", msg.clone()),
            Error::UnsupportedFormat(what) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_format",
                format!("Unsupported format: {}", what),
            ),
            Error::Extraction { filename, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "extraction_error",
                format!("Failed to extract text from '{}': {}", filename, message),
            ),
            Error::Ocr(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "ocr_error", msg.clone()),
            Error::Embedding(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "embedding_error",
                msg.clone(),
            ),
            Error::DimensionMismatch { expected, actual } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "dimension_mismatch",
                format!(
                    "Embedding dimensionality mismatch: got {}, index stores {}",
                    actual, expected
                ),
            ),
            Error::IndexWrite(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "index_write_error",
                msg.clone(),
            ),
            Error::IndexQuery(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "index_query_error",
                msg.clone(),
            ),
            Error::Generation(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "generation_error",
                msg.clone(),
            ),
            Error::Timeout { stage, secs } => (
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                format!("{} timed out after {}s", stage, secs),
            ),
            Error::DocumentNotFound(id) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Document not found: {}", id),
            ),
            Error::InvalidTransition { from, to } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "invalid_transition",
                format!("Invalid ingestion state transition: {} -> {}", from, to),
            ),
            Error::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_error",
                err.to_string(),
            ),
            Error::Json(err) => (StatusCode::BAD_REQUEST, "json_error", err.to_string()),
            Error::Http(err) => (StatusCode::BAD_GATEWAY, "http_error", err.to_string()),
            Error::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
