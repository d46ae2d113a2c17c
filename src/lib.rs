//! corpus-rag: per-user document ingestion and retrieval with grounded answers
//!
//! Uploaded documents (plain text, PDFs, scanned images) are extracted,
//! chunked, embedded, and indexed into a per-user partition of a vector
//! store. Questions are answered by retrieving the most similar chunks
//! and composing a bounded, citation-carrying prompt for a language
//! model. The OCR engine, the embedding model, the language model, and
//! the vector store are external capabilities consumed through traits.

pub mod chunker;
pub mod config;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use types::{
    document::{Chunk, Document, IngestStatus, MediaType},
    query::QueryRequest,
    response::{CitedChunk, QueryResponse},
};
