//! Core types for documents, chunks, queries, and responses

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, ChunkStatus, Document, IngestStatus, MediaType};
pub use query::QueryRequest;
pub use response::{CitedChunk, DocumentStatusResponse, QueryResponse, UploadResponse};
