//! External capability abstractions
//!
//! The OCR engine, the embedding model, and the language model are
//! external services. These traits carry their request/response
//! contracts; the clients here speak to an OCR HTTP service and to
//! Ollama.

pub mod embedding;
pub mod http_ocr;
pub mod llm;
pub mod ocr;
pub mod ollama;

pub use embedding::EmbeddingProvider;
pub use http_ocr::HttpOcr;
pub use llm::LlmProvider;
pub use ocr::OcrProvider;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};
