//! OCR provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Recognizes text in an image or single-page PDF.
///
/// Treated as fallible and possibly slow. Output is returned as the
/// engine produced it; callers trim but do not otherwise correct it.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Run OCR over one image or page
    async fn recognize(&self, data: &[u8], mime: &str, language: &str) -> Result<String>;

    /// Check if the engine is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
