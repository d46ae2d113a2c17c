//! Text extraction from uploaded files
//!
//! Dispatch is by declared media type: text-like inputs are decoded
//! directly, PDFs are extracted page by page with OCR for pages that
//! have no text layer, and raster images go straight to OCR. The
//! extractor returns plain text and writes no state.

mod pdf;
mod text;

use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::providers::ocr::OcrProvider;
use crate::types::MediaType;

/// Plain text extracted from an uploaded file
#[derive(Debug, Clone)]
pub struct ExtractedText {
    /// The full extracted text, pages concatenated in page order
    pub content: String,
    /// Hash of the extracted text
    pub content_hash: String,
    /// Total pages, 1 for non-paginated inputs
    pub total_pages: u32,
    /// How many pages went through OCR
    pub ocr_pages: u32,
}

impl ExtractedText {
    /// Build from a single body of text
    pub fn single_page(content: String, via_ocr: bool) -> Self {
        Self {
            content_hash: hash_content(&content),
            total_pages: 1,
            ocr_pages: if via_ocr { 1 } else { 0 },
            content,
        }
    }

    /// Build from per-page text, joining non-empty pages in page order
    pub fn from_pages(pages: Vec<String>, total_pages: u32, ocr_pages: u32) -> Self {
        let content = pages
            .iter()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n\n");
        Self {
            content_hash: hash_content(&content),
            total_pages,
            ocr_pages,
            content,
        }
    }
}

/// Converts raw uploaded bytes into plain text
pub struct Extractor {
    ocr: Arc<dyn OcrProvider>,
    config: ExtractionConfig,
}

impl Extractor {
    /// Create a new extractor
    pub fn new(ocr: Arc<dyn OcrProvider>, config: ExtractionConfig) -> Self {
        Self { ocr, config }
    }

    /// Extract plain text from a file.
    ///
    /// Fails with `UnsupportedFormat` for media types we cannot ingest
    /// and with an extraction error when nothing usable comes out,
    /// including the case where OCR returns zero characters for every
    /// page. An empty document that looks successfully ingested is worse
    /// than a visible failure.
    pub async fn extract(
        &self,
        filename: &str,
        data: &[u8],
        media_type: &MediaType,
    ) -> Result<ExtractedText> {
        let extracted = match media_type {
            MediaType::Text | MediaType::Markdown | MediaType::Csv => {
                ExtractedText::single_page(text::decode(data), false)
            }
            MediaType::Pdf => {
                pdf::extract(filename, data, self.ocr.as_ref(), &self.config).await?
            }
            MediaType::Image(mime) => {
                let recognized = self
                    .ocr
                    .recognize(data, mime, &self.config.ocr_language)
                    .await?;
                ExtractedText::single_page(recognized.trim().to_string(), true)
            }
            MediaType::Unknown => {
                return Err(Error::UnsupportedFormat(filename.to_string()));
            }
        };

        if extracted.content.trim().is_empty() {
            return Err(Error::extraction(filename, "no text could be extracted"));
        }

        tracing::debug!(
            "[{}] extracted {} chars from {} page(s), {} via OCR",
            filename,
            extracted.content.len(),
            extracted.total_pages,
            extracted.ocr_pages
        );

        Ok(extracted)
    }
}

/// Hash extracted text for re-ingestion bookkeeping
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedOcr(String);

    #[async_trait]
    impl OcrProvider for FixedOcr {
        async fn recognize(&self, _data: &[u8], _mime: &str, _language: &str) -> Result<String> {
            Ok(self.0.clone())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn extractor(ocr_text: &str) -> Extractor {
        Extractor::new(
            Arc::new(FixedOcr(ocr_text.to_string())),
            ExtractionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_text_passes_through() {
        let result = extractor("")
            .extract("notes.txt", b"hello world", &MediaType::Text)
            .await
            .unwrap();
        assert_eq!(result.content, "hello world");
        assert_eq!(result.total_pages, 1);
        assert_eq!(result.ocr_pages, 0);
    }

    #[tokio::test]
    async fn test_image_goes_through_ocr_and_is_trimmed() {
        let result = extractor("  recognized text \n")
            .extract(
                "scan.png",
                &[0x89, 0x50, 0x4e, 0x47],
                &MediaType::Image("image/png".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(result.content, "recognized text");
        assert_eq!(result.ocr_pages, 1);
    }

    #[tokio::test]
    async fn test_empty_ocr_is_a_failure_not_an_empty_document() {
        let err = extractor("   ")
            .extract(
                "blank.tif",
                &[0x49, 0x49],
                &MediaType::Image("image/tiff".to_string()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }

    #[tokio::test]
    async fn test_unknown_media_type_is_rejected() {
        let err = extractor("")
            .extract("data.bin", b"\x00\x01", &MediaType::Unknown)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash_content("abc"), hash_content("abc"));
        assert_ne!(hash_content("abc"), hash_content("abd"));
    }
}
