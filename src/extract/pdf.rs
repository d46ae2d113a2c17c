//! PDF text extraction with per-page OCR fallback
//!
//! Pages are extracted in page order with `lopdf`. A page with no text
//! layer is carved into a single-page PDF and sent through OCR. When
//! `lopdf` cannot parse the document at all, `pdf-extract` takes one
//! whole-document attempt before extraction fails.

use lopdf::Document as PdfDocument;

use super::ExtractedText;
use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::providers::ocr::OcrProvider;

/// Extract text from a PDF, page by page
pub async fn extract(
    filename: &str,
    data: &[u8],
    ocr: &dyn OcrProvider,
    config: &ExtractionConfig,
) -> Result<ExtractedText> {
    let doc = match PdfDocument::load_mem(data) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(
                "[{}] lopdf could not parse the document ({}), trying pdf-extract",
                filename,
                e
            );
            return extract_flat(filename, data);
        }
    };

    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(Error::extraction(filename, "PDF has no pages"));
    }

    let total_pages = page_numbers.len() as u32;
    let mut pages: Vec<String> = Vec::with_capacity(page_numbers.len());
    let mut ocr_pages = 0u32;

    for page_number in page_numbers {
        let page_text = doc
            .extract_text(&[page_number])
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        if !page_text.is_empty() {
            pages.push(page_text);
            continue;
        }

        // No text layer on this page. Rasterized scans land here.
        tracing::debug!("[{}] page {} has no text layer, sending to OCR", filename, page_number);
        let page_pdf = carve_page(&doc, page_number)
            .map_err(|e| Error::extraction(filename, format!("could not isolate page {}: {}", page_number, e)))?;
        let recognized = ocr
            .recognize(&page_pdf, "application/pdf", &config.ocr_language)
            .await?;
        let recognized = recognized.trim().to_string();
        if !recognized.is_empty() {
            ocr_pages += 1;
        }
        pages.push(recognized);
    }

    if pages.iter().all(|p| p.is_empty()) {
        return Err(Error::extraction(
            filename,
            "no text could be extracted from any page, including OCR",
        ));
    }

    Ok(ExtractedText::from_pages(pages, total_pages, ocr_pages))
}

/// Whole-document fallback via pdf-extract
fn extract_flat(filename: &str, data: &[u8]) -> Result<ExtractedText> {
    let content = pdf_extract::extract_text_from_mem(data)
        .map_err(|e| Error::extraction(filename, format!("PDF parsing failed: {}", e)))?;
    let content = content.trim().to_string();
    if content.is_empty() {
        return Err(Error::extraction(filename, "PDF has no extractable text"));
    }
    Ok(ExtractedText::single_page(content, false))
}

/// Produce a single-page PDF containing only the given page
fn carve_page(doc: &PdfDocument, page_number: u32) -> std::result::Result<Vec<u8>, lopdf::Error> {
    let mut single = doc.clone();
    let others: Vec<u32> = single
        .get_pages()
        .keys()
        .copied()
        .filter(|&n| n != page_number)
        .collect();
    single.delete_pages(&others);
    single.prune_objects();

    let mut buffer = Vec::new();
    single.save_to(&mut buffer)?;
    Ok(buffer)
}
