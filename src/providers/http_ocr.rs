//! HTTP client for a tesseract-style OCR service

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};

use super::ocr::OcrProvider;

/// OCR over HTTP: multipart upload of the page bytes plus a language
/// hint, JSON text back.
pub struct HttpOcr {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct OcrResponse {
    text: String,
}

impl HttpOcr {
    /// Create a new OCR client
    pub fn new(config: &ExtractionConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.ocr_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.ocr_url.clone(),
        }
    }
}

#[async_trait]
impl OcrProvider for HttpOcr {
    async fn recognize(&self, data: &[u8], mime: &str, language: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name("page")
            .mime_str(mime)
            .map_err(|e| Error::Ocr(format!("invalid mime type '{}': {}", mime, e)))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("lang", language.to_string());

        let response = self
            .client
            .post(format!("{}/ocr", self.base_url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Ocr(format!("OCR service error ({}): {}", status, body)));
        }

        let ocr: OcrResponse = response
            .json()
            .await
            .map_err(|e| Error::Ocr(format!("invalid OCR response: {}", e)))?;

        Ok(ocr.text)
    }

    async fn health_check(&self) -> Result<bool> {
        match self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "http-ocr"
    }
}
