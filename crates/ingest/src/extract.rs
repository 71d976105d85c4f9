//! Adapter over the external agentic document-analysis service.
//!
//! One call per page PDF; the service returns an ordered chunk list which is
//! joined with the page metadata into self-describing extraction records.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use captura_core::config::ExtractorConfig;
use captura_core::{ExtractedChunk, PageMeta, RawExtractionRecord};

use crate::html;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("extraction API error: {status} — {body}")]
    Api { status: u16, body: String },

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("extractor not configured: {0}")]
    NotConfigured(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Seam for the external extraction capability: HTTP in production, a stub
/// in tests.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Extract the ordered content chunks of one per-page PDF.
    async fn parse_page(&self, path: &Path) -> Result<Vec<ExtractedChunk>, ExtractError>;
}

/// HTTP backend for the agentic document-analysis API.
pub struct AgenticExtractor {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AgenticExtractor {
    pub fn from_config(config: &ExtractorConfig) -> Result<Self, ExtractError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ExtractError::NotConfigured("EXTRACTOR_API_KEY not set".into()))?;
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs as u64))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Deserialize)]
struct ParseResponse {
    data: ParseData,
}

#[derive(Deserialize)]
struct ParseData {
    chunks: Vec<ChunkPayload>,
}

#[derive(Deserialize)]
struct ChunkPayload {
    chunk_id: Option<String>,
    chunk_type: captura_core::ChunkType,
    text: String,
}

#[async_trait]
impl DocumentExtractor for AgenticExtractor {
    async fn parse_page(&self, path: &Path) -> Result<Vec<ExtractedChunk>, ExtractError> {
        let url = format!("{}/v1/tools/agentic-document-analysis", self.base_url);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "page.pdf".to_string());

        let bytes = tokio::fs::read(path).await?;
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = multipart::Form::new()
            .part("pdf", part)
            .text("include_marginalia", "true")
            .text("include_metadata_in_markdown", "true");

        debug!("extraction request to {} for {}", url, path.display());

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Api { status, body });
        }

        let parsed: ParseResponse = response.json().await?;
        Ok(parsed
            .data
            .chunks
            .into_iter()
            .map(|c| ExtractedChunk {
                chunk_id: c.chunk_id,
                chunk_type: c.chunk_type,
                text: c.text,
            })
            .collect())
    }
}

/// Join chunks with their page metadata into one record per chunk, ordinals
/// 1-based in extraction order. Metadata is copied onto every record. An
/// empty chunk list fails; no artifact should be written for it.
pub fn build_records(
    chunks: Vec<ExtractedChunk>,
    meta: &PageMeta,
) -> Result<Vec<RawExtractionRecord>, ExtractError> {
    if chunks.is_empty() {
        return Err(ExtractError::ExtractionFailed(format!(
            "no chunks extracted from {} page {}",
            meta.name_file, meta.page
        )));
    }

    Ok(chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| RawExtractionRecord {
            chunk_id: chunk.chunk_id.unwrap_or_default(),
            chunk: (i + 1) as u32,
            chunk_type: chunk.chunk_type.to_string(),
            clean_text: html::clean_text(chunk.chunk_type, &chunk.text),
            text_html: chunk.text,
            meta: meta.clone(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use captura_core::ChunkType;

    fn meta() -> PageMeta {
        PageMeta {
            name_file: "covalca_3.pdf".into(),
            url_file: "https://files.example.com/covalca_3.pdf".into(),
            page: 16,
            active: "1".into(),
            capture_log: "2026-08-06 12:00:00".into(),
            subject_mail: "captura".into(),
        }
    }

    #[test]
    fn records_carry_full_metadata_and_ordinals() {
        let chunks = vec![
            ExtractedChunk {
                chunk_id: Some("c1".into()),
                chunk_type: ChunkType::Text,
                text: "Invoice 42".into(),
            },
            ExtractedChunk {
                chunk_id: None,
                chunk_type: ChunkType::Table,
                text: "<table><tr><td>a</td><td>b</td></tr></table>".into(),
            },
        ];

        let records = build_records(chunks, &meta()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].chunk, 1);
        assert_eq!(records[1].chunk, 2);
        assert_eq!(records[0].clean_text, "Invoice 42");
        assert_eq!(records[1].clean_text, r#"[("a", "b")]"#);
        for r in &records {
            assert_eq!(r.meta.page, 16);
            assert_eq!(r.meta.name_file, "covalca_3.pdf");
        }
    }

    #[test]
    fn empty_chunk_list_is_a_failure() {
        let err = build_records(Vec::new(), &meta()).unwrap_err();
        assert!(matches!(err, ExtractError::ExtractionFailed(_)));
    }
}
