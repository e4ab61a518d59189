//! HTTP client for the knowledge service.
//!
//! Every endpoint takes a multipart form and answers with JSON. Failures of
//! any kind surface as `ScribeError::RequestFailed`; nothing is retried here.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use scribe_core::config::BackendConfig;
use scribe_core::error::{Result, ScribeError};

use crate::service::{KnowledgeService, UploadFile};
use crate::wire::{
    AudioIngestResponse, ChatResponse, ErrorBody, FeedbackResponse, ImageIngestResponse,
    ScanResponse, TextIngestResponse,
};

/// reqwest-backed implementation of [`KnowledgeService`].
#[derive(Debug, Clone)]
pub struct KnowledgeServiceClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl KnowledgeServiceClient {
    /// Create a client from backend settings.
    ///
    /// Returns a `Config` error if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ScribeError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// Base URL requests are sent to, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn upload<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        file: &UploadFile,
    ) -> Result<T> {
        let part = Part::stream(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| {
                ScribeError::request_failed(
                    None,
                    format!("{} failed: invalid MIME type {}: {}", operation, file.mime_type, e),
                )
            })?;
        let form = Form::new().part("file", part);

        debug!(
            operation,
            filename = %file.filename,
            bytes = file.len(),
            "Uploading file"
        );
        self.send(operation, self.http_client.post(self.url(path)).multipart(form))
            .await
    }

    /// Send a request and decode its JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = request.send().await.map_err(|e| transport_error(operation, e))?;
        let response = check_status(operation, response).await?;

        response.json::<T>().await.map_err(|e| {
            ScribeError::request_failed(
                None,
                format!("{} failed: malformed response: {}", operation, e),
            )
        })
    }
}

impl KnowledgeService for KnowledgeServiceClient {
    async fn chat(&self, query: &str) -> Result<ChatResponse> {
        let form = Form::new().text("query", query.to_string());
        self.send("Chat", self.http_client.post(self.url("/chat")).multipart(form))
            .await
    }

    async fn ingest_audio(&self, file: &UploadFile) -> Result<AudioIngestResponse> {
        self.upload("Audio ingestion", "/ingest/audio", file).await
    }

    async fn ingest_image(&self, file: &UploadFile) -> Result<ImageIngestResponse> {
        self.upload("Image ingestion", "/ingest/image", file).await
    }

    async fn ingest_text(&self, file: &UploadFile) -> Result<TextIngestResponse> {
        self.upload("Text ingestion", "/ingest/text", file).await
    }

    async fn scan_folder(&self) -> Result<ScanResponse> {
        self.send("Folder scan", self.http_client.post(self.url("/ingest/scan")))
            .await
    }

    async fn submit_feedback(
        &self,
        original_query: &str,
        correct_answer: &str,
    ) -> Result<FeedbackResponse> {
        let form = Form::new()
            .text("original_query", original_query.to_string())
            .text("correct_answer", correct_answer.to_string());
        self.send(
            "Feedback",
            self.http_client.post(self.url("/feedback")).multipart(form),
        )
        .await
    }

    async fn health(&self) -> bool {
        match self.http_client.get(self.url("/")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Health check failed: {}", e);
                false
            }
        }
    }
}

fn transport_error(operation: &str, err: reqwest::Error) -> ScribeError {
    let message = if err.is_timeout() {
        format!("{} failed: request timed out", operation)
    } else if err.is_connect() {
        format!("{} failed: could not connect to backend: {}", operation, err)
    } else {
        format!("{} failed: {}", operation, err)
    };
    warn!("{}", message);
    ScribeError::request_failed(None, message)
}

async fn check_status(operation: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let reason = status.canonical_reason().unwrap_or("Unknown status");
    let message = match extract_detail(&body) {
        Some(detail) => format!("{} failed: {} - {}", operation, reason, detail),
        None if body.trim().is_empty() => format!("{} failed: {}", operation, reason),
        None => format!("{} failed: {} - {}", operation, reason, body.trim()),
    };
    warn!(status = status.as_u16(), "{}", message);
    Err(ScribeError::request_failed(Some(status.as_u16()), message))
}

/// Pull the `detail` field out of a FastAPI error body.
fn extract_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = BackendConfig {
            base_url: "http://localhost:8000/".to_string(),
            ..BackendConfig::default()
        };
        let client = KnowledgeServiceClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/chat"), "http://localhost:8000/chat");
    }

    #[test]
    fn test_extract_detail_string() {
        assert_eq!(
            extract_detail(r#"{"detail":"OCR engine crashed"}"#),
            Some("OCR engine crashed".to_string())
        );
    }

    #[test]
    fn test_extract_detail_structured() {
        let body = r#"{"detail":[{"loc":["body","query"],"msg":"field required"}]}"#;
        let detail = extract_detail(body).unwrap();
        assert!(detail.contains("field required"));
    }

    #[test]
    fn test_extract_detail_absent() {
        assert_eq!(extract_detail(r#"{"error":"nope"}"#), None);
        assert_eq!(extract_detail("Internal Server Error"), None);
        assert_eq!(extract_detail(""), None);
    }
}
