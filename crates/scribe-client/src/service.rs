use std::future::Future;

use bytes::Bytes;

use scribe_core::error::Result;
use scribe_core::types::ContentKind;

use crate::wire::{
    AudioIngestResponse, ChatResponse, FeedbackResponse, ImageIngestResponse, ScanResponse,
    TextIngestResponse,
};

// =============================================================================
// Upload payload
// =============================================================================

/// A file queued for ingestion.
///
/// The payload is an immutable, cheaply cloneable byte blob; the uploader
/// never holds a reference into the producer's buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub filename: String,
    pub kind: ContentKind,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(
        filename: impl Into<String>,
        kind: ContentKind,
        mime_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            kind,
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// =============================================================================
// Trait
// =============================================================================

/// Request/response access to the knowledge service.
///
/// Implementations translate shapes only; they never retry. Every failure
/// (network, timeout, non-2xx, malformed body) is reported as
/// `ScribeError::RequestFailed`.
pub trait KnowledgeService: Send + Sync {
    /// Ask a question against the knowledge base.
    fn chat(&self, query: &str) -> impl Future<Output = Result<ChatResponse>> + Send;

    /// Upload an audio file for transcription and indexing.
    fn ingest_audio(
        &self,
        file: &UploadFile,
    ) -> impl Future<Output = Result<AudioIngestResponse>> + Send;

    /// Upload an image for OCR and indexing.
    fn ingest_image(
        &self,
        file: &UploadFile,
    ) -> impl Future<Output = Result<ImageIngestResponse>> + Send;

    /// Upload a document for chunking and indexing.
    fn ingest_text(
        &self,
        file: &UploadFile,
    ) -> impl Future<Output = Result<TextIngestResponse>> + Send;

    /// Trigger a backend-side scan of the knowledge folder.
    fn scan_folder(&self) -> impl Future<Output = Result<ScanResponse>> + Send;

    /// Submit a correction for a previous answer.
    fn submit_feedback(
        &self,
        original_query: &str,
        correct_answer: &str,
    ) -> impl Future<Output = Result<FeedbackResponse>> + Send;

    /// Whether the backend answers at all. Never fails.
    fn health(&self) -> impl Future<Output = bool> + Send;
}
