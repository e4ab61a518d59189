//! Scripted in-memory knowledge service for tests and offline runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Semaphore;
use tracing::debug;

use scribe_core::error::{Result, ScribeError};

use crate::service::{KnowledgeService, UploadFile};
use crate::wire::{
    AudioIngestResponse, ChatResponse, FeedbackResponse, ImageIngestResponse, ScanResponse,
    TextIngestResponse,
};

/// A call observed by [`MockKnowledgeService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Chat { query: String },
    IngestAudio { filename: String },
    IngestImage { filename: String },
    IngestText { filename: String },
    ScanFolder,
    Feedback {
        original_query: String,
        correct_answer: String,
    },
    Health,
}

#[derive(Default)]
struct Script {
    chat: VecDeque<Result<ChatResponse>>,
    audio: VecDeque<Result<AudioIngestResponse>>,
    image: VecDeque<Result<ImageIngestResponse>>,
    text: VecDeque<Result<TextIngestResponse>>,
    scan: VecDeque<Result<ScanResponse>>,
    feedback: VecDeque<Result<FeedbackResponse>>,
    calls: Vec<RecordedCall>,
}

/// Knowledge service that replays queued replies.
///
/// Each operation pops its next scripted reply; when the queue is empty a
/// canned success is returned instead. Every call is recorded in order.
pub struct MockKnowledgeService {
    script: Mutex<Script>,
    healthy: Mutex<bool>,
    chat_gate: Option<Arc<Semaphore>>,
    upload_gate: Option<Arc<Semaphore>>,
}

impl Default for MockKnowledgeService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockKnowledgeService {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script::default()),
            healthy: Mutex::new(true),
            chat_gate: None,
            upload_gate: None,
        }
    }

    /// Hold every chat call until a permit is available on `gate`.
    ///
    /// The call is recorded before waiting, so tests can observe an
    /// in-flight request through [`call_count`](Self::call_count).
    pub fn with_chat_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.chat_gate = Some(gate);
        self
    }

    /// Hold every ingest call (audio, image, text) until a permit is
    /// available on `gate`. Recorded before waiting, like the chat gate.
    pub fn with_upload_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.upload_gate = Some(gate);
        self
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push_chat(&self, answer: impl Into<String>, context_used: Vec<String>) {
        self.script().chat.push_back(Ok(ChatResponse {
            answer: answer.into(),
            context_used,
        }));
    }

    pub fn fail_chat(&self, status: Option<u16>, message: impl Into<String>) {
        self.script()
            .chat
            .push_back(Err(ScribeError::request_failed(status, message)));
    }

    pub fn push_audio(&self, response: AudioIngestResponse) {
        self.script().audio.push_back(Ok(response));
    }

    pub fn fail_audio(&self, status: Option<u16>, message: impl Into<String>) {
        self.script()
            .audio
            .push_back(Err(ScribeError::request_failed(status, message)));
    }

    pub fn push_image(&self, response: ImageIngestResponse) {
        self.script().image.push_back(Ok(response));
    }

    pub fn fail_image(&self, status: Option<u16>, message: impl Into<String>) {
        self.script()
            .image
            .push_back(Err(ScribeError::request_failed(status, message)));
    }

    pub fn push_text(&self, response: TextIngestResponse) {
        self.script().text.push_back(Ok(response));
    }

    pub fn fail_text(&self, status: Option<u16>, message: impl Into<String>) {
        self.script()
            .text
            .push_back(Err(ScribeError::request_failed(status, message)));
    }

    pub fn push_scan(&self, response: ScanResponse) {
        self.script().scan.push_back(Ok(response));
    }

    pub fn fail_scan(&self, status: Option<u16>, message: impl Into<String>) {
        self.script()
            .scan
            .push_back(Err(ScribeError::request_failed(status, message)));
    }

    pub fn push_feedback(&self, response: FeedbackResponse) {
        self.script().feedback.push_back(Ok(response));
    }

    pub fn fail_feedback(&self, status: Option<u16>, message: impl Into<String>) {
        self.script()
            .feedback
            .push_back(Err(ScribeError::request_failed(status, message)));
    }

    pub fn set_healthy(&self, healthy: bool) {
        *self.healthy.lock().unwrap_or_else(|e| e.into_inner()) = healthy;
    }

    /// All calls received so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.script().calls.len()
    }

    fn record(&self, call: RecordedCall) {
        debug!(?call, "Mock knowledge service call");
        self.script().calls.push(call);
    }
}

async fn pass_gate(gate: Option<&Semaphore>, operation: &str) -> Result<()> {
    if let Some(gate) = gate {
        let permit = gate.acquire().await.map_err(|_| {
            ScribeError::request_failed(None, format!("{} failed: gate closed", operation))
        })?;
        permit.forget();
    }
    Ok(())
}

impl KnowledgeService for MockKnowledgeService {
    async fn chat(&self, query: &str) -> Result<ChatResponse> {
        self.record(RecordedCall::Chat {
            query: query.to_string(),
        });
        pass_gate(self.chat_gate.as_deref(), "Chat").await?;
        let next = self.script().chat.pop_front();
        next.unwrap_or_else(|| {
            Ok(ChatResponse {
                answer: format!("mock answer to: {}", query),
                context_used: Vec::new(),
            })
        })
    }

    async fn ingest_audio(&self, file: &UploadFile) -> Result<AudioIngestResponse> {
        self.record(RecordedCall::IngestAudio {
            filename: file.filename.clone(),
        });
        pass_gate(self.upload_gate.as_deref(), "Audio ingestion").await?;
        let next = self.script().audio.pop_front();
        next.unwrap_or_else(|| {
            Ok(AudioIngestResponse {
                status: "success".to_string(),
                text_snippet: Some("[mock transcript]".to_string()),
            })
        })
    }

    async fn ingest_image(&self, file: &UploadFile) -> Result<ImageIngestResponse> {
        self.record(RecordedCall::IngestImage {
            filename: file.filename.clone(),
        });
        pass_gate(self.upload_gate.as_deref(), "Image ingestion").await?;
        let next = self.script().image.pop_front();
        next.unwrap_or_else(|| {
            Ok(ImageIngestResponse {
                status: "success".to_string(),
                extracted_text: Some("[mock extracted text]".to_string()),
            })
        })
    }

    async fn ingest_text(&self, file: &UploadFile) -> Result<TextIngestResponse> {
        self.record(RecordedCall::IngestText {
            filename: file.filename.clone(),
        });
        pass_gate(self.upload_gate.as_deref(), "Text ingestion").await?;
        let next = self.script().text.pop_front();
        next.unwrap_or_else(|| {
            Ok(TextIngestResponse {
                status: "success".to_string(),
                chunks_created: 1,
                text_snippet: None,
            })
        })
    }

    async fn scan_folder(&self) -> Result<ScanResponse> {
        self.record(RecordedCall::ScanFolder);
        let next = self.script().scan.pop_front();
        next.unwrap_or_else(|| {
            Ok(ScanResponse {
                status: Some("empty".to_string()),
                message: Some("No document files found in knowledge folder".to_string()),
                ..ScanResponse::default()
            })
        })
    }

    async fn submit_feedback(
        &self,
        original_query: &str,
        correct_answer: &str,
    ) -> Result<FeedbackResponse> {
        self.record(RecordedCall::Feedback {
            original_query: original_query.to_string(),
            correct_answer: correct_answer.to_string(),
        });
        let next = self.script().feedback.pop_front();
        next.unwrap_or_else(|| {
            Ok(FeedbackResponse {
                status: "learned".to_string(),
                message: "Correction stored".to_string(),
            })
        })
    }

    async fn health(&self) -> bool {
        self.record(RecordedCall::Health);
        *self.healthy.lock().unwrap_or_else(|e| e.into_inner())
    }
}
