//! Ingestion orchestrator.
//!
//! Sends files to the knowledge service strictly one at a time and mirrors
//! every upload as a job in the processing log. Errors never escape a batch:
//! each one becomes an `error` entry and the next file proceeds.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info, warn};

use scribe_audio::{Microphone, RecordingCapture};
use scribe_client::{KnowledgeService, ScanResponse, UploadFile};
use scribe_core::config::IngestConfig;
use scribe_core::error::{Result, ScribeError};
use scribe_core::types::{ContentKind, JobKind, JobStatus, ProcessingLogEntry};

use crate::jobs::JobTable;

const SCAN_LABEL: &str = "knowledge folder";

/// Drives uploads and folder scans against a [`KnowledgeService`].
pub struct IngestionOrchestrator<S: KnowledgeService> {
    service: Arc<S>,
    jobs: Mutex<JobTable>,
    /// Serializes every backend call made by this orchestrator.
    upload_lane: tokio::sync::Mutex<()>,
}

impl<S: KnowledgeService> IngestionOrchestrator<S> {
    pub fn new(service: Arc<S>, config: &IngestConfig) -> Self {
        Self::with_capacity(service, config.log_capacity)
    }

    pub fn with_capacity(service: Arc<S>, log_capacity: usize) -> Self {
        Self {
            service,
            jobs: Mutex::new(JobTable::new(log_capacity)),
            upload_lane: tokio::sync::Mutex::new(()),
        }
    }

    /// Upload a single file.
    pub async fn ingest(&self, file: UploadFile) -> ProcessingLogEntry {
        let _lane = self.upload_lane.lock().await;
        self.upload(file).await
    }

    /// Upload files in order, each finishing before the next starts.
    ///
    /// Returns the settled entry of every file, in submission order.
    pub async fn ingest_batch(&self, files: Vec<UploadFile>) -> Vec<ProcessingLogEntry> {
        let _lane = self.upload_lane.lock().await;
        info!(count = files.len(), "Batch ingestion started");

        let mut settled = Vec::with_capacity(files.len());
        for file in files {
            settled.push(self.upload(file).await);
        }

        let failed = settled
            .iter()
            .filter(|e| e.status == JobStatus::Error)
            .count();
        info!(count = settled.len(), failed, "Batch ingestion finished");
        settled
    }

    /// Ask the backend to index its knowledge folder.
    ///
    /// The entry only succeeds if at least one file was processed.
    pub async fn scan_folder(&self) -> ProcessingLogEntry {
        let _lane = self.upload_lane.lock().await;
        let pending = self.create(
            JobKind::FolderScan,
            SCAN_LABEL,
            "Scanning knowledge folder...",
        );

        let outcome = match self.service.scan_folder().await {
            Ok(resp) => summarize_scan(resp),
            Err(e) => Err(e.to_string()),
        };
        self.settle(pending, outcome)
    }

    /// Upload the clip held by `capture` as audio.
    ///
    /// Uses `filename` or `recording_<unix-ms>.<ext>`. The capture is released
    /// only if the upload succeeds, so a failed clip can be retried.
    pub async fn ingest_recording<M: Microphone>(
        &self,
        capture: &RecordingCapture<M>,
        filename: Option<String>,
    ) -> Result<ProcessingLogEntry> {
        let clip = capture.clip().await?;
        if clip.is_empty() {
            return Err(ScribeError::ValidationFailed(
                "Recording is empty; nothing to upload".to_string(),
            ));
        }

        let filename = filename.unwrap_or_else(|| {
            format!("recording_{}.{}", Utc::now().timestamp_millis(), clip.extension)
        });
        let file = UploadFile::new(
            filename,
            ContentKind::Audio,
            clip.mime_type.clone(),
            clip.bytes.clone(),
        );

        let entry = self.ingest(file).await;
        if entry.status == JobStatus::Success {
            capture.mark_uploaded(clip.id).await;
        }
        Ok(entry)
    }

    /// Snapshot of the processing log, newest first.
    pub fn log(&self) -> Vec<ProcessingLogEntry> {
        self.jobs().snapshot()
    }

    /// Upload one file. Callers must hold the upload lane.
    async fn upload(&self, file: UploadFile) -> ProcessingLogEntry {
        let pending = self.create(file.kind.into(), &file.filename, placeholder(file.kind));
        info!(
            job_id = %pending.id,
            filename = %file.filename,
            kind = %file.kind,
            bytes = file.len(),
            "Upload started"
        );

        let outcome = match file.kind {
            ContentKind::Audio => self.service.ingest_audio(&file).await.map(|r| {
                non_empty(r.text_snippet).unwrap_or_else(|| "Transcription complete!".to_string())
            }),
            ContentKind::Image => self.service.ingest_image(&file).await.map(|r| {
                non_empty(r.extracted_text)
                    .unwrap_or_else(|| "Text extraction complete!".to_string())
            }),
            ContentKind::Text => self.service.ingest_text(&file).await.map(|r| {
                let indexed = format!("Indexed {} chunk(s)", r.chunks_created);
                match non_empty(r.text_snippet) {
                    Some(snippet) => format!("{}: {}", indexed, snippet),
                    None => indexed,
                }
            }),
        };

        self.settle(pending, outcome.map_err(|e| e.to_string()))
    }

    fn create(&self, kind: JobKind, filename: &str, message: &str) -> ProcessingLogEntry {
        let mut jobs = self.jobs();
        let id = jobs.create(kind, filename, message);
        jobs.get(id)
            .cloned()
            .unwrap_or_else(|| ProcessingLogEntry::processing(id, kind, filename, message))
    }

    fn settle(
        &self,
        pending: ProcessingLogEntry,
        outcome: std::result::Result<String, String>,
    ) -> ProcessingLogEntry {
        let id = pending.id;
        let (status, message) = match outcome {
            Ok(message) => {
                info!(job_id = %id, filename = %pending.filename, "Upload succeeded");
                (JobStatus::Success, message)
            }
            Err(message) => {
                warn!(job_id = %id, filename = %pending.filename, "Upload failed: {}", message);
                (JobStatus::Error, message)
            }
        };

        let result = {
            let mut jobs = self.jobs();
            match status {
                JobStatus::Success => jobs.resolve(id, message.clone()),
                _ => jobs.fail(id, message.clone()),
            }
        };

        match result {
            Ok(entry) => entry,
            Err(e) => {
                // Evicted before it finished; report the outcome anyway.
                debug!(job_id = %id, "Dropping late job update: {}", e);
                ProcessingLogEntry {
                    status,
                    message,
                    finished_at: Some(Utc::now()),
                    ..pending
                }
            }
        }
    }

    fn jobs(&self) -> MutexGuard<'_, JobTable> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn placeholder(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Audio => "Transcribing audio...",
        ContentKind::Image => "Extracting text from image...",
        ContentKind::Text => "Indexing document...",
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

fn summarize_scan(resp: ScanResponse) -> std::result::Result<String, String> {
    if resp.files_processed == 0 {
        return Err(
            non_empty(resp.message).unwrap_or_else(|| "No files were processed".to_string()),
        );
    }

    let mut message = format!("Processed {} file(s)", resp.files_processed);
    let files = resp.files.unwrap_or_default();
    if !files.is_empty() {
        message.push_str(": ");
        message.push_str(&files.join(", "));
    }
    let failed = resp.errors.map(|e| e.len()).unwrap_or(0);
    if failed > 0 {
        message.push_str(&format!(" ({} failed)", failed));
    }
    Ok(message)
}

// =============================================================================
// Tests
// =============================================================================
