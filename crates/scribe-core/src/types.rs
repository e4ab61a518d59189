use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Speaker of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Kind of content carried by an upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Speech recordings, transcribed by the backend.
    Audio,
    /// Pictures and scans, run through OCR by the backend.
    Image,
    /// Documents (.txt, .md, .pdf, .docx), chunked and indexed by the backend.
    Text,
}

impl ContentKind {
    /// File extensions accepted for this kind, lowercase without the dot.
    pub fn accepted_extensions(&self) -> &'static [&'static str] {
        match self {
            ContentKind::Audio => &["mp3", "wav", "webm", "ogg", "m4a"],
            ContentKind::Image => &["png", "jpg", "jpeg"],
            ContentKind::Text => &["txt", "md", "pdf", "docx"],
        }
    }

    /// Infer the content kind from a file extension.
    pub fn from_path(path: &Path) -> Option<ContentKind> {
        let ext = extension_of(path)?;
        [ContentKind::Audio, ContentKind::Image, ContentKind::Text]
            .into_iter()
            .find(|kind| kind.accepts_extension(&ext))
    }

    /// Whether a file with this path may be uploaded as this kind.
    pub fn accepts(&self, path: &Path) -> bool {
        extension_of(path)
            .map(|ext| self.accepts_extension(&ext))
            .unwrap_or(false)
    }

    fn accepts_extension(&self, ext: &str) -> bool {
        self.accepted_extensions().contains(&ext)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Audio => write!(f, "audio"),
            ContentKind::Image => write!(f, "image"),
            ContentKind::Text => write!(f, "text"),
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Kind of ingestion job shown in the processing log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Audio,
    Image,
    Text,
    /// Backend-driven bulk ingestion of the knowledge folder.
    FolderScan,
}

impl From<ContentKind> for JobKind {
    fn from(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Audio => JobKind::Audio,
            ContentKind::Image => JobKind::Image,
            ContentKind::Text => JobKind::Text,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Audio => write!(f, "audio"),
            JobKind::Image => write!(f, "image"),
            JobKind::Text => write!(f, "text"),
            JobKind::FolderScan => write!(f, "folder-scan"),
        }
    }
}

/// Status of an ingestion job.
///
/// Valid transitions:
/// - Processing -> Success
/// - Processing -> Error
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Success,
    Error,
}

impl JobStatus {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &JobStatus) -> bool {
        matches!(
            (self, target),
            (JobStatus::Processing, JobStatus::Success) | (JobStatus::Processing, JobStatus::Error)
        )
    }

    /// Whether the job has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Success => write!(f, "success"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Structs
// =============================================================================

/// One conversation turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Monotonically increasing within a session, starting at 1.
    pub id: u64,
    pub role: Role,
    pub content: String,
    /// Retrieval citations, present only on answers the backend produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    pub timestamp: DateTime<Utc>,
    /// The user text this answer responds to. Absent on user turns and on
    /// synthetic error notices, which makes those ineligible for feedback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl Message {
    pub fn user(id: u64, content: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::User,
            content: content.into(),
            sources: None,
            timestamp: Utc::now(),
            query: None,
        }
    }

    /// An answer produced by the backend for `query`.
    pub fn answer(
        id: u64,
        content: impl Into<String>,
        sources: Vec<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: content.into(),
            sources: Some(sources),
            timestamp: Utc::now(),
            query: Some(query.into()),
        }
    }

    /// A synthetic assistant notice with no query back-reference.
    pub fn notice(id: u64, content: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: content.into(),
            sources: None,
            timestamp: Utc::now(),
            query: None,
        }
    }

    /// Whether a correction may be submitted against this message.
    pub fn accepts_feedback(&self) -> bool {
        self.role == Role::Assistant && self.query.is_some()
    }
}

/// Stable identifier of an ingestion job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observable status of one ingestion job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessingLogEntry {
    pub id: JobId,
    #[serde(rename = "type")]
    pub kind: JobKind,
    /// Display label only; updates are keyed by `id`.
    pub filename: String,
    pub status: JobStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProcessingLogEntry {
    /// Create a new in-flight entry.
    pub fn processing(
        id: JobId,
        kind: JobKind,
        filename: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id,
            kind,
            filename: filename.into(),
            status: JobStatus::Processing,
            message: message.into(),
            timestamp: Utc::now(),
            finished_at: None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
