//! Response bodies of the knowledge service.
//!
//! Unknown fields are ignored and missing optional fields decode as absent,
//! so minor backend additions do not break the client.

use serde::{Deserialize, Deserializer, Serialize};

/// Response from POST /chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    /// Retrieval context the answer was grounded on.
    #[serde(default, deserialize_with = "null_as_default")]
    pub context_used: Vec<String>,
}

/// Response from POST /ingest/audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioIngestResponse {
    pub status: String,
    /// Leading slice of the transcript.
    #[serde(default)]
    pub text_snippet: Option<String>,
}

/// Response from POST /ingest/image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageIngestResponse {
    pub status: String,
    /// Leading slice of the OCR output.
    #[serde(default)]
    pub extracted_text: Option<String>,
}

/// Response from POST /ingest/text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextIngestResponse {
    pub status: String,
    #[serde(default)]
    pub chunks_created: u64,
    #[serde(default)]
    pub text_snippet: Option<String>,
}

/// Response from POST /ingest/scan
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScanResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub files_processed: u64,
    #[serde(default)]
    pub files: Option<Vec<String>>,
    #[serde(default)]
    pub message: Option<String>,
    /// Files the backend found but could not index.
    #[serde(default)]
    pub errors: Option<Vec<ScanFileError>>,
}

/// One file the folder scan failed on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFileError {
    pub file: String,
    pub error: String,
}

/// Response from POST /feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// FastAPI-style error body: `{"detail": ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: serde_json::Value,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
