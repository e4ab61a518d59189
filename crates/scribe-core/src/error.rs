use thiserror::Error;

/// Top-level error type for the OmniScribe client.
///
/// The first four variants form the user-facing taxonomy that every
/// orchestrator converts into visible status (a log entry, a chat message,
/// or an inline form error). The rest cover setup concerns such as loading
/// configuration or opening an audio device.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScribeError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("{}", format_request_failure(.status, .message))]
    RequestFailed {
        /// HTTP status code, absent for network failures and timeouts.
        status: Option<u16>,
        message: String,
    },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ScribeError {
    /// Build a `RequestFailed` error.
    pub fn request_failed(status: Option<u16>, message: impl Into<String>) -> Self {
        ScribeError::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by a `RequestFailed` error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ScribeError::RequestFailed { status, .. } => *status,
            _ => None,
        }
    }
}

fn format_request_failure(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Request failed ({}): {}", code, message),
        None => format!("Request failed: {}", message),
    }
}

impl From<toml::de::Error> for ScribeError {
    fn from(err: toml::de::Error) -> Self {
        ScribeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ScribeError {
    fn from(err: toml::ser::Error) -> Self {
        ScribeError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ScribeError {
    fn from(err: serde_json::Error) -> Self {
        ScribeError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for OmniScribe operations.
pub type Result<T> = std::result::Result<T, ScribeError>;
