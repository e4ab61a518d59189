//! Scribe Audio crate - microphone capture sessions for voice notes.
//!
//! Provides the `Microphone`/`CaptureStream` seam, the `RecordingCapture`
//! session state machine built on it, and a mock microphone for testing
//! without real audio hardware. A cpal-backed microphone is available behind
//! the `cpal` feature.

pub mod cpal_microphone;
pub mod recorder;
pub mod state;
pub mod wav;

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use scribe_core::error::{Result, ScribeError};

pub use cpal_microphone::CpalMicrophone;
pub use recorder::{RecordedClip, RecordingCapture};
pub use state::RecordingState;

// =============================================================================
// Traits
// =============================================================================

/// Source of capture streams.
///
/// Opening a stream is where the platform asks for microphone access, so it
/// may suspend for as long as the user takes to answer.
pub trait Microphone: Send + Sync {
    /// Open a new capture stream.
    ///
    /// Fails with `ScribeError::PermissionDenied` if access is refused or no
    /// input device is available.
    fn open(&self) -> impl Future<Output = Result<Box<dyn CaptureStream>>> + Send;
}

/// An open capture stream.
///
/// The underlying device is released when the stream is finished or dropped.
pub trait CaptureStream: Send {
    /// Stop capturing and hand back everything buffered so far.
    ///
    /// May block while buffered audio is encoded; callers in async code run
    /// it on the blocking pool.
    fn finish(self: Box<Self>) -> Result<CapturedAudio>;
}

/// Raw output of a finished capture stream.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedAudio {
    /// Encoded chunks in arrival order.
    pub chunks: Vec<Bytes>,
    pub mime_type: String,
    /// File extension without the dot.
    pub extension: String,
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Mock microphone for testing.
///
/// Every stream it opens yields the same scripted chunks. It can simulate a
/// refused permission or a failing finalize, and tracks how many streams are
/// currently open so tests can check that devices get released.
#[derive(Debug, Clone, Default)]
pub struct MockMicrophone {
    chunks: Vec<Bytes>,
    deny: bool,
    fail_finish: bool,
    finish_delay: Option<Duration>,
    opened: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
}

impl MockMicrophone {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunks every opened stream will produce.
    pub fn with_chunks<I, B>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        self.chunks = chunks.into_iter().map(Into::into).collect();
        self
    }

    /// Refuse microphone access on every `open`.
    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::default()
        }
    }

    /// Make every stream fail when finished.
    pub fn failing_finish(mut self) -> Self {
        self.fail_finish = true;
        self
    }

    /// Block the finishing thread for `delay`, like encoding a long take.
    pub fn with_finish_delay(mut self, delay: Duration) -> Self {
        self.finish_delay = Some(delay);
        self
    }

    /// Streams opened and not yet released.
    pub fn open_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Total streams opened so far.
    pub fn times_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Microphone for MockMicrophone {
    async fn open(&self) -> Result<Box<dyn CaptureStream>> {
        if self.deny {
            return Err(ScribeError::PermissionDenied(
                "Microphone access denied. Please allow microphone permissions.".to_string(),
            ));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Mock microphone stream opened");
        Ok(Box::new(MockStream {
            chunks: self.chunks.clone(),
            fail_finish: self.fail_finish,
            finish_delay: self.finish_delay,
            live: Arc::clone(&self.live),
        }))
    }
}

struct MockStream {
    chunks: Vec<Bytes>,
    fail_finish: bool,
    finish_delay: Option<Duration>,
    live: Arc<AtomicUsize>,
}

impl CaptureStream for MockStream {
    fn finish(self: Box<Self>) -> Result<CapturedAudio> {
        if let Some(delay) = self.finish_delay {
            std::thread::sleep(delay);
        }
        if self.fail_finish {
            return Err(ScribeError::Audio("Mock stream failed to finalize".to_string()));
        }
        Ok(CapturedAudio {
            chunks: self.chunks.clone(),
            mime_type: "audio/wav".to_string(),
            extension: "wav".to_string(),
        })
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_microphone_scripted_chunks() {
        let mic = MockMicrophone::new().with_chunks([b"ab".to_vec(), b"cd".to_vec()]);
        let stream = mic.open().await.unwrap();
        assert_eq!(mic.open_streams(), 1);

        let audio = stream.finish().unwrap();
        assert_eq!(audio.chunks, vec![Bytes::from("ab"), Bytes::from("cd")]);
        assert_eq!(audio.extension, "wav");
        assert_eq!(mic.open_streams(), 0);
        assert_eq!(mic.times_opened(), 1);
    }

    #[tokio::test]
    async fn test_mock_microphone_denied() {
        let mic = MockMicrophone::denied();
        let result = mic.open().await;
        assert!(matches!(result, Err(ScribeError::PermissionDenied(_))));
        assert_eq!(mic.times_opened(), 0);
    }

    #[tokio::test]
    async fn test_mock_stream_released_on_failed_finish() {
        let mic = MockMicrophone::new().failing_finish();
        let stream = mic.open().await.unwrap();
        assert!(stream.finish().is_err());
        assert_eq!(mic.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_mock_stream_released_on_drop() {
        let mic = MockMicrophone::new();
        let stream = mic.open().await.unwrap();
        drop(stream);
        assert_eq!(mic.open_streams(), 0);
    }
}
