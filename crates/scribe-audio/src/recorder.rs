//! Single-session microphone recorder.
//!
//! `RecordingCapture` owns at most one session at a time. The session is kept
//! behind an async mutex because `start()` holds it across the permission
//! prompt; concurrent start/stop calls therefore serialize. The observable
//! [`RecordingState`] and the last non-fatal error are mirrored in plain
//! mutexes so they can be read without awaiting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use scribe_core::error::{Result, ScribeError};

use crate::state::RecordingState;
use crate::{CaptureStream, CapturedAudio, Microphone};

/// A finished recording, ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedClip {
    /// Session that produced this clip.
    pub id: u64,
    pub bytes: Bytes,
    pub mime_type: String,
    /// File extension without the dot.
    pub extension: String,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl RecordedClip {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

enum Session {
    Idle,
    Recording {
        id: u64,
        started_at: DateTime<Utc>,
        started: Instant,
        stream: Box<dyn CaptureStream>,
    },
    Captured(RecordedClip),
}

impl Session {
    fn state(&self) -> RecordingState {
        match self {
            Session::Idle => RecordingState::Idle,
            Session::Recording { .. } => RecordingState::Recording,
            Session::Captured(_) => RecordingState::Captured,
        }
    }
}

/// Records voice notes from a [`Microphone`].
pub struct RecordingCapture<M: Microphone> {
    microphone: M,
    session: tokio::sync::Mutex<Session>,
    state: Mutex<RecordingState>,
    last_error: Mutex<Option<String>>,
    next_id: AtomicU64,
}

impl<M: Microphone> RecordingCapture<M> {
    pub fn new(microphone: M) -> Self {
        Self {
            microphone,
            session: tokio::sync::Mutex::new(Session::Idle),
            state: Mutex::new(RecordingState::Idle),
            last_error: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Begin a new recording session and return its id.
    ///
    /// Suspends while the platform asks for microphone access. A refusal
    /// leaves the session idle and is kept in [`last_error`](Self::last_error).
    pub async fn start(&self) -> Result<u64> {
        let mut session = self.session.lock().await;
        let current = session.state();
        if !current.can_transition_to(&RecordingState::Recording) {
            return Err(ScribeError::InvalidState(format!(
                "cannot start recording while {}",
                current
            )));
        }

        self.set_last_error(None);
        let stream = match self.microphone.open().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to open microphone: {}", e);
                self.set_last_error(Some(e.to_string()));
                return Err(e);
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.transition(
            &mut session,
            Session::Recording {
                id,
                started_at: Utc::now(),
                started: Instant::now(),
                stream,
            },
        );
        info!(session_id = id, "Recording started");
        Ok(id)
    }

    /// Stop the current recording and keep the finished clip.
    ///
    /// The capture stream is consumed either way. If finalizing fails the
    /// session returns to idle and the error is kept as `last_error`.
    pub async fn stop(&self) -> Result<RecordedClip> {
        let mut session = self.session.lock().await;
        let (id, started_at, started, stream) =
            match std::mem::replace(&mut *session, Session::Idle) {
                Session::Recording {
                    id,
                    started_at,
                    started,
                    stream,
                } => (id, started_at, started, stream),
                other => {
                    let current = other.state();
                    *session = other;
                    return Err(ScribeError::InvalidState(format!(
                        "cannot stop recording while {}",
                        current
                    )));
                }
            };

        match finish_stream(stream).await {
            Ok(audio) => {
                let bytes = concat_chunks(audio.chunks);
                let clip = RecordedClip {
                    id,
                    bytes,
                    mime_type: audio.mime_type,
                    extension: audio.extension,
                    started_at,
                    duration: started.elapsed(),
                };
                info!(
                    session_id = id,
                    bytes = clip.len(),
                    duration_ms = clip.duration.as_millis() as u64,
                    "Recording captured"
                );
                self.transition(&mut session, Session::Captured(clip.clone()));
                Ok(clip)
            }
            Err(e) => {
                warn!(session_id = id, "Failed to finalize recording: {}", e);
                self.set_last_error(Some(e.to_string()));
                self.transition(&mut session, Session::Idle);
                Err(e)
            }
        }
    }

    /// Drop the captured clip without uploading it.
    pub async fn discard(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        let held = match &*session {
            Session::Captured(clip) => clip.id,
            other => {
                return Err(ScribeError::InvalidState(format!(
                    "nothing to discard while {}",
                    other.state()
                )))
            }
        };
        info!(session_id = held, "Recording discarded");
        self.transition(&mut session, Session::Idle);
        Ok(())
    }

    /// Release the clip of `session_id` after it was uploaded.
    ///
    /// Returns `false` without touching the session if a different clip (or
    /// none) is held.
    pub async fn mark_uploaded(&self, session_id: u64) -> bool {
        let mut session = self.session.lock().await;
        let matches = matches!(&*session, Session::Captured(clip) if clip.id == session_id);
        if !matches {
            debug!(session_id, "Uploaded clip is no longer held; ignoring");
            return false;
        }
        self.transition(&mut session, Session::Idle);
        true
    }

    /// A copy of the captured clip.
    pub async fn clip(&self) -> Result<RecordedClip> {
        match &*self.session.lock().await {
            Session::Captured(clip) => Ok(clip.clone()),
            other => Err(ScribeError::InvalidState(format!(
                "no captured recording while {}",
                other.state()
            ))),
        }
    }

    pub fn state(&self) -> RecordingState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    /// Error from the last failed start or stop, cleared by the next start.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn microphone(&self) -> &M {
        &self.microphone
    }

    fn transition(&self, slot: &mut Session, next: Session) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let target = next.state();
        debug!("Recording state: {} -> {}", *state, target);
        *slot = next;
        *state = target;
    }

    fn set_last_error(&self, error: Option<String>) {
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = error;
    }
}

/// Finish `stream` on the blocking pool. A cpal stream WAV-encodes its whole
/// buffer here (up to `max_buffer_secs` of samples).
async fn finish_stream(stream: Box<dyn CaptureStream>) -> Result<CapturedAudio> {
    tokio::task::spawn_blocking(move || stream.finish())
        .await
        .map_err(|e| ScribeError::Audio(format!("Recording finalizer did not complete: {}", e)))?
}

fn concat_chunks(chunks: Vec<Bytes>) -> Bytes {
    match chunks.len() {
        0 => Bytes::new(),
        1 => chunks.into_iter().next().unwrap_or_default(),
        _ => {
            let total = chunks.iter().map(Bytes::len).sum();
            let mut buf = BytesMut::with_capacity(total);
            for chunk in chunks {
                buf.extend_from_slice(&chunk);
            }
            buf.freeze()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockMicrophone;

    fn recorder_with(chunks: &[&'static [u8]]) -> RecordingCapture<MockMicrophone> {
        let mic = MockMicrophone::new().with_chunks(chunks.iter().copied().map(Bytes::from_static));
        RecordingCapture::new(mic)
    }

    // -------------------------------------------------------------------------
    // Happy path
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_start_stop_captures_concatenated_clip() {
        let recorder = recorder_with(&[b"RIFF", b"data"]);
        assert_eq!(recorder.state(), RecordingState::Idle);

        let id = recorder.start().await.unwrap();
        assert!(recorder.is_recording());
        assert_eq!(recorder.microphone().open_streams(), 1);

        let clip = recorder.stop().await.unwrap();
        assert_eq!(clip.id, id);
        assert_eq!(clip.bytes, Bytes::from_static(b"RIFFdata"));
        assert_eq!(clip.mime_type, "audio/wav");
        assert_eq!(recorder.state(), RecordingState::Captured);
        assert_eq!(recorder.microphone().open_streams(), 0);
        assert_eq!(recorder.clip().await.unwrap(), clip);
    }

    #[tokio::test]
    async fn test_zero_chunks_still_captured() {
        let recorder = recorder_with(&[]);
        recorder.start().await.unwrap();
        let clip = recorder.stop().await.unwrap();
        assert!(clip.is_empty());
        assert_eq!(recorder.state(), RecordingState::Captured);
    }

    #[tokio::test]
    async fn test_session_ids_increase() {
        let recorder = recorder_with(&[b"x"]);
        let first = recorder.start().await.unwrap();
        recorder.stop().await.unwrap();
        recorder.discard().await.unwrap();
        let second = recorder.start().await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_slow_finalize_does_not_stall_runtime() {
        let mic = MockMicrophone::new()
            .with_chunks([b"RIFF".to_vec()])
            .with_finish_delay(Duration::from_millis(300));
        let recorder = RecordingCapture::new(mic);
        recorder.start().await.unwrap();

        let begun = Instant::now();
        let (clip, waited) = tokio::join!(recorder.stop(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert_eq!(recorder.state(), RecordingState::Recording);
            begun.elapsed()
        });

        assert!(waited < Duration::from_millis(250), "runtime stalled for {:?}", waited);
        assert_eq!(clip.unwrap().bytes, Bytes::from_static(b"RIFF"));
        assert_eq!(recorder.state(), RecordingState::Captured);
        assert_eq!(recorder.microphone().open_streams(), 0);
    }

    // -------------------------------------------------------------------------
    // Permission and finalize failures
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_permission_denied_stays_idle() {
        let recorder = RecordingCapture::new(MockMicrophone::denied());
        let result = recorder.start().await;

        assert!(matches!(result, Err(ScribeError::PermissionDenied(_))));
        assert_eq!(recorder.state(), RecordingState::Idle);
        let last = recorder.last_error().unwrap();
        assert!(last.contains("Microphone access denied"));
    }

    #[tokio::test]
    async fn test_finalize_failure_returns_to_idle_and_releases_stream() {
        let recorder = RecordingCapture::new(MockMicrophone::new().failing_finish());
        recorder.start().await.unwrap();

        let result = recorder.stop().await;
        assert!(matches!(result, Err(ScribeError::Audio(_))));
        assert_eq!(recorder.state(), RecordingState::Idle);
        assert_eq!(recorder.microphone().open_streams(), 0);
        assert!(recorder.last_error().is_some());
    }

    #[tokio::test]
    async fn test_last_error_cleared_on_next_start() {
        let recorder = RecordingCapture::new(MockMicrophone::new().failing_finish());
        recorder.start().await.unwrap();
        let _ = recorder.stop().await;
        assert!(recorder.last_error().is_some());

        recorder.start().await.unwrap();
        assert!(recorder.last_error().is_none());
    }

    // -------------------------------------------------------------------------
    // Invalid transitions
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_start_while_recording_is_invalid() {
        let recorder = recorder_with(&[b"x"]);
        recorder.start().await.unwrap();
        let result = recorder.start().await;
        assert!(matches!(result, Err(ScribeError::InvalidState(_))));
        assert_eq!(recorder.microphone().times_opened(), 1);
        assert!(recorder.is_recording());
    }

    #[tokio::test]
    async fn test_start_while_captured_is_invalid() {
        let recorder = recorder_with(&[b"x"]);
        recorder.start().await.unwrap();
        recorder.stop().await.unwrap();
        let result = recorder.start().await;
        assert!(matches!(result, Err(ScribeError::InvalidState(_))));
        assert_eq!(recorder.state(), RecordingState::Captured);
    }

    #[tokio::test]
    async fn test_stop_without_start_is_invalid() {
        let recorder = recorder_with(&[]);
        let result = recorder.stop().await;
        assert!(matches!(result, Err(ScribeError::InvalidState(_))));
        assert_eq!(recorder.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn test_stop_twice_keeps_clip() {
        let recorder = recorder_with(&[b"x"]);
        recorder.start().await.unwrap();
        recorder.stop().await.unwrap();
        assert!(recorder.stop().await.is_err());
        assert!(recorder.clip().await.is_ok());
    }

    #[tokio::test]
    async fn test_discard_requires_clip() {
        let recorder = recorder_with(&[]);
        assert!(matches!(
            recorder.discard().await,
            Err(ScribeError::InvalidState(_))
        ));
        assert!(recorder.clip().await.is_err());
    }

    // -------------------------------------------------------------------------
    // Upload release
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_mark_uploaded_releases_matching_clip() {
        let recorder = recorder_with(&[b"x"]);
        let id = recorder.start().await.unwrap();
        recorder.stop().await.unwrap();

        assert!(!recorder.mark_uploaded(id + 100).await);
        assert_eq!(recorder.state(), RecordingState::Captured);

        assert!(recorder.mark_uploaded(id).await);
        assert_eq!(recorder.state(), RecordingState::Idle);
        assert!(recorder.clip().await.is_err());
    }

    #[tokio::test]
    async fn test_mark_uploaded_ignores_newer_session() {
        let recorder = recorder_with(&[b"x"]);
        let old = recorder.start().await.unwrap();
        recorder.stop().await.unwrap();
        recorder.discard().await.unwrap();
        recorder.start().await.unwrap();

        assert!(!recorder.mark_uploaded(old).await);
        assert!(recorder.is_recording());
    }

    #[tokio::test]
    async fn test_concurrent_starts_serialize() {
        let recorder = recorder_with(&[b"x"]);
        let (a, b) = tokio::join!(recorder.start(), recorder.start());

        assert!(a.is_ok() ^ b.is_ok());
        assert_eq!(recorder.microphone().times_opened(), 1);
    }

    #[test]
    fn test_concat_chunks() {
        assert!(concat_chunks(vec![]).is_empty());
        assert_eq!(
            concat_chunks(vec![Bytes::from_static(b"a")]),
            Bytes::from_static(b"a")
        );
        assert_eq!(
            concat_chunks(vec![Bytes::from_static(b"ab"), Bytes::from_static(b"cd")]),
            Bytes::from_static(b"abcd")
        );
    }
}
