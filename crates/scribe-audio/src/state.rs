//! Observable recording lifecycle.
//!
//! Valid transitions:
//! - Idle -> Recording (microphone granted)
//! - Recording -> Captured (stream finalized)
//! - Recording -> Idle (finalize failed)
//! - Captured -> Idle (clip discarded or uploaded)

use std::fmt;

/// State of the single recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingState {
    /// No session. Ready to start.
    Idle,
    /// A capture stream is open and buffering audio.
    Recording,
    /// A finished clip is held, waiting to be uploaded or discarded.
    Captured,
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingState::Idle => write!(f, "idle"),
            RecordingState::Recording => write!(f, "recording"),
            RecordingState::Captured => write!(f, "captured"),
        }
    }
}

impl RecordingState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &RecordingState) -> bool {
        matches!(
            (self, target),
            (RecordingState::Idle, RecordingState::Recording)
                | (RecordingState::Recording, RecordingState::Captured)
                // Finalize failure
                | (RecordingState::Recording, RecordingState::Idle)
                | (RecordingState::Captured, RecordingState::Idle)
        )
    }
}
