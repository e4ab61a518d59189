//! Scribe Chat crate - conversation transcript and the correction loop.
//!
//! `ChatOrchestrator` keeps an append-only transcript and allows one chat
//! request in flight at a time. `FeedbackOrchestrator` sends corrections for
//! answers in that transcript back to the knowledge service.

pub mod feedback;
mod flight;
pub mod orchestrator;

pub use feedback::{FeedbackForm, FeedbackFormState, FeedbackOrchestrator, FeedbackReceipt};
pub use orchestrator::{ChatOrchestrator, ERROR_NOTICE};
