//! Chat orchestrator: append-only transcript over a knowledge service.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use scribe_client::KnowledgeService;
use scribe_core::error::{Result, ScribeError};
use scribe_core::types::Message;

use crate::flight::InFlight;

/// Assistant reply shown when a chat request fails.
pub const ERROR_NOTICE: &str = "Sorry, I encountered an error processing your request. \
     Please make sure the backend is running.";

/// Owns the conversation transcript and sends user turns to the backend.
///
/// At most one request is in flight; a second `send` while waiting is
/// rejected without touching the transcript.
pub struct ChatOrchestrator<S: KnowledgeService> {
    service: Arc<S>,
    transcript: Mutex<Vec<Message>>,
    next_id: AtomicU64,
    in_flight: AtomicBool,
}

impl<S: KnowledgeService> ChatOrchestrator<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self {
            service,
            transcript: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Send one user turn and return the assistant message appended for it.
    ///
    /// A backend failure is not an error here: it produces the fixed
    /// [`ERROR_NOTICE`] reply, which carries no query and so cannot be
    /// corrected.
    pub async fn send(&self, text: &str) -> Result<Message> {
        let query = text.trim();
        if query.is_empty() {
            return Err(ScribeError::ValidationFailed(
                "message cannot be empty".to_string(),
            ));
        }
        let _flight = InFlight::claim(&self.in_flight).ok_or_else(|| {
            ScribeError::InvalidState("a chat request is already in flight".to_string())
        })?;

        let user = Message::user(self.allocate_id(), query);
        debug!(message_id = user.id, "Chat turn sent");
        self.append(user);

        let reply = match self.service.chat(query).await {
            Ok(resp) => {
                info!(sources = resp.context_used.len(), "Chat answer received");
                Message::answer(self.allocate_id(), resp.answer, resp.context_used, query)
            }
            Err(e) => {
                warn!("Chat request failed: {}", e);
                Message::notice(self.allocate_id(), ERROR_NOTICE)
            }
        };
        self.append(reply.clone());
        Ok(reply)
    }

    /// Copy of the transcript, oldest first.
    pub fn transcript(&self) -> Vec<Message> {
        self.messages().clone()
    }

    /// Whether a chat request is currently in flight.
    pub fn is_waiting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Most recent assistant message that can be corrected.
    pub fn last_answer(&self) -> Option<Message> {
        self.messages()
            .iter()
            .rev()
            .find(|m| m.accepts_feedback())
            .cloned()
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn append(&self, message: Message) {
        self.messages().push(message);
    }

    fn messages(&self) -> MutexGuard<'_, Vec<Message>> {
        self.transcript.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// =============================================================================
// Tests
// =============================================================================
