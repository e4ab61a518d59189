//! Correction loop for chat answers.
//!
//! `FeedbackOrchestrator` validates and sends a correction; `FeedbackForm`
//! tracks one correction attempt for a single message:
//! - Open -> Submitted (backend accepted the correction)
//!
//! A failed submit keeps the form open with the error recorded, so the user
//! can edit and try again.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use scribe_client::KnowledgeService;
use scribe_core::error::{Result, ScribeError};
use scribe_core::types::Message;

use crate::flight::InFlight;

/// Backend acknowledgement of a correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackReceipt {
    pub status: String,
    pub message: String,
}

/// Sends corrections to the knowledge service, one at a time.
pub struct FeedbackOrchestrator<S: KnowledgeService> {
    service: Arc<S>,
    submitting: AtomicBool,
}

impl<S: KnowledgeService> FeedbackOrchestrator<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self {
            service,
            submitting: AtomicBool::new(false),
        }
    }

    /// Submit `correction` for the answer in `message`.
    ///
    /// Fails with `ValidationFailed` and makes no request if the message has
    /// no originating query or the trimmed correction is empty.
    pub async fn submit(&self, message: &Message, correction: &str) -> Result<FeedbackReceipt> {
        let original_query = message.query.as_deref().ok_or_else(|| {
            ScribeError::ValidationFailed("this message cannot be corrected".to_string())
        })?;
        let correction = correction.trim();
        if correction.is_empty() {
            return Err(ScribeError::ValidationFailed(
                "correction cannot be empty".to_string(),
            ));
        }
        let _flight = InFlight::claim(&self.submitting).ok_or_else(|| {
            ScribeError::InvalidState("a correction is already being submitted".to_string())
        })?;

        match self.service.submit_feedback(original_query, correction).await {
            Ok(resp) => {
                info!(message_id = message.id, status = %resp.status, "Correction submitted");
                Ok(FeedbackReceipt {
                    status: resp.status,
                    message: resp.message,
                })
            }
            Err(e) => {
                warn!(message_id = message.id, "Correction failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }
}

// =============================================================================
// Form
// =============================================================================

/// State of a correction form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedbackFormState {
    Open,
    Submitted,
}

impl FeedbackFormState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &FeedbackFormState) -> bool {
        matches!(
            (self, target),
            (FeedbackFormState::Open, FeedbackFormState::Submitted)
        )
    }
}

impl fmt::Display for FeedbackFormState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackFormState::Open => write!(f, "open"),
            FeedbackFormState::Submitted => write!(f, "submitted"),
        }
    }
}

/// One correction attempt for a chat answer.
#[derive(Debug, Clone)]
pub struct FeedbackForm {
    message: Message,
    state: FeedbackFormState,
    error: Option<String>,
    receipt: Option<FeedbackReceipt>,
}

impl FeedbackForm {
    /// Open a form for `message`. Only backend answers can be corrected.
    pub fn open(message: Message) -> Result<Self> {
        if !message.accepts_feedback() {
            return Err(ScribeError::ValidationFailed(format!(
                "message {} cannot be corrected",
                message.id
            )));
        }
        Ok(Self {
            message,
            state: FeedbackFormState::Open,
            error: None,
            receipt: None,
        })
    }

    /// Submit through `orchestrator`, recording the outcome on the form.
    pub async fn submit<S: KnowledgeService>(
        &mut self,
        orchestrator: &FeedbackOrchestrator<S>,
        correction: &str,
    ) -> Result<FeedbackReceipt> {
        if !self.state.can_transition_to(&FeedbackFormState::Submitted) {
            return Err(ScribeError::InvalidState(format!(
                "feedback form is already {}",
                self.state
            )));
        }

        match orchestrator.submit(&self.message, correction).await {
            Ok(receipt) => {
                self.state = FeedbackFormState::Submitted;
                self.error = None;
                self.receipt = Some(receipt.clone());
                Ok(receipt)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn state(&self) -> FeedbackFormState {
        self.state
    }

    /// Error from the last failed submit, shown inline.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn receipt(&self) -> Option<&FeedbackReceipt> {
        self.receipt.as_ref()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_client::{FeedbackResponse, MockKnowledgeService, RecordedCall};

    fn orchestrator() -> (Arc<MockKnowledgeService>, FeedbackOrchestrator<MockKnowledgeService>) {
        let service = Arc::new(MockKnowledgeService::new());
        (service.clone(), FeedbackOrchestrator::new(service))
    }

    fn answer() -> Message {
        Message::answer(2, "Lyon", vec!["doc1".to_string()], "capital of France?")
    }

    // -------------------------------------------------------------------------
    // Orchestrator
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_submit_sends_query_and_trimmed_correction() {
        let (service, feedback) = orchestrator();
        service.push_feedback(FeedbackResponse {
            status: "learned".into(),
            message: "Thanks, I will remember that".into(),
        });

        let receipt = feedback.submit(&answer(), "  Paris  ").await.unwrap();
        assert_eq!(receipt.status, "learned");
        assert_eq!(receipt.message, "Thanks, I will remember that");
        assert_eq!(
            service.calls(),
            vec![RecordedCall::Feedback {
                original_query: "capital of France?".into(),
                correct_answer: "Paris".into(),
            }]
        );
        assert!(!feedback.is_submitting());
    }

    #[tokio::test]
    async fn test_empty_correction_makes_no_call() {
        let (service, feedback) = orchestrator();
        let result = feedback.submit(&answer(), "   ").await;
        assert!(matches!(result, Err(ScribeError::ValidationFailed(_))));
        assert_eq!(service.call_count(), 0);
    }

    #[tokio::test]
    async fn test_message_without_query_makes_no_call() {
        let (service, feedback) = orchestrator();
        let notice = Message::notice(3, "Sorry");
        let user = Message::user(1, "hi");

        assert!(matches!(
            feedback.submit(&notice, "Paris").await,
            Err(ScribeError::ValidationFailed(_))
        ));
        assert!(matches!(
            feedback.submit(&user, "Paris").await,
            Err(ScribeError::ValidationFailed(_))
        ));
        assert_eq!(service.call_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_is_returned() {
        let (service, feedback) = orchestrator();
        service.fail_feedback(Some(500), "Feedback failed: Internal Server Error");

        let err = feedback.submit(&answer(), "Paris").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(!feedback.is_submitting());
    }

    // -------------------------------------------------------------------------
    // Form
    // -------------------------------------------------------------------------

    #[test]
    fn test_form_state_transitions() {
        assert!(FeedbackFormState::Open.can_transition_to(&FeedbackFormState::Submitted));
        assert!(!FeedbackFormState::Submitted.can_transition_to(&FeedbackFormState::Open));
        assert!(!FeedbackFormState::Submitted.can_transition_to(&FeedbackFormState::Submitted));
        assert_eq!(FeedbackFormState::Submitted.to_string(), "submitted");
    }

    #[test]
    fn test_form_refuses_ineligible_message() {
        assert!(FeedbackForm::open(Message::notice(1, "Sorry")).is_err());
        assert!(FeedbackForm::open(Message::user(1, "hi")).is_err());
        assert!(FeedbackForm::open(answer()).is_ok());
    }

    #[tokio::test]
    async fn test_form_stays_open_on_failure_then_succeeds() {
        let (service, feedback) = orchestrator();
        service.fail_feedback(None, "Feedback failed: could not connect to backend");

        let mut form = FeedbackForm::open(answer()).unwrap();
        assert!(form.submit(&feedback, "Paris").await.is_err());
        assert_eq!(form.state(), FeedbackFormState::Open);
        assert!(form.error().unwrap().contains("could not connect"));

        // Manual retry
        let receipt = form.submit(&feedback, "Paris").await.unwrap();
        assert_eq!(receipt.status, "learned");
        assert_eq!(form.state(), FeedbackFormState::Submitted);
        assert!(form.error().is_none());
        assert_eq!(form.receipt(), Some(&receipt));
    }

    #[tokio::test]
    async fn test_form_validation_error_is_recorded() {
        let (service, feedback) = orchestrator();
        let mut form = FeedbackForm::open(answer()).unwrap();

        assert!(form.submit(&feedback, "").await.is_err());
        assert_eq!(form.state(), FeedbackFormState::Open);
        assert!(form.error().is_some());
        assert_eq!(service.call_count(), 0);
    }

    #[tokio::test]
    async fn test_submitted_form_cannot_resubmit() {
        let (service, feedback) = orchestrator();
        let mut form = FeedbackForm::open(answer()).unwrap();
        form.submit(&feedback, "Paris").await.unwrap();

        let result = form.submit(&feedback, "Paris again").await;
        assert!(matches!(result, Err(ScribeError::InvalidState(_))));
        assert_eq!(service.call_count(), 1);
    }
}
