//! Scribe Client crate - typed access to the knowledge service's HTTP contract.
//!
//! `KnowledgeService` is the seam every orchestrator is generic over.
//! `KnowledgeServiceClient` maps it onto the backend's multipart endpoints
//! with reqwest; `MockKnowledgeService` replays scripted replies for tests.

pub mod client;
pub mod mock;
pub mod service;
pub mod wire;

pub use client::KnowledgeServiceClient;
pub use mock::{MockKnowledgeService, RecordedCall};
pub use service::{KnowledgeService, UploadFile};
pub use wire::{
    AudioIngestResponse, ChatResponse, FeedbackResponse, ImageIngestResponse, ScanFileError,
    ScanResponse, TextIngestResponse,
};
