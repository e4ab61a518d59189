//! Scribe Ingest crate - upload orchestration and the processing log.
//!
//! Feeds audio, image, and text files (and the backend's knowledge folder)
//! to the knowledge service one upload at a time, tracking each job in a
//! bounded, newest-first processing log.

pub mod jobs;
pub mod orchestrator;
pub mod upload;

pub use jobs::JobTable;
pub use orchestrator::IngestionOrchestrator;
pub use upload::{load_upload, mime_type_for};
