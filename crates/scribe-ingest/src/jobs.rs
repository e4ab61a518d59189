//! Bounded processing log keyed by job id.

use std::collections::VecDeque;

use chrono::Utc;
use tracing::debug;

use scribe_core::error::{Result, ScribeError};
use scribe_core::types::{JobId, JobKind, JobStatus, ProcessingLogEntry};

/// Newest-first table of ingestion jobs.
///
/// Holds at most `capacity` entries. Creating one more evicts the oldest,
/// whatever its status. Updates are addressed by [`JobId`], so two jobs with
/// the same filename never clobber each other.
#[derive(Debug, Clone)]
pub struct JobTable {
    entries: VecDeque<ProcessingLogEntry>,
    capacity: usize,
    next_id: u64,
}

impl JobTable {
    /// Create an empty table. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
        }
    }

    /// Add a `processing` entry at the front and return its id.
    pub fn create(
        &mut self,
        kind: JobKind,
        filename: impl Into<String>,
        message: impl Into<String>,
    ) -> JobId {
        let id = JobId(self.next_id);
        self.next_id += 1;

        self.entries
            .push_front(ProcessingLogEntry::processing(id, kind, filename, message));
        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_back() {
                debug!(
                    job_id = %evicted.id,
                    status = %evicted.status,
                    "Evicted job from processing log"
                );
            }
        }
        id
    }

    /// Move a job to `success`.
    pub fn resolve(
        &mut self,
        id: JobId,
        message: impl Into<String>,
    ) -> Result<ProcessingLogEntry> {
        self.settle(id, JobStatus::Success, message.into())
    }

    /// Move a job to `error`.
    pub fn fail(&mut self, id: JobId, message: impl Into<String>) -> Result<ProcessingLogEntry> {
        self.settle(id, JobStatus::Error, message.into())
    }

    fn settle(
        &mut self,
        id: JobId,
        target: JobStatus,
        message: String,
    ) -> Result<ProcessingLogEntry> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| ScribeError::InvalidState(format!("job {} is no longer tracked", id)))?;

        if !entry.status.can_transition_to(&target) {
            return Err(ScribeError::InvalidState(format!(
                "job {} is already {}",
                id, entry.status
            )));
        }

        debug!(job_id = %id, "Job status: {} -> {}", entry.status, target);
        entry.status = target;
        entry.message = message;
        entry.finished_at = Some(Utc::now());
        Ok(entry.clone())
    }

    pub fn get(&self, id: JobId) -> Option<&ProcessingLogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Copy of all entries, newest first.
    pub fn snapshot(&self) -> Vec<ProcessingLogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new(20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_is_processing_and_newest_first() {
        let mut table = JobTable::new(20);
        let a = table.create(JobKind::Text, "a.txt", "Indexing document...");
        let b = table.create(JobKind::Image, "b.png", "Extracting text from image...");

        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, b);
        assert_eq!(snapshot[1].id, a);
        assert!(snapshot.iter().all(|e| e.status == JobStatus::Processing));
        assert!(snapshot.iter().all(|e| e.finished_at.is_none()));
    }

    #[test]
    fn test_ids_are_unique() {
        let mut table = JobTable::new(5);
        let a = table.create(JobKind::Text, "same.txt", "");
        let b = table.create(JobKind::Text, "same.txt", "");
        assert_ne!(a, b);
    }

    #[test]
    fn test_resolve_and_fail() {
        let mut table = JobTable::new(20);
        let ok = table.create(JobKind::Audio, "rec.wav", "Transcribing audio...");
        let bad = table.create(JobKind::Image, "img.png", "Extracting text from image...");

        let entry = table.resolve(ok, "hello world").unwrap();
        assert_eq!(entry.status, JobStatus::Success);
        assert_eq!(entry.message, "hello world");
        assert!(entry.finished_at.is_some());

        let entry = table.fail(bad, "Image ingestion failed").unwrap();
        assert_eq!(entry.status, JobStatus::Error);
        assert_eq!(table.get(bad).unwrap().message, "Image ingestion failed");
    }

    #[test]
    fn test_terminal_entries_never_change() {
        let mut table = JobTable::new(20);
        let id = table.create(JobKind::Text, "a.txt", "");
        table.resolve(id, "done").unwrap();

        assert!(matches!(
            table.fail(id, "late failure"),
            Err(ScribeError::InvalidState(_))
        ));
        assert!(matches!(
            table.resolve(id, "again"),
            Err(ScribeError::InvalidState(_))
        ));
        let entry = table.get(id).unwrap();
        assert_eq!(entry.status, JobStatus::Success);
        assert_eq!(entry.message, "done");
    }

    #[test]
    fn test_same_filename_independent_entries() {
        let mut table = JobTable::new(20);
        let first = table.create(JobKind::Text, "notes.md", "");
        let second = table.create(JobKind::Text, "notes.md", "");

        table.fail(first, "broken").unwrap();
        table.resolve(second, "Indexed 1 chunk(s)").unwrap();

        assert_eq!(table.get(first).unwrap().status, JobStatus::Error);
        assert_eq!(table.get(second).unwrap().status, JobStatus::Success);
    }

    // -------------------------------------------------------------------------
    // Capacity
    // -------------------------------------------------------------------------

    #[test]
    fn test_capacity_keeps_most_recent() {
        let mut table = JobTable::new(20);
        let ids: Vec<JobId> = (0..25)
            .map(|i| table.create(JobKind::Text, format!("f{}.txt", i), ""))
            .collect();

        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 20);
        let expected: Vec<JobId> = ids.iter().rev().take(20).copied().collect();
        let actual: Vec<JobId> = snapshot.iter().map(|e| e.id).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_eviction_ignores_status() {
        let mut table = JobTable::new(2);
        let oldest = table.create(JobKind::Text, "a", "");
        table.create(JobKind::Text, "b", "");
        table.create(JobKind::Text, "c", "");

        // The still-processing oldest entry is gone
        assert!(table.get(oldest).is_none());
        assert!(matches!(
            table.resolve(oldest, "too late"),
            Err(ScribeError::InvalidState(_))
        ));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut table = JobTable::new(0);
        assert_eq!(table.capacity(), 1);
        table.create(JobKind::Text, "a", "");
        table.create(JobKind::Text, "b", "");
        assert_eq!(table.len(), 1);
        assert_eq!(table.snapshot()[0].filename, "b");
    }

    #[test]
    fn test_default_capacity() {
        let table = JobTable::default();
        assert_eq!(table.capacity(), 20);
        assert!(table.is_empty());
    }
}
