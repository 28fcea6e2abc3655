//! Feedback store for cached prompt/response pairs.

use std::path::PathBuf;
use std::sync::Mutex;

use tracing::debug;
use tutor_models::{normalize_prompt, FeedbackId, FeedbackRecord, UserId, Vote, VoteOutcome};

use crate::atomic::{atomic_write_json, load_all_json, read_json_optional};
use crate::error::{PersistenceError, Result};

/// Stores one JSON document per feedback record under `base_path/feedback/`.
///
/// Records are never deleted; only votes change them.
pub struct FeedbackStore {
    base_path: PathBuf,
    vote_lock: Mutex<()>,
}

impl FeedbackStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            vote_lock: Mutex::new(()),
        }
    }

    fn feedback_dir(&self) -> PathBuf {
        self.base_path.join("feedback")
    }

    fn record_path(&self, id: &FeedbackId) -> PathBuf {
        self.feedback_dir().join(format!("{}.json", id))
    }

    pub fn insert(&self, record: &FeedbackRecord) -> Result<()> {
        atomic_write_json(&self.record_path(&record.id), record)
    }

    pub fn get(&self, id: &FeedbackId) -> Result<Option<FeedbackRecord>> {
        read_json_optional(&self.record_path(id))
    }

    /// Apply a vote and persist the record, returning the updated record.
    pub fn vote(
        &self,
        id: &FeedbackId,
        voter: UserId,
        vote: Vote,
    ) -> Result<(FeedbackRecord, VoteOutcome)> {
        let _guard = self.vote_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut record = self
            .get(id)?
            .ok_or_else(|| PersistenceError::not_found("feedback record", id))?;

        let outcome = record.vote(voter, vote);
        if outcome != VoteOutcome::Unchanged {
            self.insert(&record)?;
        }
        debug!(id = %id, voter = %voter, vote = vote.as_str(), ?outcome, "Vote applied");
        Ok((record, outcome))
    }

    /// The best-rated record answering the same (normalized) prompt.
    ///
    /// Ties on ratio go to the record with more likes.
    pub fn find_cached(&self, prompt: &str) -> Result<Option<FeedbackRecord>> {
        let wanted = normalize_prompt(prompt);
        if wanted.is_empty() {
            return Ok(None);
        }

        Ok(self
            .list()?
            .into_iter()
            .filter(|r| r.normalized_prompt == wanted)
            .max_by(|a, b| {
                a.ratio()
                    .partial_cmp(&b.ratio())
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.likes.cmp(&b.likes))
            }))
    }

    /// All records, oldest first.
    pub fn list(&self) -> Result<Vec<FeedbackRecord>> {
        let mut records: Vec<FeedbackRecord> = load_all_json(&self.feedback_dir())?;
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}
