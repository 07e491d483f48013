//! Record Store
//!
//! In-memory storage collaborator for trials and submissions. Both inserts
//! are atomic insert-if-absent under a single write lock, so there is no
//! check-then-act window between existence check and write. Trials are
//! never deleted within this scope; retention is an external policy.
//!
//! The public lookup surface exposes only client-visible fields. Secret
//! scalars and assignments leave the store solely through
//! [`RecordStore::audit_trials`], which no live-path component calls.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::trial::types::{IssuedTrial, Submission, TrialId, TrialRecord};

/// Storage errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A trial with this identifier already exists.
    #[error("trial id already present")]
    DuplicateTrialId,

    /// A submission for this trial has already been recorded.
    #[error("submission already recorded for this trial")]
    DuplicateSubmission,
}

/// In-memory append-only keyed store for trials and submissions.
pub struct RecordStore {
    /// Issued trials, keyed by id.
    trials: RwLock<BTreeMap<TrialId, TrialRecord>>,
    /// Submissions, keyed by trial id. Under the append policy a key may
    /// hold several timestamped events; the first entry is never replaced.
    submissions: RwLock<BTreeMap<TrialId, Vec<Submission>>>,
}

impl RecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            trials: RwLock::new(BTreeMap::new()),
            submissions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert a trial record, failing if the id is already taken.
    ///
    /// The whole record becomes visible in one step; no reader can observe
    /// a partially populated trial.
    pub async fn insert_trial(&self, record: TrialRecord) -> Result<(), StoreError> {
        let mut trials = self.trials.write().await;
        match trials.entry(record.id()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateTrialId),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    /// Whether a trial with this id has been issued.
    pub async fn trial_exists(&self, id: &TrialId) -> bool {
        self.trials.read().await.contains_key(id)
    }

    /// Public view of an issued trial.
    pub async fn issued(&self, id: &TrialId) -> Option<IssuedTrial> {
        self.trials.read().await.get(id).map(|r| r.public())
    }

    /// Record the first submission for a trial, failing on a duplicate.
    pub async fn insert_submission(&self, submission: Submission) -> Result<(), StoreError> {
        let mut submissions = self.submissions.write().await;
        match submissions.entry(submission.trial_id) {
            Entry::Occupied(_) => Err(StoreError::DuplicateSubmission),
            Entry::Vacant(slot) => {
                slot.insert(vec![submission]);
                Ok(())
            }
        }
    }

    /// Append a submission as a distinct timestamped event.
    ///
    /// Earlier events for the same trial are kept untouched.
    pub async fn append_submission(&self, submission: Submission) {
        let mut submissions = self.submissions.write().await;
        submissions
            .entry(submission.trial_id)
            .or_default()
            .push(submission);
    }

    /// All recorded submissions for a trial, oldest first.
    pub async fn submissions_for(&self, id: &TrialId) -> Vec<Submission> {
        self.submissions
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of issued trials.
    pub async fn trial_count(&self) -> usize {
        self.trials.read().await.len()
    }

    /// Number of trials with at least one submission.
    pub async fn submission_count(&self) -> usize {
        self.submissions.read().await.len()
    }

    /// Privileged access to full trial records, secret fields included.
    ///
    /// For the post-collection analytics collaborator. The issuance and
    /// submission paths must never call this.
    pub async fn audit_trials<T>(&self, f: impl FnOnce(&BTreeMap<TrialId, TrialRecord>) -> T) -> T {
        let trials = self.trials.read().await;
        f(&trials)
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keys::derive_public_point;
    use crate::core::scalar::sample_scalar;
    use crate::trial::types::{Guess, PrivilegedTrialRead};
    use chrono::Utc;
    use rand::rngs::OsRng;
    use std::sync::Arc;

    fn make_record() -> TrialRecord {
        let d = sample_scalar(&mut OsRng).unwrap();
        let point = derive_public_point(&d).unwrap();
        TrialRecord::new(TrialId::random(), d, point, Utc::now())
    }

    fn make_submission(trial_id: TrialId, guess: Guess) -> Submission {
        Submission {
            trial_id,
            guess,
            confidence: None,
            received_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup_trial() {
        let store = RecordStore::new();
        let record = make_record();
        let id = record.id();
        let public = record.public();

        store.insert_trial(record).await.unwrap();
        assert!(store.trial_exists(&id).await);
        assert_eq!(store.trial_count().await, 1);

        let issued = store.issued(&id).await.unwrap();
        assert_eq!(issued.trial_id, public.trial_id);
        assert_eq!(issued.public_point, public.public_point);

        assert!(!store.trial_exists(&TrialId::random()).await);
    }

    #[tokio::test]
    async fn test_duplicate_trial_id_rejected() {
        let store = RecordStore::new();
        let first = make_record();
        let id = first.id();
        let first_point = *first.public_point();
        store.insert_trial(first).await.unwrap();

        // Second record under the same id must not overwrite the first.
        let d = sample_scalar(&mut OsRng).unwrap();
        let point = derive_public_point(&d).unwrap();
        let clash = TrialRecord::new(id, d, point, Utc::now());
        let result = store.insert_trial(clash).await;
        assert!(matches!(result, Err(StoreError::DuplicateTrialId)));

        assert_eq!(store.issued(&id).await.unwrap().public_point, first_point);
    }

    #[tokio::test]
    async fn test_submission_insert_if_absent() {
        let store = RecordStore::new();
        let id = TrialId::random();

        store
            .insert_submission(make_submission(id, Guess::Left))
            .await
            .unwrap();
        let result = store.insert_submission(make_submission(id, Guess::Right)).await;
        assert!(matches!(result, Err(StoreError::DuplicateSubmission)));

        let recorded = store.submissions_for(&id).await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].guess, Guess::Left);
    }

    #[tokio::test]
    async fn test_append_keeps_first_event() {
        let store = RecordStore::new();
        let id = TrialId::random();

        store.append_submission(make_submission(id, Guess::Left)).await;
        store.append_submission(make_submission(id, Guess::Right)).await;

        let recorded = store.submissions_for(&id).await;
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].guess, Guess::Left);
        assert_eq!(recorded[1].guess, Guess::Right);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_resolves_to_one_winner() {
        let store = Arc::new(RecordStore::new());
        let id = TrialId::random();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            let guess = if i % 2 == 0 { Guess::Left } else { Guess::Right };
            handles.push(tokio::spawn(async move {
                store.insert_submission(make_submission(id, guess)).await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(store.submissions_for(&id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_audit_access_sees_assignment() {
        let store = RecordStore::new();
        let record = make_record();
        let id = record.id();
        let expected = record.assignment();
        store.insert_trial(record).await.unwrap();

        let assignment = store
            .audit_trials(|trials| trials.get(&id).map(|r| r.assignment()))
            .await
            .unwrap();
        assert_eq!(assignment, expected);
    }
}
