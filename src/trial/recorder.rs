//! Submission Recorder
//!
//! Accepts blind guesses for issued trials and appends them to storage.
//! The recorder never reads the secret scalar or assignment and never
//! computes correctness; the receipt it returns carries no signal beyond
//! "accepted". Correctness evaluation belongs to an analytics pass after
//! collection closes, off the live path.

use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::RecordStore;
use crate::trial::types::{Guess, Submission, TrialId};

/// How a second submission for the same trial is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// First write wins; later submissions are rejected.
    #[default]
    Reject,
    /// Every submission is kept as a distinct timestamped event.
    AppendEvents,
}

/// Recorder configuration.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Duplicate-submission policy.
    pub duplicate_policy: DuplicatePolicy,
    /// Inclusive lower bound for stated confidence.
    pub confidence_min: f64,
    /// Inclusive upper bound for stated confidence.
    pub confidence_max: f64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Reject,
            confidence_min: 0.5,
            confidence_max: 1.0,
        }
    }
}

/// Recording errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RecordError {
    /// No trial with the referenced id has been issued.
    #[error("unknown trial id")]
    UnknownTrial,

    /// Stated confidence outside the configured bound.
    #[error("confidence {value} outside [{min}, {max}]")]
    ConfidenceOutOfRange {
        /// The offending value.
        value: f64,
        /// Configured lower bound.
        min: f64,
        /// Configured upper bound.
        max: f64,
    },

    /// A submission for this trial has already been accepted.
    #[error("submission already recorded for this trial")]
    DuplicateSubmission,
}

/// Acknowledgement of a recorded submission.
///
/// Deliberately free of any correctness signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    /// Whether the submission was recorded.
    pub accepted: bool,
    /// Server timestamp of receipt.
    pub received_at: DateTime<Utc>,
}

/// Records blind submissions against a shared record store.
#[derive(Clone)]
pub struct SubmissionRecorder {
    store: Arc<RecordStore>,
    config: RecorderConfig,
}

impl SubmissionRecorder {
    /// Create a recorder over `store`.
    pub fn new(store: Arc<RecordStore>, config: RecorderConfig) -> Self {
        Self { store, config }
    }

    /// Record a guess for a previously issued trial.
    ///
    /// Rejections leave no side effect in the store.
    pub async fn record(
        &self,
        trial_id: TrialId,
        guess: Guess,
        confidence: Option<f64>,
    ) -> Result<SubmissionReceipt, RecordError> {
        validate_confidence(&self.config, confidence)?;

        // Trials are never deleted, so this check cannot go stale before
        // the insert below.
        if !self.store.trial_exists(&trial_id).await {
            return Err(RecordError::UnknownTrial);
        }

        let submission = Submission {
            trial_id,
            guess,
            confidence,
            received_at: Utc::now(),
        };
        let received_at = submission.received_at;

        match self.config.duplicate_policy {
            DuplicatePolicy::Reject => self
                .store
                .insert_submission(submission)
                .await
                .map_err(|_| RecordError::DuplicateSubmission)?,
            DuplicatePolicy::AppendEvents => self.store.append_submission(submission).await,
        }

        debug!(%trial_id, "recorded submission");
        Ok(SubmissionReceipt {
            accepted: true,
            received_at,
        })
    }
}

/// Validate an optional confidence value against the configured bound.
fn validate_confidence(config: &RecorderConfig, confidence: Option<f64>) -> Result<(), RecordError> {
    if let Some(value) = confidence {
        if !value.is_finite() || value < config.confidence_min || value > config.confidence_max {
            return Err(RecordError::ConfidenceOutOfRange {
                value,
                min: config.confidence_min,
                max: config.confidence_max,
            });
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::issuer::TrialIssuer;
    use proptest::prelude::*;

    fn setup(policy: DuplicatePolicy) -> (Arc<RecordStore>, TrialIssuer, SubmissionRecorder) {
        let store = Arc::new(RecordStore::new());
        let issuer = TrialIssuer::new(store.clone());
        let recorder = SubmissionRecorder::new(
            store.clone(),
            RecorderConfig {
                duplicate_policy: policy,
                ..Default::default()
            },
        );
        (store, issuer, recorder)
    }

    #[tokio::test]
    async fn test_end_to_end_issue_then_submit() {
        let (store, issuer, recorder) = setup(DuplicatePolicy::Reject);

        let issued = issuer.issue().await.unwrap();
        let receipt = recorder
            .record(issued.trial_id, Guess::Left, Some(0.8))
            .await
            .unwrap();
        assert!(receipt.accepted);

        // Resubmission with a different guess is rejected and the first
        // record survives unchanged.
        let second = recorder.record(issued.trial_id, Guess::Right, None).await;
        assert!(matches!(second, Err(RecordError::DuplicateSubmission)));

        let recorded = store.submissions_for(&issued.trial_id).await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].guess, Guess::Left);
    }

    #[tokio::test]
    async fn test_append_policy_keeps_both_events() {
        let (store, issuer, recorder) = setup(DuplicatePolicy::AppendEvents);

        let issued = issuer.issue().await.unwrap();
        recorder.record(issued.trial_id, Guess::Left, None).await.unwrap();
        recorder.record(issued.trial_id, Guess::Right, None).await.unwrap();

        let recorded = store.submissions_for(&issued.trial_id).await;
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].guess, Guess::Left);
        assert_eq!(recorded[1].guess, Guess::Right);
        assert!(recorded[0].received_at <= recorded[1].received_at);
    }

    #[tokio::test]
    async fn test_unknown_trial_rejected_without_side_effect() {
        let (store, _issuer, recorder) = setup(DuplicatePolicy::Reject);

        let ghost = TrialId::random();
        let result = recorder.record(ghost, Guess::Left, None).await;
        assert!(matches!(result, Err(RecordError::UnknownTrial)));
        assert!(store.submissions_for(&ghost).await.is_empty());
        assert_eq!(store.submission_count().await, 0);
    }

    #[tokio::test]
    async fn test_confidence_bound_enforced() {
        let (store, issuer, recorder) = setup(DuplicatePolicy::Reject);
        let issued = issuer.issue().await.unwrap();

        let low = recorder.record(issued.trial_id, Guess::Left, Some(0.4)).await;
        assert!(matches!(low, Err(RecordError::ConfidenceOutOfRange { .. })));
        let high = recorder.record(issued.trial_id, Guess::Left, Some(1.01)).await;
        assert!(matches!(high, Err(RecordError::ConfidenceOutOfRange { .. })));
        let nan = recorder.record(issued.trial_id, Guess::Left, Some(f64::NAN)).await;
        assert!(matches!(nan, Err(RecordError::ConfidenceOutOfRange { .. })));

        // Rejected submissions left nothing behind.
        assert!(store.submissions_for(&issued.trial_id).await.is_empty());

        recorder
            .record(issued.trial_id, Guess::Left, Some(0.5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_receipt_carries_no_correctness_signal() {
        let (_store, issuer, recorder) = setup(DuplicatePolicy::Reject);
        let issued = issuer.issue().await.unwrap();

        let receipt = recorder.record(issued.trial_id, Guess::Left, None).await.unwrap();
        let json = serde_json::to_string(&receipt).unwrap();
        for field in ["correct", "assignment", "secret", "verdict"] {
            assert!(!json.to_lowercase().contains(field), "leaky field: {field}");
        }
    }

    proptest! {
        #[test]
        fn prop_confidence_in_bound_accepted(value in 0.5f64..=1.0) {
            let config = RecorderConfig::default();
            prop_assert!(validate_confidence(&config, Some(value)).is_ok());
        }

        #[test]
        fn prop_confidence_out_of_bound_rejected(value in prop::num::f64::ANY) {
            let config = RecorderConfig::default();
            let in_bound = value.is_finite() && (0.5..=1.0).contains(&value);
            prop_assert_eq!(validate_confidence(&config, Some(value)).is_ok(), in_bound);
        }

        #[test]
        fn prop_absent_confidence_always_valid(min in 0.0f64..0.5, max in 0.5f64..=1.0) {
            let config = RecorderConfig {
                confidence_min: min,
                confidence_max: max,
                ..Default::default()
            };
            prop_assert!(validate_confidence(&config, None).is_ok());
        }
    }
}
