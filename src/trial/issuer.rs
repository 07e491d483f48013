//! Trial Issuer
//!
//! Owns secret-scalar generation: samples the scalar, derives the public
//! point, computes the hidden assignment, mints the trial id and persists
//! the full record atomically. Only the public fields are returned; the
//! secret stays with the storage collaborator.

use std::sync::Arc;
use chrono::Utc;
use rand::rngs::OsRng;
use tracing::{debug, warn};

use crate::core::keys::{derive_public_point, KeyError};
use crate::core::scalar::{sample_scalar, SampleError};
use crate::store::{RecordStore, StoreError};
use crate::trial::types::{IssuedTrial, TrialId, TrialRecord};

/// Issuance errors.
#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    /// Scalar sampling failed. Fatal; the entropy source has no fallback.
    #[error(transparent)]
    Sample(#[from] SampleError),

    /// The curve library rejected a sampled scalar.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Two freshly minted trial ids collided in a row.
    ///
    /// One collision triggers a silent internal retry; a second means the
    /// identifier space or randomness source is broken, and overwriting an
    /// existing trial's secret is never an option.
    #[error("trial id collision persisted after retry")]
    IdCollision,
}

/// Issues blind trials against a shared record store.
#[derive(Clone)]
pub struct TrialIssuer {
    store: Arc<RecordStore>,
}

impl TrialIssuer {
    /// Create an issuer over `store`.
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Issue one trial and return its public payload.
    ///
    /// Each issuance is independent; an abandoned caller leaves a valid
    /// trial with no submission, which is a terminal state, not an error.
    pub async fn issue(&self) -> Result<IssuedTrial, IssueError> {
        for attempt in 0..2 {
            let secret = sample_scalar(&mut OsRng)?;
            let public_point = derive_public_point(&secret)?;
            let record = TrialRecord::new(TrialId::random(), secret, public_point, Utc::now());
            let issued = record.public();

            match self.store.insert_trial(record).await {
                Ok(()) => {
                    debug!(trial_id = %issued.trial_id, "issued trial");
                    return Ok(issued);
                }
                Err(StoreError::DuplicateTrialId) if attempt == 0 => {
                    warn!(trial_id = %issued.trial_id, "trial id collision, regenerating");
                }
                Err(_) => break,
            }
        }
        Err(IssueError::IdCollision)
    }
}

// =============================================================================
// TESTS
// =============================================================================
