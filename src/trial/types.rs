//! Trial Domain Types
//!
//! The record types of the protocol and the capability split between them:
//! [`TrialRecord`] holds the full server-side state including the secret
//! scalar and hidden assignment, [`IssuedTrial`] is the only view that can
//! reach a client. `Assignment` deliberately has no serde impls, so the
//! hidden bit cannot enter any serialized payload by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::keys::PublicPoint;
use crate::core::scalar::SecretScalar;

/// Globally unique opaque trial identifier.
///
/// 128 bits of randomness (UUID v4); collision probability is negligible
/// but still checked at insert time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrialId(Uuid);

impl TrialId {
    /// Mint a fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for TrialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The hidden side assignment of a trial.
///
/// Computed once at issuance from the secret scalar's relation to the
/// group midpoint and retained server-side only. No `Serialize` impl:
/// this type must be structurally unable to appear in a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// Scalar in the lower half `[1, m]`.
    Left,
    /// Scalar in the upper half `[m+1, n-1]`.
    Right,
}

impl Assignment {
    /// Derive the assignment for a secret scalar.
    pub fn from_scalar(secret: &SecretScalar) -> Self {
        if secret.is_lower_half() {
            Assignment::Left
        } else {
            Assignment::Right
        }
    }
}

/// A guesser's stated side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Guess {
    /// The guesser claims the lower half.
    Left,
    /// The guesser claims the upper half.
    Right,
}

/// Public view of an issued trial: the complete issuance response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedTrial {
    /// Opaque trial identifier.
    pub trial_id: TrialId,
    /// Compressed public point derived from the secret scalar.
    pub public_point: PublicPoint,
    /// Server timestamp of generation.
    pub issued_at: DateTime<Utc>,
}

/// Full server-side trial record.
///
/// Created atomically: construction computes the assignment, so a record
/// with only some fields populated cannot exist. Fields are private; the
/// public accessors expose only what a client may see, and the secret
/// fields are reachable solely through [`PrivilegedTrialRead`].
#[derive(Debug)]
pub struct TrialRecord {
    trial_id: TrialId,
    secret_scalar: SecretScalar,
    public_point: PublicPoint,
    assignment: Assignment,
    issued_at: DateTime<Utc>,
}

impl TrialRecord {
    /// Build a complete record. Owned by the issuer.
    pub(crate) fn new(
        trial_id: TrialId,
        secret_scalar: SecretScalar,
        public_point: PublicPoint,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let assignment = Assignment::from_scalar(&secret_scalar);
        Self {
            trial_id,
            secret_scalar,
            public_point,
            assignment,
            issued_at,
        }
    }

    /// Trial identifier.
    pub fn id(&self) -> TrialId {
        self.trial_id
    }

    /// Compressed public point.
    pub fn public_point(&self) -> &PublicPoint {
        &self.public_point
    }

    /// Issuance timestamp.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// The client-visible view of this record.
    pub fn public(&self) -> IssuedTrial {
        IssuedTrial {
            trial_id: self.trial_id,
            public_point: self.public_point,
            issued_at: self.issued_at,
        }
    }
}

/// Privileged read access to a trial's secret fields.
///
/// Intended for a post-collection analytics collaborator only. The live
/// request path (issuance responses, submission recording) never goes
/// through this trait.
pub trait PrivilegedTrialRead {
    /// The secret scalar. Never transmit or log.
    fn secret_scalar(&self) -> &SecretScalar;
    /// The hidden side assignment.
    fn assignment(&self) -> Assignment;
}

impl PrivilegedTrialRead for TrialRecord {
    fn secret_scalar(&self) -> &SecretScalar {
        &self.secret_scalar
    }

    fn assignment(&self) -> Assignment {
        self.assignment
    }
}

/// A recorded client response to one trial.
///
/// Immutable after creation; a later resubmission is a new event under the
/// append policy, never an edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// The trial this submission references.
    pub trial_id: TrialId,
    /// The blind guess.
    pub guess: Guess,
    /// Stated certainty within the configured bound, if given.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub confidence: Option<f64>,
    /// Server timestamp of receipt.
    pub received_at: DateTime<Utc>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keys::derive_public_point;
    use crate::core::scalar::{sample_scalar, CURVE_ORDER, ORDER_MIDPOINT};
    use rand::rngs::OsRng;

    fn scalar_from(bytes: [u8; 32]) -> SecretScalar {
        SecretScalar::from_bytes_for_test(bytes)
    }

    #[test]
    fn test_assignment_at_range_edges() {
        let mut one = [0u8; 32];
        one[31] = 1;
        assert_eq!(Assignment::from_scalar(&scalar_from(one)), Assignment::Left);

        let mut n_minus_one = CURVE_ORDER;
        n_minus_one[31] = 0x40;
        assert_eq!(
            Assignment::from_scalar(&scalar_from(n_minus_one)),
            Assignment::Right
        );

        assert_eq!(
            Assignment::from_scalar(&scalar_from(ORDER_MIDPOINT)),
            Assignment::Left
        );
    }

    #[test]
    fn test_guess_wire_format() {
        assert_eq!(serde_json::to_string(&Guess::Left).unwrap(), "\"LEFT\"");
        assert_eq!(serde_json::to_string(&Guess::Right).unwrap(), "\"RIGHT\"");
        assert!(serde_json::from_str::<Guess>("\"UP\"").is_err());
    }

    #[test]
    fn test_trial_ids_are_distinct() {
        let mut ids = std::collections::BTreeSet::new();
        for _ in 0..10_000 {
            assert!(ids.insert(TrialId::random()));
        }
    }

    #[test]
    fn test_public_view_carries_only_public_fields() {
        let d = sample_scalar(&mut OsRng).unwrap();
        let point = derive_public_point(&d).unwrap();
        let secret_hex = hex::encode(d.as_bytes());
        let record = TrialRecord::new(TrialId::random(), d, point, Utc::now());

        let json = serde_json::to_string(&record.public()).unwrap();
        assert!(json.contains("trial_id"));
        assert!(json.contains("public_point"));
        assert!(json.contains("issued_at"));
        assert!(!json.contains(&secret_hex));
        assert!(!json.contains("assignment"));
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_record_debug_redacts_secret() {
        let d = sample_scalar(&mut OsRng).unwrap();
        let point = derive_public_point(&d).unwrap();
        let secret_hex = hex::encode(d.as_bytes());
        let record = TrialRecord::new(TrialId::random(), d, point, Utc::now());

        let rendered = format!("{:?}", record);
        assert!(!rendered.contains(&secret_hex));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_privileged_read_matches_scalar_half() {
        let record = TrialRecord::new(
            TrialId::random(),
            scalar_from(ORDER_MIDPOINT),
            derive_public_point(&scalar_from(ORDER_MIDPOINT)).unwrap(),
            Utc::now(),
        );
        assert_eq!(record.assignment(), Assignment::Left);
        assert_eq!(record.secret_scalar().as_bytes(), &ORDER_MIDPOINT);
    }

    #[test]
    fn test_submission_omits_absent_confidence() {
        let submission = Submission {
            trial_id: TrialId::random(),
            guess: Guess::Left,
            confidence: None,
            received_at: Utc::now(),
        };
        let json = serde_json::to_string(&submission).unwrap();
        assert!(!json.contains("confidence"));
    }
}
