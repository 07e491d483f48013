//! Trial protocol logic.
//!
//! The blind-trial lifecycle: issuance (secret sampled, public point
//! derived, hidden assignment computed and retained) and blind submission
//! recording. Nothing in this module computes or discloses correctness;
//! that belongs to an analytics pass after data collection closes.

pub mod issuer;
pub mod recorder;
pub mod types;

pub use issuer::{IssueError, TrialIssuer};
pub use recorder::{
    DuplicatePolicy, RecordError, RecorderConfig, SubmissionReceipt, SubmissionRecorder,
};
pub use types::{Assignment, Guess, IssuedTrial, PrivilegedTrialRead, Submission, TrialId, TrialRecord};
