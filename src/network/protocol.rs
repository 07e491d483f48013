//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are serialized as JSON for debugging ease,
//! with optional binary (bincode) for flat payload structs.

use serde::{Deserialize, Serialize};

use crate::trial::recorder::SubmissionReceipt;
use crate::trial::types::{Guess, IssuedTrial, TrialId};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request a fresh blind trial. Parameterless.
    StartTrial,

    /// Submit a guess for a previously issued trial.
    Submit(SubmitRequest),

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp, echoed back.
        timestamp: u64,
    },
}

/// A guess submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// The trial being answered.
    pub trial_id: TrialId,
    /// The blind guess.
    pub guess: Guess,
    /// Optional stated certainty.
    ///
    /// No `skip_serializing_if` here: bincode decodes positionally, so an
    /// omitted field would truncate the binary encoding. JSON carries an
    /// explicit `null` instead.
    #[serde(default)]
    pub confidence: Option<f64>,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A freshly issued trial: public fields only, never the secret scalar
    /// or assignment.
    TrialIssued(IssuedTrial),

    /// Acknowledgement of a recorded submission. Carries no correctness
    /// signal.
    SubmissionAck(SubmissionReceipt),

    /// Pong response.
    Pong {
        /// Echo of the client timestamp.
        timestamp: u64,
        /// Server time in unix milliseconds.
        server_time: u64,
    },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown {
        /// Human-readable reason.
        reason: String,
    },
}

/// A rejected request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed message or invalid field value.
    InvalidInput,
    /// The referenced trial was never issued.
    TrialNotFound,
    /// A submission for this trial was already accepted.
    DuplicateSubmission,
    /// Connection limit reached.
    ServerOverloaded,
    /// Internal error.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl SubmitRequest {
    /// Serialize to binary.
    ///
    /// Tagged enums (`#[serde(tag = "type")]`) are not supported by
    /// bincode, so the binary path carries this flat struct directly.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}
