//! Network Layer
//!
//! WebSocket transport for the trial protocol. This layer only shuttles
//! public payloads; nothing secret-bearing is reachable from here.

pub mod protocol;
pub mod server;

pub use protocol::{ClientMessage, ErrorCode, ServerError, ServerMessage, SubmitRequest};
pub use server::{ServerConfig, TrialServer, TrialServerError};
