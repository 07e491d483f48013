//! # Blind Trial Server
//!
//! Trial generator for the secret-bit guessing protocol over secp256k1.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   BLIND TRIAL SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Cryptographic primitives                  │
//! │  ├── scalar.rs   - Unbiased secret-scalar sampling           │
//! │  └── keys.rs     - Compressed public point derivation        │
//! │                                                              │
//! │  trial/          - Protocol logic                            │
//! │  ├── types.rs    - Records and the public/secret split       │
//! │  ├── issuer.rs   - Trial issuance                            │
//! │  └── recorder.rs - Blind submission recording                │
//! │                                                              │
//! │  store/          - Append-only keyed record store            │
//! │                                                              │
//! │  network/        - WebSocket transport                       │
//! │  ├── protocol.rs - Message types                             │
//! │  └── server.rs   - WebSocket server                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Blindness Guarantee
//!
//! Each trial binds a uniformly random secret scalar to a hidden side
//! assignment and exposes only the derived compressed public point:
//! - Scalars are rejection-sampled, never reduced modulo the group order
//! - The assignment type has no serde impls and cannot enter a payload
//! - Submission recording never reads the secret fields and never returns
//!   a correctness verdict
//!
//! An issued trial with no submission is a valid terminal state.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod network;
pub mod store;
pub mod trial;

// Re-export commonly used types
pub use crate::core::keys::{derive_public_point, PublicPoint, COMPRESSED_POINT_LEN};
pub use crate::core::scalar::{sample_scalar, SecretScalar, CURVE_ORDER, ORDER_MIDPOINT};
pub use network::server::{ServerConfig, TrialServer};
pub use store::RecordStore;
pub use trial::issuer::TrialIssuer;
pub use trial::recorder::{DuplicatePolicy, RecorderConfig, SubmissionRecorder};
pub use trial::types::{Guess, IssuedTrial, Submission, TrialId};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
