//! Core cryptographic primitives.
//!
//! Everything that touches the secret scalar lives here: unbiased sampling
//! over the secp256k1 group order and derivation of the compressed public
//! point. No type in this module ever serializes secret material.

pub mod keys;
pub mod scalar;

// Re-export core types
pub use keys::{derive_public_point, KeyError, PublicPoint, COMPRESSED_POINT_LEN};
pub use scalar::{sample_scalar, SampleError, SecretScalar, CURVE_ORDER, ORDER_MIDPOINT};
