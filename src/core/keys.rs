//! Public Key Derivation
//!
//! Derives the compressed SEC1 public point for a secret scalar via the
//! `k256` curve implementation. Hand-rolled elliptic-curve arithmetic is a
//! correctness hazard and deliberately absent from this crate.

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::scalar::SecretScalar;

/// Length of a SEC1 compressed secp256k1 point (parity byte + x-coordinate).
pub const COMPRESSED_POINT_LEN: usize = 33;

/// A compressed secp256k1 public point.
///
/// Deterministic function of the secret scalar; safe to transmit. On the
/// wire it is a fixed-length lowercase hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicPoint([u8; COMPRESSED_POINT_LEN]);

impl PublicPoint {
    /// Raw SEC1 compressed bytes.
    pub fn as_bytes(&self) -> &[u8; COMPRESSED_POINT_LEN] {
        &self.0
    }

    /// Lowercase hex encoding (66 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidEncoding)?;
        let bytes: [u8; COMPRESSED_POINT_LEN] =
            bytes.try_into().map_err(|_| KeyError::InvalidEncoding)?;
        // 0x02 / 0x03 are the SEC1 compressed parity tags.
        if bytes[0] != 0x02 && bytes[0] != 0x03 {
            return Err(KeyError::InvalidEncoding);
        }
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for PublicPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for PublicPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(D::Error::custom)
    }
}

/// Key derivation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KeyError {
    /// The scalar was rejected by the curve implementation.
    ///
    /// Cannot happen for scalars produced by the sampler; surfaced rather
    /// than unwrapped so a broken caller fails loudly.
    #[error("scalar is not a valid secp256k1 secret key")]
    InvalidScalar,

    /// A point encoding was not 33 hex-decodable SEC1 compressed bytes.
    #[error("invalid compressed point encoding")]
    InvalidEncoding,
}

/// Derive the compressed public point for `secret`.
///
/// Standard base-point scalar multiplication; byte-identical output for
/// identical input. `k256::SecretKey` zeroizes its own copy on drop, so no
/// unscrubbed duplicate of the scalar outlives the call.
pub fn derive_public_point(secret: &SecretScalar) -> Result<PublicPoint, KeyError> {
    let secret_key =
        SecretKey::from_slice(secret.as_bytes()).map_err(|_| KeyError::InvalidScalar)?;
    let encoded = secret_key.public_key().to_encoded_point(true);

    let mut bytes = [0u8; COMPRESSED_POINT_LEN];
    bytes.copy_from_slice(encoded.as_bytes());
    Ok(PublicPoint(bytes))
}

// =============================================================================
// TESTS
// =============================================================================
