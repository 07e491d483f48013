//! Secret Scalar Sampling
//!
//! Produces uniformly distributed secp256k1 private scalars in `[1, n-1]`
//! by rejection sampling over fixed-width CSPRNG draws. Reducing a 256-bit
//! draw modulo `n` would bias the low end of the range, so out-of-range
//! draws are discarded and redrawn instead.
//!
//! The retry loop is unbounded on purpose: capping it would narrow the
//! output distribution if the cap were ever hit. With `n` within a small
//! constant factor of `2^256`, the expected redraw count is far below one.

use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

/// secp256k1 group order `n`, big-endian.
pub const CURVE_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFE, 0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36,
    0x41, 0x41,
];

/// Midpoint `m = (n - 1) / 2`, big-endian.
///
/// `n` is odd, so `m` splits the nonzero scalar range `[1, n-1]` into two
/// exact halves: `[1, m]` and `[m+1, n-1]`.
pub const ORDER_MIDPOINT: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B,
    0x20, 0xA0,
];

/// A secp256k1 private scalar in `[1, n-1]`.
///
/// This type never leaves the server side of the protocol. It has no
/// `Clone` and no serde impls, its `Debug` output is redacted, and the
/// underlying bytes are wiped on drop.
pub struct SecretScalar([u8; 32]);

impl SecretScalar {
    /// Raw big-endian bytes of the scalar.
    ///
    /// Privileged accessor: the only legitimate callers are key derivation
    /// and a post-collection analytics pass. Never feed this into anything
    /// client-reachable.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether the scalar lies in the lower half `[1, m]` of the range.
    ///
    /// Equal-width big-endian arrays order lexicographically, which matches
    /// numeric order, so a byte-slice comparison suffices.
    pub fn is_lower_half(&self) -> bool {
        self.0[..] <= ORDER_MIDPOINT[..]
    }

    #[cfg(test)]
    pub(crate) fn from_bytes_for_test(bytes: [u8; 32]) -> Self {
        debug_assert!(scalar_in_range(&bytes));
        Self(bytes)
    }
}

impl std::fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretScalar(<redacted>)")
    }
}

impl Drop for SecretScalar {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Scalar sampling errors.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    /// The secure randomness source failed to produce output.
    ///
    /// Fatal: there is no fallback to a lower-quality source.
    #[error("entropy source failure: {0}")]
    Entropy(#[from] rand::Error),
}

/// Sample a uniform scalar in `[1, n-1]`.
///
/// Draws 32 bytes from `rng`, interprets them as a big-endian integer and
/// accepts the first draw that is nonzero and below the group order. The
/// `CryptoRng` bound rules out non-cryptographic generators at compile
/// time; a failing entropy source surfaces as [`SampleError::Entropy`]
/// rather than a retry.
pub fn sample_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Result<SecretScalar, SampleError> {
    let mut buf = [0u8; 32];
    loop {
        rng.try_fill_bytes(&mut buf)?;
        if scalar_in_range(&buf) {
            let scalar = SecretScalar(buf);
            buf.zeroize();
            return Ok(scalar);
        }
    }
}

/// Check `1 <= x < n` for a big-endian 32-byte value.
fn scalar_in_range(buf: &[u8; 32]) -> bool {
    buf.iter().any(|&b| b != 0) && buf[..] < CURVE_ORDER[..]
}

// =============================================================================
// TESTS
// =============================================================================
