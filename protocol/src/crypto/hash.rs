//! # Hashing Utilities
//!
//! The two hash functions account-link needs, plus the `0x`-hex helpers that
//! every Ethereum-flavoured wire format insists on.
//!
//! - **Keccak-256**: the pre-standard SHA-3 that Ethereum uses for
//!   addresses, `personal_sign` digests and ABI selectors. Not the same as
//!   NIST SHA3-256; the padding differs.
//! - **SHA-256**: used to derive the authentication secret returned by the
//!   Ethereum adapter's `authenticate`.

use sha2::Sha256;
use sha3::{Digest, Keccak256};

/// Compute the Keccak-256 hash of the input data.
///
/// ```
/// use account_link::crypto::keccak256;
///
/// let hash = keccak256(b"");
/// assert_eq!(
///     hex::encode(hash),
///     "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
/// );
/// ```
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the SHA-256 hash of the input data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hex-encode with a `0x` prefix, lowercase.
pub fn to_hex_prefixed(data: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(data))
}

/// Decode hex with or without a `0x` prefix.
pub fn decode_hex_prefixed(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(digits)
}
