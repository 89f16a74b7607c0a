//! # Ethereum Signer Recovery
//!
//! `personal_sign` (EIP-191 version `0x45`) signatures carry a recovery id,
//! so the signer's address can be recomputed from the message and signature
//! alone. That is the whole verification story for key-controlled accounts:
//! recover, derive the address, compare.
//!
//! Signatures are the usual 65 bytes `r || s || v`, hex-encoded with `0x`.
//! `v` may be `27/28` (what wallets return) or `0/1` (raw recovery id).
//! High-s signatures are accepted and normalized before recovery.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use thiserror::Error;

use super::hash::{decode_hex_prefixed, keccak256, to_hex_prefixed};
use crate::config::PERSONAL_MESSAGE_PREFIX;

/// Why a signature could not be turned into an address.
///
/// Callers on the verification path collapse all of these into "not
/// verified"; the variants exist for logs and tests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("signature is not valid hex")]
    InvalidHex,

    #[error("signature must be 65 bytes, got {0}")]
    InvalidLength(usize),

    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    #[error("malformed r/s scalars")]
    MalformedSignature,

    #[error("public key recovery failed")]
    RecoveryFailed,
}

/// Digest that `personal_sign` actually signs:
/// `keccak256("\x19Ethereum Signed Message:\n" || len(message) || message)`.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut data = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + 20 + message.len());
    data.extend_from_slice(PERSONAL_MESSAGE_PREFIX.as_bytes());
    data.extend_from_slice(message.len().to_string().as_bytes());
    data.extend_from_slice(message);
    keccak256(&data)
}

/// Derive the lowercase `0x` address of a secp256k1 public key: the last 20
/// bytes of the Keccak-256 of the uncompressed point without its `0x04` tag.
pub fn address_of(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    to_hex_prefixed(&hash[12..])
}

/// Recover the lowercase address that produced `signature` over `message`
/// via `personal_sign`.
pub fn recover_personal_signer(message: &[u8], signature: &str) -> Result<String, RecoveryError> {
    let bytes = decode_hex_prefixed(signature).map_err(|_| RecoveryError::InvalidHex)?;
    if bytes.len() != 65 {
        return Err(RecoveryError::InvalidLength(bytes.len()));
    }

    let v = bytes[64];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let mut recovery_id =
        RecoveryId::from_byte(recovery_byte).ok_or(RecoveryError::InvalidRecoveryId(v))?;
    let mut signature =
        Signature::from_slice(&bytes[..64]).map_err(|_| RecoveryError::MalformedSignature)?;

    // k256 only recovers low-s signatures. Negating s mirrors R, so the
    // y-parity bit of the recovery id flips with it.
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id = RecoveryId::from_byte(recovery_id.to_byte() ^ 1)
            .ok_or(RecoveryError::InvalidRecoveryId(v))?;
    }

    let digest = personal_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .map_err(|_| RecoveryError::RecoveryFailed)?;

    Ok(address_of(&key))
}

/// True for `0x` followed by exactly 40 hex digits, any case.
pub fn is_eth_address(address: &str) -> bool {
    address.len() == 42
        && address.starts_with("0x")
        && address[2..].bytes().all(|b| b.is_ascii_hexdigit())
}
