//! # Cryptographic Primitives
//!
//! Hashing and Ethereum signer recovery. Everything else (Filecoin, EOS and
//! Polkadot signature schemes, contract-wallet checks) is delegated to the
//! chain SDKs behind the verifier traits in [`crate::chains`].
//!
//! Everything here is a thin, type-safe wrapper around audited
//! implementations (`k256`, `sha3`, `sha2`).

pub mod hash;
pub mod recovery;

pub use hash::{decode_hex_prefixed, keccak256, sha256, to_hex_prefixed};
pub use recovery::{
    address_of, is_eth_address, personal_message_hash, recover_personal_signer, RecoveryError,
};
