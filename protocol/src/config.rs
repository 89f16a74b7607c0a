//! # Protocol Configuration & Constants
//!
//! Every magic string in the account-link protocol lives here. Signers and
//! verifiers on both sides of a proof must agree on these byte-for-byte, so
//! changing any of them silently invalidates every proof already issued.

// ---------------------------------------------------------------------------
// Consent Message
// ---------------------------------------------------------------------------

/// First line of every consent message. The DID follows after a blank line.
pub const CONSENT_PREAMBLE: &str = "Create a new account link to your identity.";

/// Separator between the preamble and the DID.
pub const CONSENT_DID_SEPARATOR: &str = "\n\n";

/// Inserted before the timestamp when one is embedded in the message.
pub const CONSENT_TIMESTAMP_LABEL: &str = " \nTimestamp: ";

// ---------------------------------------------------------------------------
// Proof Versions
// ---------------------------------------------------------------------------

/// Legacy encoding: implicit Ethereum namespace, bare `address` + `chainId`.
pub const PROOF_VERSION_LEGACY: u64 = 1;

/// Current encoding: explicit CAIP-10 `account`.
pub const PROOF_VERSION_CURRENT: u64 = 2;

// ---------------------------------------------------------------------------
// Namespaces
// ---------------------------------------------------------------------------

/// CAIP-2 namespace of the Ethereum family. Every legacy proof belongs here.
pub const ETHEREUM_NAMESPACE: &str = "eip155";

/// CAIP-2 namespace for Filecoin.
pub const FILECOIN_NAMESPACE: &str = "fil";

/// CAIP-2 namespace for EOSIO chains.
pub const EOSIO_NAMESPACE: &str = "eosio";

/// CAIP-2 namespace for Polkadot / Substrate chains.
pub const POLKADOT_NAMESPACE: &str = "polkadot";

/// Chain reference assumed for legacy proofs that carry no `chainId`.
/// Ethereum mainnet. Legacy proofs made on other chains without a recorded
/// chain id will be checked against mainnet.
pub const LEGACY_DEFAULT_CHAIN_REFERENCE: &str = "1";

// ---------------------------------------------------------------------------
// Proof Sub-kinds
// ---------------------------------------------------------------------------

pub const KIND_ETHEREUM_EOA: &str = "ethereum-eoa";
pub const KIND_ERC1271: &str = "erc1271";
pub const KIND_FILECOIN_EOA_TX: &str = "eoa-tx";
pub const KIND_EOSIO: &str = "eosio";
pub const KIND_POLKADOT_EOA: &str = "eoa";

// ---------------------------------------------------------------------------
// Ethereum
// ---------------------------------------------------------------------------

/// Return value of a successful ERC-1271 `isValidSignature(bytes,bytes)`.
/// It is also the function selector of that same method.
pub const ERC1271_MAGIC_VALUE: [u8; 4] = [0x20, 0xc1, 0x3b, 0x0b];

/// Prefix applied by `personal_sign` before hashing (EIP-191, version 0x45).
pub const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// `eth_getCode` answers that mean "no contract deployed here".
pub const EMPTY_BYTECODE: [&str; 3] = ["0x", "0x0", "0x00"];

// ---------------------------------------------------------------------------
// EOSIO
// ---------------------------------------------------------------------------

/// EOS wallets wrap long words; a space is inserted after this many
/// consecutive non-space characters of the signed payload.
pub const EOSIO_MAX_WORD_LENGTH: usize = 12;

/// CAIP-2 references for EOSIO are the first 32 hex chars of the chain id.
pub const EOSIO_CAIP_CHAIN_ID_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Filecoin
// ---------------------------------------------------------------------------

/// Gas parameters of the zero-value self-transfer that carries the consent
/// payload. These never hit a chain; they only need to be stable.
pub const FILECOIN_GAS_PRICE: &str = "1";
pub const FILECOIN_GAS_LIMIT: u64 = 1000;

// ---------------------------------------------------------------------------
// DID Extraction
// ---------------------------------------------------------------------------

/// DID methods recognized when pulling the DID back out of a message.
pub const RECOGNIZED_DID_METHODS: [&str; 2] = ["3", "muport"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaces_are_distinct() {
        let all = [
            ETHEREUM_NAMESPACE,
            FILECOIN_NAMESPACE,
            EOSIO_NAMESPACE,
            POLKADOT_NAMESPACE,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_versions_ordered() {
        assert!(PROOF_VERSION_LEGACY < PROOF_VERSION_CURRENT);
    }

    #[test]
    fn test_erc1271_magic_matches_selector() {
        // keccak256("isValidSignature(bytes,bytes)")[..4]
        let selector = crate::crypto::keccak256(b"isValidSignature(bytes,bytes)");
        assert_eq!(selector[..4], ERC1271_MAGIC_VALUE);
    }
}
