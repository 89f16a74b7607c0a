//! # Link Proofs
//!
//! A link proof is the signed artifact callers store and exchange. Two wire
//! encodings exist, told apart by a numeric `version` field:
//!
//! | version | account fields | namespace |
//! |---------|----------------|-----------|
//! | 1 or absent | `address`, optional `chainId` | always `eip155` |
//! | 2 | `account` (CAIP-10) | from `account` |
//!
//! In memory the two are separate types joined by [`LinkProof`]. The only way
//! from one to the other is [`migrate`], which is a no-op for v2 input.
//!
//! Any `version` other than 1 or 2 is read as legacy and logged at `warn`,
//! since a future encoding is not something this crate can verify.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use tracing::warn;

use crate::account::{AccountId, AccountIdError, ChainId};
use crate::config::{
    ETHEREUM_NAMESPACE, KIND_ERC1271, KIND_EOSIO, KIND_ETHEREUM_EOA, KIND_FILECOIN_EOA_TX,
    KIND_POLKADOT_EOA, LEGACY_DEFAULT_CHAIN_REFERENCE, PROOF_VERSION_CURRENT,
    PROOF_VERSION_LEGACY,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A proof that is structurally unusable, as opposed to one whose signature
/// simply does not verify.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProofError {
    /// JSON that does not describe a proof of either version.
    #[error("malformed proof: {0}")]
    Malformed(String),

    /// The `account` of a proof, or the one synthesized during migration,
    /// is not a valid CAIP-10 identifier.
    #[error("invalid proof account: {0}")]
    InvalidAccount(#[from] AccountIdError),

    /// A legacy proof with no `address` has nothing to migrate to.
    #[error("legacy proof has no address")]
    MissingAddress,
}

// ---------------------------------------------------------------------------
// ProofKind
// ---------------------------------------------------------------------------

/// Adapter-specific sub-kind, the `type` field on the wire.
///
/// Unknown strings are preserved as [`ProofKind::Other`] so that the adapter
/// can reject them as unsupported instead of the parser rejecting the proof.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProofKind {
    /// Ethereum key-controlled account, verified by signer recovery.
    EthereumEoa,
    /// Ethereum contract wallet, verified on-chain.
    Erc1271,
    /// Filecoin message signature.
    EoaTx,
    /// EOSIO arbitrary-data signature.
    Eosio,
    /// Polkadot raw-payload signature.
    Eoa,
    Other(String),
}

impl ProofKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::EthereumEoa => KIND_ETHEREUM_EOA,
            Self::Erc1271 => KIND_ERC1271,
            Self::EoaTx => KIND_FILECOIN_EOA_TX,
            Self::Eosio => KIND_EOSIO,
            Self::Eoa => KIND_POLKADOT_EOA,
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for ProofKind {
    fn from(s: &str) -> Self {
        match s {
            KIND_ETHEREUM_EOA => Self::EthereumEoa,
            KIND_ERC1271 => Self::Erc1271,
            KIND_FILECOIN_EOA_TX => Self::EoaTx,
            KIND_EOSIO => Self::Eosio,
            KIND_POLKADOT_EOA => Self::Eoa,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ProofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProofKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProofKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Proof encodings
// ---------------------------------------------------------------------------

/// Current encoding: explicit CAIP-10 account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkProofV2 {
    #[serde(rename = "type")]
    pub kind: ProofKind,
    pub message: String,
    pub signature: String,
    pub account: AccountId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    /// Set by validation, never by creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
}

/// Legacy encoding: a bare Ethereum address and an optional numeric chain id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkProofV1 {
    /// Absent on the oldest proofs, which were all `ethereum-eoa`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ProofKind>,
    pub message: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(
        rename = "chainId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
}

impl LinkProofV1 {
    /// The effective sub-kind, defaulting to `ethereum-eoa`.
    pub fn kind(&self) -> ProofKind {
        self.kind.clone().unwrap_or(ProofKind::EthereumEoa)
    }
}

/// A proof in either encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkProof {
    V1(LinkProofV1),
    V2(LinkProofV2),
}

impl LinkProof {
    /// Parse a proof from its JSON wire form.
    pub fn from_json(json: &str) -> Result<Self, ProofError> {
        serde_json::from_str(json).map_err(|e| ProofError::Malformed(e.to_string()))
    }

    pub fn version(&self) -> u64 {
        match self {
            Self::V1(_) => PROOF_VERSION_LEGACY,
            Self::V2(_) => PROOF_VERSION_CURRENT,
        }
    }

    /// Namespace used to pick an adapter, without migrating: the account's
    /// namespace for v2, `eip155` for anything legacy.
    pub fn dispatch_namespace(&self) -> &str {
        match self {
            Self::V1(_) => ETHEREUM_NAMESPACE,
            Self::V2(p) => p.account.namespace(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::V1(p) => &p.message,
            Self::V2(p) => &p.message,
        }
    }

    pub fn signature(&self) -> &str {
        match self {
            Self::V1(p) => &p.signature,
            Self::V2(p) => &p.signature,
        }
    }

    pub fn did(&self) -> Option<&str> {
        match self {
            Self::V1(p) => p.did.as_deref(),
            Self::V2(p) => p.did.as_deref(),
        }
    }

    /// Upgrade to the current encoding. See [`migrate`].
    pub fn migrate(self) -> Result<LinkProofV2, ProofError> {
        migrate(self)
    }
}

impl From<LinkProofV1> for LinkProof {
    fn from(p: LinkProofV1) -> Self {
        Self::V1(p)
    }
}

impl From<LinkProofV2> for LinkProof {
    fn from(p: LinkProofV2) -> Self {
        Self::V2(p)
    }
}

#[derive(Serialize)]
struct Versioned<'a, T> {
    version: u64,
    #[serde(flatten)]
    inner: &'a T,
}

impl Serialize for LinkProof {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::V1(inner) => Versioned {
                version: PROOF_VERSION_LEGACY,
                inner,
            }
            .serialize(serializer),
            Self::V2(inner) => Versioned {
                version: PROOF_VERSION_CURRENT,
                inner,
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for LinkProof {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let mut map = Map::<String, Value>::deserialize(deserializer)?;
        let version = map.remove("version");

        let is_current = match &version {
            None | Some(Value::Null) => false,
            Some(v) if v.as_u64() == Some(PROOF_VERSION_CURRENT) => true,
            Some(v) if v.as_u64() == Some(PROOF_VERSION_LEGACY) => false,
            Some(other) => {
                warn!(version = %other, "unknown proof version, reading as legacy");
                false
            }
        };

        let object = Value::Object(map);
        if is_current {
            serde_json::from_value(object)
                .map(LinkProof::V2)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value(object)
                .map(LinkProof::V1)
                .map_err(D::Error::custom)
        }
    }
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

/// Upgrade any proof to the v2 encoding.
///
/// Legacy proofs are always Ethereum-family: the account becomes
/// `address@eip155:<chainId>`, with chain `1` assumed when `chainId` is
/// absent. A legacy proof created on another chain without a recorded
/// `chainId` will therefore be checked against mainnet. The address is
/// copied verbatim; case normalization is the Ethereum adapter's job.
///
/// ```
/// use account_link::proof::{migrate, LinkProof};
///
/// let legacy = LinkProof::from_json(
///     r#"{"message":"m","signature":"0x00","address":"0xabc","chainId":5}"#,
/// ).unwrap();
/// let current = migrate(legacy).unwrap();
/// assert_eq!(current.account.to_string(), "0xabc@eip155:5");
/// assert_eq!(migrate(current.clone().into()).unwrap(), current);
/// ```
pub fn migrate(proof: LinkProof) -> Result<LinkProofV2, ProofError> {
    let legacy = match proof {
        LinkProof::V2(current) => return Ok(current),
        LinkProof::V1(legacy) => legacy,
    };

    let kind = legacy.kind();
    let address = legacy.address.ok_or(ProofError::MissingAddress)?;
    let reference = legacy
        .chain_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| LEGACY_DEFAULT_CHAIN_REFERENCE.to_string());
    let account = AccountId::new(address, ChainId::new(ETHEREUM_NAMESPACE, reference)?)?;

    Ok(LinkProofV2 {
        kind,
        message: legacy.message,
        signature: legacy.signature,
        account,
        timestamp: legacy.timestamp,
        did: legacy.did,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v2_json() -> Value {
        json!({
            "version": 2,
            "type": "ethereum-eoa",
            "message": "Create a new account link to your identity.\n\ndid:3:bafysdfwefwe",
            "signature": "0xdeadbeef",
            "account": "0xabc@eip155:1"
        })
    }

    #[test]
    fn test_parse_v2() {
        let proof: LinkProof = serde_json::from_value(v2_json()).unwrap();
        let LinkProof::V2(p) = &proof else {
            panic!("expected v2");
        };
        assert_eq!(p.kind, ProofKind::EthereumEoa);
        assert_eq!(p.account.to_string(), "0xabc@eip155:1");
        assert_eq!(proof.dispatch_namespace(), "eip155");
        assert_eq!(proof.version(), 2);
    }

    #[test]
    fn test_v2_serialization_roundtrip() {
        let proof: LinkProof = serde_json::from_value(v2_json()).unwrap();
        let value = serde_json::to_value(&proof).unwrap();
        assert_eq!(value, v2_json());
    }

    #[test]
    fn test_v2_requires_account() {
        let mut value = v2_json();
        value.as_object_mut().unwrap().remove("account");
        assert!(serde_json::from_value::<LinkProof>(value).is_err());
    }

    #[test]
    fn test_v2_rejects_bad_account() {
        let mut value = v2_json();
        value["account"] = json!("not-an-account");
        assert!(LinkProof::from_json(&value.to_string()).is_err());
    }

    #[test]
    fn test_missing_version_is_legacy() {
        let proof = LinkProof::from_json(r#"{"message":"m","signature":"s","address":"0xabc"}"#)
            .unwrap();
        assert!(matches!(proof, LinkProof::V1(_)));
        assert_eq!(proof.dispatch_namespace(), ETHEREUM_NAMESPACE);
    }

    #[test]
    fn test_unknown_version_is_legacy() {
        let proof = LinkProof::from_json(
            r#"{"version":7,"message":"m","signature":"s","account":"0xabc@fil:f"}"#,
        )
        .unwrap();
        // Read as legacy, so the v2 account is ignored and dispatch stays on eip155.
        assert!(matches!(proof, LinkProof::V1(_)));
        assert_eq!(proof.dispatch_namespace(), ETHEREUM_NAMESPACE);
    }

    #[test]
    fn test_unknown_kind_preserved() {
        let mut value = v2_json();
        value["type"] = json!("quantum-wallet");
        let proof: LinkProof = serde_json::from_value(value).unwrap();
        let LinkProof::V2(p) = proof else {
            panic!("expected v2");
        };
        assert_eq!(p.kind, ProofKind::Other("quantum-wallet".into()));
        assert_eq!(p.kind.to_string(), "quantum-wallet");
    }

    #[test]
    fn test_migrate_defaults_chain_and_kind() {
        let legacy = LinkProof::from_json(r#"{"message":"m","signature":"s","address":"0xabc"}"#)
            .unwrap();
        let migrated = migrate(legacy).unwrap();
        assert_eq!(migrated.account.to_string(), "0xabc@eip155:1");
        assert_eq!(migrated.kind, ProofKind::EthereumEoa);
    }

    #[test]
    fn test_migrate_keeps_chain_and_kind() {
        let legacy = LinkProof::from_json(
            r#"{"version":1,"type":"erc1271","message":"m","signature":"s","address":"0xabc","chainId":137,"timestamp":9}"#,
        )
        .unwrap();
        let migrated = migrate(legacy).unwrap();
        assert_eq!(migrated.account.to_string(), "0xabc@eip155:137");
        assert_eq!(migrated.kind, ProofKind::Erc1271);
        assert_eq!(migrated.timestamp, Some(9));

        let value = serde_json::to_value(LinkProof::V2(migrated)).unwrap();
        assert_eq!(value["version"], 2);
        assert!(value.get("address").is_none());
        assert!(value.get("chainId").is_none());
    }

    #[test]
    fn test_migrate_idempotent() {
        let legacy = LinkProof::from_json(
            r#"{"message":"m","signature":"s","address":"0xabc","chainId":3}"#,
        )
        .unwrap();
        let once = migrate(legacy).unwrap();
        let twice = migrate(LinkProof::V2(once.clone())).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_migrate_requires_address() {
        let legacy = LinkProof::from_json(r#"{"message":"m","signature":"s"}"#).unwrap();
        assert_eq!(migrate(legacy), Err(ProofError::MissingAddress));
    }

    #[test]
    fn test_migrate_rejects_invalid_address() {
        let legacy =
            LinkProof::from_json(r#"{"message":"m","signature":"s","address":"0x a"}"#).unwrap();
        assert!(matches!(
            migrate(legacy),
            Err(ProofError::InvalidAccount(AccountIdError::InvalidAddress(_)))
        ));
    }
}
