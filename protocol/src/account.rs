//! # Account Identifiers (CAIP-2 / CAIP-10)
//!
//! A proof names the account it links as `address@namespace:reference`:
//!
//! ```text
//! 0xabc...def@eip155:1
//! └── address ┘└ chain id ┘
//! ```
//!
//! The chain id half is a CAIP-2 identifier: a short lowercase namespace
//! (the dispatch key for adapters) and a chain reference whose meaning is
//! namespace-specific (an EVM chain id, a Filecoin network letter, a
//! truncated EOS chain hash, a Polkadot genesis hash prefix).
//!
//! Parsing is strict. An invalid string is an [`AccountIdError`], never a
//! silently defaulted value. Address case is left untouched here; adapters
//! normalize it for their chain.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing or constructing account identifiers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccountIdError {
    /// The string is missing the `@` (account) or `:` (chain id) separator.
    #[error("invalid account id '{0}': expected 'address@namespace:reference'")]
    MissingSeparator(String),

    /// Namespace must match `[-a-z0-9]{3,8}`.
    #[error("invalid chain namespace '{0}'")]
    InvalidNamespace(String),

    /// Reference must match `[-_a-zA-Z0-9]{1,32}`.
    #[error("invalid chain reference '{0}'")]
    InvalidReference(String),

    /// Address must match `[-.%a-zA-Z0-9]{1,128}`.
    #[error("invalid account address '{0}'")]
    InvalidAddress(String),
}

fn valid_namespace(s: &str) -> bool {
    (3..=8).contains(&s.len())
        && s.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

fn valid_reference(s: &str) -> bool {
    (1..=32).contains(&s.len())
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn valid_address(s: &str) -> bool {
    (1..=128).contains(&s.len())
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'%'))
}

// ---------------------------------------------------------------------------
// ChainId
// ---------------------------------------------------------------------------

/// A CAIP-2 chain identifier: `namespace:reference`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId {
    namespace: String,
    reference: String,
}

impl ChainId {
    /// Build a chain id from its parts, validating both.
    pub fn new(
        namespace: impl Into<String>,
        reference: impl Into<String>,
    ) -> Result<Self, AccountIdError> {
        let namespace = namespace.into();
        let reference = reference.into();
        if !valid_namespace(&namespace) {
            return Err(AccountIdError::InvalidNamespace(namespace));
        }
        if !valid_reference(&reference) {
            return Err(AccountIdError::InvalidReference(reference));
        }
        Ok(Self {
            namespace,
            reference,
        })
    }

    /// The namespace, e.g. `eip155`. Adapters are registered under this.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The chain reference, e.g. `1` for Ethereum mainnet.
    pub fn reference(&self) -> &str {
        &self.reference
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

impl FromStr for ChainId {
    type Err = AccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, reference) = s
            .split_once(':')
            .ok_or_else(|| AccountIdError::MissingSeparator(s.to_string()))?;
        Self::new(namespace, reference)
    }
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// A CAIP-10 account identifier: an address on a specific chain.
///
/// # Examples
///
/// ```
/// use account_link::account::AccountId;
///
/// let account: AccountId = "0xabc123@eip155:1".parse().unwrap();
/// assert_eq!(account.address(), "0xabc123");
/// assert_eq!(account.chain_id().namespace(), "eip155");
/// assert_eq!(account.chain_id().reference(), "1");
/// assert_eq!(account.to_string(), "0xabc123@eip155:1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountId {
    address: String,
    chain_id: ChainId,
}

impl AccountId {
    /// Build an account id from an address and an already-valid chain id.
    pub fn new(address: impl Into<String>, chain_id: ChainId) -> Result<Self, AccountIdError> {
        let address = address.into();
        if !valid_address(&address) {
            return Err(AccountIdError::InvalidAddress(address));
        }
        Ok(Self { address, chain_id })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    /// Shorthand for `self.chain_id().namespace()`.
    pub fn namespace(&self) -> &str {
        self.chain_id.namespace()
    }

    /// Same account with the address replaced, e.g. after case normalization.
    pub fn with_address(&self, address: impl Into<String>) -> Result<Self, AccountIdError> {
        Self::new(address, self.chain_id.clone())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.address, self.chain_id)
    }
}

impl FromStr for AccountId {
    type Err = AccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, chain_id) = s
            .split_once('@')
            .ok_or_else(|| AccountIdError::MissingSeparator(s.to_string()))?;
        let chain_id = chain_id.parse::<ChainId>().map_err(|e| match e {
            AccountIdError::MissingSeparator(_) => AccountIdError::MissingSeparator(s.to_string()),
            other => other,
        })?;
        Self::new(address, chain_id)
    }
}

impl TryFrom<&str> for AccountId {
    type Error = AccountIdError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// IntoAccountId
// ---------------------------------------------------------------------------

/// Anything the dispatcher accepts where an account is expected: a parsed
/// [`AccountId`] or its string form.
pub trait IntoAccountId {
    fn into_account_id(self) -> Result<AccountId, AccountIdError>;
}

impl IntoAccountId for AccountId {
    fn into_account_id(self) -> Result<AccountId, AccountIdError> {
        Ok(self)
    }
}

impl IntoAccountId for &AccountId {
    fn into_account_id(self) -> Result<AccountId, AccountIdError> {
        Ok(self.clone())
    }
}

impl IntoAccountId for &str {
    fn into_account_id(self) -> Result<AccountId, AccountIdError> {
        self.parse()
    }
}

impl IntoAccountId for String {
    fn into_account_id(self) -> Result<AccountId, AccountIdError> {
        self.parse()
    }
}

impl IntoAccountId for &String {
    fn into_account_id(self) -> Result<AccountId, AccountIdError> {
        self.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_roundtrip() {
        let cases = [
            "0x12345abcde@eip155:1",
            "testuser1111@eosio:1eaa0824707c8c16bd25145493bf062a",
            "f1xyz@fil:f",
            "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY@polkadot:b0a8d493285c2df73290dfb7e61f870f",
        ];
        for case in cases {
            let account: AccountId = case.parse().unwrap();
            assert_eq!(account.to_string(), case);
        }
    }

    #[test]
    fn accessors() {
        let account: AccountId = "idx3idctest1@eosio:2a02a0053e5a8cf73a56ba0fda11e4d9"
            .parse()
            .unwrap();
        assert_eq!(account.address(), "idx3idctest1");
        assert_eq!(account.namespace(), "eosio");
        assert_eq!(
            account.chain_id().reference(),
            "2a02a0053e5a8cf73a56ba0fda11e4d9"
        );
    }

    #[test]
    fn missing_separators_rejected() {
        assert!(matches!(
            "0xabc".parse::<AccountId>(),
            Err(AccountIdError::MissingSeparator(_))
        ));
        assert!(matches!(
            "0xabc@eip155".parse::<AccountId>(),
            Err(AccountIdError::MissingSeparator(_))
        ));
    }

    #[test]
    fn invalid_parts_rejected() {
        assert!(matches!(
            "0xabc@E:1".parse::<AccountId>(),
            Err(AccountIdError::InvalidNamespace(_))
        ));
        assert!(matches!(
            "0xabc@waytoolongnamespace:1".parse::<AccountId>(),
            Err(AccountIdError::InvalidNamespace(_))
        ));
        assert!(matches!(
            "0xabc@eip155:".parse::<AccountId>(),
            Err(AccountIdError::InvalidReference(_))
        ));
        assert!(matches!(
            "0xabc@eip155:123456789012345678901234567890123".parse::<AccountId>(),
            Err(AccountIdError::InvalidReference(_))
        ));
        assert!(matches!(
            "@eip155:1".parse::<AccountId>(),
            Err(AccountIdError::InvalidAddress(_))
        ));
        assert!(matches!(
            "0x ab@eip155:1".parse::<AccountId>(),
            Err(AccountIdError::InvalidAddress(_))
        ));
    }

    #[test]
    fn serde_as_string() {
        let account: AccountId = "0xabc@eip155:5".parse().unwrap();
        let json = serde_json::to_string(&account).unwrap();
        assert_eq!(json, "\"0xabc@eip155:5\"");
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, account);
        assert!(serde_json::from_str::<AccountId>("\"nope\"").is_err());
    }

    #[test]
    fn into_account_id_variants() {
        let parsed: AccountId = "0xabc@eip155:1".parse().unwrap();
        assert_eq!("0xabc@eip155:1".into_account_id().unwrap(), parsed);
        assert_eq!(
            String::from("0xabc@eip155:1").into_account_id().unwrap(),
            parsed
        );
        assert_eq!((&parsed).into_account_id().unwrap(), parsed);
        assert!("garbage".into_account_id().is_err());
    }

    #[test]
    fn with_address_keeps_chain() {
        let account: AccountId = "0xABC@eip155:10".parse().unwrap();
        let lowered = account.with_address("0xabc").unwrap();
        assert_eq!(lowered.to_string(), "0xabc@eip155:10");
    }
}
