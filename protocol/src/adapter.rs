//! # Chain Adapter Contract
//!
//! One [`ChainAdapter`] per CAIP-2 namespace. An adapter knows how to:
//!
//! 1. **create** a proof: build the consent message, get it signed by the
//!    provider, and refuse (`ProviderMismatch`) if the provider is not the
//!    requested account on the requested chain;
//! 2. **validate** a proof: recompute the signed bytes and check the
//!    signature, returning `Ok(None)` for any verification failure;
//! 3. **authenticate**: sign an ephemeral message, with the same signer
//!    check as creation.
//!
//! Adapters hold no per-call state. They are shared behind `Arc` and called
//! concurrently.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::borrow::Cow;

use crate::account::AccountId;
use crate::error::LinkError;
use crate::proof::{LinkProof, LinkProofV2};
use crate::provider::{ProviderKind, SigningProvider};

/// Options for proof creation.
///
/// `skip_timestamp` is the only option every adapter honors. Anything in
/// `extra` is passed through untouched for adapter-specific use (the
/// Ethereum adapter reads `signingAccount`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkOptions {
    pub skip_timestamp: bool,
    pub extra: Map<String, Value>,
}

impl LinkOptions {
    /// Options for a message without a timestamp.
    pub fn without_timestamp() -> Self {
        Self {
            skip_timestamp: true,
            ..Self::default()
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// A string-valued adapter option.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

/// Signing and verification for one chain family.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// CAIP-2 namespace this adapter is registered under.
    fn namespace(&self) -> &str;

    /// Provider family this adapter signs through.
    fn provider_kind(&self) -> ProviderKind;

    /// Sign a fresh consent message for `did` as `account`.
    ///
    /// `Ok(None)` means the adapter could not produce a proof; the
    /// dispatcher reports that as `ProofCreationFailed`.
    async fn create_link(
        &self,
        did: &str,
        account: &AccountId,
        provider: &SigningProvider,
        options: &LinkOptions,
    ) -> Result<Option<LinkProofV2>, LinkError>;

    /// Check a proof's signature.
    ///
    /// Returns the (migrated) proof when it verifies and `Ok(None)` when it
    /// does not. `Err` is reserved for proofs this adapter cannot even
    /// interpret, such as an unsupported `type`.
    async fn validate_link(&self, proof: LinkProof) -> Result<Option<LinkProofV2>, LinkError>;

    /// Sign `message` as `account` without producing a proof.
    async fn authenticate(
        &self,
        message: &str,
        account: &AccountId,
        provider: &SigningProvider,
    ) -> Result<String, LinkError>;

    /// Human-readable consent text of a proof, searched for the DID after
    /// validation. Adapters that store an encoded message override this.
    fn consent_text<'a>(&self, proof: &'a LinkProofV2) -> Cow<'a, str> {
        Cow::Borrowed(&proof.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options() {
        let opts = LinkOptions::default();
        assert!(!opts.skip_timestamp);
        assert_eq!(opts.extra_str("signingAccount"), None);

        let opts = LinkOptions::without_timestamp().with_extra("signingAccount", "0xabc");
        assert!(opts.skip_timestamp);
        assert_eq!(opts.extra_str("signingAccount"), Some("0xabc"));
    }

    #[test]
    fn test_non_string_extra_is_ignored_by_extra_str() {
        let opts = LinkOptions::default().with_extra("count", 3);
        assert_eq!(opts.extra_str("count"), None);
        assert_eq!(opts.extra.get("count"), Some(&Value::from(3)));
    }
}
