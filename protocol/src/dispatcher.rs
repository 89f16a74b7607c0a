//! # Link Dispatcher
//!
//! Routes create / validate / authenticate requests to the adapter registered
//! for the account's namespace. The adapter table is built once and never
//! changes afterwards:
//!
//! ```text
//! LinkDispatcher::builder()
//!     .register(Arc::new(EthereumAdapter::new()))
//!     .register(Arc::new(PolkadotAdapter::new(verifier)))
//!     .build()
//! ```
//!
//! Every request-shaped failure (unknown namespace, wrong provider family,
//! malformed account) is detected before the adapter, and so before any
//! provider call.
//!
//! Validation picks the namespace without migrating: v2 proofs name it in
//! `account`; anything legacy is `eip155`. After the adapter accepts a proof,
//! `did` is overwritten with whatever DID the consent text contains.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::account::IntoAccountId;
use crate::adapter::{ChainAdapter, LinkOptions};
use crate::did::extract_did;
use crate::error::LinkError;
use crate::proof::{LinkProof, LinkProofV2};
use crate::provider::SigningProvider;

/// Builder for [`LinkDispatcher`].
#[derive(Default)]
pub struct LinkDispatcherBuilder {
    adapters: HashMap<String, Arc<dyn ChainAdapter>>,
}

impl LinkDispatcherBuilder {
    /// Register `adapter` under its namespace. A later registration for the
    /// same namespace replaces the earlier one.
    pub fn register(mut self, adapter: Arc<dyn ChainAdapter>) -> Self {
        let namespace = adapter.namespace().to_string();
        if self.adapters.contains_key(&namespace) {
            warn!(%namespace, "replacing previously registered adapter");
        }
        self.adapters.insert(namespace, adapter);
        self
    }

    pub fn build(self) -> LinkDispatcher {
        LinkDispatcher {
            adapters: self.adapters,
        }
    }
}

/// Immutable namespace → adapter table.
#[derive(Clone)]
pub struct LinkDispatcher {
    adapters: HashMap<String, Arc<dyn ChainAdapter>>,
}

impl LinkDispatcher {
    pub fn builder() -> LinkDispatcherBuilder {
        LinkDispatcherBuilder::default()
    }

    /// Registered namespaces, sorted.
    pub fn namespaces(&self) -> Vec<&str> {
        let mut namespaces: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        namespaces.sort_unstable();
        namespaces
    }

    fn resolve(&self, namespace: &str) -> Result<&Arc<dyn ChainAdapter>, LinkError> {
        self.adapters
            .get(namespace)
            .ok_or_else(|| LinkError::UnsupportedNamespace {
                namespace: namespace.to_string(),
            })
    }

    fn resolve_for_provider(
        &self,
        namespace: &str,
        provider: &SigningProvider,
    ) -> Result<&Arc<dyn ChainAdapter>, LinkError> {
        let adapter = self.resolve(namespace)?;
        let expected = adapter.provider_kind();
        if provider.kind() != expected {
            return Err(LinkError::ProviderKindMismatch {
                expected,
                actual: provider.kind(),
            });
        }
        Ok(adapter)
    }

    /// Create a proof linking `account` to `did`.
    pub async fn create_link(
        &self,
        did: &str,
        account: impl IntoAccountId,
        provider: &SigningProvider,
        options: &LinkOptions,
    ) -> Result<LinkProofV2, LinkError> {
        let account = account.into_account_id()?;
        let namespace = account.namespace();
        let adapter = self.resolve_for_provider(namespace, provider)?;
        debug!(%namespace, %account, "create_link");

        adapter
            .create_link(did, &account, provider, options)
            .await?
            .ok_or_else(|| LinkError::ProofCreationFailed {
                namespace: namespace.to_string(),
            })
    }

    /// Validate a proof of either version.
    ///
    /// `Ok(None)` means the proof does not verify. `Err` means the proof
    /// cannot be interpreted at all (unsupported namespace or type).
    pub async fn validate_link(&self, proof: LinkProof) -> Result<Option<LinkProofV2>, LinkError> {
        let namespace = proof.dispatch_namespace().to_string();
        let adapter = self.resolve(&namespace)?;
        debug!(%namespace, version = proof.version(), "validate_link");

        let Some(mut valid) = adapter.validate_link(proof).await? else {
            debug!(%namespace, "proof not verified");
            return Ok(None);
        };

        let did = extract_did(&adapter.consent_text(&valid)).map(str::to_owned);
        if did.is_none() {
            warn!(account = %valid.account, "verified proof carries no recognizable DID");
        }
        valid.did = did;
        Ok(Some(valid))
    }

    /// Parse a proof from JSON, then [`validate_link`](Self::validate_link).
    pub async fn validate_json(&self, json: &str) -> Result<Option<LinkProofV2>, LinkError> {
        let proof = LinkProof::from_json(json)?;
        self.validate_link(proof).await
    }

    /// Sign `message` as `account` without producing a proof.
    pub async fn authenticate(
        &self,
        message: &str,
        account: impl IntoAccountId,
        provider: &SigningProvider,
    ) -> Result<String, LinkError> {
        let account = account.into_account_id()?;
        let namespace = account.namespace();
        let adapter = self.resolve_for_provider(namespace, provider)?;
        debug!(%namespace, %account, "authenticate");

        adapter.authenticate(message, &account, provider).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountId;
    use crate::proof::ProofKind;
    use crate::provider::{ProviderError, ProviderKind, RawSigner};
    use async_trait::async_trait;
    use std::borrow::Cow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Accepts every v2 proof; creates nothing.
    struct Lenient {
        namespace: &'static str,
    }

    #[async_trait]
    impl ChainAdapter for Lenient {
        fn namespace(&self) -> &str {
            self.namespace
        }

        fn provider_kind(&self) -> ProviderKind {
            ProviderKind::RawPayload
        }

        async fn create_link(
            &self,
            _did: &str,
            _account: &AccountId,
            _provider: &SigningProvider,
            _options: &LinkOptions,
        ) -> Result<Option<LinkProofV2>, LinkError> {
            Ok(None)
        }

        async fn validate_link(&self, proof: LinkProof) -> Result<Option<LinkProofV2>, LinkError> {
            Ok(proof.migrate().ok())
        }

        async fn authenticate(
            &self,
            message: &str,
            _account: &AccountId,
            _provider: &SigningProvider,
        ) -> Result<String, LinkError> {
            Ok(message.to_uppercase())
        }

        fn consent_text<'a>(&self, proof: &'a LinkProofV2) -> Cow<'a, str> {
            Cow::Owned(proof.message.replace("DID ", "did:3:"))
        }
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl RawSigner for Counting {
        async fn sign_raw(&self, _address: &str, _data: &str) -> Result<String, ProviderError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("0x".into())
        }
    }

    fn dispatcher() -> LinkDispatcher {
        LinkDispatcher::builder()
            .register(Arc::new(Lenient { namespace: "polkadot" }))
            .register(Arc::new(Lenient { namespace: "eip155" }))
            .build()
    }

    #[test]
    fn test_namespaces_sorted() {
        assert_eq!(dispatcher().namespaces(), vec!["eip155", "polkadot"]);
    }

    #[tokio::test]
    async fn test_unsupported_namespace_before_provider() {
        let signer = Arc::new(Counting::default());
        let provider = SigningProvider::RawPayload(signer.clone());
        let err = dispatcher()
            .create_link("did:3:abc", "abc@cosmos:hub", &provider, &LinkOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::UnsupportedNamespace { ref namespace } if namespace == "cosmos"));
        assert_eq!(signer.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_creation_is_error() {
        let provider = SigningProvider::RawPayload(Arc::new(Counting::default()));
        let err = dispatcher()
            .create_link("did:3:abc", "abc@polkadot:x", &provider, &LinkOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::ProofCreationFailed { .. }));
    }

    #[tokio::test]
    async fn test_malformed_account_string() {
        let provider = SigningProvider::RawPayload(Arc::new(Counting::default()));
        let err = dispatcher()
            .authenticate("hi", "no-separator", &provider)
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::InvalidAccount(_)));
    }

    #[tokio::test]
    async fn test_authenticate_delegates() {
        let provider = SigningProvider::RawPayload(Arc::new(Counting::default()));
        let out = dispatcher()
            .authenticate("hi", "abc@polkadot:x", &provider)
            .await
            .unwrap();
        assert_eq!(out, "HI");
    }

    #[tokio::test]
    async fn test_validate_sets_did_from_consent_text() {
        let proof = LinkProof::from_json(
            r#"{"version":2,"type":"eoa","message":"link DID bafyabc","signature":"0x","account":"abc@polkadot:x","did":"did:3:forged"}"#,
        )
        .unwrap();
        let valid = dispatcher().validate_link(proof).await.unwrap().unwrap();
        assert_eq!(valid.did.as_deref(), Some("did:3:bafyabc"));
        assert_eq!(valid.kind, ProofKind::Eoa);
    }

    #[tokio::test]
    async fn test_validate_without_did_is_still_valid() {
        let proof = LinkProof::from_json(
            r#"{"version":2,"type":"eoa","message":"nothing here","signature":"0x","account":"abc@polkadot:x","did":"did:3:stale"}"#,
        )
        .unwrap();
        let valid = dispatcher().validate_link(proof).await.unwrap().unwrap();
        assert_eq!(valid.did, None);
    }

    #[tokio::test]
    async fn test_validate_unregistered_namespace() {
        let proof = LinkProof::from_json(
            r#"{"version":2,"type":"eoa","message":"m","signature":"0x","account":"abc@cosmos:hub"}"#,
        )
        .unwrap();
        let err = dispatcher().validate_link(proof).await.unwrap_err();
        assert!(matches!(err, LinkError::UnsupportedNamespace { .. }));
    }

    #[tokio::test]
    async fn test_validate_json_malformed() {
        let err = dispatcher().validate_json("{not json").await.unwrap_err();
        assert!(matches!(err, LinkError::MalformedProof(_)));
    }

    #[test]
    fn test_later_registration_wins() {
        let dispatcher = LinkDispatcher::builder()
            .register(Arc::new(Lenient { namespace: "eip155" }))
            .register(Arc::new(Lenient { namespace: "eip155" }))
            .build();
        assert_eq!(dispatcher.namespaces(), vec!["eip155"]);
    }
}
