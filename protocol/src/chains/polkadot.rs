//! # Polkadot Adapter (`polkadot`)
//!
//! Substrate signers sign raw bytes handed over as `0x`-hex. The proof stores
//! the message in that hex form, so [`ChainAdapter::consent_text`] decodes it
//! again for DID extraction.
//!
//! Signature schemes (sr25519, ed25519, ecdsa) are the verifier's business.
//! The adapter verifies every signature it obtains before handing it out, so
//! a signer answering with the wrong key surfaces as `ProviderMismatch`.

use async_trait::async_trait;
use std::borrow::Cow;
use std::sync::Arc;

use super::{expect_current, verdict};
use crate::account::AccountId;
use crate::adapter::{ChainAdapter, LinkOptions};
use crate::config::POLKADOT_NAMESPACE;
use crate::consent::ConsentMessage;
use crate::crypto::{decode_hex_prefixed, to_hex_prefixed};
use crate::error::LinkError;
use crate::proof::{LinkProof, LinkProofV2, ProofKind};
use crate::provider::{ProviderError, ProviderKind, RawSigner, SigningProvider};

/// Checks `signature` over the bytes of the `0x`-hex `message` for `address`.
#[async_trait]
pub trait PolkadotVerifier: Send + Sync {
    async fn verify(
        &self,
        message: &str,
        signature: &str,
        address: &str,
    ) -> Result<bool, ProviderError>;
}

pub struct PolkadotAdapter {
    verifier: Arc<dyn PolkadotVerifier>,
}

impl PolkadotAdapter {
    pub fn new(verifier: Arc<dyn PolkadotVerifier>) -> Self {
        Self { verifier }
    }

    async fn sign_checked(
        &self,
        signer: &dyn RawSigner,
        data: &str,
        address: &str,
    ) -> Result<String, LinkError> {
        let signature = signer.sign_raw(address, data).await?;
        if !self.verifier.verify(data, &signature, address).await? {
            return Err(LinkError::mismatch(address, "signature from a different key"));
        }
        Ok(signature)
    }
}

#[async_trait]
impl ChainAdapter for PolkadotAdapter {
    fn namespace(&self) -> &str {
        POLKADOT_NAMESPACE
    }

    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::RawPayload
    }

    async fn create_link(
        &self,
        did: &str,
        account: &AccountId,
        provider: &SigningProvider,
        options: &LinkOptions,
    ) -> Result<Option<LinkProofV2>, LinkError> {
        let signer = provider.raw_payload()?;
        let consent = ConsentMessage::build(did, !options.skip_timestamp);
        let message = to_hex_prefixed(consent.message.as_bytes());
        let signature = self
            .sign_checked(signer, &message, account.address())
            .await?;

        Ok(Some(LinkProofV2 {
            kind: ProofKind::Eoa,
            message,
            signature,
            account: account.clone(),
            timestamp: consent.timestamp,
            did: None,
        }))
    }

    async fn validate_link(&self, proof: LinkProof) -> Result<Option<LinkProofV2>, LinkError> {
        let Some(proof) = expect_current(proof, POLKADOT_NAMESPACE, ProofKind::Eoa)? else {
            return Ok(None);
        };

        let answer = self
            .verifier
            .verify(&proof.message, &proof.signature, proof.account.address())
            .await;
        Ok(verdict(answer, proof))
    }

    async fn authenticate(
        &self,
        message: &str,
        account: &AccountId,
        provider: &SigningProvider,
    ) -> Result<String, LinkError> {
        let signer = provider.raw_payload()?;
        let data = to_hex_prefixed(message.as_bytes());
        self.sign_checked(signer, &data, account.address()).await
    }

    fn consent_text<'a>(&self, proof: &'a LinkProofV2) -> Cow<'a, str> {
        decode_hex_prefixed(&proof.message)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .map_or(Cow::Borrowed(proof.message.as_str()), Cow::Owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Never;

    #[async_trait]
    impl PolkadotVerifier for Never {
        async fn verify(&self, _: &str, _: &str, _: &str) -> Result<bool, ProviderError> {
            Ok(false)
        }
    }

    fn proof(message: &str) -> LinkProofV2 {
        LinkProofV2 {
            kind: ProofKind::Eoa,
            message: message.to_string(),
            signature: "0x00".into(),
            account: "5abc@polkadot:b0a8d493285c2df73290dfb7e61f870f".parse().unwrap(),
            timestamp: None,
            did: None,
        }
    }

    #[test]
    fn test_consent_text_decodes_hex() {
        let adapter = PolkadotAdapter::new(Arc::new(Never));
        let text = ConsentMessage::with_timestamp("did:3:bafy", None).message;
        let hex_proof = proof(&to_hex_prefixed(text.as_bytes()));
        assert_eq!(adapter.consent_text(&hex_proof), text);
    }

    #[test]
    fn test_consent_text_falls_back_to_raw() {
        let adapter = PolkadotAdapter::new(Arc::new(Never));
        let raw = proof("not hex did:3:bafy");
        assert_eq!(adapter.consent_text(&raw), "not hex did:3:bafy");
    }

    #[tokio::test]
    async fn test_rejected_signature_is_none() {
        let adapter = PolkadotAdapter::new(Arc::new(Never));
        let result = adapter.validate_link(proof("0x00").into()).await.unwrap();
        assert!(result.is_none());
    }
}
