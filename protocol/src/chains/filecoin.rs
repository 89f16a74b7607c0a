//! # Filecoin Adapter (`fil`)
//!
//! Filecoin wallets sign messages, not arbitrary bytes. The consent JSON is
//! therefore hex-encoded into the `params` of a zero-value message the
//! account sends to itself. Nothing is ever broadcast; the gas fields only
//! need to be the same on both sides.
//!
//! The chain reference is the network prefix letter (`f` mainnet, `t`
//! testnet) and must match the first character of the address.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::{expect_current, verdict};
use crate::account::AccountId;
use crate::adapter::{ChainAdapter, LinkOptions};
use crate::config::{FILECOIN_GAS_LIMIT, FILECOIN_GAS_PRICE, FILECOIN_NAMESPACE};
use crate::consent::ConsentMessage;
use crate::error::LinkError;
use crate::proof::{LinkProof, LinkProofV2, ProofKind};
use crate::provider::{ProviderError, ProviderKind, SigningProvider, TransactionSigner};

/// Unsigned Filecoin message, in the JSON shape signing tools accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilecoinMessage {
    pub from: String,
    pub to: String,
    pub value: String,
    pub method: u64,
    pub gas_price: String,
    pub gas_limit: u64,
    pub nonce: u64,
    /// Hex of the embedded payload.
    pub params: String,
}

impl FilecoinMessage {
    /// Zero-value message from `address` to itself carrying `payload`.
    pub fn self_transfer(address: &str, payload: &str) -> Self {
        Self {
            from: address.to_string(),
            to: address.to_string(),
            value: "0".to_string(),
            method: 0,
            gas_price: FILECOIN_GAS_PRICE.to_string(),
            gas_limit: FILECOIN_GAS_LIMIT,
            nonce: 0,
            params: hex::encode(payload),
        }
    }
}

/// Signature as returned by a Filecoin signer: a key-type tag and the
/// encoded signature bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilecoinSignature {
    #[serde(rename = "type")]
    pub kind: u8,
    pub data: String,
}

/// Checks a signature over a serialized [`FilecoinMessage`].
#[async_trait]
pub trait FilecoinVerifier: Send + Sync {
    async fn verify(
        &self,
        signature: &str,
        message: &FilecoinMessage,
    ) -> Result<bool, ProviderError>;
}

pub struct FilecoinAdapter {
    verifier: Arc<dyn FilecoinVerifier>,
}

impl FilecoinAdapter {
    pub fn new(verifier: Arc<dyn FilecoinVerifier>) -> Self {
        Self { verifier }
    }
}

/// The provider must hold `account` and the address must belong to the
/// requested network.
async fn check_account(
    signer: &dyn TransactionSigner,
    account: &AccountId,
) -> Result<(), LinkError> {
    let address = account.address();
    let reference = account.chain_id().reference();
    if !address.starts_with(reference) {
        let network: String = address.chars().take(1).collect();
        return Err(LinkError::mismatch(
            account.chain_id().to_string(),
            format!("{FILECOIN_NAMESPACE}:{network}"),
        ));
    }

    let accounts = signer.accounts().await?;
    if !accounts.iter().any(|a| a == address) {
        let returned = if accounts.is_empty() {
            "no accounts".to_string()
        } else {
            accounts.join(",")
        };
        return Err(LinkError::mismatch(address, returned));
    }
    Ok(())
}

#[async_trait]
impl ChainAdapter for FilecoinAdapter {
    fn namespace(&self) -> &str {
        FILECOIN_NAMESPACE
    }

    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::Transaction
    }

    async fn create_link(
        &self,
        did: &str,
        account: &AccountId,
        provider: &SigningProvider,
        options: &LinkOptions,
    ) -> Result<Option<LinkProofV2>, LinkError> {
        let signer = provider.transaction()?;
        check_account(signer, account).await?;

        let consent = ConsentMessage::build(did, !options.skip_timestamp);
        let payload = FilecoinMessage::self_transfer(account.address(), &consent.to_json());
        let signature = signer.sign(account.address(), &payload).await?;
        debug!(%account, key_type = signature.kind, "filecoin consent signed");

        Ok(Some(LinkProofV2 {
            kind: ProofKind::EoaTx,
            message: consent.message,
            signature: signature.data,
            account: account.clone(),
            timestamp: consent.timestamp,
            did: None,
        }))
    }

    async fn validate_link(&self, proof: LinkProof) -> Result<Option<LinkProofV2>, LinkError> {
        let Some(proof) = expect_current(proof, FILECOIN_NAMESPACE, ProofKind::EoaTx)? else {
            return Ok(None);
        };

        let consent = ConsentMessage {
            message: proof.message.clone(),
            timestamp: proof.timestamp,
        };
        let payload = FilecoinMessage::self_transfer(proof.account.address(), &consent.to_json());
        let answer = self.verifier.verify(&proof.signature, &payload).await;
        Ok(verdict(answer, proof))
    }

    async fn authenticate(
        &self,
        message: &str,
        account: &AccountId,
        provider: &SigningProvider,
    ) -> Result<String, LinkError> {
        let signer = provider.transaction()?;
        check_account(signer, account).await?;

        // The message travels as a JSON string literal.
        let payload = FilecoinMessage::self_transfer(
            account.address(),
            &Value::from(message).to_string(),
        );
        Ok(signer.sign(account.address(), &payload).await?.data)
    }
}
