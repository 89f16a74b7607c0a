//! # EOSIO Adapter (`eosio`)
//!
//! EOS wallets sign arbitrary data with one of the account's keys. To bind
//! the signature to an account and chain, the signed payload appends both:
//!
//! ```text
//! <message> [For: <account> on chain: eosio:<reference>]
//! ```
//!
//! Wallets refuse long unbroken words, so every whitespace character becomes
//! a plain space and a space is inserted after each run of 12 non-space
//! characters. Verification rebuilds the same payload.
//!
//! The CAIP-2 reference is the first 32 characters of the chain id.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{expect_current, verdict};
use crate::account::AccountId;
use crate::adapter::{ChainAdapter, LinkOptions};
use crate::config::{EOSIO_CAIP_CHAIN_ID_LENGTH, EOSIO_MAX_WORD_LENGTH, EOSIO_NAMESPACE};
use crate::consent::ConsentMessage;
use crate::error::LinkError;
use crate::proof::{LinkProof, LinkProofV2, ProofKind};
use crate::provider::{ArbitraryDataSigner, ProviderError, ProviderKind, SigningProvider};

/// Checks an arbitrary-data signature against the keys of `account` on the
/// chain whose CAIP-2 reference is `chain_id`.
#[async_trait]
pub trait EosioVerifier: Send + Sync {
    async fn verify_signature(
        &self,
        chain_id: &str,
        account: &str,
        signature: &str,
        data: &str,
    ) -> Result<bool, ProviderError>;
}

pub struct EosioAdapter {
    verifier: Arc<dyn EosioVerifier>,
}

impl EosioAdapter {
    pub fn new(verifier: Arc<dyn EosioVerifier>) -> Self {
        Self { verifier }
    }
}

/// CAIP-2 reference of a full EOS chain id.
pub fn to_caip_chain_id(chain_id: &str) -> String {
    chain_id.chars().take(EOSIO_CAIP_CHAIN_ID_LENGTH).collect()
}

fn sanitize(text: &str, size: usize) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / size + 1);
    let mut run = 0;
    for c in text.chars() {
        if c.is_whitespace() {
            out.push(' ');
            run = 0;
            continue;
        }
        out.push(c);
        run += 1;
        if run == size {
            out.push(' ');
            run = 0;
        }
    }
    out
}

/// The exact string an EOS wallet signs for `message` on behalf of `account`.
///
/// ```
/// use account_link::chains::eosio::signing_payload;
///
/// let account = "idx3idctest1@eosio:2a02a0053e5a8cf73a56ba0fda11e4d9".parse().unwrap();
/// assert_eq!(
///     signing_payload("hi\nthere", &account),
///     "hi there [For: idx3idctest1  on chain: eosio:2a02a0 053e5a8cf73a 56ba0fda11e4 d9]"
/// );
/// ```
pub fn signing_payload(message: &str, account: &AccountId) -> String {
    let payload = format!(
        "{message} [For: {} on chain: {}]",
        account.address(),
        account.chain_id()
    );
    sanitize(&payload, EOSIO_MAX_WORD_LENGTH)
}

/// Check the wallet is `account` on the requested chain, then sign the
/// bound payload with its first key. Returns the normalized account too.
async fn sign_payload(
    signer: &dyn ArbitraryDataSigner,
    message: &str,
    account: &AccountId,
) -> Result<(AccountId, String), LinkError> {
    let account = account.with_address(account.address().to_lowercase())?;
    let requested_chain = account.chain_id().reference();

    let account_name = signer.account_name().await?;
    let chain = to_caip_chain_id(&signer.chain_id().await?);
    if chain != requested_chain {
        return Err(LinkError::mismatch(
            format!("{EOSIO_NAMESPACE}:{requested_chain}"),
            format!("{EOSIO_NAMESPACE}:{chain}"),
        ));
    }
    if account_name != account.address() {
        return Err(LinkError::mismatch(account.address(), account_name));
    }

    let payload = signing_payload(message, &account);
    let keys = signer.keys().await?;
    let key = keys
        .first()
        .ok_or_else(|| ProviderError::InvalidResponse("wallet exposes no keys".into()))?;
    let signature = signer.sign_arbitrary(key, &payload).await?;
    debug!(%account, "eosio payload signed");
    Ok((account, signature))
}

#[async_trait]
impl ChainAdapter for EosioAdapter {
    fn namespace(&self) -> &str {
        EOSIO_NAMESPACE
    }

    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::ArbitraryData
    }

    async fn create_link(
        &self,
        did: &str,
        account: &AccountId,
        provider: &SigningProvider,
        options: &LinkOptions,
    ) -> Result<Option<LinkProofV2>, LinkError> {
        let signer = provider.arbitrary_data()?;
        let consent = ConsentMessage::build(did, !options.skip_timestamp);
        let (account, signature) = sign_payload(signer, &consent.message, account).await?;

        Ok(Some(LinkProofV2 {
            kind: ProofKind::Eosio,
            message: consent.message,
            signature,
            account,
            timestamp: consent.timestamp,
            did: None,
        }))
    }

    async fn validate_link(&self, proof: LinkProof) -> Result<Option<LinkProofV2>, LinkError> {
        let Some(proof) = expect_current(proof, EOSIO_NAMESPACE, ProofKind::Eosio)? else {
            return Ok(None);
        };

        let data = signing_payload(&proof.message, &proof.account);
        let answer = self
            .verifier
            .verify_signature(
                proof.account.chain_id().reference(),
                proof.account.address(),
                &proof.signature,
                &data,
            )
            .await;
        Ok(verdict(answer, proof))
    }

    async fn authenticate(
        &self,
        message: &str,
        account: &AccountId,
        provider: &SigningProvider,
    ) -> Result<String, LinkError> {
        let signer = provider.arbitrary_data()?;
        let (_, signature) = sign_payload(signer, message, account).await?;
        Ok(signature)
    }
}
