//! # Ethereum Adapter (`eip155`)
//!
//! Two account kinds live behind an Ethereum address:
//!
//! - **Key-controlled (`ethereum-eoa`)**: the proof is a `personal_sign`
//!   signature and verifies by recovering the signer. No network needed.
//! - **Contract wallet (`erc1271`)**: the address has code. The wallet signs
//!   with some owner key, and only the contract can say whether that counts,
//!   via `isValidSignature(bytes,bytes)`. Verification is an `eth_call`
//!   against a read-only connection for the account's chain.
//!
//! The kind is detected at creation time by calling `eth_getCode`. A failed
//! call counts as "no code".
//!
//! Legacy (v1) proofs are always handled here. A legacy `ethereum-eoa` proof
//! without an address gets one by recovery before it is migrated.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::account::AccountId;
use crate::adapter::{ChainAdapter, LinkOptions};
use crate::config::{EMPTY_BYTECODE, ERC1271_MAGIC_VALUE, ETHEREUM_NAMESPACE};
use crate::consent::ConsentMessage;
use crate::crypto::{
    decode_hex_prefixed, is_eth_address, recover_personal_signer, sha256, to_hex_prefixed,
};
use crate::error::LinkError;
use crate::proof::{migrate, LinkProof, LinkProofV2, ProofKind};
use crate::provider::{JsonRpcProvider, ProviderError, ProviderKind, SigningProvider};
use crate::rpc::EthMethod;

/// Adapter option naming the owner key expected to sign for a contract
/// wallet.
pub const SIGNING_ACCOUNT_OPTION: &str = "signingAccount";

/// Resolves a chain reference (`"1"`, `"137"`, ...) to a read-only
/// JSON-RPC connection for contract-wallet verification.
pub trait NetworkResolver: Send + Sync {
    fn connect(&self, reference: &str) -> Option<Arc<dyn JsonRpcProvider>>;
}

impl NetworkResolver for HashMap<String, Arc<dyn JsonRpcProvider>> {
    fn connect(&self, reference: &str) -> Option<Arc<dyn JsonRpcProvider>> {
        self.get(reference).cloned()
    }
}

/// Ethereum-family [`ChainAdapter`].
///
/// Without a [`NetworkResolver`] the adapter still creates both kinds of
/// proof and verifies key-controlled ones, but every contract-wallet proof
/// validates to `None`.
#[derive(Clone, Default)]
pub struct EthereumAdapter {
    networks: Option<Arc<dyn NetworkResolver>>,
}

impl EthereumAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_networks(networks: Arc<dyn NetworkResolver>) -> Self {
        Self {
            networks: Some(networks),
        }
    }

    async fn validate_erc1271(&self, proof: LinkProofV2) -> Option<LinkProofV2> {
        let chain = proof.account.chain_id();
        let Some(rpc) = self
            .networks
            .as_ref()
            .and_then(|networks| networks.connect(chain.reference()))
        else {
            warn!(chain = %chain, "no read-only connection for chain, contract-wallet proof not verified");
            return None;
        };

        let answer = is_valid_signature(
            rpc.as_ref(),
            proof.account.address(),
            &proof.message,
            &proof.signature,
        )
        .await;
        match answer {
            Ok(valid) => {
                debug!(account = %proof.account, valid, "isValidSignature answered");
                valid.then_some(proof)
            }
            Err(err) => {
                warn!(%err, chain = %chain, "isValidSignature call failed");
                None
            }
        }
    }
}

#[async_trait]
impl ChainAdapter for EthereumAdapter {
    fn namespace(&self) -> &str {
        ETHEREUM_NAMESPACE
    }

    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::JsonRpc
    }

    async fn create_link(
        &self,
        did: &str,
        account: &AccountId,
        provider: &SigningProvider,
        options: &LinkOptions,
    ) -> Result<Option<LinkProofV2>, LinkError> {
        let rpc = provider.json_rpc()?;
        let account = normalize(account)?;
        let address = account.address();
        let consent = ConsentMessage::build(did, !options.skip_timestamp);

        let kind = detect_kind(rpc, address).await;
        debug!(%account, %kind, "detected ethereum account kind");

        let signature = if kind == ProofKind::Erc1271 {
            let chain = chain_id(rpc).await?;
            let requested = account.chain_id().reference();
            if chain.to_string() != requested {
                return Err(LinkError::mismatch(
                    account.chain_id().to_string(),
                    format!("{ETHEREUM_NAMESPACE}:{chain}"),
                ));
            }
            let signature = personal_sign(rpc, &consent.message, address).await?;
            if let Some(owner) = options.extra_str(SIGNING_ACCOUNT_OPTION) {
                check_signer(&consent.message, &signature, &owner.to_lowercase())?;
            }
            check_contract_accepts(rpc, address, &consent.message, &signature).await?;
            signature
        } else {
            let signature = personal_sign(rpc, &consent.message, address).await?;
            check_signer(&consent.message, &signature, address)?;
            signature
        };

        Ok(Some(LinkProofV2 {
            kind,
            message: consent.message,
            signature,
            account,
            timestamp: consent.timestamp,
            did: None,
        }))
    }

    async fn validate_link(&self, proof: LinkProof) -> Result<Option<LinkProofV2>, LinkError> {
        let kind = match &proof {
            LinkProof::V1(legacy) => legacy.kind(),
            LinkProof::V2(current) => current.kind.clone(),
        };
        if !matches!(kind, ProofKind::EthereumEoa | ProofKind::Erc1271) {
            return Err(LinkError::UnsupportedType {
                namespace: ETHEREUM_NAMESPACE.to_string(),
                kind: kind.to_string(),
            });
        }

        let proof = match proof {
            LinkProof::V2(current) => current,
            LinkProof::V1(mut legacy) => {
                if kind == ProofKind::EthereumEoa && legacy.address.is_none() {
                    match recover_personal_signer(legacy.message.as_bytes(), &legacy.signature) {
                        Ok(address) => legacy.address = Some(address),
                        Err(err) => {
                            debug!(%err, "legacy proof signer not recoverable");
                            return Ok(None);
                        }
                    }
                }
                match migrate(LinkProof::V1(legacy)) {
                    Ok(current) => current,
                    Err(err) => {
                        debug!(%err, "legacy proof not migratable");
                        return Ok(None);
                    }
                }
            }
        };

        match kind {
            ProofKind::Erc1271 => Ok(self.validate_erc1271(proof).await),
            _ => Ok(validate_eoa(proof)),
        }
    }

    async fn authenticate(
        &self,
        message: &str,
        account: &AccountId,
        provider: &SigningProvider,
    ) -> Result<String, LinkError> {
        let rpc = provider.json_rpc()?;
        let account = normalize(account)?;
        let signature = personal_sign(rpc, message, account.address()).await?;
        check_signer(message, &signature, account.address())?;

        let digits = signature.strip_prefix("0x").unwrap_or(&signature);
        Ok(to_hex_prefixed(sha256(digits.as_bytes())))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn normalize(account: &AccountId) -> Result<AccountId, LinkError> {
    let address = account.address().to_lowercase();
    if !is_eth_address(&address) {
        return Err(LinkError::MalformedInput(format!(
            "'{}' is not an Ethereum address",
            account.address()
        )));
    }
    Ok(account.with_address(address)?)
}

fn validate_eoa(proof: LinkProofV2) -> Option<LinkProofV2> {
    match recover_personal_signer(proof.message.as_bytes(), &proof.signature) {
        Ok(recovered) if recovered == proof.account.address().to_lowercase() => Some(proof),
        Ok(recovered) => {
            debug!(account = %proof.account, %recovered, "signer does not match account");
            None
        }
        Err(err) => {
            debug!(%err, "signature not recoverable");
            None
        }
    }
}

fn check_signer(message: &str, signature: &str, expected: &str) -> Result<(), LinkError> {
    match recover_personal_signer(message.as_bytes(), signature) {
        Ok(recovered) if recovered == expected => Ok(()),
        Ok(recovered) => Err(LinkError::mismatch(expected, recovered)),
        Err(err) => Err(LinkError::mismatch(
            expected,
            format!("unrecoverable signature ({err})"),
        )),
    }
}

/// Ask the contract at `address` whether it accepts `signature` over
/// `message`. An `Rpc` error means the call reverted.
async fn is_valid_signature(
    rpc: &dyn JsonRpcProvider,
    address: &str,
    message: &str,
    signature: &str,
) -> Result<bool, ProviderError> {
    let Ok(signature) = decode_hex_prefixed(signature) else {
        return Ok(false);
    };
    let calldata = encode_is_valid_signature(message.as_bytes(), &signature);
    let params = json!([
        {
            "to": address.to_lowercase(),
            "data": to_hex_prefixed(calldata),
        },
        "latest"
    ]);

    match rpc.request(EthMethod::Call, params).await? {
        Value::String(result) => {
            let bytes = decode_hex_prefixed(&result).map_err(|_| {
                ProviderError::InvalidResponse(format!("isValidSignature returned {result}"))
            })?;
            Ok(bytes.get(..4) == Some(&ERC1271_MAGIC_VALUE[..]))
        }
        other => Err(ProviderError::InvalidResponse(format!(
            "isValidSignature returned {other}"
        ))),
    }
}

/// A freshly signed contract-wallet proof must pass `isValidSignature` on
/// the wallet's own chain before it is handed out.
async fn check_contract_accepts(
    rpc: &dyn JsonRpcProvider,
    address: &str,
    message: &str,
    signature: &str,
) -> Result<(), LinkError> {
    match is_valid_signature(rpc, address, message, signature).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(LinkError::mismatch(address, "signature rejected by contract wallet")),
        Err(ProviderError::Rpc { message, .. }) => Err(LinkError::mismatch(
            address,
            format!("isValidSignature reverted ({message})"),
        )),
        Err(err) => Err(err.into()),
    }
}

async fn detect_kind(rpc: &dyn JsonRpcProvider, address: &str) -> ProofKind {
    match rpc.request(EthMethod::GetCode, json!([address, "latest"])).await {
        Ok(Value::String(code)) if !code.is_empty() && !EMPTY_BYTECODE.contains(&code.as_str()) => {
            ProofKind::Erc1271
        }
        Ok(_) => ProofKind::EthereumEoa,
        Err(err) => {
            warn!(%err, "eth_getCode failed, assuming key-controlled account");
            ProofKind::EthereumEoa
        }
    }
}

async fn chain_id(rpc: &dyn JsonRpcProvider) -> Result<u64, ProviderError> {
    let value = rpc.request(EthMethod::ChainId, json!([])).await?;
    let parsed = match &value {
        Value::String(s) => {
            let digits = s.strip_prefix("0x").unwrap_or(s);
            u64::from_str_radix(digits, 16).ok()
        }
        Value::Number(n) => n.as_u64(),
        _ => None,
    };
    parsed.ok_or_else(|| ProviderError::InvalidResponse(format!("eth_chainId returned {value}")))
}

async fn personal_sign(
    rpc: &dyn JsonRpcProvider,
    message: &str,
    address: &str,
) -> Result<String, ProviderError> {
    let params = json!([to_hex_prefixed(message.as_bytes()), address]);
    match rpc.request(EthMethod::PersonalSign, params).await? {
        Value::String(signature) => Ok(signature),
        other => Err(ProviderError::InvalidResponse(format!(
            "personal_sign returned {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// ERC-1271 ABI
// ---------------------------------------------------------------------------

fn abi_word(n: usize) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&(n as u64).to_be_bytes());
    word
}

fn padded_len(n: usize) -> usize {
    n.div_ceil(32) * 32
}

fn push_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&abi_word(bytes.len()));
    out.extend_from_slice(bytes);
    out.resize(out.len() + padded_len(bytes.len()) - bytes.len(), 0);
}

/// Calldata for `isValidSignature(bytes data, bytes signature)`.
pub fn encode_is_valid_signature(data: &[u8], signature: &[u8]) -> Vec<u8> {
    let data_size = 32 + padded_len(data.len());
    let mut out = Vec::with_capacity(4 + 64 + data_size + 32 + padded_len(signature.len()));
    // The selector and the magic return value are the same four bytes.
    out.extend_from_slice(&ERC1271_MAGIC_VALUE);
    out.extend_from_slice(&abi_word(64));
    out.extend_from_slice(&abi_word(64 + data_size));
    push_bytes(&mut out, &data[..]);
    push_bytes(&mut out, signature);
    out
}

/// Inverse of [`encode_is_valid_signature`]: `(data, signature)`.
pub fn decode_is_valid_signature(calldata: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
    let args = calldata.strip_prefix(&ERC1271_MAGIC_VALUE[..])?;

    let read_word = |at: usize| -> Option<usize> {
        let word = args.get(at..at.checked_add(32)?)?;
        if word[..24].iter().any(|b| *b != 0) {
            return None;
        }
        let mut tail = [0u8; 8];
        tail.copy_from_slice(&word[24..]);
        usize::try_from(u64::from_be_bytes(tail)).ok()
    };
    let read_bytes = |offset: usize| -> Option<Vec<u8>> {
        let len = read_word(offset)?;
        let start = offset.checked_add(32)?;
        args.get(start..start.checked_add(len)?).map(<[u8]>::to_vec)
    };

    Some((read_bytes(read_word(0)?)?, read_bytes(read_word(32)?)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{address_of, personal_message_hash};
    use k256::ecdsa::SigningKey;

    /// Answers `personal_sign` with one key and reports fixed code/chain.
    /// `eth_call` plays a contract wallet owned by `owner`.
    struct KeyWallet {
        key: SigningKey,
        code: &'static str,
        chain: &'static str,
        owner: String,
    }

    #[async_trait]
    impl JsonRpcProvider for KeyWallet {
        async fn request(&self, method: EthMethod, params: Value) -> Result<Value, ProviderError> {
            match method {
                EthMethod::GetCode => Ok(json!(self.code)),
                EthMethod::ChainId => Ok(json!(self.chain)),
                EthMethod::PersonalSign => {
                    let message = decode_hex_prefixed(params[0].as_str().unwrap_or_default())
                        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
                    let (sig, recid) = self
                        .key
                        .sign_prehash_recoverable(&personal_message_hash(&message))
                        .map_err(|e| ProviderError::Rejected(e.to_string()))?;
                    let mut bytes = sig.to_bytes().to_vec();
                    bytes.push(recid.to_byte() + 27);
                    Ok(json!(to_hex_prefixed(bytes)))
                }
                EthMethod::Call => {
                    let data = params[0]["data"].as_str().unwrap_or_default();
                    let calldata = decode_hex_prefixed(data)
                        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
                    let (data, sig) = decode_is_valid_signature(&calldata)
                        .ok_or_else(|| ProviderError::InvalidResponse("bad calldata".into()))?;
                    let signer = recover_personal_signer(&data, &to_hex_prefixed(sig));
                    let mut word = [0u8; 32];
                    if matches!(signer, Ok(ref s) if *s == self.owner) {
                        word[..4].copy_from_slice(&ERC1271_MAGIC_VALUE);
                    }
                    Ok(json!(to_hex_prefixed(word)))
                }
            }
        }
    }

    fn wallet(code: &'static str) -> (SigningProvider, String) {
        let key = SigningKey::from_slice(&[3u8; 32]).unwrap();
        let address = address_of(key.verifying_key());
        let provider = SigningProvider::JsonRpc(Arc::new(KeyWallet {
            key,
            code,
            chain: "0x1",
            owner: address.clone(),
        }));
        (provider, address)
    }

    #[test]
    fn test_abi_layout() {
        let calldata = encode_is_valid_signature(b"hi", &[0xaa; 65]);
        // selector + 2 offsets + (len + 1 word) + (len + 3 words)
        assert_eq!(calldata.len(), 4 + 64 + 64 + 32 + 96);
        assert_eq!(calldata[..4], ERC1271_MAGIC_VALUE);
        assert_eq!(calldata[4 + 31], 64);
        assert_eq!(calldata[4 + 63], 128);

        let (data, sig) = decode_is_valid_signature(&calldata).unwrap();
        assert_eq!(data, b"hi");
        assert_eq!(sig, vec![0xaa; 65]);
    }

    #[test]
    fn test_abi_decode_rejects_truncated() {
        let calldata = encode_is_valid_signature(b"hello", &[1; 65]);
        assert!(decode_is_valid_signature(&calldata[..calldata.len() - 40]).is_none());
        assert!(decode_is_valid_signature(&[0, 1, 2, 3]).is_none());
    }

    #[test]
    fn test_normalize() {
        let account: AccountId = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01@eip155:1"
            .parse()
            .unwrap();
        assert_eq!(
            normalize(&account).unwrap().address(),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );

        let bad: AccountId = "0xabc@eip155:1".parse().unwrap();
        assert!(matches!(normalize(&bad), Err(LinkError::MalformedInput(_))));
    }

    #[tokio::test]
    async fn test_eoa_create_and_validate() {
        let (provider, address) = wallet("0x");
        let account: AccountId = format!("{address}@eip155:1").parse().unwrap();
        let adapter = EthereumAdapter::new();

        let proof = adapter
            .create_link("did:3:abc", &account, &provider, &LinkOptions::without_timestamp())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(proof.kind, ProofKind::EthereumEoa);
        assert_eq!(proof.timestamp, None);

        let validated = adapter.validate_link(proof.clone().into()).await.unwrap();
        assert_eq!(validated, Some(proof));
    }

    #[tokio::test]
    async fn test_signer_mismatch() {
        let (provider, _) = wallet("0x");
        let account: AccountId = "0x0000000000000000000000000000000000000001@eip155:1"
            .parse()
            .unwrap();
        let err = EthereumAdapter::new()
            .create_link("did:3:abc", &account, &provider, &LinkOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::ProviderMismatch { .. }));
    }

    #[tokio::test]
    async fn test_contract_wallet_chain_mismatch() {
        let (provider, address) = wallet("0x6080");
        let account: AccountId = format!("{address}@eip155:137").parse().unwrap();
        let err = EthereumAdapter::new()
            .create_link("did:3:abc", &account, &provider, &LinkOptions::default())
            .await
            .unwrap_err();
        match err {
            LinkError::ProviderMismatch { expected, returned } => {
                assert_eq!(expected, "eip155:137");
                assert_eq!(returned, "eip155:1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_contract_wallet_without_network_is_unverified() {
        let (provider, address) = wallet("0x6080");
        let account: AccountId = format!("{address}@eip155:1").parse().unwrap();
        let adapter = EthereumAdapter::new();
        let proof = adapter
            .create_link("did:3:abc", &account, &provider, &LinkOptions::without_timestamp())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(proof.kind, ProofKind::Erc1271);
        assert_eq!(adapter.validate_link(proof.into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_contract_wallet_refusing_signature_is_mismatch() {
        let key = SigningKey::from_slice(&[3u8; 32]).unwrap();
        let address = address_of(key.verifying_key());
        let provider = SigningProvider::JsonRpc(Arc::new(KeyWallet {
            key,
            code: "0x6080",
            chain: "0x1",
            owner: "0x00000000000000000000000000000000000000aa".into(),
        }));
        let account: AccountId = format!("{address}@eip155:1").parse().unwrap();

        let err = EthereumAdapter::new()
            .create_link("did:3:abc", &account, &provider, &LinkOptions::default())
            .await
            .unwrap_err();
        match err {
            LinkError::ProviderMismatch { expected, returned } => {
                assert_eq!(expected, address);
                assert_eq!(returned, "signature rejected by contract wallet");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_legacy_without_address_is_recovered() {
        let (provider, address) = wallet("0x");
        let account: AccountId = format!("{address}@eip155:1").parse().unwrap();
        let adapter = EthereumAdapter::new();
        let proof = adapter
            .create_link("did:3:abc", &account, &provider, &LinkOptions::without_timestamp())
            .await
            .unwrap()
            .unwrap();

        let legacy = LinkProof::from_json(
            &json!({"version": 1, "message": proof.message, "signature": proof.signature})
                .to_string(),
        )
        .unwrap();
        let validated = adapter.validate_link(legacy).await.unwrap().unwrap();
        assert_eq!(validated.account, account);
    }

    #[tokio::test]
    async fn test_unknown_kind_is_unsupported() {
        let proof = LinkProof::from_json(
            r#"{"version":2,"type":"eoa-tx","message":"m","signature":"0x00","account":"0xabc@eip155:1"}"#,
        )
        .unwrap();
        let err = EthereumAdapter::new().validate_link(proof).await.unwrap_err();
        assert!(matches!(err, LinkError::UnsupportedType { .. }));
    }

    #[tokio::test]
    async fn test_authenticate_returns_signature_digest() {
        let (provider, address) = wallet("0x");
        let account: AccountId = format!("{address}@eip155:1").parse().unwrap();
        let secret = EthereumAdapter::new()
            .authenticate("login nonce 42", &account, &provider)
            .await
            .unwrap();
        assert!(secret.starts_with("0x"));
        assert_eq!(secret.len(), 66);
    }
}
