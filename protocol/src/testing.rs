//! # Test Wallets
//!
//! In-process stand-ins for real wallets and chain SDKs, enabled with the
//! `test-utils` feature.
//!
//! - [`LocalEthereumWallet`] answers the Ethereum JSON-RPC methods with real
//!   secp256k1 keys, and can host an ERC-1271 contract wallet that accepts
//!   signatures from its owner key. It doubles as the read-only network
//!   connection for contract-wallet verification.
//! - Filecoin, EOSIO and Polkadot use ed25519 keys in place of their native
//!   schemes. Only the adapters' plumbing is under test there, so the curve
//!   does not matter as long as signer and verifier agree.
//!
//! Every signer counts its calls, so tests can assert that a rejected request
//! never reached the wallet.

use async_trait::async_trait;
use ed25519_dalek::{Signer, Verifier};
use k256::ecdsa::SigningKey;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::account::AccountId;
use crate::chains::eosio::to_caip_chain_id;
use crate::chains::ethereum::decode_is_valid_signature;
use crate::chains::{
    EosioVerifier, FilecoinMessage, FilecoinSignature, FilecoinVerifier, NetworkResolver,
    PolkadotVerifier,
};
use crate::config::{EOSIO_NAMESPACE, ERC1271_MAGIC_VALUE, ETHEREUM_NAMESPACE};
use crate::crypto::{
    address_of, decode_hex_prefixed, keccak256, personal_message_hash, recover_personal_signer,
    to_hex_prefixed,
};
use crate::provider::{
    ArbitraryDataSigner, JsonRpcProvider, ProviderError, RawSigner, TransactionSigner,
};
use crate::rpc::{EthMethod, RpcError};

/// Bytecode reported for contract wallets. Any non-empty code works.
pub const CONTRACT_WALLET_CODE: &str = "0x608060405234801561001057600080fd5b50";

/// Sign `message` the way `personal_sign` does, as `0x` r‖s‖v with v = 27/28.
pub fn personal_sign(key: &SigningKey, message: &[u8]) -> Result<String, ProviderError> {
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(&personal_message_hash(message))
        .map_err(|e| ProviderError::Rejected(e.to_string()))?;
    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(27 + recovery_id.to_byte());
    Ok(to_hex_prefixed(bytes))
}

fn param_str(params: &Value, index: usize) -> Result<&str, RpcError> {
    params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::invalid_params(format!("param {index} must be a string")))
}

// ---------------------------------------------------------------------------
// Ethereum
// ---------------------------------------------------------------------------

/// A wallet holding secp256k1 keys on one chain.
pub struct LocalEthereumWallet {
    chain_id: u64,
    accounts: Vec<(String, SigningKey)>,
    /// Contract wallet address → owner key.
    contracts: HashMap<String, SigningKey>,
    /// When set, every `personal_sign` uses this key, whatever was asked.
    impostor: Option<SigningKey>,
    unreachable: bool,
    requests: Mutex<Vec<EthMethod>>,
}

impl LocalEthereumWallet {
    /// A wallet with one fresh key-controlled account.
    pub fn new(chain_id: u64) -> Self {
        let key = SigningKey::random(&mut OsRng);
        Self {
            chain_id,
            accounts: vec![(address_of(key.verifying_key()), key)],
            contracts: HashMap::new(),
            impostor: None,
            unreachable: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Add another key-controlled account.
    pub fn with_account(mut self) -> Self {
        let key = SigningKey::random(&mut OsRng);
        self.accounts.push((address_of(key.verifying_key()), key));
        self
    }

    /// Deploy a contract wallet owned by the first account.
    pub fn with_contract_wallet(mut self) -> Self {
        let (owner_address, owner) = &self.accounts[0];
        let seed = format!("{owner_address}/{}", self.contracts.len());
        let contract = to_hex_prefixed(&keccak256(seed.as_bytes())[12..]);
        self.contracts.insert(contract, owner.clone());
        self
    }

    /// Sign with an unrelated key regardless of the requested account.
    pub fn impersonating(mut self) -> Self {
        self.impostor = Some(SigningKey::random(&mut OsRng));
        self
    }

    /// Fail every request with a transport error.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// The first key-controlled address.
    pub fn address(&self) -> &str {
        &self.accounts[0].0
    }

    pub fn addresses(&self) -> Vec<String> {
        self.accounts.iter().map(|(a, _)| a.clone()).collect()
    }

    /// Address of the first deployed contract wallet, if any.
    pub fn contract_address(&self) -> Option<String> {
        let mut contracts: Vec<&String> = self.contracts.keys().collect();
        contracts.sort();
        contracts.first().map(|a| a.to_string())
    }

    /// `address@eip155:<chain>`.
    pub fn account_id(&self, address: &str) -> AccountId {
        format!("{address}@{ETHEREUM_NAMESPACE}:{}", self.chain_id)
            .parse()
            .unwrap_or_else(|e| panic!("wallet produced invalid account id: {e}"))
    }

    /// Methods received so far, in order.
    pub fn requests(&self) -> Vec<EthMethod> {
        self.requests.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    fn signing_key(&self, address: &str) -> Option<&SigningKey> {
        if let Some(key) = &self.impostor {
            return Some(key);
        }
        self.accounts
            .iter()
            .find(|(a, _)| a == address)
            .map(|(_, k)| k)
            .or_else(|| self.contracts.get(address))
    }

    fn is_valid_signature(&self, params: &Value) -> Result<Value, ProviderError> {
        let call = params
            .get(0)
            .ok_or_else(|| RpcError::invalid_params("missing call object"))?;
        let to = call
            .get("to")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        let Some(owner) = self.contracts.get(&to) else {
            return Err(RpcError::execution_reverted().into());
        };
        let calldata = call
            .get("data")
            .and_then(Value::as_str)
            .and_then(|d| decode_hex_prefixed(d).ok())
            .ok_or_else(|| RpcError::invalid_params("call data must be hex"))?;
        let (message, signature) = decode_is_valid_signature(&calldata)
            .ok_or_else(|| RpcError::invalid_params("not an isValidSignature call"))?;

        let valid = recover_personal_signer(&message, &to_hex_prefixed(signature))
            .map(|signer| signer == address_of(owner.verifying_key()))
            .unwrap_or(false);

        let mut word = [0u8; 32];
        if valid {
            word[..4].copy_from_slice(&ERC1271_MAGIC_VALUE);
        }
        Ok(json!(to_hex_prefixed(word)))
    }
}

#[async_trait]
impl JsonRpcProvider for LocalEthereumWallet {
    async fn request(&self, method: EthMethod, params: Value) -> Result<Value, ProviderError> {
        self.requests.lock().push(method);
        if self.unreachable {
            return Err(ProviderError::Transport("connection refused".into()));
        }

        match method {
            EthMethod::ChainId => Ok(json!(format!("0x{:x}", self.chain_id))),
            EthMethod::GetCode => {
                let address = param_str(&params, 0)?.to_lowercase();
                let code = if self.contracts.contains_key(&address) {
                    CONTRACT_WALLET_CODE
                } else {
                    "0x"
                };
                Ok(json!(code))
            }
            EthMethod::PersonalSign => {
                let message = decode_hex_prefixed(param_str(&params, 0)?)
                    .map_err(|_| RpcError::invalid_params("message must be hex"))?;
                let address = param_str(&params, 1)?.to_lowercase();
                let key = self
                    .signing_key(&address)
                    .ok_or_else(|| RpcError::unauthorized(&address))?;
                Ok(json!(personal_sign(key, &message)?))
            }
            EthMethod::Call => self.is_valid_signature(&params),
        }
    }
}

/// Read-only connections keyed by chain reference.
#[derive(Default)]
pub struct LocalNetworks {
    chains: HashMap<String, Arc<dyn JsonRpcProvider>>,
}

impl LocalNetworks {
    pub fn with_chain(mut self, reference: impl Into<String>, rpc: Arc<dyn JsonRpcProvider>) -> Self {
        self.chains.insert(reference.into(), rpc);
        self
    }
}

impl NetworkResolver for LocalNetworks {
    fn connect(&self, reference: &str) -> Option<Arc<dyn JsonRpcProvider>> {
        self.chains.connect(reference)
    }
}

// ---------------------------------------------------------------------------
// ed25519 helpers
// ---------------------------------------------------------------------------

fn ed25519_key() -> ed25519_dalek::SigningKey {
    ed25519_dalek::SigningKey::generate(&mut OsRng)
}

fn ed25519_verify(public_key_hex: &str, message: &[u8], signature_hex: &str) -> bool {
    let Ok(key_bytes) = decode_hex_prefixed(public_key_hex) else {
        return false;
    };
    let Ok(key_bytes) = <[u8; 32]>::try_from(key_bytes.as_slice()) else {
        return false;
    };
    let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = decode_hex_prefixed(signature_hex) else {
        return false;
    };
    let Ok(signature) = ed25519_dalek::Signature::from_slice(&sig_bytes) else {
        return false;
    };
    key.verify(message, &signature).is_ok()
}

fn ed25519_sign(key: &ed25519_dalek::SigningKey, message: &[u8]) -> String {
    hex::encode(key.sign(message).to_bytes())
}

// ---------------------------------------------------------------------------
// Filecoin
// ---------------------------------------------------------------------------

/// Filecoin-style wallet whose address is `<network>1<hex public key>`.
pub struct LocalFilecoinWallet {
    key: ed25519_dalek::SigningKey,
    address: String,
    calls: AtomicUsize,
}

impl LocalFilecoinWallet {
    pub fn new(network: char) -> Self {
        let key = ed25519_key();
        let address = format!("{network}1{}", hex::encode(key.verifying_key().as_bytes()));
        Self {
            key,
            address,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// `address@fil:<network>`.
    pub fn account_id(&self) -> AccountId {
        let network: String = self.address.chars().take(1).collect();
        format!("{}@fil:{network}", self.address)
            .parse()
            .unwrap_or_else(|e| panic!("wallet produced invalid account id: {e}"))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn filecoin_bytes(message: &FilecoinMessage) -> Result<Vec<u8>, ProviderError> {
    serde_json::to_vec(message).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl TransactionSigner for LocalFilecoinWallet {
    async fn accounts(&self) -> Result<Vec<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![self.address.clone()])
    }

    async fn sign(
        &self,
        address: &str,
        message: &FilecoinMessage,
    ) -> Result<FilecoinSignature, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if address != self.address {
            return Err(ProviderError::Rejected(format!("unknown account {address}")));
        }
        Ok(FilecoinSignature {
            kind: 1,
            data: ed25519_sign(&self.key, &filecoin_bytes(message)?),
        })
    }
}

/// Verifies against the public key embedded in the sender address.
pub struct LocalFilecoinVerifier;

#[async_trait]
impl FilecoinVerifier for LocalFilecoinVerifier {
    async fn verify(
        &self,
        signature: &str,
        message: &FilecoinMessage,
    ) -> Result<bool, ProviderError> {
        let Some(public_key) = message.from.get(2..) else {
            return Ok(false);
        };
        Ok(ed25519_verify(public_key, &filecoin_bytes(message)?, signature))
    }
}

// ---------------------------------------------------------------------------
// EOSIO
// ---------------------------------------------------------------------------

/// EOS-style wallet: a named account on a chain, with one key.
pub struct LocalEosioWallet {
    account: String,
    chain_id: String,
    key: ed25519_dalek::SigningKey,
    calls: AtomicUsize,
}

impl LocalEosioWallet {
    /// `chain_id` is the full chain id, as a wallet reports it.
    pub fn new(account: &str, chain_id: &str) -> Self {
        Self {
            account: account.to_string(),
            chain_id: chain_id.to_string(),
            key: ed25519_key(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn public_key(&self) -> String {
        format!("EOS{}", hex::encode(self.key.verifying_key().as_bytes()))
    }

    /// `account@eosio:<first 32 chars of chain id>`.
    pub fn account_id(&self) -> AccountId {
        format!(
            "{}@{EOSIO_NAMESPACE}:{}",
            self.account,
            to_caip_chain_id(&self.chain_id)
        )
        .parse()
        .unwrap_or_else(|e| panic!("wallet produced invalid account id: {e}"))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArbitraryDataSigner for LocalEosioWallet {
    async fn account_name(&self) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.account.clone())
    }

    async fn chain_id(&self) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.chain_id.clone())
    }

    async fn keys(&self) -> Result<Vec<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![self.public_key()])
    }

    async fn sign_arbitrary(&self, key: &str, data: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if key != self.public_key() {
            return Err(ProviderError::Rejected(format!("unknown key {key}")));
        }
        Ok(ed25519_sign(&self.key, data.as_bytes()))
    }
}

/// Account registry standing in for on-chain permission lookup.
#[derive(Default)]
pub struct LocalEosioVerifier {
    /// (CAIP chain reference, account) → hex public key.
    accounts: HashMap<(String, String), String>,
}

impl LocalEosioVerifier {
    pub fn with_wallet(mut self, wallet: &LocalEosioWallet) -> Self {
        self.accounts.insert(
            (to_caip_chain_id(&wallet.chain_id), wallet.account.clone()),
            hex::encode(wallet.key.verifying_key().as_bytes()),
        );
        self
    }
}

#[async_trait]
impl EosioVerifier for LocalEosioVerifier {
    async fn verify_signature(
        &self,
        chain_id: &str,
        account: &str,
        signature: &str,
        data: &str,
    ) -> Result<bool, ProviderError> {
        let Some(public_key) = self
            .accounts
            .get(&(chain_id.to_string(), account.to_string()))
        else {
            return Ok(false);
        };
        Ok(ed25519_verify(public_key, data.as_bytes(), signature))
    }
}

// ---------------------------------------------------------------------------
// Polkadot
// ---------------------------------------------------------------------------

/// Raw-payload signer whose address is the `0x`-hex public key.
pub struct LocalPolkadotSigner {
    key: ed25519_dalek::SigningKey,
    address: String,
    impostor: Option<ed25519_dalek::SigningKey>,
    calls: AtomicUsize,
}

impl LocalPolkadotSigner {
    pub fn new() -> Self {
        let key = ed25519_key();
        let address = to_hex_prefixed(key.verifying_key().as_bytes());
        Self {
            key,
            address,
            impostor: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sign with an unrelated key regardless of the requested address.
    pub fn impersonating(mut self) -> Self {
        self.impostor = Some(ed25519_key());
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn account_id(&self, genesis: &str) -> AccountId {
        format!("{}@polkadot:{genesis}", self.address)
            .parse()
            .unwrap_or_else(|e| panic!("signer produced invalid account id: {e}"))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for LocalPolkadotSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RawSigner for LocalPolkadotSigner {
    async fn sign_raw(&self, address: &str, data: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if address != self.address {
            return Err(ProviderError::Rejected(format!("unknown account {address}")));
        }
        let bytes = decode_hex_prefixed(data)
            .map_err(|e| ProviderError::InvalidResponse(format!("payload is not hex: {e}")))?;
        let key = self.impostor.as_ref().unwrap_or(&self.key);
        Ok(format!("0x{}", ed25519_sign(key, &bytes)))
    }
}

/// Verifies against the public key the address encodes.
pub struct LocalPolkadotVerifier;

#[async_trait]
impl PolkadotVerifier for LocalPolkadotVerifier {
    async fn verify(
        &self,
        message: &str,
        signature: &str,
        address: &str,
    ) -> Result<bool, ProviderError> {
        let Ok(bytes) = decode_hex_prefixed(message) else {
            return Ok(false);
        };
        Ok(ed25519_verify(address, &bytes, signature))
    }
}
