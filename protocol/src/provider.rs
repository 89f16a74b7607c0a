//! # Signing Providers
//!
//! Wallets come in a few shapes, and each chain adapter speaks exactly one:
//!
//! | Kind | Trait | Chain |
//! |------|-------|-------|
//! | `json-rpc` | [`JsonRpcProvider`] | Ethereum family |
//! | `transaction` | [`TransactionSigner`] | Filecoin |
//! | `raw-payload` | [`RawSigner`] | Polkadot |
//! | `arbitrary-data` | [`ArbitraryDataSigner`] | EOSIO |
//!
//! Callers hand the dispatcher a [`SigningProvider`], a closed enum over
//! those four. The dispatcher compares [`SigningProvider::kind`] with the
//! adapter's declared kind before any adapter code runs.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::chains::filecoin::{FilecoinMessage, FilecoinSignature};
use crate::error::LinkError;
use crate::rpc::EthMethod;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A signing provider or verification backend failed to answer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i32, message: String },

    /// The request never got an answer (connection, timeout, HTTP status).
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with something of the wrong shape.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// The wallet refused to sign.
    #[error("signing request rejected: {0}")]
    Rejected(String),
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Request/response provider (EIP-1193 style).
#[async_trait]
pub trait JsonRpcProvider: Send + Sync {
    async fn request(&self, method: EthMethod, params: Value) -> Result<Value, ProviderError>;
}

/// Structured transaction signer.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn accounts(&self) -> Result<Vec<String>, ProviderError>;

    async fn sign(
        &self,
        address: &str,
        message: &FilecoinMessage,
    ) -> Result<FilecoinSignature, ProviderError>;
}

/// Raw-payload signer callback. `data` is `0x`-hex; the result is the
/// signature in the chain's own encoding.
#[async_trait]
pub trait RawSigner: Send + Sync {
    async fn sign_raw(&self, address: &str, data: &str) -> Result<String, ProviderError>;
}

/// Key lookup plus arbitrary-data signing, as EOS wallets expose it.
#[async_trait]
pub trait ArbitraryDataSigner: Send + Sync {
    async fn account_name(&self) -> Result<String, ProviderError>;

    /// Full chain id; adapters truncate it as needed.
    async fn chain_id(&self) -> Result<String, ProviderError>;

    async fn keys(&self) -> Result<Vec<String>, ProviderError>;

    async fn sign_arbitrary(&self, key: &str, data: &str) -> Result<String, ProviderError>;
}

// ---------------------------------------------------------------------------
// SigningProvider
// ---------------------------------------------------------------------------

/// Which capability family a provider belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    JsonRpc,
    Transaction,
    RawPayload,
    ArbitraryData,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JsonRpc => "json-rpc",
            Self::Transaction => "transaction",
            Self::RawPayload => "raw-payload",
            Self::ArbitraryData => "arbitrary-data",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider of one of the supported capability families.
#[derive(Clone)]
pub enum SigningProvider {
    JsonRpc(Arc<dyn JsonRpcProvider>),
    Transaction(Arc<dyn TransactionSigner>),
    RawPayload(Arc<dyn RawSigner>),
    ArbitraryData(Arc<dyn ArbitraryDataSigner>),
}

impl SigningProvider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::JsonRpc(_) => ProviderKind::JsonRpc,
            Self::Transaction(_) => ProviderKind::Transaction,
            Self::RawPayload(_) => ProviderKind::RawPayload,
            Self::ArbitraryData(_) => ProviderKind::ArbitraryData,
        }
    }

    fn mismatch(&self, expected: ProviderKind) -> LinkError {
        LinkError::ProviderKindMismatch {
            expected,
            actual: self.kind(),
        }
    }

    pub(crate) fn json_rpc(&self) -> Result<&dyn JsonRpcProvider, LinkError> {
        match self {
            Self::JsonRpc(p) => Ok(p.as_ref()),
            _ => Err(self.mismatch(ProviderKind::JsonRpc)),
        }
    }

    pub(crate) fn transaction(&self) -> Result<&dyn TransactionSigner, LinkError> {
        match self {
            Self::Transaction(p) => Ok(p.as_ref()),
            _ => Err(self.mismatch(ProviderKind::Transaction)),
        }
    }

    pub(crate) fn raw_payload(&self) -> Result<&dyn RawSigner, LinkError> {
        match self {
            Self::RawPayload(p) => Ok(p.as_ref()),
            _ => Err(self.mismatch(ProviderKind::RawPayload)),
        }
    }

    pub(crate) fn arbitrary_data(&self) -> Result<&dyn ArbitraryDataSigner, LinkError> {
        match self {
            Self::ArbitraryData(p) => Ok(p.as_ref()),
            _ => Err(self.mismatch(ProviderKind::ArbitraryData)),
        }
    }
}

impl fmt::Debug for SigningProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SigningProvider").field(&self.kind()).finish()
    }
}
