//! # Ethereum JSON-RPC over HTTP
//!
//! Read-only connections used to check contract-wallet proofs. Each
//! endpoint is configured as `<chain reference>=<url>`, e.g.
//! `1=https://rpc.example.org`.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use account_link::chains::NetworkResolver;
use account_link::provider::{JsonRpcProvider, ProviderError};
use account_link::rpc::{encode_rpc_message, EthMethod, RpcResponse};

/// Per-request timeout for verification calls.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// One `<reference>=<url>` pair from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcEndpoint {
    pub reference: String,
    pub url: String,
}

impl FromStr for RpcEndpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (reference, url) = s
            .split_once('=')
            .ok_or_else(|| format!("expected <chain reference>=<url>, got `{s}`"))?;
        let reference = reference.trim();
        let url = url.trim();
        if reference.is_empty() || url.is_empty() {
            return Err(format!("expected <chain reference>=<url>, got `{s}`"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("endpoint url must be http(s): `{url}`"));
        }
        Ok(Self {
            reference: reference.to_string(),
            url: url.to_string(),
        })
    }
}

/// A JSON-RPC endpoint reached with HTTP POST.
pub struct HttpJsonRpc {
    client: reqwest::Client,
    url: String,
}

impl HttpJsonRpc {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl JsonRpcProvider for HttpJsonRpc {
    async fn request(&self, method: EthMethod, params: Value) -> Result<Value, ProviderError> {
        let body = encode_rpc_message(method, params);
        tracing::debug!(url = %self.url, %method, "json-rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Transport(format!(
                "{} answered HTTP {status}",
                self.url
            )));
        }

        let envelope: RpcResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        envelope.into_result()
    }
}

/// Chain reference → HTTP connection.
#[derive(Default, Clone)]
pub struct RpcEndpoints {
    connections: HashMap<String, Arc<dyn JsonRpcProvider>>,
}

impl RpcEndpoints {
    pub fn new(client: &reqwest::Client, endpoints: &[RpcEndpoint]) -> Self {
        let connections = endpoints
            .iter()
            .map(|endpoint| {
                let rpc: Arc<dyn JsonRpcProvider> =
                    Arc::new(HttpJsonRpc::new(client.clone(), endpoint.url.clone()));
                (endpoint.reference.clone(), rpc)
            })
            .collect();
        Self { connections }
    }

    /// Configured chain references, sorted.
    pub fn references(&self) -> Vec<&str> {
        let mut references: Vec<&str> = self.connections.keys().map(String::as_str).collect();
        references.sort_unstable();
        references
    }
}

impl NetworkResolver for RpcEndpoints {
    fn connect(&self, reference: &str) -> Option<Arc<dyn JsonRpcProvider>> {
        self.connections.connect(reference)
    }
}
