//! # Ethereum JSON-RPC Envelope
//!
//! The handful of JSON-RPC 2.0 methods the Ethereum adapter speaks, and the
//! request/response envelope around them. The transport is not here: the
//! node crate posts these over HTTP, the test wallet answers them in process.
//!
//! | Method | Params | Used for |
//! |--------|--------|----------|
//! | `personal_sign` | `[hexMessage, address]` | signing consent / auth messages |
//! | `eth_chainId` | `[]` | contract-wallet chain check |
//! | `eth_getCode` | `[address, "latest"]` | EOA vs contract-wallet detection |
//! | `eth_call` | `[{to, data}, "latest"]` | ERC-1271 `isValidSignature` |

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::provider::ProviderError;

/// Request id used for every envelope. Calls are never pipelined.
pub const RPC_REQUEST_ID: u64 = 1;

// ---------------------------------------------------------------------------
// Methods
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EthMethod {
    #[serde(rename = "personal_sign")]
    PersonalSign,
    #[serde(rename = "eth_chainId")]
    ChainId,
    #[serde(rename = "eth_getCode")]
    GetCode,
    #[serde(rename = "eth_call")]
    Call,
}

impl EthMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PersonalSign => "personal_sign",
            Self::ChainId => "eth_chainId",
            Self::GetCode => "eth_getCode",
            Self::Call => "eth_call",
        }
    }
}

impl std::fmt::Display for EthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: EthMethod,
    #[serde(default)]
    pub params: Value,
}

/// Wrap `method` and `params` in a request envelope.
pub fn encode_rpc_message(method: EthMethod, params: Value) -> RpcRequest {
    RpcRequest {
        jsonrpc: "2.0".to_string(),
        id: RPC_REQUEST_ID,
        method,
        params,
    }
}

/// A JSON-RPC 2.0 response. Exactly one of `result` or `error` is set by a
/// conforming server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// An `error` wins over a `result`; neither is an invalid response.
    pub fn into_result(self) -> Result<Value, ProviderError> {
        match (self.error, self.result) {
            (Some(err), _) => Err(ProviderError::Rpc {
                code: err.code,
                message: err.message,
            }),
            (None, Some(result)) => Ok(result),
            (None, None) => Err(ProviderError::InvalidResponse(
                "response carries neither result nor error".into(),
            )),
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: msg.into(),
            data: None,
        }
    }

    /// EIP-1193 4100: the requested account is not authorized.
    pub fn unauthorized(address: &str) -> Self {
        Self {
            code: 4100,
            message: format!("account {address} is not authorized"),
            data: None,
        }
    }

    pub fn execution_reverted() -> Self {
        Self {
            code: -32000,
            message: "execution reverted".into(),
            data: None,
        }
    }
}

impl From<RpcError> for ProviderError {
    fn from(err: RpcError) -> Self {
        ProviderError::Rpc {
            code: err.code,
            message: err.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let req = encode_rpc_message(EthMethod::GetCode, json!(["0xabc", "latest"]));
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "eth_getCode",
                "params": ["0xabc", "latest"]
            })
        );
    }

    #[test]
    fn test_method_names_match_serde() {
        for method in [
            EthMethod::PersonalSign,
            EthMethod::ChainId,
            EthMethod::GetCode,
            EthMethod::Call,
        ] {
            assert_eq!(serde_json::to_value(method).unwrap(), json!(method.as_str()));
        }
    }

    #[test]
    fn test_unsent_methods_do_not_parse() {
        assert!(serde_json::from_value::<EthMethod>(json!("eth_accounts")).is_err());
        assert!(serde_json::from_value::<EthMethod>(json!("eth_sendTransaction")).is_err());
    }

    #[test]
    fn test_response_into_result() {
        let ok: RpcResponse =
            serde_json::from_value(json!({"jsonrpc":"2.0","id":1,"result":"0x1"})).unwrap();
        assert_eq!(ok.into_result().unwrap(), json!("0x1"));

        let err: RpcResponse = serde_json::from_value(
            json!({"jsonrpc":"2.0","id":1,"error":{"code":4001,"message":"User rejected"}}),
        )
        .unwrap();
        assert_eq!(
            err.into_result(),
            Err(ProviderError::Rpc {
                code: 4001,
                message: "User rejected".into()
            })
        );

        let empty: RpcResponse = serde_json::from_value(json!({"jsonrpc":"2.0","id":1})).unwrap();
        assert!(matches!(
            empty.into_result(),
            Err(ProviderError::InvalidResponse(_))
        ));
    }
}
