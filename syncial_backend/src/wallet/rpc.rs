use crate::error::ContractError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Serialize, Debug)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Deserialize, Debug)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Deserialize, Debug)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("failed to decode {method} result: {message}")]
    Decode { method: String, message: String },
    #[error("{method} returned no result")]
    MissingResult { method: String },
}

impl From<RpcError> for ContractError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Rpc {
                code,
                message,
                data,
            } => ContractError::from_rpc(code, &message, data.as_ref()),
            RpcError::Transport(err) => ContractError::Transport(err.to_string()),
            other => ContractError::Transport(other.to_string()),
        }
    }
}

/// Minimal JSON-RPC 2.0 client over HTTP POST.
#[derive(Debug)]
pub struct JsonRpcClient {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    pub fn with_client(url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        self.request_optional(method, params)
            .await?
            .ok_or_else(|| RpcError::MissingResult {
                method: method.to_string(),
            })
    }

    /// Like [`request`](Self::request) but a `null` result is `Ok(None)`,
    /// which is how nodes answer for a receipt that is not mined yet.
    pub async fn request_optional<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };
        tracing::debug!(url = %self.url, method, id, "json-rpc request");
        let response: JsonRpcResponse = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }
        match response.result {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| RpcError::Decode {
                    method: method.to_string(),
                    message: err.to_string(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rpc_errors_are_classified_when_converted() {
        let err = RpcError::Rpc {
            code: 4001,
            message: "User rejected".into(),
            data: None,
        };
        assert!(matches!(
            ContractError::from(err),
            ContractError::UserRejected
        ));
    }

    #[test]
    fn request_serializes_as_jsonrpc_2() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "eth_chainId",
            params: json!([]),
            id: 7,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "method": "eth_chainId", "params": [], "id": 7})
        );
    }
}
