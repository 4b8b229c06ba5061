use super::rpc::{JsonRpcClient, RpcError};
use super::{ContractCall, ReadConnection};
use crate::error::ContractError;
use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Public read client: plain JSON-RPC against the chain's RPC endpoint.
#[derive(Debug)]
pub struct RpcReader {
    rpc: JsonRpcClient,
}

impl RpcReader {
    pub fn new(url: &str) -> Self {
        Self {
            rpc: JsonRpcClient::new(url),
        }
    }

    pub fn with_client(url: &str, http: reqwest::Client) -> Self {
        Self {
            rpc: JsonRpcClient::with_client(url, http),
        }
    }

    pub async fn balance(&self, address: Address) -> Result<U256, RpcError> {
        self.rpc
            .request("eth_getBalance", json!([address, "latest"]))
            .await
    }
}

#[async_trait]
impl ReadConnection for RpcReader {
    async fn call(&self, call: ContractCall) -> Result<Bytes, ContractError> {
        let mut request = json!({ "to": call.to, "data": call.data });
        if let (Some(from), Value::Object(map)) = (call.from, &mut request) {
            map.insert("from".into(), json!(from));
        }
        let bytes = self.rpc.request("eth_call", json!([request, "latest"])).await?;
        Ok(bytes)
    }
}
