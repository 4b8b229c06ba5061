use super::rpc::JsonRpcClient;
use super::{
    ContractCall, ContractWrite, ReadConnection, ReceiptStatus, SignerKind, TransactionSigner,
    WriteReceipt,
};
use crate::error::ContractError;
use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// A user-controlled wallet reached over EIP-1193 style JSON-RPC. It holds
/// the keys; this side only asks it to call and to send.
#[derive(Debug)]
pub struct InjectedWallet {
    rpc: JsonRpcClient,
    account: Address,
    poll_interval: Duration,
    receipt_timeout: Duration,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: B256,
    #[serde(default)]
    status: Value,
}

impl InjectedWallet {
    /// Requests account access; the first account returned becomes the
    /// session account.
    pub async fn connect(url: &str) -> Result<Self, ContractError> {
        let rpc = JsonRpcClient::new(url);
        let accounts: Vec<Address> = rpc.request("eth_requestAccounts", json!([])).await?;
        let account = accounts.into_iter().next().ok_or(ContractError::Unauthorized)?;
        Ok(Self {
            rpc,
            account,
            poll_interval: RECEIPT_POLL_INTERVAL,
            receipt_timeout: RECEIPT_TIMEOUT,
        })
    }

    pub fn with_receipt_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.receipt_timeout = timeout;
        self
    }

    pub fn account(&self) -> Address {
        self.account
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<RawReceipt, ContractError> {
        let deadline = tokio::time::Instant::now() + self.receipt_timeout;
        loop {
            let receipt: Option<RawReceipt> = self
                .rpc
                .request_optional("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if let Some(receipt) = receipt {
                return Ok(receipt);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ContractError::ReceiptTimeout {
                    tx_hash: tx_hash.to_string(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl ReadConnection for InjectedWallet {
    async fn call(&self, call: ContractCall) -> Result<Bytes, ContractError> {
        let from = call.from.unwrap_or(self.account);
        let bytes = self
            .rpc
            .request(
                "eth_call",
                json!([{ "from": from, "to": call.to, "data": call.data }, "latest"]),
            )
            .await?;
        Ok(bytes)
    }
}

#[async_trait]
impl TransactionSigner for InjectedWallet {
    fn kind(&self) -> SignerKind {
        SignerKind::Injected
    }

    fn address(&self) -> Address {
        self.account
    }

    async fn write_and_wait(&self, write: ContractWrite) -> Result<WriteReceipt, ContractError> {
        let tx_hash: B256 = self
            .rpc
            .request(
                "eth_sendTransaction",
                json!([{
                    "from": self.account,
                    "to": write.to,
                    "data": write.calldata,
                    "value": write.value,
                }]),
            )
            .await?;
        tracing::debug!(function = write.function, %tx_hash, "transaction submitted");

        let receipt = self.wait_for_receipt(tx_hash).await?;
        Ok(WriteReceipt::new(
            receipt.transaction_hash,
            ReceiptStatus::from_json(&receipt.status),
            SignerKind::Injected,
        ))
    }
}
