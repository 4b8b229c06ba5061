//! Provider and signer resolution.
//!
//! A session can see up to two wallets: an injected wallet (an EIP-1193
//! style endpoint the user controls) and a wallet-abstraction client made of
//! a public read client plus a locally signing wallet client. Reads prefer
//! the injected wallet; writes walk a signer chain that is fixed when the
//! session connects.

mod client;
mod injected;
mod reader;
pub mod rpc;

#[cfg(test)]
pub(crate) mod testing;

pub use client::LocalWalletClient;
pub use injected::InjectedWallet;
pub use reader::RpcReader;

use crate::chain::ChainSpec;
use crate::config::WalletConfig;
use crate::error::ContractError;
use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Read-only `eth_call` against a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: Address,
    pub from: Option<Address>,
    pub data: Bytes,
}

/// A state-changing contract call, already ABI encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractWrite {
    pub to: Address,
    pub function: &'static str,
    pub calldata: Bytes,
    pub value: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerKind {
    Injected,
    WalletClient,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Success,
    Reverted,
    Unknown(String),
}

impl ReceiptStatus {
    /// Wallets disagree on the shape of `status`: nodes send `"0x1"`, some
    /// providers a number, wallet SDKs the string `"success"`.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(raw) => match raw.to_ascii_lowercase().as_str() {
                "0x1" | "1" | "success" => ReceiptStatus::Success,
                "0x0" | "0" | "reverted" | "failure" => ReceiptStatus::Reverted,
                other => ReceiptStatus::Unknown(other.to_string()),
            },
            Value::Number(n) => match n.as_u64() {
                Some(1) => ReceiptStatus::Success,
                Some(0) => ReceiptStatus::Reverted,
                _ => ReceiptStatus::Unknown(n.to_string()),
            },
            Value::Bool(true) => ReceiptStatus::Success,
            Value::Bool(false) => ReceiptStatus::Reverted,
            other => ReceiptStatus::Unknown(other.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ReceiptStatus::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReceipt {
    pub tx_hash: B256,
    pub status: ReceiptStatus,
    pub success: bool,
    pub via: SignerKind,
}

impl WriteReceipt {
    pub fn new(tx_hash: B256, status: ReceiptStatus, via: SignerKind) -> Self {
        let success = status.is_success();
        Self {
            tx_hash,
            status,
            success,
            via,
        }
    }
}

#[async_trait]
pub trait ReadConnection: Send + Sync {
    async fn call(&self, call: ContractCall) -> Result<Bytes, ContractError>;
}

#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn kind(&self) -> SignerKind;

    fn address(&self) -> Address;

    /// Submits the transaction and waits until it is included.
    async fn write_and_wait(&self, write: ContractWrite) -> Result<WriteReceipt, ContractError>;
}

/// Resolved wallet capabilities for one connected account.
pub struct WalletSession {
    injected_reader: Option<Arc<dyn ReadConnection>>,
    injected_signer: Option<Arc<dyn TransactionSigner>>,
    public_reader: Option<Arc<dyn ReadConnection>>,
    signers: Vec<Arc<dyn TransactionSigner>>,
    account: Option<Address>,
    injected_failure: Option<String>,
}

impl WalletSession {
    pub fn builder() -> WalletSessionBuilder {
        WalletSessionBuilder::default()
    }

    /// Connects every wallet the configuration names. An injected wallet
    /// that refuses to connect is logged and left out; the session then
    /// falls back to the public client for reads. A wallet client whose key
    /// does not parse is likewise logged and skipped.
    pub async fn connect(config: &WalletConfig, chain: &ChainSpec) -> Result<Self, ContractError> {
        let mut builder = Self::builder().public_client(Arc::new(RpcReader::new(&chain.rpc_url)));

        if let Some(url) = &config.injected_url {
            match InjectedWallet::connect(url).await {
                Ok(wallet) => {
                    tracing::info!(account = %wallet.account(), url = %url, "injected wallet connected");
                    builder = builder.injected(Arc::new(wallet));
                }
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "injected wallet unavailable");
                    builder = builder.injected_failure(err.to_string());
                }
            }
        }

        if let Some(key) = &config.private_key {
            match LocalWalletClient::new(key, &chain.rpc_url) {
                Ok(client) => {
                    tracing::info!(account = %client.address(), "wallet client ready");
                    builder = builder.wallet_client(Arc::new(client));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "wallet client unavailable, check SYNCIAL_WALLET_PRIVATE_KEY");
                }
            }
        }

        Ok(builder.build())
    }

    /// A session with no wallets at all; every call fails with
    /// [`ContractError::NoProvider`].
    pub fn disconnected() -> Self {
        Self::builder().build()
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn require_account(&self) -> Result<Address, ContractError> {
        self.account.ok_or(ContractError::NotConnected)
    }

    pub fn signer_chain(&self) -> Vec<SignerKind> {
        self.signers.iter().map(|signer| signer.kind()).collect()
    }

    /// The read connection: injected wallet first, then the public client.
    pub fn connection(&self) -> Result<Arc<dyn ReadConnection>, ContractError> {
        self.injected_reader
            .clone()
            .or_else(|| self.public_reader.clone())
            .ok_or(ContractError::NoProvider)
    }

    /// The injected wallet's signer. The wallet client is never returned
    /// here; it only takes part in [`send_contract_write`](Self::send_contract_write).
    pub fn signer(&self) -> Result<Arc<dyn TransactionSigner>, ContractError> {
        match &self.injected_signer {
            Some(signer) => Ok(signer.clone()),
            None => Err(ContractError::NoSigner(
                self.injected_failure
                    .clone()
                    .unwrap_or_else(|| "no injected wallet".into()),
            )),
        }
    }

    pub async fn call(&self, call: ContractCall) -> Result<Bytes, ContractError> {
        self.connection()?.call(call).await
    }

    /// Sends through the first signer that succeeds. A failure of one path
    /// moves on to the next; only the last failure is reported.
    pub async fn send_contract_write(
        &self,
        write: ContractWrite,
    ) -> Result<WriteReceipt, ContractError> {
        let mut last_error = None;
        for signer in &self.signers {
            match signer.write_and_wait(write.clone()).await {
                Ok(receipt) => {
                    tracing::info!(
                        function = write.function,
                        via = ?receipt.via,
                        tx_hash = %receipt.tx_hash,
                        success = receipt.success,
                        "contract write confirmed"
                    );
                    return Ok(receipt);
                }
                Err(err) => {
                    tracing::warn!(
                        function = write.function,
                        via = ?signer.kind(),
                        error = %err,
                        "contract write failed on signer"
                    );
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or(ContractError::NoWriteMethod))
    }
}

#[derive(Default)]
pub struct WalletSessionBuilder {
    injected_reader: Option<Arc<dyn ReadConnection>>,
    injected_signer: Option<Arc<dyn TransactionSigner>>,
    public_reader: Option<Arc<dyn ReadConnection>>,
    wallet_client: Option<Arc<dyn TransactionSigner>>,
    injected_failure: Option<String>,
}

impl WalletSessionBuilder {
    pub fn injected<W>(mut self, wallet: Arc<W>) -> Self
    where
        W: ReadConnection + TransactionSigner + 'static,
    {
        self.injected_reader = Some(wallet.clone());
        self.injected_signer = Some(wallet);
        self
    }

    pub fn public_client(mut self, reader: Arc<dyn ReadConnection>) -> Self {
        self.public_reader = Some(reader);
        self
    }

    pub fn wallet_client(mut self, client: Arc<dyn TransactionSigner>) -> Self {
        self.wallet_client = Some(client);
        self
    }

    pub fn injected_failure(mut self, reason: impl Into<String>) -> Self {
        self.injected_failure = Some(reason.into());
        self
    }

    /// Fixes the signer chain (injected, then wallet client) and the
    /// connected account.
    pub fn build(self) -> WalletSession {
        let signers: Vec<Arc<dyn TransactionSigner>> = self
            .injected_signer
            .iter()
            .chain(self.wallet_client.iter())
            .cloned()
            .collect();
        let account = signers.first().map(|signer| signer.address());
        WalletSession {
            injected_reader: self.injected_reader,
            injected_signer: self.injected_signer,
            public_reader: self.public_reader,
            signers,
            account,
            injected_failure: self.injected_failure,
        }
    }
}
