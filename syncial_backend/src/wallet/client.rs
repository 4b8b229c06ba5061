use super::{ContractWrite, ReceiptStatus, SignerKind, TransactionSigner, WriteReceipt};
use crate::error::ContractError;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::TransportError;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

const RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Wallet-abstraction client: signs locally and relies on the provider's
/// fillers for nonce, gas and chain id.
pub struct LocalWalletClient {
    provider: DynProvider,
    address: Address,
}

impl LocalWalletClient {
    pub fn new(private_key: &str, rpc_url: &str) -> Result<Self, ContractError> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .map_err(|err| ContractError::InvalidInput(format!("wallet private key: {err}")))?;
        let address = signer.address();
        let url: Url = rpc_url
            .parse()
            .map_err(|err| ContractError::InvalidInput(format!("rpc url {rpc_url}: {err}")))?;
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();
        Ok(Self { provider, address })
    }
}

fn classify(err: TransportError) -> ContractError {
    match err.as_error_resp() {
        Some(payload) => {
            let data = payload
                .data
                .as_ref()
                .and_then(|raw| serde_json::from_str(raw.get()).ok());
            ContractError::from_rpc(payload.code, &payload.message, data.as_ref())
        }
        None => ContractError::Transport(err.to_string()),
    }
}

#[async_trait]
impl TransactionSigner for LocalWalletClient {
    fn kind(&self) -> SignerKind {
        SignerKind::WalletClient
    }

    fn address(&self) -> Address {
        self.address
    }

    async fn write_and_wait(&self, write: ContractWrite) -> Result<WriteReceipt, ContractError> {
        let tx = TransactionRequest::default()
            .with_from(self.address)
            .with_to(write.to)
            .with_input(write.calldata)
            .with_value(write.value);
        let pending = self.provider.send_transaction(tx).await.map_err(classify)?;
        let tx_hash = *pending.tx_hash();
        tracing::debug!(function = write.function, %tx_hash, "transaction submitted");

        let receipt = pending
            .with_timeout(Some(RECEIPT_TIMEOUT))
            .get_receipt()
            .await
            .map_err(|err| match err {
                alloy::providers::PendingTransactionError::TransportError(err) => classify(err),
                _ => ContractError::ReceiptTimeout {
                    tx_hash: tx_hash.to_string(),
                },
            })?;
        let status = if receipt.status() {
            ReceiptStatus::Success
        } else {
            ReceiptStatus::Reverted
        };
        Ok(WriteReceipt::new(
            receipt.transaction_hash,
            status,
            SignerKind::WalletClient,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Anvil's first dev account.
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn derives_address_from_private_key() {
        let client = LocalWalletClient::new(DEV_KEY, "http://127.0.0.1:8545").unwrap();
        assert_eq!(
            client.address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
                .parse::<Address>()
                .unwrap()
        );
        assert_eq!(client.kind(), SignerKind::WalletClient);
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(matches!(
            LocalWalletClient::new("not-a-key", "http://127.0.0.1:8545"),
            Err(ContractError::InvalidInput(_))
        ));
    }
}
