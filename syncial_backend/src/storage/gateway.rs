use super::{
    classify_content_id, validate_content_id, ContentIdKind, StorageBackend, StorageBalance,
    StorageError, StorageStatus, StoredObject, UploadLimits,
};
use crate::wallet::RpcReader;
use alloy::primitives::utils::format_units;
use alloy::primitives::Address;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Available funds at or below this many whole tokens count as low.
const LOW_BALANCE_THRESHOLD: f64 = 10.0;

/// A storage network reached through an HTTP gateway. The gateway token
/// and the funding wallet stay on the server.
pub struct GatewayStorage {
    base_url: String,
    token: Option<String>,
    wallet: Option<Address>,
    rpc: RpcReader,
    http: reqwest::Client,
    limits: UploadLimits,
}

#[derive(Deserialize)]
struct GatewayUpload {
    #[serde(alias = "rootHash", alias = "pieceCid", alias = "contentId")]
    root_hash: String,
    #[serde(default)]
    size: Option<u64>,
}

impl GatewayStorage {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        wallet: Option<Address>,
        rpc_url: &str,
        limits: UploadLimits,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            wallet,
            rpc: RpcReader::with_client(rpc_url, http.clone()),
            http,
            limits,
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn balance(&self, wallet: Address) -> Result<StorageBalance, StorageError> {
        let wei = self
            .rpc
            .balance(wallet)
            .await
            .map_err(|err| StorageError::Unavailable(err.to_string()))?;
        let whole = format_units(wei, "ether").map_err(|err| StorageError::Backend(err.to_string()))?;
        Ok(StorageBalance {
            wallet_balance: whole.clone(),
            available_funds: whole.clone(),
            total_funds: whole,
            locked_funds: "0.0".into(),
        })
    }
}

fn unavailable(err: reqwest::Error) -> StorageError {
    StorageError::Unavailable(err.to_string())
}

fn from_status(status: StatusCode, body: String) -> StorageError {
    match status {
        StatusCode::NOT_FOUND => StorageError::NotFound,
        StatusCode::PAYMENT_REQUIRED => StorageError::InsufficientFunds,
        StatusCode::PAYLOAD_TOO_LARGE => StorageError::Backend(body),
        s if s.is_server_error() => StorageError::Unavailable(format!("{s}: {body}")),
        s => StorageError::Backend(format!("{s}: {body}")),
    }
}

#[async_trait]
impl StorageBackend for GatewayStorage {
    fn kind(&self) -> &'static str {
        "gateway"
    }

    fn limits(&self) -> UploadLimits {
        self.limits
    }

    async fn put(&self, bytes: Bytes, file_name: &str) -> Result<StoredObject, StorageError> {
        let size = bytes.len() as u64;
        let part = Part::bytes(bytes.to_vec()).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        let response = self
            .authorized(self.http.post(format!("{}/upload", self.base_url)))
            .multipart(form)
            .send()
            .await
            .map_err(unavailable)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(from_status(status, body));
        }
        let uploaded: GatewayUpload = response
            .json()
            .await
            .map_err(|err| StorageError::Backend(format!("malformed upload response: {err}")))?;
        validate_content_id(&uploaded.root_hash)
            .map_err(|_| StorageError::Backend("gateway returned an invalid content id".into()))?;
        let kind = classify_content_id(&uploaded.root_hash);
        if kind == ContentIdKind::Other {
            tracing::warn!(
                content_id = %uploaded.root_hash,
                "gateway returned an unrecognized content id format"
            );
        }
        Ok(StoredObject {
            content_id: uploaded.root_hash,
            size: uploaded.size.unwrap_or(size),
        })
    }

    async fn get(&self, content_id: &str) -> Result<Bytes, StorageError> {
        validate_content_id(content_id)?;
        let response = self
            .authorized(
                self.http
                    .get(format!("{}/download/{content_id}", self.base_url)),
            )
            .send()
            .await
            .map_err(unavailable)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(from_status(status, body));
        }
        response.bytes().await.map_err(unavailable)
    }

    async fn status(&self) -> Result<StorageStatus, StorageError> {
        let response = self
            .authorized(self.http.get(format!("{}/health", self.base_url)))
            .send()
            .await
            .map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(StorageError::Unavailable(format!(
                "gateway health returned {}",
                response.status()
            )));
        }
        let Some(wallet) = self.wallet else {
            return Ok(StorageStatus {
                balance: None,
                low_balance: false,
            });
        };
        let balance = self.balance(wallet).await?;
        let low_balance = balance.available() <= LOW_BALANCE_THRESHOLD;
        Ok(StorageStatus {
            balance: Some(balance),
            low_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_gateway_statuses() {
        assert!(matches!(
            from_status(StatusCode::NOT_FOUND, String::new()),
            StorageError::NotFound
        ));
        assert!(matches!(
            from_status(StatusCode::PAYMENT_REQUIRED, String::new()),
            StorageError::InsufficientFunds
        ));
        assert!(matches!(
            from_status(StatusCode::BAD_GATEWAY, "down".into()),
            StorageError::Unavailable(_)
        ));
    }

    #[test]
    fn upload_response_accepts_known_id_fields() {
        let a: GatewayUpload = serde_json::from_str(r#"{"root_hash":"abc"}"#).unwrap();
        let b: GatewayUpload = serde_json::from_str(r#"{"pieceCid":"def","size":9}"#).unwrap();
        assert_eq!(a.root_hash, "abc");
        assert_eq!((b.root_hash.as_str(), b.size), ("def", Some(9)));
    }
}
