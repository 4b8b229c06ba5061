//! Client side of the upload service: what the app calls before posting.

use crate::storage::{
    validate_content_id, validate_upload, StorageError, StorageStatus, UploadLimits,
};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    /// Rejected locally; no request was made.
    #[error("{0}")]
    Invalid(#[from] StorageError),
    /// The upload service answered with `{error}`.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error("upload service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected upload response: {0}")]
    Malformed(String),
}

impl UploadError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            UploadError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub success: bool,
    pub piece_cid: String,
    pub root_hash: String,
    pub size: u64,
    pub file_name: String,
}

impl UploadReceipt {
    /// The id a post records for its image.
    pub fn content_id(&self) -> &str {
        &self.root_hash
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageStatusReport {
    pub status: String,
    #[serde(default)]
    pub balance: Option<serde_json::Value>,
    pub message: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

#[derive(Debug, Clone)]
pub struct UploadClient {
    base_url: String,
    http: reqwest::Client,
    limits: UploadLimits,
}

impl UploadClient {
    pub fn new(base_url: &str, limits: UploadLimits) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            limits,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn limits(&self) -> UploadLimits {
        self.limits
    }

    pub async fn upload(
        &self,
        bytes: Bytes,
        file_name: &str,
        mime: Option<&str>,
    ) -> Result<UploadReceipt, UploadError> {
        let mime = validate_upload(&bytes, mime, self.limits)?;
        tracing::debug!(file_name, size = bytes.len(), %mime, "uploading image");

        let part = Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str(&mime)?;
        let response = self
            .http
            .post(format!("{}/api/upload", self.base_url))
            .multipart(Form::new().part("file", part))
            .send()
            .await?;
        let response = check(response).await?;

        let receipt: UploadReceipt = response
            .json()
            .await
            .map_err(|err| UploadError::Malformed(err.to_string()))?;
        if !receipt.success {
            return Err(UploadError::Malformed("upload reported success=false".into()));
        }
        Ok(receipt)
    }

    pub async fn download(&self, content_id: &str) -> Result<Bytes, UploadError> {
        validate_content_id(content_id)?;
        let response = self
            .http
            .get(format!("{}/api/download/{content_id}", self.base_url))
            .send()
            .await?;
        Ok(check(response).await?.bytes().await?)
    }

    pub async fn storage_status(&self) -> Result<StorageStatusReport, UploadError> {
        let response = self
            .http
            .get(format!("{}/api/storage-status", self.base_url))
            .send()
            .await?;
        let response = check(response).await?;
        response
            .json()
            .await
            .map_err(|err| UploadError::Malformed(err.to_string()))
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, UploadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|parsed| parsed.error)
        .unwrap_or_else(|_| format!("upload service returned {status}"));
    Err(UploadError::Rejected { status, message })
}

impl StorageStatusReport {
    pub fn is_operational(&self) -> bool {
        self.status == "operational"
    }

    pub fn low_balance(&self) -> bool {
        self.message == "Low balance warning"
    }
}

impl From<&StorageStatus> for StorageStatusReport {
    fn from(status: &StorageStatus) -> Self {
        Self {
            status: "operational".into(),
            balance: status
                .balance
                .as_ref()
                .and_then(|balance| serde_json::to_value(balance).ok()),
            message: if status.low_balance {
                "Low balance warning".into()
            } else {
                "Storage service healthy".into()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::UploadProfile;

    #[tokio::test]
    async fn rejects_bad_files_without_a_request() {
        // Nothing listens on port 9; a request would surface as Transport.
        let client = UploadClient::new("http://127.0.0.1:9", UploadProfile::Filecoin.limits());

        let err = client
            .upload(Bytes::from_static(b"tiny"), "a.png", Some("image/png"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Invalid(StorageError::TooSmall { .. })));

        let err = client
            .upload(Bytes::from(vec![b'a'; 512]), "notes.txt", Some("text/plain"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Only image files are allowed");
    }

    #[tokio::test]
    async fn invalid_content_ids_never_leave_the_client() {
        let client = UploadClient::new("http://127.0.0.1:9", UploadProfile::ZeroG.limits());
        assert!(matches!(
            client.download("../secret").await,
            Err(UploadError::Invalid(StorageError::InvalidContentId))
        ));
    }

    #[test]
    fn status_report_mirrors_server_messages() {
        let report = StorageStatusReport::from(&StorageStatus {
            balance: None,
            low_balance: true,
        });
        assert!(report.is_operational());
        assert!(report.low_balance());
    }
}
