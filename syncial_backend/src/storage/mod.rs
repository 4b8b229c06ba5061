//! Off-chain blob storage for post images.

mod fs;
mod gateway;

pub use fs::FsStorage;
pub use gateway::GatewayStorage;

use crate::config::{StorageBackendKind, StorageConfig, SyncialPaths};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use serde::Serialize;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

const MIB: u64 = 1024 * 1024;

/// Size limits of the storage networks the app has shipped against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadProfile {
    Filecoin,
    ZeroG,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadLimits {
    pub min_bytes: u64,
    pub max_bytes: u64,
}

impl UploadProfile {
    pub fn limits(self) -> UploadLimits {
        match self {
            UploadProfile::Filecoin => UploadLimits {
                min_bytes: 127,
                max_bytes: 200 * MIB,
            },
            UploadProfile::ZeroG => UploadLimits {
                min_bytes: 1,
                max_bytes: 10 * MIB,
            },
        }
    }
}

impl FromStr for UploadProfile {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "filecoin" => Ok(UploadProfile::Filecoin),
            "zero_g" | "zero-g" | "0g" => Ok(UploadProfile::ZeroG),
            other => Err(anyhow!("unknown storage profile {other:?}")),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No file provided")]
    MissingFile,
    #[error("Only image files are allowed")]
    NotAnImage { mime: Option<String> },
    #[error("File too small (minimum {min} bytes)")]
    TooSmall { size: u64, min: u64 },
    #[error("File too large (maximum {})", describe_size(.max))]
    TooLarge { size: u64, max: u64 },
    #[error("Invalid content id")]
    InvalidContentId,
    #[error("Image not found")]
    NotFound,
    #[error("storage backend has insufficient funds")]
    InsufficientFunds,
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Errors the uploader can fix by choosing another file.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StorageError::MissingFile
                | StorageError::NotAnImage { .. }
                | StorageError::TooSmall { .. }
                | StorageError::TooLarge { .. }
        )
    }
}

fn describe_size(bytes: &u64) -> String {
    let bytes = *bytes;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MB", bytes / MIB)
    } else {
        format!("{bytes} bytes")
    }
}

/// Checks size bounds and that the payload is an image. Returns the MIME
/// type to record: the declared one when it is an image type, otherwise
/// whatever the magic bytes say.
pub fn validate_upload(
    bytes: &[u8],
    declared_mime: Option<&str>,
    limits: UploadLimits,
) -> Result<String, StorageError> {
    let size = bytes.len() as u64;
    if size < limits.min_bytes {
        return Err(StorageError::TooSmall {
            size,
            min: limits.min_bytes,
        });
    }
    if size > limits.max_bytes {
        return Err(StorageError::TooLarge {
            size,
            max: limits.max_bytes,
        });
    }

    let declared = declared_mime
        .map(|mime| mime.trim().to_ascii_lowercase())
        .filter(|mime| !mime.is_empty() && mime != "application/octet-stream");
    match declared {
        Some(mime) if mime.starts_with("image/") => Ok(mime),
        Some(mime) => Err(StorageError::NotAnImage { mime: Some(mime) }),
        None => match sniff_mime(bytes) {
            Some(mime) if mime.starts_with("image/") => Ok(mime),
            other => Err(StorageError::NotAnImage { mime: other }),
        },
    }
}

pub fn sniff_mime(bytes: &[u8]) -> Option<String> {
    infer::get(bytes).map(|kind| kind.mime_type().to_string())
}

/// Content ids become path segments and URLs; keep them to a safe alphabet.
pub fn validate_content_id(content_id: &str) -> Result<(), StorageError> {
    let valid = !content_id.is_empty()
        && content_id.len() <= 128
        && content_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidContentId)
    }
}

/// What produced a content id. Only ids issued by a storage network are
/// piece CIDs; the filesystem backend issues BLAKE3 hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentIdKind {
    PieceCidV2,
    LegacyPieceCid,
    Blake3,
    Other,
}

const PIECE_CID_V2: &str = r"^bafkzcib[a-z2-7]{56,57}$";
const LEGACY_PIECE_CID: &str = r"^baga6ea4seaq[a-z2-7]{52}$";
const BLAKE3_HEX: &str = r"^[0-9a-f]{64}$";

fn content_id_patterns() -> &'static [(ContentIdKind, Regex)] {
    static PATTERNS: OnceLock<Vec<(ContentIdKind, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (ContentIdKind::PieceCidV2, PIECE_CID_V2),
            (ContentIdKind::LegacyPieceCid, LEGACY_PIECE_CID),
            (ContentIdKind::Blake3, BLAKE3_HEX),
        ]
        .into_iter()
        .filter_map(|(kind, pattern)| Regex::new(pattern).ok().map(|re| (kind, re)))
        .collect()
    })
}

pub fn classify_content_id(content_id: &str) -> ContentIdKind {
    content_id_patterns()
        .iter()
        .find(|(_, re)| re.is_match(content_id))
        .map(|(kind, _)| *kind)
        .unwrap_or(ContentIdKind::Other)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub content_id: String,
    pub size: u64,
}

/// Funds backing the storage account, as decimal strings in whole tokens.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageBalance {
    pub wallet_balance: String,
    pub available_funds: String,
    pub total_funds: String,
    pub locked_funds: String,
}

impl StorageBalance {
    pub fn available(&self) -> f64 {
        self.available_funds.parse().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageStatus {
    pub balance: Option<StorageBalance>,
    pub low_balance: bool,
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> &'static str;

    fn limits(&self) -> UploadLimits;

    async fn put(&self, bytes: Bytes, file_name: &str) -> Result<StoredObject, StorageError>;

    async fn get(&self, content_id: &str) -> Result<Bytes, StorageError>;

    async fn status(&self) -> Result<StorageStatus, StorageError>;
}

pub fn build_backend(
    config: &StorageConfig,
    paths: &SyncialPaths,
    rpc_url: &str,
) -> Result<Arc<dyn StorageBackend>> {
    let limits = config.profile.limits();
    let limits = match config.max_upload_bytes {
        Some(max) => UploadLimits {
            max_bytes: max.min(limits.max_bytes),
            ..limits
        },
        None => limits,
    };
    match config.backend {
        StorageBackendKind::Fs => Ok(Arc::new(FsStorage::new(&paths.blobs_dir, limits))),
        StorageBackendKind::Gateway => {
            let url = config
                .gateway_url
                .as_deref()
                .context("SYNCIAL_STORAGE_GATEWAY_URL is required for the gateway backend")?;
            let wallet = config
                .wallet
                .as_deref()
                .map(|raw| raw.parse())
                .transpose()
                .context("SYNCIAL_STORAGE_WALLET is not a valid address")?;
            Ok(Arc::new(GatewayStorage::new(
                url,
                config.token.clone(),
                wallet,
                rpc_url,
                limits,
            )))
        }
    }
}
