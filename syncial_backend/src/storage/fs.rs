use super::{
    validate_content_id, StorageBackend, StorageError, StorageStatus, StoredObject, UploadLimits,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Content-addressed blobs on local disk. The content id is the BLAKE3 hex
/// digest; files are fanned out by the first two hex characters.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
    limits: UploadLimits,
}

impl FsStorage {
    pub fn new(root: impl AsRef<Path>, limits: UploadLimits) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            limits,
        }
    }

    fn blob_path(&self, content_id: &str) -> PathBuf {
        let shard = content_id.get(..2).unwrap_or("00");
        self.root.join(shard).join(content_id)
    }
}

async fn discard(staging: &Path) {
    if let Err(err) = tokio::fs::remove_file(staging).await {
        if err.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %staging.display(), error = %err, "failed to remove staging file");
        }
    }
}

#[async_trait]
impl StorageBackend for FsStorage {
    fn kind(&self) -> &'static str {
        "fs"
    }

    fn limits(&self) -> UploadLimits {
        self.limits
    }

    async fn put(&self, bytes: Bytes, file_name: &str) -> Result<StoredObject, StorageError> {
        let content_id = blake3::hash(&bytes).to_hex().to_string();
        let path = self.blob_path(&content_id);
        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(%content_id, "blob already stored");
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            // One staging file per writer; concurrent uploads of the same
            // bytes race only on the final rename.
            let staging = path.with_file_name(format!("{content_id}.{}.part", Uuid::new_v4()));
            if let Err(err) = tokio::fs::write(&staging, &bytes).await {
                discard(&staging).await;
                return Err(err.into());
            }
            if let Err(err) = tokio::fs::rename(&staging, &path).await {
                discard(&staging).await;
                if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    return Err(err.into());
                }
                tracing::debug!(%content_id, error = %err, "blob stored by a concurrent upload");
            } else {
                tracing::info!(%content_id, size = bytes.len(), file_name, "blob stored");
            }
        }
        Ok(StoredObject {
            content_id,
            size: bytes.len() as u64,
        })
    }

    async fn get(&self, content_id: &str) -> Result<Bytes, StorageError> {
        validate_content_id(content_id)?;
        match tokio::fs::read(self.blob_path(content_id)).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    async fn status(&self) -> Result<StorageStatus, StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(StorageStatus {
            balance: None,
            low_balance: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::UploadProfile;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn stores_and_reads_back_by_hash() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path(), UploadProfile::Filecoin.limits());
        let payload = Bytes::from_static(b"not really an image but bytes are bytes");

        let stored = storage.put(payload.clone(), "a.png").await.unwrap();
        assert_eq!(stored.content_id, blake3::hash(&payload).to_hex().to_string());
        assert_eq!(stored.size, payload.len() as u64);

        let again = storage.put(payload.clone(), "b.png").await.unwrap();
        assert_eq!(again.content_id, stored.content_id);

        assert_eq!(storage.get(&stored.content_id).await.unwrap(), payload);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_puts_of_the_same_bytes_all_succeed() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(FsStorage::new(dir.path(), UploadProfile::Filecoin.limits()));
        let payload = Bytes::from(vec![0x5a; 4 * 1024 * 1024]);
        let content_id = blake3::hash(&payload).to_hex().to_string();

        for _ in 0..5 {
            let uploads = (0..8).map(|i| {
                let storage = storage.clone();
                let payload = payload.clone();
                tokio::spawn(async move { storage.put(payload, &format!("{i}.png")).await })
            });
            for upload in futures_util::future::join_all(uploads).await {
                assert_eq!(upload.unwrap().unwrap().content_id, content_id);
            }
            let shard = dir.path().join(&content_id[..2]);
            tokio::fs::remove_file(shard.join(&content_id)).await.unwrap();
        }

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join(&content_id[..2]))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert!(leftovers.is_empty(), "staging files left behind: {leftovers:?}");
    }

    #[tokio::test]
    async fn missing_and_malformed_ids() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path(), UploadProfile::Filecoin.limits());
        assert!(matches!(
            storage.get("abcdef").await,
            Err(StorageError::NotFound)
        ));
        assert!(matches!(
            storage.get("../secret").await,
            Err(StorageError::InvalidContentId)
        ));
        assert!(!storage.status().await.unwrap().low_balance);
    }
}
