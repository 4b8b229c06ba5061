//! The account's own feed: uploads an image, posts it on-chain and shows it
//! right away under a provisional id until the chain reports the real one.

use crate::error::ContractError;
use crate::services::posts::{PostService, PostView};
use crate::upload_client::{UploadClient, UploadError};
use alloy::primitives::{Address, B256};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EntryId {
    Pending(Uuid),
    Chain(u64),
}

impl EntryId {
    pub fn is_pending(&self) -> bool {
        matches!(self, EntryId::Pending(_))
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Pending(id) => write!(f, "pending-{id}"),
            EntryId::Chain(id) => write!(f, "#{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedEntry {
    pub id: EntryId,
    pub author: Address,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub is_private: bool,
    pub tx_hash: Option<B256>,
}

impl FeedEntry {
    fn from_post(post: PostView) -> Self {
        Self {
            id: EntryId::Chain(post.id),
            author: post.author,
            image: post.image,
            created_at: post.timestamp,
            is_private: post.is_private,
            tx_hash: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error("Blockchain transaction failed")]
    TransactionFailed { tx_hash: B256 },
}

impl FeedError {
    pub fn user_message(&self) -> String {
        match self {
            FeedError::Contract(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

pub struct FeedComposer {
    uploads: UploadClient,
    posts: PostService,
    account: Address,
    entries: RwLock<Vec<FeedEntry>>,
}

impl FeedComposer {
    pub fn new(uploads: UploadClient, posts: PostService, account: Address) -> Self {
        Self {
            uploads,
            posts,
            account,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn account(&self) -> Address {
        self.account
    }

    /// Newest first.
    pub async fn entries(&self) -> Vec<FeedEntry> {
        self.entries.read().await.clone()
    }

    pub async fn publish_image(
        &self,
        bytes: Bytes,
        file_name: &str,
        mime: Option<&str>,
    ) -> Result<FeedEntry, FeedError> {
        let upload = self.uploads.upload(bytes, file_name, mime).await?;
        let content_id = upload.content_id().to_string();
        tracing::info!(%content_id, size = upload.size, "image stored, creating post");

        let receipt = self.posts.create_post(&content_id).await?;
        if !receipt.success {
            tracing::warn!(tx_hash = %receipt.tx_hash, %content_id, "createPost reverted");
            return Err(FeedError::TransactionFailed {
                tx_hash: receipt.tx_hash,
            });
        }

        let entry = FeedEntry {
            id: EntryId::Pending(Uuid::new_v4()),
            author: self.account,
            image: content_id,
            created_at: Utc::now(),
            is_private: false,
            tx_hash: Some(receipt.tx_hash),
        };
        self.entries.write().await.insert(0, entry.clone());
        tracing::info!(entry = %entry.id, tx_hash = %receipt.tx_hash, via = ?receipt.via, "post published");
        Ok(entry)
    }

    /// Re-reads the account's posts. Pending entries whose image the chain
    /// now reports are replaced by the chain entry; the rest stay on top.
    pub async fn refresh(&self) -> Result<Vec<FeedEntry>, FeedError> {
        let mut posts = self.posts.get_user_posts(self.account).await?;
        posts.retain(|post| !post.is_deleted);
        posts.sort_by(|a, b| b.id.cmp(&a.id));

        let confirmed: HashSet<&str> = posts.iter().map(|post| post.image.as_str()).collect();
        let mut entries = self.entries.write().await;
        let mut merged: Vec<FeedEntry> = entries
            .iter()
            .filter(|entry| entry.id.is_pending() && !confirmed.contains(entry.image.as_str()))
            .cloned()
            .collect();
        let still_pending = merged.len();
        merged.extend(posts.into_iter().map(FeedEntry::from_post));

        tracing::debug!(total = merged.len(), still_pending, "feed refreshed");
        *entries = merged;
        Ok(entries.clone())
    }
}
