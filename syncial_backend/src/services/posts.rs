use super::ContractHandle;
use crate::contracts::ISocialPosts;
use crate::error::ContractError;
use crate::utils::unix_to_datetime;
use crate::wallet::WriteReceipt;
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone)]
pub struct PostService {
    contract: ContractHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    pub id: u64,
    pub author: Address,
    pub image: String,
    pub timestamp: DateTime<Utc>,
    pub timestamp_unix: u64,
    pub is_private: bool,
    pub is_deleted: bool,
}

impl PostView {
    pub fn from_record(post: ISocialPosts::Post) -> Self {
        let timestamp_unix = post.timestamp.saturating_to::<u64>();
        Self {
            id: post.id.saturating_to::<u64>(),
            author: post.author,
            image: post.image,
            timestamp: unix_to_datetime(timestamp_unix),
            timestamp_unix,
            is_private: post.isPrivate,
            is_deleted: post.isDeleted,
        }
    }
}

impl PostService {
    pub fn new(contract: ContractHandle) -> Self {
        Self { contract }
    }

    pub async fn create_post(&self, image: &str) -> Result<WriteReceipt, ContractError> {
        let image = image.trim();
        if image.is_empty() {
            return Err(ContractError::InvalidInput(
                "image content id may not be empty".into(),
            ));
        }
        self.contract
            .write(
                &ISocialPosts::createPostCall {
                    image: image.to_string(),
                },
                U256::ZERO,
            )
            .await
    }

    pub async fn delete_post(&self, post_id: u64) -> Result<WriteReceipt, ContractError> {
        self.contract
            .write(
                &ISocialPosts::deletePostCall {
                    postId: U256::from(post_id),
                },
                U256::ZERO,
            )
            .await
    }

    pub async fn set_post_privacy(
        &self,
        post_id: u64,
        is_private: bool,
    ) -> Result<WriteReceipt, ContractError> {
        self.contract
            .write(
                &ISocialPosts::setPostPrivacyCall {
                    postId: U256::from(post_id),
                    isPrivate: is_private,
                },
                U256::ZERO,
            )
            .await
    }

    /// Posts by `user`. For the connected account this goes through
    /// `getMyPosts`, which keys on the caller and includes private posts.
    pub async fn get_user_posts(&self, user: Address) -> Result<Vec<PostView>, ContractError> {
        let posts = match self.contract.session().account() {
            Some(account) if account == user => {
                self.contract
                    .read_as(&ISocialPosts::getMyPostsCall {}, Some(account))
                    .await?
            }
            _ => {
                self.contract
                    .read(&ISocialPosts::getUserPostsCall { user })
                    .await?
            }
        };
        Ok(posts.into_iter().map(PostView::from_record).collect())
    }

    pub async fn get_all_posts(&self) -> Result<Vec<PostView>, ContractError> {
        let posts = self.contract.read(&ISocialPosts::getAllPostsCall {}).await?;
        Ok(posts.into_iter().map(PostView::from_record).collect())
    }

    pub async fn get_feed(&self, offset: u64, count: u64) -> Result<Vec<PostView>, ContractError> {
        let posts = self
            .contract
            .read(&ISocialPosts::getFeedCall {
                offset: U256::from(offset),
                count: U256::from(count),
            })
            .await?;
        Ok(posts.into_iter().map(PostView::from_record).collect())
    }

    pub async fn get_post(&self, post_id: u64) -> Result<PostView, ContractError> {
        let post = self
            .contract
            .read(&ISocialPosts::getPostCall {
                postId: U256::from(post_id),
            })
            .await?;
        Ok(PostView::from_record(post))
    }

    pub async fn get_total_posts(&self) -> Result<u64, ContractError> {
        let total = self.contract.read(&ISocialPosts::totalPostsCall {}).await?;
        Ok(total.saturating_to::<u64>())
    }
}
