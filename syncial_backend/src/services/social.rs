use super::ContractHandle;
use crate::contracts::ISocialGraph;
use crate::error::ContractError;
use crate::wallet::WriteReceipt;
use alloy::primitives::{Address, U256};

#[derive(Clone)]
pub struct SocialGraphService {
    contract: ContractHandle,
}

impl SocialGraphService {
    pub fn new(contract: ContractHandle) -> Self {
        Self { contract }
    }

    pub async fn follow(&self, target: Address) -> Result<WriteReceipt, ContractError> {
        self.contract
            .write(&ISocialGraph::followCall { target }, U256::ZERO)
            .await
    }

    pub async fn unfollow(&self, target: Address) -> Result<WriteReceipt, ContractError> {
        self.contract
            .write(&ISocialGraph::unfollowCall { target }, U256::ZERO)
            .await
    }

    pub async fn follow_by_username(&self, username: &str) -> Result<WriteReceipt, ContractError> {
        let username = non_empty_username(username)?;
        self.contract
            .write(&ISocialGraph::followByUsernameCall { username }, U256::ZERO)
            .await
    }

    pub async fn unfollow_by_username(
        &self,
        username: &str,
    ) -> Result<WriteReceipt, ContractError> {
        let username = non_empty_username(username)?;
        self.contract
            .write(&ISocialGraph::unfollowByUsernameCall { username }, U256::ZERO)
            .await
    }

    pub async fn is_following(
        &self,
        follower: Address,
        following: Address,
    ) -> Result<bool, ContractError> {
        self.contract
            .read(&ISocialGraph::isFollowingCall {
                follower,
                following,
            })
            .await
    }

    pub async fn get_followers(&self, user: Address) -> Result<Vec<Address>, ContractError> {
        self.contract
            .read(&ISocialGraph::getFollowersCall { user })
            .await
    }

    pub async fn get_following(&self, user: Address) -> Result<Vec<Address>, ContractError> {
        self.contract
            .read(&ISocialGraph::getFollowingCall { user })
            .await
    }
}

fn non_empty_username(raw: &str) -> Result<String, ContractError> {
    let trimmed = raw.trim().trim_start_matches('@');
    if trimmed.is_empty() {
        return Err(ContractError::InvalidInput("username may not be empty".into()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{ContractDirectory, SOCIAL_GRAPH_ADDRESS};
    use crate::services::ContractServices;
    use crate::wallet::testing::FakeWallet;
    use crate::wallet::WalletSession;
    use alloy::primitives::address;
    use alloy::sol_types::{SolCall, SolValue};
    use std::sync::Arc;

    const ME: Address = address!("00000000000000000000000000000000000000aa");
    const ALICE: Address = address!("00000000000000000000000000000000000000a1");

    fn social(wallet: Arc<FakeWallet>) -> SocialGraphService {
        let session = WalletSession::builder().injected(wallet).build();
        ContractServices::new(Arc::new(session), &ContractDirectory::default()).social
    }

    #[tokio::test]
    async fn follow_targets_the_social_graph() {
        let wallet = Arc::new(FakeWallet::injected(ME));
        social(wallet.clone()).follow(ALICE).await.unwrap();

        let writes = wallet.writes();
        assert_eq!(writes[0].to, SOCIAL_GRAPH_ADDRESS);
        let decoded = ISocialGraph::followCall::abi_decode(&writes[0].calldata).unwrap();
        assert_eq!(decoded.target, ALICE);
    }

    #[tokio::test]
    async fn follow_by_username_strips_the_at_sign() {
        let wallet = Arc::new(FakeWallet::injected(ME));
        social(wallet.clone())
            .follow_by_username("@alice")
            .await
            .unwrap();
        let decoded =
            ISocialGraph::followByUsernameCall::abi_decode(&wallet.writes()[0].calldata).unwrap();
        assert_eq!(decoded.username, "alice");

        assert!(social(wallet).unfollow_by_username(" ").await.is_err());
    }

    #[tokio::test]
    async fn reads_follower_lists() {
        let wallet = Arc::new(FakeWallet::injected(ME));
        wallet.answer::<ISocialGraph::getFollowersCall>((vec![ALICE, ME],).abi_encode_params());
        wallet.answer::<ISocialGraph::isFollowingCall>((true,).abi_encode_params());
        let social = social(wallet);

        assert_eq!(social.get_followers(ME).await.unwrap(), vec![ALICE, ME]);
        assert!(social.is_following(ALICE, ME).await.unwrap());
    }
}
