//! Contract descriptors: the deployed address of every contract the
//! application talks to, plus the ABI surface it uses.

use alloy::primitives::{address, Address};
use alloy::sol;
use anyhow::{Context, Result};
use serde::Serialize;
use std::env;

sol! {
    interface ISocialPosts {
        struct Post {
            uint256 id;
            address author;
            string image;
            uint256 timestamp;
            bool isPrivate;
            bool isDeleted;
        }

        event PostCreated(uint256 indexed id, address indexed author, string image, uint256 timestamp);

        function createPost(string image) external;
        function deletePost(uint256 postId) external;
        function setPostPrivacy(uint256 postId, bool isPrivate) external;
        function getPost(uint256 postId) external view returns (Post memory);
        function getMyPosts() external view returns (Post[] memory);
        function getUserPosts(address user) external view returns (Post[] memory);
        function getAllPosts() external view returns (Post[] memory);
        function getFeed(uint256 offset, uint256 count) external view returns (Post[] memory);
        function totalPosts() external view returns (uint256);
    }
}

sol! {
    interface ISocialGraph {
        event Followed(address indexed follower, address indexed following);
        event Unfollowed(address indexed follower, address indexed following);

        function follow(address target) external;
        function unfollow(address target) external;
        function followByUsername(string username) external;
        function unfollowByUsername(string username) external;
        function isFollowing(address follower, address following) external view returns (bool);
        function getFollowers(address user) external view returns (address[] memory);
        function getFollowing(address user) external view returns (address[] memory);
    }
}

sol! {
    interface IUsernames {
        function mintUsername(string username) external;
        function isUsernameAvailable(string username) external view returns (bool);
        function getUsernameFromWallet(address wallet) external view returns (string memory);
        function usernames(string username) external view returns (address);
    }
}

sol! {
    interface IPredictionMarket {
        function createPoll(
            string question,
            uint256 duration,
            bytes32 assetPriceId,
            bytes32 quotePriceId,
            uint256 targetPrice
        ) external;
        function placeBet(uint256 pollId, bool option) external payable;
        function resolvePoll(uint256 pollId) external;
        function updateMaxPrice(uint256 pollId) external;
        function polls(uint256 pollId) external view returns (
            string question,
            uint256 startTime,
            uint256 endTime,
            bytes32 assetPriceId,
            bytes32 quotePriceId,
            uint256 targetPrice,
            uint256 maxPriceDuringPoll,
            uint256 totalYes,
            uint256 totalNo,
            bool isResolved,
            address host
        );
        function getUserBets(uint256 pollId, address user) external view returns (uint256 yesAmount, uint256 noAmount);
        function pollCount() external view returns (uint256);
    }
}

pub const POSTS_ADDRESS: Address = address!("a46b02ada701eb34ad9ac8feb786f575208a4c46");
pub const SOCIAL_GRAPH_ADDRESS: Address = address!("9a85208bd9d5b20e95f4ebbfce6567d64f38dfd4");
pub const USERNAMES_ADDRESS: Address = address!("25c66b57149495a196da2c1180a02db847493460");
pub const PREDICTION_MARKET_ADDRESS: Address = address!("b1cfe2c411c1c88f95953962e3ebce46c79f240c");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContractDescriptor {
    pub name: &'static str,
    pub address: Address,
}

/// Addresses for one deployment. Each can be overridden from the
/// environment so a redeploy does not need a rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractDirectory {
    pub posts: ContractDescriptor,
    pub social_graph: ContractDescriptor,
    pub usernames: ContractDescriptor,
    pub prediction_market: ContractDescriptor,
}

impl Default for ContractDirectory {
    fn default() -> Self {
        Self {
            posts: ContractDescriptor {
                name: "SocialPosts",
                address: POSTS_ADDRESS,
            },
            social_graph: ContractDescriptor {
                name: "SocialGraph",
                address: SOCIAL_GRAPH_ADDRESS,
            },
            usernames: ContractDescriptor {
                name: "Usernames",
                address: USERNAMES_ADDRESS,
            },
            prediction_market: ContractDescriptor {
                name: "PredictionMarket",
                address: PREDICTION_MARKET_ADDRESS,
            },
        }
    }
}

impl ContractDirectory {
    pub fn from_env() -> Result<Self> {
        let mut directory = Self::default();
        override_address(&mut directory.posts, "SYNCIAL_POSTS_ADDRESS")?;
        override_address(&mut directory.social_graph, "SYNCIAL_SOCIAL_GRAPH_ADDRESS")?;
        override_address(&mut directory.usernames, "SYNCIAL_USERNAMES_ADDRESS")?;
        override_address(
            &mut directory.prediction_market,
            "SYNCIAL_PREDICTION_MARKET_ADDRESS",
        )?;
        Ok(directory)
    }
}

fn override_address(descriptor: &mut ContractDescriptor, var: &str) -> Result<()> {
    let Ok(raw) = env::var(var) else {
        return Ok(());
    };
    if raw.trim().is_empty() {
        return Ok(());
    }
    descriptor.address = raw
        .trim()
        .parse()
        .with_context(|| format!("{var} is not a valid address"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolCall;

    #[test]
    fn default_directory_uses_deployment_constants() {
        let directory = ContractDirectory::default();
        assert_eq!(directory.posts.address, POSTS_ADDRESS);
        assert_eq!(directory.social_graph.name, "SocialGraph");
    }

    #[test]
    fn selectors_match_solidity_signatures() {
        assert_eq!(ISocialPosts::createPostCall::SIGNATURE, "createPost(string)");
        assert_eq!(ISocialPosts::getMyPostsCall::SIGNATURE, "getMyPosts()");
        assert_eq!(
            IPredictionMarket::placeBetCall::SIGNATURE,
            "placeBet(uint256,bool)"
        );
        assert_ne!(
            ISocialPosts::getMyPostsCall::SELECTOR,
            ISocialPosts::getUserPostsCall::SELECTOR
        );
    }
}
