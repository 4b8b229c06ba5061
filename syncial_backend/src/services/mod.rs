pub mod market;
pub mod posts;
pub mod social;
pub mod usernames;

pub use market::{PollPhase, PollView, PredictionMarketService, UserBets};
pub use posts::{PostService, PostView};
pub use social::SocialGraphService;
pub use usernames::{UsernameCache, UsernameService};

use crate::contracts::{ContractDescriptor, ContractDirectory};
use crate::error::ContractError;
use crate::wallet::{ContractCall, ContractWrite, WalletSession, WriteReceipt};
use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use std::sync::Arc;

/// One deployed contract seen through a wallet session.
#[derive(Clone)]
pub struct ContractHandle {
    session: Arc<WalletSession>,
    descriptor: ContractDescriptor,
}

impl ContractHandle {
    pub fn new(session: Arc<WalletSession>, descriptor: ContractDescriptor) -> Self {
        Self {
            session,
            descriptor,
        }
    }

    pub fn address(&self) -> Address {
        self.descriptor.address
    }

    pub fn session(&self) -> &WalletSession {
        &self.session
    }

    pub async fn read<C: SolCall>(&self, call: &C) -> Result<C::Return, ContractError> {
        self.read_as(call, None).await
    }

    /// `eth_call` with an explicit `from`, for getters that key on
    /// `msg.sender`.
    pub async fn read_as<C: SolCall>(
        &self,
        call: &C,
        from: Option<Address>,
    ) -> Result<C::Return, ContractError> {
        let output = self
            .session
            .call(ContractCall {
                to: self.descriptor.address,
                from,
                data: call.abi_encode().into(),
            })
            .await?;
        C::abi_decode_returns(&output).map_err(|err| ContractError::Decode {
            function: C::SIGNATURE,
            message: err.to_string(),
        })
    }

    pub async fn write<C: SolCall>(
        &self,
        call: &C,
        value: U256,
    ) -> Result<WriteReceipt, ContractError> {
        tracing::debug!(
            contract = self.descriptor.name,
            function = C::SIGNATURE,
            "sending contract write"
        );
        self.session
            .send_contract_write(ContractWrite {
                to: self.descriptor.address,
                function: C::SIGNATURE,
                calldata: call.abi_encode().into(),
                value,
            })
            .await
    }
}

/// All four contract façades over one session.
#[derive(Clone)]
pub struct ContractServices {
    pub posts: PostService,
    pub social: SocialGraphService,
    pub usernames: UsernameService,
    pub market: PredictionMarketService,
    directory: ContractDirectory,
}

impl ContractServices {
    pub fn new(session: Arc<WalletSession>, directory: &ContractDirectory) -> Self {
        Self::with_cache(session, directory, Arc::new(UsernameCache::default()))
    }

    fn with_cache(
        session: Arc<WalletSession>,
        directory: &ContractDirectory,
        cache: Arc<UsernameCache>,
    ) -> Self {
        Self {
            posts: PostService::new(ContractHandle::new(session.clone(), directory.posts)),
            social: SocialGraphService::new(ContractHandle::new(
                session.clone(),
                directory.social_graph,
            )),
            usernames: UsernameService::with_cache(
                ContractHandle::new(session.clone(), directory.usernames),
                cache,
            ),
            market: PredictionMarketService::new(ContractHandle::new(
                session,
                directory.prediction_market,
            )),
            directory: directory.clone(),
        }
    }

    /// Rebinds every façade to a new session. The username cache is kept
    /// but emptied.
    pub fn switch_wallet(&self, session: Arc<WalletSession>) -> Result<Self, ContractError> {
        self.usernames.on_wallet_changed()?;
        Ok(Self::with_cache(session, &self.directory, self.usernames.cache()))
    }
}

/// Parses a hex address regardless of checksum casing.
pub fn parse_address(raw: &str) -> Result<Address, ContractError> {
    raw.trim()
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| ContractError::InvalidInput(format!("{raw:?} is not an address")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_addresses_in_any_case() {
        let lower = parse_address("0x9a85208bd9d5b20e95f4ebbfce6567d64f38dfd4").unwrap();
        let upper = parse_address("0x9A85208BD9D5B20E95F4EBBFCE6567D64F38DFD4").unwrap();
        assert_eq!(lower, upper);
        assert!(parse_address("bob").is_err());
    }
}
