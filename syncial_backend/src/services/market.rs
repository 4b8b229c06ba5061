use super::ContractHandle;
use crate::contracts::IPredictionMarket;
use crate::error::ContractError;
use crate::utils::unix_to_datetime;
use crate::wallet::WriteReceipt;
use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use serde::Serialize;
use std::time::Duration;

/// End times above this are millisecond timestamps.
const MILLISECOND_THRESHOLD: u64 = 1_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    Open,
    AwaitingResolution,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollView {
    pub id: u64,
    pub question: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub asset_price_id: B256,
    pub quote_price_id: B256,
    pub target_price: U256,
    pub max_price_during_poll: U256,
    pub total_yes: U256,
    pub total_no: U256,
    pub is_resolved: bool,
    pub host: Address,
}

impl PollView {
    pub fn from_record(id: u64, poll: IPredictionMarket::pollsReturn) -> Self {
        Self {
            id,
            question: poll.question,
            start_time: unix_to_datetime(normalize_seconds(poll.startTime.saturating_to())),
            end_time: unix_to_datetime(normalize_seconds(poll.endTime.saturating_to())),
            asset_price_id: poll.assetPriceId,
            quote_price_id: poll.quotePriceId,
            target_price: poll.targetPrice,
            max_price_during_poll: poll.maxPriceDuringPoll,
            total_yes: poll.totalYes,
            total_no: poll.totalNo,
            is_resolved: poll.isResolved,
            host: poll.host,
        }
    }

    pub fn phase(&self, now: DateTime<Utc>) -> PollPhase {
        if self.is_resolved {
            PollPhase::Resolved
        } else if now < self.end_time {
            PollPhase::Open
        } else {
            PollPhase::AwaitingResolution
        }
    }

    pub fn total_pool(&self) -> U256 {
        self.total_yes.saturating_add(self.total_no)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserBets {
    pub yes: U256,
    pub no: U256,
}

/// Contract timestamps are seconds, but some deployments stored
/// milliseconds.
pub fn normalize_seconds(raw: u64) -> u64 {
    if raw > MILLISECOND_THRESHOLD {
        raw / 1000
    } else {
        raw
    }
}

/// Renders an 8-decimal fixed-point amount with four fractional digits,
/// rounding half up.
pub fn format_amount(amount: U256) -> String {
    let ten_thousand = U256::from(10_000u64);
    let scaled = amount.saturating_add(U256::from(5_000u64)) / ten_thousand;
    let whole = scaled / ten_thousand;
    let fraction = (scaled % ten_thousand).saturating_to::<u64>();
    format!("{whole}.{fraction:04}")
}

#[derive(Clone)]
pub struct PredictionMarketService {
    contract: ContractHandle,
}

impl PredictionMarketService {
    pub fn new(contract: ContractHandle) -> Self {
        Self { contract }
    }

    pub async fn create_poll(
        &self,
        question: &str,
        duration: Duration,
        asset_price_id: B256,
        quote_price_id: B256,
        target_price: U256,
    ) -> Result<WriteReceipt, ContractError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ContractError::InvalidInput("question may not be empty".into()));
        }
        if duration.is_zero() {
            return Err(ContractError::InvalidInput(
                "poll duration must be positive".into(),
            ));
        }
        self.contract
            .write(
                &IPredictionMarket::createPollCall {
                    question: question.to_string(),
                    duration: U256::from(duration.as_secs()),
                    assetPriceId: asset_price_id,
                    quotePriceId: quote_price_id,
                    targetPrice: target_price,
                },
                U256::ZERO,
            )
            .await
    }

    /// Bets `amount` (decimal, in the native token) on `yes` or `no`.
    pub async fn place_bet(
        &self,
        poll_id: u64,
        yes: bool,
        amount: &str,
    ) -> Result<WriteReceipt, ContractError> {
        let value = parse_ether(amount.trim())
            .map_err(|err| ContractError::InvalidInput(format!("bet amount {amount:?}: {err}")))?;
        if value.is_zero() {
            return Err(ContractError::InvalidInput(
                "bet amount must be greater than zero".into(),
            ));
        }
        self.contract
            .write(
                &IPredictionMarket::placeBetCall {
                    pollId: U256::from(poll_id),
                    option: yes,
                },
                value,
            )
            .await
    }

    pub async fn resolve_poll(&self, poll_id: u64) -> Result<WriteReceipt, ContractError> {
        self.contract
            .write(
                &IPredictionMarket::resolvePollCall {
                    pollId: U256::from(poll_id),
                },
                U256::ZERO,
            )
            .await
    }

    pub async fn update_max_price(&self, poll_id: u64) -> Result<WriteReceipt, ContractError> {
        self.contract
            .write(
                &IPredictionMarket::updateMaxPriceCall {
                    pollId: U256::from(poll_id),
                },
                U256::ZERO,
            )
            .await
    }

    pub async fn poll(&self, poll_id: u64) -> Result<PollView, ContractError> {
        let raw = self
            .contract
            .read(&IPredictionMarket::pollsCall {
                pollId: U256::from(poll_id),
            })
            .await?;
        Ok(PollView::from_record(poll_id, raw))
    }

    pub async fn user_bets(&self, poll_id: u64, user: Address) -> Result<UserBets, ContractError> {
        let bets = self
            .contract
            .read(&IPredictionMarket::getUserBetsCall {
                pollId: U256::from(poll_id),
                user,
            })
            .await?;
        Ok(UserBets {
            yes: bets.yesAmount,
            no: bets.noAmount,
        })
    }

    pub async fn poll_count(&self) -> Result<u64, ContractError> {
        let count = self
            .contract
            .read(&IPredictionMarket::pollCountCall {})
            .await?;
        Ok(count.saturating_to::<u64>())
    }

    /// Every poll, ids `0..pollCount`.
    pub async fn list_polls(&self) -> Result<Vec<PollView>, ContractError> {
        let count = self.poll_count().await?;
        try_join_all((0..count).map(|id| self.poll(id))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ContractDirectory;
    use crate::services::ContractServices;
    use crate::wallet::testing::FakeWallet;
    use crate::wallet::WalletSession;
    use alloy::primitives::address;
    use alloy::sol_types::{SolCall, SolValue};
    use chrono::TimeZone;
    use std::sync::Arc;

    const ME: Address = address!("00000000000000000000000000000000000000aa");

    fn market(wallet: Arc<FakeWallet>) -> PredictionMarketService {
        let session = WalletSession::builder().injected(wallet).build();
        ContractServices::new(Arc::new(session), &ContractDirectory::default()).market
    }

    fn encoded_poll(end_time: u64, resolved: bool) -> Vec<u8> {
        (
            "Will ETH close above $4000?".to_string(),
            U256::from(1_700_000_000u64),
            U256::from(end_time),
            B256::repeat_byte(0xff),
            B256::ZERO,
            U256::from(400_000_000_000u64),
            U256::from(410_000_000_000u64),
            U256::from(150_000_000u64),
            U256::from(50_000_000u64),
            resolved,
            ME,
        )
            .abi_encode_params()
    }

    #[test]
    fn formats_eight_decimal_amounts() {
        assert_eq!(format_amount(U256::from(150_000_000u64)), "1.5000");
        assert_eq!(format_amount(U256::from(123_456_789u64)), "1.2346");
        assert_eq!(format_amount(U256::ZERO), "0.0000");
    }

    #[test]
    fn millisecond_end_times_are_normalized() {
        assert_eq!(normalize_seconds(1_700_000_000_000), 1_700_000_000);
        assert_eq!(normalize_seconds(1_700_000_000), 1_700_000_000);
    }

    #[tokio::test]
    async fn decodes_poll_tuple_and_phase() {
        let wallet = Arc::new(FakeWallet::injected(ME));
        wallet.answer::<IPredictionMarket::pollsCall>(encoded_poll(1_800_000_000_000, false));
        let poll = market(wallet).poll(0).await.unwrap();

        assert_eq!(poll.question, "Will ETH close above $4000?");
        assert_eq!(poll.end_time.timestamp(), 1_800_000_000);
        assert_eq!(poll.host, ME);
        assert_eq!(format_amount(poll.total_pool()), "2.0000");

        let before = Utc.timestamp_opt(1_750_000_000, 0).unwrap();
        let after = Utc.timestamp_opt(1_850_000_000, 0).unwrap();
        assert_eq!(poll.phase(before), PollPhase::Open);
        assert_eq!(poll.phase(after), PollPhase::AwaitingResolution);
    }

    #[tokio::test]
    async fn lists_every_poll_id() {
        let wallet = Arc::new(FakeWallet::injected(ME));
        wallet.answer::<IPredictionMarket::pollCountCall>((U256::from(3u64),).abi_encode_params());
        wallet.answer::<IPredictionMarket::pollsCall>(encoded_poll(1_800_000_000, true));
        let polls = market(wallet.clone()).list_polls().await.unwrap();

        assert_eq!(polls.iter().map(|p| p.id).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(polls.iter().all(|p| p.phase(Utc::now()) == PollPhase::Resolved));
        let last = IPredictionMarket::pollsCall::abi_decode(&wallet.calls()[3].data).unwrap();
        assert_eq!(last.pollId, U256::from(2u64));
    }

    #[tokio::test]
    async fn bets_carry_value_in_wei() {
        let wallet = Arc::new(FakeWallet::injected(ME));
        let market = market(wallet.clone());
        market.place_bet(4, true, "0.25").await.unwrap();

        let write = &wallet.writes()[0];
        assert_eq!(write.value, U256::from(250_000_000_000_000_000u64));
        let decoded = IPredictionMarket::placeBetCall::abi_decode(&write.calldata).unwrap();
        assert!(decoded.option);
        assert_eq!(decoded.pollId, U256::from(4u64));

        assert!(market.place_bet(4, false, "0").await.is_err());
        assert!(market.place_bet(4, false, "lots").await.is_err());
        assert_eq!(wallet.writes().len(), 1);
    }

    #[tokio::test]
    async fn create_poll_validates_then_encodes_seconds() {
        let wallet = Arc::new(FakeWallet::injected(ME));
        let market = market(wallet.clone());

        assert!(market
            .create_poll(" ", Duration::from_secs(60), B256::ZERO, B256::ZERO, U256::ZERO)
            .await
            .is_err());
        assert!(market
            .create_poll("ETH up?", Duration::ZERO, B256::ZERO, B256::ZERO, U256::ZERO)
            .await
            .is_err());
        assert!(wallet.writes().is_empty());

        market
            .create_poll(
                "ETH up?",
                Duration::from_secs(3600),
                B256::repeat_byte(1),
                B256::repeat_byte(2),
                U256::from(400_000_000_000u64),
            )
            .await
            .unwrap();
        market.update_max_price(0).await.unwrap();

        let writes = wallet.writes();
        let created = IPredictionMarket::createPollCall::abi_decode(&writes[0].calldata).unwrap();
        assert_eq!(created.duration, U256::from(3600u64));
        assert_eq!(created.quotePriceId, B256::repeat_byte(2));
        assert!(writes[1].function.starts_with("updateMaxPrice"));
    }

    #[tokio::test]
    async fn user_bets_decode_named_returns() {
        let wallet = Arc::new(FakeWallet::injected(ME));
        wallet.answer::<IPredictionMarket::getUserBetsCall>(
            (U256::from(7u64), U256::from(9u64)).abi_encode_params(),
        );
        let bets = market(wallet).user_bets(1, ME).await.unwrap();
        assert_eq!(bets, UserBets { yes: U256::from(7u64), no: U256::from(9u64) });
    }
}
