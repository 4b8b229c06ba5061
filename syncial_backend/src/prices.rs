//! Pyth Hermes price feed client.

use alloy::primitives::{b256, B256};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PriceFeed {
    EthUsd,
    HbarUsd,
    BtcUsd,
    SolUsd,
}

pub const DEFAULT_FEEDS: [PriceFeed; 4] = [
    PriceFeed::EthUsd,
    PriceFeed::HbarUsd,
    PriceFeed::BtcUsd,
    PriceFeed::SolUsd,
];

impl PriceFeed {
    pub fn id(self) -> B256 {
        match self {
            PriceFeed::EthUsd => {
                b256!("ff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace")
            }
            PriceFeed::HbarUsd => {
                b256!("3728e591097635310e6341af53db8b7ee42da9b3a8d918f9463ce9cca886dfbd")
            }
            PriceFeed::BtcUsd => {
                b256!("e62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43")
            }
            PriceFeed::SolUsd => {
                b256!("ef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d")
            }
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            PriceFeed::EthUsd => "ETH/USD",
            PriceFeed::HbarUsd => "HBAR/USD",
            PriceFeed::BtcUsd => "BTC/USD",
            PriceFeed::SolUsd => "SOL/USD",
        }
    }

    pub fn from_id(id: B256) -> Option<Self> {
        DEFAULT_FEEDS.into_iter().find(|feed| feed.id() == id)
    }

    pub fn from_symbol(raw: &str) -> Option<Self> {
        let wanted = raw.trim().to_ascii_uppercase().replace('-', "/");
        let wanted = if wanted.contains('/') {
            wanted
        } else {
            format!("{wanted}/USD")
        };
        DEFAULT_FEEDS
            .into_iter()
            .find(|feed| feed.symbol() == wanted)
    }
}

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("price service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("price service returned {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed price update: {0}")]
    Malformed(String),
}

/// One published price. The real value is `price × 10^expo`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub feed_id: B256,
    pub feed: Option<PriceFeed>,
    pub price: i64,
    pub conf: u64,
    pub expo: i32,
    pub publish_time: i64,
}

impl PriceQuote {
    pub fn value(&self) -> f64 {
        self.price as f64 * 10f64.powi(self.expo)
    }

    pub fn confidence(&self) -> f64 {
        self.conf as f64 * 10f64.powi(self.expo)
    }

    pub fn formatted(&self) -> String {
        format!("{:.2}", self.value())
    }

    pub fn label(&self) -> String {
        match self.feed {
            Some(feed) => feed.symbol().to_string(),
            None => format!("{}…", &self.feed_id.to_string()[..10]),
        }
    }
}

impl fmt::Display for PriceQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ${}", self.label(), self.formatted())
    }
}

#[derive(Deserialize)]
struct LatestResponse {
    #[serde(default)]
    parsed: Vec<ParsedUpdate>,
}

#[derive(Deserialize)]
struct ParsedUpdate {
    id: String,
    price: RawPrice,
}

#[derive(Deserialize)]
struct RawPrice {
    price: String,
    conf: String,
    expo: i32,
    publish_time: i64,
}

fn parse_update(update: ParsedUpdate) -> Result<PriceQuote, PriceError> {
    let id = update.id.trim_start_matches("0x");
    let feed_id: B256 = format!("0x{id}")
        .parse()
        .map_err(|_| PriceError::Malformed(format!("feed id {:?}", update.id)))?;
    let price = update
        .price
        .price
        .parse()
        .map_err(|_| PriceError::Malformed(format!("price {:?}", update.price.price)))?;
    let conf = update
        .price
        .conf
        .parse()
        .map_err(|_| PriceError::Malformed(format!("conf {:?}", update.price.conf)))?;
    Ok(PriceQuote {
        feed_id,
        feed: PriceFeed::from_id(feed_id),
        price,
        conf,
        expo: update.price.expo,
        publish_time: update.price.publish_time,
    })
}

#[derive(Debug, Clone)]
pub struct HermesClient {
    base_url: String,
    http: reqwest::Client,
}

impl HermesClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Latest price for each feed id, in the order Hermes returns them.
    pub async fn latest(&self, ids: &[B256]) -> Result<Vec<PriceQuote>, PriceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query: Vec<(&str, String)> = ids
            .iter()
            .map(|id| ("ids[]", format!("{id:x}").trim_start_matches("0x").to_string()))
            .collect();
        let response = self
            .http
            .get(format!("{}/v2/updates/price/latest", self.base_url))
            .query(&query)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PriceError::Status(response.status()));
        }
        let body: LatestResponse = response.json().await?;
        body.parsed.into_iter().map(parse_update).collect()
    }

    pub async fn latest_defaults(&self) -> Result<Vec<PriceQuote>, PriceError> {
        let ids: Vec<B256> = DEFAULT_FEEDS.iter().map(|feed| feed.id()).collect();
        self.latest(&ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "binary": {"encoding": "hex", "data": []},
        "parsed": [{
            "id": "ff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace",
            "price": {"price": "342112345678", "conf": "150000000", "expo": -8, "publish_time": 1760000000},
            "ema_price": {"price": "341000000000", "conf": "140000000", "expo": -8, "publish_time": 1760000000}
        }]
    }"#;

    #[test]
    fn parses_hermes_updates() {
        let body: LatestResponse = serde_json::from_str(SAMPLE).unwrap();
        let quotes: Vec<PriceQuote> = body
            .parsed
            .into_iter()
            .map(parse_update)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(quotes.len(), 1);
        let eth = &quotes[0];
        assert_eq!(eth.feed, Some(PriceFeed::EthUsd));
        assert_eq!(eth.formatted(), "3421.12");
        assert!((eth.confidence() - 1.5).abs() < 1e-9);
        assert_eq!(eth.to_string(), "ETH/USD $3421.12");
    }

    #[test]
    fn rejects_non_numeric_prices() {
        let update = ParsedUpdate {
            id: "00".repeat(32),
            price: RawPrice {
                price: "n/a".into(),
                conf: "0".into(),
                expo: -8,
                publish_time: 0,
            },
        };
        assert!(matches!(parse_update(update), Err(PriceError::Malformed(_))));
    }

    #[test]
    fn resolves_symbols() {
        assert_eq!(PriceFeed::from_symbol("btc"), Some(PriceFeed::BtcUsd));
        assert_eq!(PriceFeed::from_symbol("sol-usd"), Some(PriceFeed::SolUsd));
        assert_eq!(PriceFeed::from_symbol("doge"), None);
    }
}
