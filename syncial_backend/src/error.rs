//! Typed failures for everything that goes through a wallet or an RPC node.
//!
//! Errors are classified from the structured parts of a JSON-RPC error: the
//! EIP-1193 provider codes, and the ABI-encoded revert payload a node
//! attaches to a failed `eth_call` / `eth_estimateGas`. The revert string is
//! then looked up in a table of the reasons the deployed contracts emit.

use alloy::primitives::Bytes;
use alloy::sol_types::decode_revert_reason;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// EIP-1193: the user rejected the request.
pub const CODE_USER_REJECTED: i64 = 4001;
/// EIP-1193: the requested method/account has not been authorized.
pub const CODE_UNAUTHORIZED: i64 = 4100;
/// EIP-1193: the provider is disconnected from the requested chain.
pub const CODE_CHAIN_DISCONNECTED: i64 = 4901;
/// EIP-3085: unrecognized chain id.
pub const CODE_UNRECOGNIZED_CHAIN: i64 = 4902;
/// Geth/erigon: execution reverted, revert payload in `data`.
pub const CODE_EXECUTION_REVERTED: i64 = 3;
/// JSON-RPC server error bucket used for pool/gas failures.
pub const CODE_SERVER_ERROR: i64 = -32000;

#[derive(Debug, Clone, Error)]
pub enum ContractError {
    #[error("No wallet provider found (no injected wallet or public client configured)")]
    NoProvider,
    #[error("Unable to get signer - please ensure wallet is properly connected ({0})")]
    NoSigner(String),
    #[error("No suitable wallet connection method available")]
    NoWriteMethod,
    #[error("wallet is not connected")]
    NotConnected,
    #[error("transaction was rejected by the user")]
    UserRejected,
    #[error("wallet has not authorized this application")]
    Unauthorized,
    #[error("insufficient funds for transaction and gas")]
    InsufficientFunds,
    #[error("wallet is connected to the wrong network")]
    WrongNetwork,
    #[error("gas estimation failed: {0}")]
    GasEstimation(String),
    #[error("execution reverted: {0}")]
    Reverted(RevertReason),
    #[error("transaction {tx_hash} was not confirmed in time")]
    ReceiptTimeout { tx_hash: String },
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to decode {function} response: {message}")]
    Decode {
        function: &'static str,
        message: String,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("username cache lock poisoned")]
    CachePoisoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl ContractError {
    /// Classifies a JSON-RPC error object.
    pub fn from_rpc(code: i64, message: &str, data: Option<&Value>) -> Self {
        match code {
            CODE_USER_REJECTED => return ContractError::UserRejected,
            CODE_UNAUTHORIZED => return ContractError::Unauthorized,
            CODE_CHAIN_DISCONNECTED | CODE_UNRECOGNIZED_CHAIN => {
                return ContractError::WrongNetwork
            }
            _ => {}
        }

        if let Some(payload) = data.and_then(revert_payload) {
            return ContractError::Reverted(RevertReason::from_revert_data(&payload));
        }

        if code == CODE_EXECUTION_REVERTED {
            let reason = message
                .strip_prefix("execution reverted")
                .map(|rest| rest.trim_start_matches(':').trim())
                .unwrap_or_default();
            return ContractError::Reverted(RevertReason::from_reason(reason));
        }

        // Nodes report pool-level rejections only as text under -32000.
        if code == CODE_SERVER_ERROR {
            let lowered = message.to_ascii_lowercase();
            if lowered.starts_with("insufficient funds") {
                return ContractError::InsufficientFunds;
            }
            if lowered.starts_with("gas required exceeds") || lowered.contains("intrinsic gas") {
                return ContractError::GasEstimation(message.to_string());
            }
        }

        ContractError::Rpc {
            code,
            message: message.to_string(),
        }
    }

    /// The text shown to a person, mirroring the wording of the web client.
    pub fn user_message(&self) -> String {
        match self {
            ContractError::UserRejected => "Transaction was cancelled by user".into(),
            ContractError::InsufficientFunds => {
                "Insufficient balance for transaction + gas fees".into()
            }
            ContractError::WrongNetwork => "Please switch to the correct network".into(),
            ContractError::GasEstimation(_) => {
                "Transaction failed due to gas estimation. Try reducing the amount.".into()
            }
            ContractError::Reverted(reason) => reason.user_message(),
            ContractError::NoProvider => {
                "No wallet provider found (MetaMask/Rainbow not detected)".into()
            }
            other => other.to_string(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ContractError::UserRejected | ContractError::WrongNetwork => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// Reason a contract call reverted, decoded from its ABI payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertReason {
    PollEnded,
    PollNotEnded,
    AlreadyResolved,
    BetBelowMinimum,
    UsernameTaken,
    UsernameAlreadyMinted,
    NotAuthor,
    PostNotFound,
    AlreadyFollowing,
    NotFollowing,
    Panic(String),
    Other(String),
    /// The node reported a revert without any payload.
    Unknown,
}

const KNOWN_REASONS: &[(&str, RevertReason)] = &[
    ("Poll ended", RevertReason::PollEnded),
    ("Poll not ended", RevertReason::PollNotEnded),
    ("Already resolved", RevertReason::AlreadyResolved),
    ("Bet below $1", RevertReason::BetBelowMinimum),
    ("Username taken", RevertReason::UsernameTaken),
    ("Username already taken", RevertReason::UsernameTaken),
    ("Already has username", RevertReason::UsernameAlreadyMinted),
    ("Not author", RevertReason::NotAuthor),
    ("Not the author", RevertReason::NotAuthor),
    ("Post does not exist", RevertReason::PostNotFound),
    ("Post not found", RevertReason::PostNotFound),
    ("Already following", RevertReason::AlreadyFollowing),
    ("Not following", RevertReason::NotFollowing),
];

impl RevertReason {
    pub fn from_reason(reason: &str) -> Self {
        let reason = reason.trim();
        if reason.is_empty() {
            return RevertReason::Unknown;
        }
        KNOWN_REASONS
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(reason))
            .map(|(_, parsed)| parsed.clone())
            .unwrap_or_else(|| RevertReason::Other(reason.to_string()))
    }

    /// Decodes `Error(string)` / `Panic(uint256)` payloads.
    pub fn from_revert_data(data: &[u8]) -> Self {
        if data.is_empty() {
            return RevertReason::Unknown;
        }
        match decode_revert_reason(data) {
            Some(reason) if reason.starts_with("panic") => RevertReason::Panic(reason),
            Some(reason) => RevertReason::from_reason(&reason),
            None => RevertReason::Other(format!("0x{}", hex_prefix(data))),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            RevertReason::PollEnded => "This poll has ended and no longer accepts bets".into(),
            RevertReason::AlreadyResolved => "This poll has already been resolved".into(),
            RevertReason::PollNotEnded => "Poll must end before it can be resolved".into(),
            RevertReason::BetBelowMinimum => "Minimum bet is $1 USD equivalent".into(),
            RevertReason::UsernameTaken => {
                "Username is already taken. Please try another.".into()
            }
            RevertReason::UsernameAlreadyMinted => "This wallet already owns a username".into(),
            RevertReason::NotAuthor => "Only the author can change this post".into(),
            RevertReason::PostNotFound => "Post not found".into(),
            RevertReason::AlreadyFollowing => "You already follow this user".into(),
            RevertReason::NotFollowing => "You do not follow this user".into(),
            RevertReason::Panic(reason) | RevertReason::Other(reason) => reason.clone(),
            RevertReason::Unknown => "Transaction reverted".into(),
        }
    }
}

impl fmt::Display for RevertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevertReason::Panic(reason) | RevertReason::Other(reason) => f.write_str(reason),
            RevertReason::Unknown => f.write_str("no reason given"),
            known => {
                let text = KNOWN_REASONS
                    .iter()
                    .find(|(_, parsed)| parsed == known)
                    .map(|(text, _)| *text)
                    .unwrap_or("reverted");
                f.write_str(text)
            }
        }
    }
}

/// Extracts revert bytes from the `data` member of an RPC error. Nodes use a
/// bare hex string; some wallets nest it one level deeper as `{ "data": … }`.
fn revert_payload(data: &Value) -> Option<Bytes> {
    match data {
        Value::String(hex) if hex.starts_with("0x") && hex.len() > 2 => hex.parse().ok(),
        Value::Object(map) => map.get("data").and_then(revert_payload),
        _ => None,
    }
}

fn hex_prefix(data: &[u8]) -> String {
    data.iter()
        .take(4)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::{Revert, SolError};
    use serde_json::json;

    fn encoded_revert(reason: &str) -> String {
        let payload = Revert::from(reason).abi_encode();
        format!("0x{}", payload.iter().map(|b| format!("{b:02x}")).collect::<String>())
    }

    #[test]
    fn user_rejection_is_a_warning() {
        let err = ContractError::from_rpc(4001, "User rejected the request.", None);
        assert!(matches!(err, ContractError::UserRejected));
        assert_eq!(err.severity(), Severity::Warning);
        assert_eq!(err.user_message(), "Transaction was cancelled by user");
    }

    #[test]
    fn decodes_revert_strings_from_error_data() {
        let data = json!(encoded_revert("Poll ended"));
        let err = ContractError::from_rpc(3, "execution reverted: Poll ended", Some(&data));
        assert!(matches!(
            err,
            ContractError::Reverted(RevertReason::PollEnded)
        ));
        assert_eq!(
            err.user_message(),
            "This poll has ended and no longer accepts bets"
        );
    }

    #[test]
    fn decodes_nested_revert_data() {
        let data = json!({ "code": 3, "data": encoded_revert("Already resolved") });
        let err = ContractError::from_rpc(-32603, "Internal JSON-RPC error.", Some(&data));
        assert!(matches!(
            err,
            ContractError::Reverted(RevertReason::AlreadyResolved)
        ));
    }

    #[test]
    fn unknown_reasons_are_preserved() {
        let data = json!(encoded_revert("Cooldown active"));
        let err = ContractError::from_rpc(3, "execution reverted", Some(&data));
        match err {
            ContractError::Reverted(RevertReason::Other(reason)) => {
                assert_eq!(reason, "Cooldown active")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn classifies_pool_rejections() {
        let err = ContractError::from_rpc(
            -32000,
            "insufficient funds for gas * price + value",
            None,
        );
        assert!(matches!(err, ContractError::InsufficientFunds));

        let err = ContractError::from_rpc(-32000, "nonce too low", None);
        assert!(matches!(err, ContractError::Rpc { code: -32000, .. }));
    }

    #[test]
    fn revert_without_payload_uses_message_suffix() {
        let err = ContractError::from_rpc(3, "execution reverted: Poll not ended", None);
        assert!(matches!(
            err,
            ContractError::Reverted(RevertReason::PollNotEnded)
        ));
        let err = ContractError::from_rpc(3, "execution reverted", None);
        assert!(matches!(err, ContractError::Reverted(RevertReason::Unknown)));
    }

    #[test]
    fn display_round_trips_known_reasons() {
        assert_eq!(RevertReason::BetBelowMinimum.to_string(), "Bet below $1");
        assert_eq!(
            RevertReason::from_reason("bet below $1"),
            RevertReason::BetBelowMinimum
        );
    }
}
