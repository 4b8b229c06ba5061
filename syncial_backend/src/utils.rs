//! Shared helpers and constants.

use alloy::primitives::Address;
use chrono::{DateTime, TimeZone, Utc};

pub const APP_NAME: &str = "syncial_backend";

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339()
}

pub fn print_banner() {
    println!("syncial {} ({APP_NAME})", env!("CARGO_PKG_VERSION"));
}

/// Converts an on-chain `uint256` second count into a UTC timestamp.
/// Values that do not fit a `DateTime` collapse to the Unix epoch.
pub fn unix_to_datetime(secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_default()
}

/// `0x1234…cdef`, used in CLI output and log lines.
pub fn short_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}…{}", &full[..6], &full[full.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_unix_seconds() {
        let ts = unix_to_datetime(1_700_000_000);
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(unix_to_datetime(u64::MAX).timestamp(), 0);
    }

    #[test]
    fn shortens_addresses() {
        let address: Address = "0x9a85208bd9d5b20e95f4ebbfce6567d64f38dfd4"
            .parse()
            .unwrap();
        let short = short_address(&address);
        assert!(short.starts_with("0x9A85"));
        assert!(short.ends_with("DFD4"));
    }
}
