//! Session detection helper (§4.5, §6).
//!
//! Sessions are always derived from a specific timestamp — the
//! position's open time — never from "now", so that recovery after a
//! restart reproduces the same session a live registration would have
//! captured (§6).

use crate::domain::types::Session;
use chrono::{DateTime, Utc, Weekday, Datelike};

/// The only symbol the weekend classification gate applies to (§4.5).
pub const WEEKEND_SYMBOL: &str = "BTCUSDc";

/// Derives the session for a position from its open timestamp.
pub fn session_for_timestamp(open_time: DateTime<Utc>) -> Session {
    Session::from_utc_timestamp(open_time)
}

/// Whether `timestamp` falls on a weekend (UTC Saturday/Sunday), the
/// gate the classifier's weekend rule checks before anything else.
pub fn is_weekend(timestamp: DateTime<Utc>) -> bool {
    matches!(timestamp.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Whether the weekend classification applies to `symbol` right now.
pub fn weekend_gate_active(symbol: &str, timestamp: DateTime<Utc>) -> bool {
    symbol == WEEKEND_SYMBOL && is_weekend(timestamp)
}
