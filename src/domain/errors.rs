//! Error kinds for the manager.
//!
//! None of these ever escape the monitoring loop (§7): transient and
//! data-unavailable kinds are logged and retried next cycle, invalid
//! improvements are silent debug-level skips, and only [`ManagerError::Fatal`]
//! is allowed to abort process startup.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("market service timed out or returned retcode {retcode:?}: {reason}")]
    TransientExternal {
        reason: String,
        retcode: Option<i32>,
    },

    #[error("modification rejected, trading session closed for {symbol}")]
    BrokerSchedule { symbol: String },

    #[error("proposed SL {proposed} does not improve on current {current} for ticket {ticket}")]
    InvalidImprovement {
        ticket: u64,
        current: Decimal,
        proposed: Decimal,
    },

    #[error("{what} unavailable for {symbol}/{timeframe}")]
    DataUnavailable {
        what: &'static str,
        symbol: String,
        timeframe: String,
    },

    #[error("persistence failure for ticket {ticket}: {reason}")]
    Persistence { ticket: u64, reason: String },

    #[error("ownership conflict on ticket {ticket}: defensive subsystem active")]
    OwnershipConflict { ticket: u64 },

    #[error("fatal: {0}")]
    Fatal(String),
}

/// Result alias used throughout the application layer.
pub type ManagerResult<T> = Result<T, ManagerError>;
