//! External collaborator interfaces (§6).
//!
//! The core never talks to a broker, a candle feed, or the defensive
//! engine directly — it only depends on these traits. Production
//! implementations live in `infrastructure`; tests provide in-memory
//! fakes.

use crate::domain::types::{DefensiveState, Direction, StrategyType};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A single open position as reported by the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionView {
    pub ticket: u64,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub current_sl: Option<Decimal>,
    pub current_tp: Option<Decimal>,
    pub volume: Decimal,
    pub open_time: DateTime<Utc>,
    pub comment: Option<String>,
}

/// One OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub time: DateTime<Utc>,
}

/// Broker-declared trading constraints for a symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolInfo {
    pub min_stop_distance: Decimal,
    pub point_value: Decimal,
    pub volume_step: Decimal,
}

/// Current bid/ask for a symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub bid: Decimal,
    pub ask: Decimal,
}

/// Result of a stop/take-profit modification request.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifyResult {
    pub ok: bool,
    pub retcode: i32,
    pub comment: String,
}

/// Result of a partial-close request.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosePartialResult {
    pub ok: bool,
    pub retcode: i32,
    pub comment: String,
}

/// Everything the manager needs from the broker/market-data layer.
///
/// Every method is a bounded, cancellable suspension point (§5); callers
/// are expected to wrap invocations in a timeout.
#[async_trait]
pub trait MarketService: Send + Sync {
    async fn positions(&self) -> Result<Vec<PositionView>>;
    async fn position(&self, ticket: u64) -> Result<Option<PositionView>>;
    async fn candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>>;
    async fn atr(&self, symbol: &str, timeframe: &str, period: usize) -> Result<Option<Decimal>>;
    async fn symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>>;
    async fn modify_stop(
        &self,
        ticket: u64,
        new_sl: Option<Decimal>,
        new_tp: Option<Decimal>,
    ) -> Result<ModifyResult>;
    async fn close_partial(&self, ticket: u64, volume: Decimal) -> Result<ClosePartialResult>;
    async fn symbol_tick(&self, symbol: &str) -> Result<Option<Tick>>;
}

/// The defensive subsystem's status feed (peer manager, consumed only).
#[async_trait]
pub trait DefensiveManager: Send + Sync {
    async fn state(&self, ticket: u64) -> DefensiveState;
}

/// Resolves a `plan_id` extracted from a broker comment to the strategy
/// the plan was opened under (§4.4 recovery, scenario 3).
///
/// Recovery only falls back to comment-keyword matching when this
/// returns `Ok(None)` (no plan on record) or `Err` (lookup failed).
#[async_trait]
pub trait PlanLookup: Send + Sync {
    async fn resolve_strategy(&self, plan_id: &str) -> Result<Option<StrategyType>>;
}
