//! `TradeState` — one per managed position (§3).

use crate::domain::repositories::PersistentRecord;
use crate::domain::trading::rule_snapshot::ResolvedRuleSnapshot;
use crate::domain::types::{Direction, OwnerId, Session, StrategyType};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// The durable, authoritative record of a managed position.
///
/// `entry_price` and `initial_sl` never change after registration
/// (§3 invariant 2); `breakeven_triggered` and `partial_taken` are
/// monotonic (invariants 3, 4). Runtime-derived fields are recomputed
/// every monitoring cycle and are never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeState {
    pub ticket: u64,
    pub symbol: String,
    pub strategy_type: StrategyType,
    pub direction: Direction,
    /// Captured once at registration; never re-derived from "now".
    pub session: Session,
    pub entry_price: Decimal,
    pub initial_sl: Decimal,
    pub initial_tp: Option<Decimal>,
    pub rules: ResolvedRuleSnapshot,
    pub owner: OwnerId,
    pub baseline_atr: Option<Decimal>,
    pub initial_volume: Decimal,
    pub breakeven_triggered: bool,
    pub partial_taken: bool,
    pub last_trailing_sl: Option<Decimal>,
    pub last_sl_modification_time: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
    pub plan_id: Option<String>,

    // --- Runtime-derived, recomputed every cycle, never persisted ---
    pub current_price: Decimal,
    pub current_sl: Option<Decimal>,
    pub current_volume: Decimal,
    pub r_multiple_achieved: Decimal,
    pub last_check_time: Option<DateTime<Utc>>,
}

impl TradeState {
    /// 1R = |entry − initial_sl|.
    pub fn one_r(&self) -> Decimal {
        (self.entry_price - self.initial_sl).abs()
    }

    /// R-multiple of a given price versus the original risk.
    pub fn r_multiple_at(&self, price: Decimal) -> Decimal {
        let one_r = self.one_r();
        if one_r.is_zero() {
            return Decimal::ZERO;
        }
        let favorable_move = match self.direction {
            Direction::Buy => price - self.entry_price,
            Direction::Sell => self.entry_price - price,
        };
        favorable_move / one_r
    }

    /// Whether `candidate` is a strict improvement over `current` given
    /// direction (§3 invariant 6): tighter for BUY means higher, for SELL
    /// means lower.
    pub fn is_tightening(&self, current: Decimal, candidate: Decimal) -> bool {
        match self.direction {
            Direction::Buy => candidate > current,
            Direction::Sell => candidate < current,
        }
    }

    /// Builds the durable row for this trade (§4.3). Rule-snapshot
    /// serialization failure degrades to an empty blob rather than
    /// failing the whole record (§4.3 failure mode).
    pub fn to_persistent_record(&self) -> PersistentRecord {
        let resolved_trailing_rules = serde_json::to_string(&self.rules).unwrap_or_else(|e| {
            tracing::error!(ticket = self.ticket, error = %e, "rule snapshot serialization failed, persisting degraded blob");
            "{}".to_string()
        });
        PersistentRecord {
            ticket: self.ticket,
            symbol: self.symbol.clone(),
            strategy_type: self.strategy_type.as_config_key().to_string(),
            direction: match self.direction {
                Direction::Buy => "BUY".to_string(),
                Direction::Sell => "SELL".to_string(),
            },
            session: self.session.as_config_key().to_string(),
            entry_price: self.entry_price,
            initial_sl: self.initial_sl,
            initial_tp: self.initial_tp,
            resolved_trailing_rules,
            managed_by: self.owner.0.clone(),
            baseline_atr: self.baseline_atr,
            initial_volume: self.initial_volume,
            breakeven_triggered: self.breakeven_triggered,
            partial_taken: self.partial_taken,
            last_trailing_sl: self.last_trailing_sl,
            last_sl_modification_time: self.last_sl_modification_time,
            registered_at: self.registered_at,
            plan_id: self.plan_id.clone(),
        }
    }
}
