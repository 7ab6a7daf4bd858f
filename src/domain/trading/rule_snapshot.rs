//! The frozen, per-trade rule snapshot (§3, §4.1).
//!
//! Once stored on a `TradeState` this is never re-merged: a mid-trade
//! edit to the configuration file only affects trades registered after
//! the edit. This removes the class of bugs where a live trade's
//! behavior shifts underneath it.

use serde::{Deserialize, Serialize};
use rust_decimal::Decimal;

/// Trailing method dispatched by the trailing engine (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingMethod {
    StructureAtrHybrid,
    StructureBased,
    AtrBasic,
    MicroChoch,
    DisplacementOrStructure,
    MinimalBeOnly,
}

impl Default for TrailingMethod {
    fn default() -> Self {
        TrailingMethod::AtrBasic
    }
}

/// A fallback method used when ATR is unavailable (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMethod {
    FixedDistance,
    Percentage,
}

/// Fully-resolved, self-contained rule configuration for one trade.
///
/// Frozen on the owning `TradeState` at registration time (§3 invariant 7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRuleSnapshot {
    /// Breakeven trigger expressed in R-multiples.
    pub breakeven_trigger_r: Decimal,
    pub trailing_method: TrailingMethod,
    pub trailing_timeframe: String,
    pub atr_multiplier: Decimal,
    pub atr_buffer: Decimal,
    pub structure_lookback: usize,
    /// Partial-profit trigger in R, and the percentage of volume to close.
    pub partial_trigger_r: Option<Decimal>,
    pub partial_close_pct: Option<Decimal>,
    pub min_sl_change_r: Decimal,
    pub sl_modification_cooldown_seconds: i64,
    pub trailing_enabled: bool,
    pub stall_lock_r: Decimal,
    pub fallback_trailing_methods: Vec<FallbackMethod>,
    pub structure_timeframe_bars: usize,
}

impl ResolvedRuleSnapshot {
    /// The built-in default used when configuration cannot be loaded at
    /// all (§4.1 failure mode) — `DEFAULT_STANDARD`, ATR-basic M15
    /// trailing, 1.0 R breakeven, 0.1 R minimum improvement, 60s cooldown.
    pub fn builtin_default() -> Self {
        ResolvedRuleSnapshot {
            breakeven_trigger_r: Decimal::new(10, 1), // 1.0
            trailing_method: TrailingMethod::AtrBasic,
            trailing_timeframe: "M15".to_string(),
            atr_multiplier: Decimal::new(15, 1), // 1.5
            atr_buffer: Decimal::new(5, 1),       // 0.5
            structure_lookback: 5,
            partial_trigger_r: None,
            partial_close_pct: None,
            min_sl_change_r: Decimal::new(1, 1), // 0.1
            sl_modification_cooldown_seconds: 60,
            trailing_enabled: true,
            stall_lock_r: Decimal::new(5, 1), // 0.5
            fallback_trailing_methods: vec![
                FallbackMethod::FixedDistance,
                FallbackMethod::Percentage,
            ],
            structure_timeframe_bars: 100,
        }
    }
}
