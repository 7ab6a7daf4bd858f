//! The `universal_sl_tp_rules` configuration document (§6).
//!
//! Deserialized from TOML with `serde`. Every field is optional at every
//! layer so that the merge in `application::rule_resolver` can fall
//! through to a lower-precedence layer or a hard-coded default — this
//! document is never validated to the point of rejecting a partial file;
//! §4.1's failure mode only triggers when the file cannot be parsed at
//! all.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RuleDocument {
    #[serde(default)]
    pub universal_sl_tp_rules: UniversalRules,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UniversalRules {
    #[serde(default)]
    pub strategies: HashMap<String, StrategyDefaults>,
    #[serde(default)]
    pub symbol_adjustments: HashMap<String, SymbolAdjustment>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StrategyDefaults {
    pub breakeven_trigger_r: Option<f64>,
    /// Session-specific override, e.g. `breakeven_trigger_r_asia`.
    #[serde(default)]
    pub breakeven_trigger_r_session: HashMap<String, f64>,
    pub trailing_method: Option<String>,
    pub trailing_timeframe: Option<String>,
    pub atr_multiplier: Option<f64>,
    pub atr_buffer: Option<f64>,
    pub structure_lookback: Option<usize>,
    pub partial_trigger_r: Option<f64>,
    pub partial_close_pct: Option<f64>,
    pub min_sl_change_r: Option<f64>,
    pub sl_modification_cooldown_seconds: Option<i64>,
    pub trailing_enabled: Option<bool>,
    pub stall_lock_r: Option<f64>,
    pub fallback_trailing_methods: Option<Vec<String>>,
    pub structure_timeframe_bars: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SymbolAdjustment {
    pub atr_timeframe: Option<String>,
    pub trailing_timeframe: Option<String>,
    pub atr_multiplier: Option<f64>,
    pub min_sl_change_r: Option<f64>,
    pub sl_modification_cooldown_seconds: Option<i64>,
    #[serde(default)]
    pub session_adjustments: HashMap<String, SessionAdjustment>,
    pub fallback_fixed_distance: Option<f64>,
    pub fallback_trailing_pct: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SessionAdjustment {
    pub tp_multiplier: Option<f64>,
    /// Multiplier applied to the ATR multiplier to tighten SL in this
    /// session.
    pub sl_tightening: Option<f64>,
}
