//! Rule Resolver (§4.1).
//!
//! Merges strategy defaults, symbol overrides, and session overrides
//! into a single frozen [`ResolvedRuleSnapshot`]. Never fails: a
//! configuration load failure upstream is handled by the caller falling
//! back to [`ResolvedRuleSnapshot::builtin_default`]; this function
//! itself only ever falls through to lower-precedence layers.

use crate::domain::config::{StrategyDefaults, SymbolAdjustment, UniversalRules};
use crate::domain::trading::{FallbackMethod, ResolvedRuleSnapshot, TrailingMethod};
use crate::domain::types::{Session, StrategyType};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

fn parse_trailing_method(s: &str) -> TrailingMethod {
    match s {
        "structure_atr_hybrid" => TrailingMethod::StructureAtrHybrid,
        "structure_based" => TrailingMethod::StructureBased,
        "micro_choch" => TrailingMethod::MicroChoch,
        "displacement_or_structure" => TrailingMethod::DisplacementOrStructure,
        "minimal_be_only" => TrailingMethod::MinimalBeOnly,
        // "atr_basic" and anything unrecognized fall back to the default.
        _ => TrailingMethod::AtrBasic,
    }
}

fn parse_fallback_methods(list: &[String]) -> Vec<FallbackMethod> {
    let parsed: Vec<FallbackMethod> = list
        .iter()
        .filter_map(|m| match m.as_str() {
            "fixed_distance" => Some(FallbackMethod::FixedDistance),
            "percentage" => Some(FallbackMethod::Percentage),
            _ => None,
        })
        .collect();
    if parsed.is_empty() {
        vec![FallbackMethod::FixedDistance, FallbackMethod::Percentage]
    } else {
        parsed
    }
}

fn dec(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap_or_default()
}

/// Resolves (`strategy_type`, `symbol`, `session`) against a parsed
/// configuration document into a frozen snapshot. Merge order, lowest to
/// highest precedence: strategy defaults, symbol overrides, session
/// overrides within the symbol block, session fields on the strategy.
pub fn resolve(
    rules: &UniversalRules,
    strategy_type: StrategyType,
    symbol: &str,
    session: Session,
) -> ResolvedRuleSnapshot {
    let default = ResolvedRuleSnapshot::builtin_default();

    // Layer 1: base strategy defaults, falling back to DEFAULT_STANDARD
    // when the strategy key is unknown to the configuration.
    let strategy_defaults = rules
        .strategies
        .get(strategy_type.as_config_key())
        .or_else(|| rules.strategies.get(StrategyType::DefaultStandard.as_config_key()));

    let mut breakeven_trigger_r = strategy_defaults
        .and_then(|s| s.breakeven_trigger_r)
        .map(dec)
        .unwrap_or(default.breakeven_trigger_r);
    let mut trailing_method = strategy_defaults
        .and_then(|s| s.trailing_method.as_deref())
        .map(parse_trailing_method)
        .unwrap_or(default.trailing_method);
    let mut trailing_timeframe = strategy_defaults
        .and_then(|s| s.trailing_timeframe.clone())
        .unwrap_or_else(|| default.trailing_timeframe.clone());
    let mut atr_multiplier = strategy_defaults
        .and_then(|s| s.atr_multiplier)
        .map(dec)
        .unwrap_or(default.atr_multiplier);
    let atr_buffer = strategy_defaults
        .and_then(|s| s.atr_buffer)
        .map(dec)
        .unwrap_or(default.atr_buffer);
    let structure_lookback = strategy_defaults
        .and_then(|s| s.structure_lookback)
        .unwrap_or(default.structure_lookback);
    let partial_trigger_r = strategy_defaults.and_then(|s| s.partial_trigger_r).map(dec);
    let partial_close_pct = strategy_defaults.and_then(|s| s.partial_close_pct).map(dec);
    let mut min_sl_change_r = strategy_defaults
        .and_then(|s| s.min_sl_change_r)
        .map(dec)
        .unwrap_or(default.min_sl_change_r);
    let mut cooldown_seconds = strategy_defaults
        .and_then(|s| s.sl_modification_cooldown_seconds)
        .unwrap_or(default.sl_modification_cooldown_seconds);
    let trailing_enabled = strategy_defaults
        .and_then(|s| s.trailing_enabled)
        .unwrap_or(default.trailing_enabled);
    let stall_lock_r = strategy_defaults
        .and_then(|s| s.stall_lock_r)
        .map(dec)
        .unwrap_or(default.stall_lock_r);
    let mut fallback_methods = strategy_defaults
        .and_then(|s| s.fallback_trailing_methods.as_ref())
        .map(|m| parse_fallback_methods(m))
        .unwrap_or_else(|| default.fallback_trailing_methods.clone());
    let structure_timeframe_bars = strategy_defaults
        .and_then(|s| s.structure_timeframe_bars)
        .unwrap_or(default.structure_timeframe_bars);

    // Layer 2: symbol-specific overrides.
    let symbol_adj: Option<&SymbolAdjustment> = rules.symbol_adjustments.get(symbol);
    if let Some(adj) = symbol_adj {
        if let Some(tf) = &adj.trailing_timeframe {
            trailing_timeframe = tf.clone();
        }
        if let Some(m) = adj.atr_multiplier {
            atr_multiplier = dec(m);
        }
        if let Some(m) = adj.min_sl_change_r {
            min_sl_change_r = dec(m);
        }
        if let Some(c) = adj.sl_modification_cooldown_seconds {
            cooldown_seconds = c;
        }
    }

    // Layer 3: session-specific overrides within the symbol block.
    if let Some(adj) = symbol_adj {
        if let Some(session_adj) = adj.session_adjustments.get(session.as_config_key()) {
            if let Some(tightening) = session_adj.sl_tightening {
                atr_multiplier *= dec(tightening);
            }
            // tp_multiplier affects take-profit placement, which this
            // engine does not itself set (entries/TPs come from the
            // strategy layer) — recorded on the snapshot for completeness
            // is unnecessary since TP is fixed at registration; no field
            // to apply it to here.
            let _ = session_adj.tp_multiplier;
        }
    }

    // Layer 4: session-specific fields on the strategy, e.g.
    // `breakeven_trigger_r_asia`.
    if let Some(sd) = strategy_defaults {
        let session_key = session.as_config_key().to_lowercase();
        if let Some(v) = sd.breakeven_trigger_r_session.get(&session_key) {
            breakeven_trigger_r = dec(*v);
        }
    }

    // Enforce the atr_basic default and fixed fallback list when the
    // strategy omits them entirely (§4.1 tie-breaks).
    if strategy_defaults
        .and_then(|s| s.trailing_method.as_deref())
        .is_none()
    {
        trailing_method = TrailingMethod::AtrBasic;
    }
    if fallback_methods.is_empty() {
        fallback_methods = vec![FallbackMethod::FixedDistance, FallbackMethod::Percentage];
    }

    ResolvedRuleSnapshot {
        breakeven_trigger_r,
        trailing_method,
        trailing_timeframe,
        atr_multiplier,
        atr_buffer,
        structure_lookback,
        partial_trigger_r,
        partial_close_pct,
        min_sl_change_r,
        sl_modification_cooldown_seconds: cooldown_seconds,
        trailing_enabled,
        stall_lock_r,
        fallback_trailing_methods: fallback_methods,
        structure_timeframe_bars,
    }
}
