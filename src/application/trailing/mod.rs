//! Trailing Engine (§4.6).
//!
//! Computes a candidate stop-loss from ATR, market structure,
//! microstructure, or displacement, and degrades through a configured
//! fallback chain when ATR is unavailable. Never proposes a widening —
//! the wrong-direction guard in [`enforce_tightening`] is the final
//! check every candidate passes through.

pub mod structure;

use crate::application::symbol_distance::{fixed_distance, PERCENTAGE_FALLBACK};
use crate::domain::ports::Candle;
use crate::domain::trading::{FallbackMethod, ResolvedRuleSnapshot, TrailingMethod};
use crate::domain::trading::TradeState;
use crate::domain::types::Direction;
use rust_decimal::Decimal;
use structure::{average_range, detect_displacement, most_recent_swing_high, most_recent_swing_low};
use tracing::debug;

/// Rejects any candidate that would widen the stop (§4.6 CRITICAL
/// guard). Returns `None` instead of a widening candidate.
pub fn enforce_tightening(state: &TradeState, current_sl: Decimal, candidate: Decimal) -> Option<Decimal> {
    if state.is_tightening(current_sl, candidate) {
        Some(candidate)
    } else {
        debug!(
            ticket = state.ticket,
            %current_sl,
            %candidate,
            "rejected profit-reducing stop candidate"
        );
        None
    }
}

/// Inputs the engine needs beyond the `TradeState` itself — all fetched
/// by the caller (the monitoring loop), keeping this module a pure,
/// synchronously testable computation.
#[derive(Debug, Clone, Default)]
pub struct TrailingInputs {
    pub atr: Option<Decimal>,
    /// Candles at `rules.trailing_timeframe`, oldest first.
    pub structure_candles: Vec<Candle>,
    /// Candles at the lowest available timeframe, oldest first, used by
    /// `micro_choch`.
    pub micro_candles: Vec<Candle>,
    /// Last ~15 bars at the structure timeframe, used by
    /// `displacement_or_structure`.
    pub displacement_window: Vec<Candle>,
    /// Overrides `rules.atr_multiplier` when the monitoring loop detects
    /// elevated volatility (§4.6 volatility override); never mutates the
    /// frozen snapshot.
    pub override_multiplier: Option<Decimal>,
}

fn atr_basic_multiplier(state: &TradeState, rules: &ResolvedRuleSnapshot, override_multiplier: Option<Decimal>) -> Decimal {
    let base = override_multiplier.unwrap_or(rules.atr_multiplier);
    let one_r = state.one_r();
    if one_r.is_zero() {
        return base;
    }
    let base_trailing_distance = match state.baseline_atr {
        Some(atr) if !atr.is_zero() => atr * base,
        _ => return base,
    };
    if base_trailing_distance.is_zero() {
        return base;
    }
    let current_sl = state.current_sl.unwrap_or(state.initial_sl);
    let be_distance = (current_sl - state.entry_price).abs();
    let half = base_trailing_distance / Decimal::TWO;
    if be_distance >= half {
        return base;
    }
    // Linear interpolation: 0.5x at be_distance=0, up to 1.0x at be_distance=half.
    let ratio = Decimal::new(5, 1) + (be_distance / half) * Decimal::new(5, 1);
    debug!(ticket = state.ticket, %ratio, "shrinking trailing multiplier for tight breakeven stop");
    base * ratio
}

fn atr_candidate(state: &TradeState, atr: Decimal, multiplier: Decimal) -> Decimal {
    let distance = atr * multiplier;
    match state.direction {
        Direction::Buy => state.current_price - distance,
        Direction::Sell => state.current_price + distance,
    }
}

/// `atr_basic` as a standalone trailing method: subject to the dynamic
/// breakeven-tightness shrink (§4.6).
fn atr_basic(state: &TradeState, rules: &ResolvedRuleSnapshot, atr: Decimal, override_multiplier: Option<Decimal>) -> Decimal {
    let multiplier = atr_basic_multiplier(state, rules, override_multiplier);
    atr_candidate(state, atr, multiplier)
}

/// The ATR leg of `structure_atr_hybrid`: uses the base multiplier
/// directly, not `atr_basic`'s breakeven-tightness shrink, which is
/// specific to the `atr_basic` method itself.
fn atr_leg_for_hybrid(rules: &ResolvedRuleSnapshot, state: &TradeState, atr: Decimal, override_multiplier: Option<Decimal>) -> Decimal {
    let multiplier = override_multiplier.unwrap_or(rules.atr_multiplier);
    atr_candidate(state, atr, multiplier)
}

fn structure_based(
    state: &TradeState,
    rules: &ResolvedRuleSnapshot,
    atr: Option<Decimal>,
    candles: &[Candle],
) -> Option<Decimal> {
    let atr = atr?;
    let buffer = rules.atr_buffer * atr;
    match state.direction {
        Direction::Buy => most_recent_swing_low(candles, rules.structure_lookback).map(|low| low - buffer),
        Direction::Sell => most_recent_swing_high(candles, rules.structure_lookback).map(|high| high + buffer),
    }
}

fn micro_choch(
    state: &TradeState,
    rules: &ResolvedRuleSnapshot,
    atr: Option<Decimal>,
    candles: &[Candle],
) -> Option<Decimal> {
    let atr = atr?;
    let buffer = rules.atr_buffer * atr;
    // A small fixed lookback approximates the change-of-character swing
    // on the lowest timeframe.
    let candidate = match state.direction {
        Direction::Buy => most_recent_swing_low(candles, 2).map(|low| low - buffer),
        Direction::Sell => most_recent_swing_high(candles, 2).map(|high| high + buffer),
    }?;
    let wrong_side = match state.direction {
        Direction::Buy => candidate >= state.current_price,
        Direction::Sell => candidate <= state.current_price,
    };
    if wrong_side {
        None
    } else {
        Some(candidate)
    }
}

fn displacement_or_structure(
    state: &TradeState,
    rules: &ResolvedRuleSnapshot,
    atr: Option<Decimal>,
    displacement_window: &[Candle],
    structure_candles: &[Candle],
) -> Option<Decimal> {
    let atr = atr?;
    let buffer = rules.atr_buffer * atr;
    if let Some(displacement_candle) = detect_displacement(displacement_window) {
        let anchor = match state.direction {
            Direction::Buy => displacement_candle.low - buffer,
            Direction::Sell => displacement_candle.high + buffer,
        };
        return Some(anchor);
    }
    structure_based(state, rules, Some(atr), structure_candles)
}

/// Computes the tighter of the structure and ATR candidates for the
/// given direction (`structure_atr_hybrid`).
fn tighter(state: &TradeState, current_sl: Decimal, a: Decimal, b: Decimal) -> Decimal {
    match state.direction {
        Direction::Buy => {
            if state.is_tightening(current_sl, a) && (!state.is_tightening(current_sl, b) || a > b) {
                a
            } else {
                b
            }
        }
        Direction::Sell => {
            if state.is_tightening(current_sl, a) && (!state.is_tightening(current_sl, b) || a < b) {
                a
            } else {
                b
            }
        }
    }
}

/// Computes a raw candidate from ATR-backed data, before the no-widen
/// guard and before the fallback chain. `None` means this method had
/// insufficient data (not the same as "ATR unavailable" — callers only
/// enter the fallback chain when `inputs.atr` itself is `None`).
fn compute_candidate(state: &TradeState, rules: &ResolvedRuleSnapshot, inputs: &TrailingInputs) -> Option<Decimal> {
    match rules.trailing_method {
        TrailingMethod::MinimalBeOnly => None,
        TrailingMethod::AtrBasic => inputs
            .atr
            .map(|atr| atr_basic(state, rules, atr, inputs.override_multiplier)),
        TrailingMethod::StructureBased => {
            structure_based(state, rules, inputs.atr, &inputs.structure_candles)
        }
        TrailingMethod::StructureAtrHybrid => {
            let structure = structure_based(state, rules, inputs.atr, &inputs.structure_candles);
            let atr_candidate = inputs
                .atr
                .map(|atr| atr_leg_for_hybrid(rules, state, atr, inputs.override_multiplier));
            match (structure, atr_candidate) {
                (Some(s), Some(a)) => {
                    let current_sl = state.current_sl.unwrap_or(state.initial_sl);
                    Some(tighter(state, current_sl, s, a))
                }
                (None, Some(a)) => Some(a),
                (Some(s), None) => Some(s),
                (None, None) => None,
            }
        }
        TrailingMethod::MicroChoch => micro_choch(state, rules, inputs.atr, &inputs.micro_candles),
        TrailingMethod::DisplacementOrStructure => displacement_or_structure(
            state,
            rules,
            inputs.atr,
            &inputs.displacement_window,
            &inputs.structure_candles,
        ),
    }
}

/// Fallback candidate when ATR is entirely unavailable, iterating the
/// rule snapshot's configured fallback methods in order.
fn fallback_candidate(state: &TradeState, rules: &ResolvedRuleSnapshot) -> Option<Decimal> {
    for method in &rules.fallback_trailing_methods {
        let distance = match method {
            FallbackMethod::FixedDistance => fixed_distance(&state.symbol),
            FallbackMethod::Percentage => state.current_price * PERCENTAGE_FALLBACK,
        };
        let candidate = match state.direction {
            Direction::Buy => state.current_price - distance,
            Direction::Sell => state.current_price + distance,
        };
        let current_sl = state.current_sl.unwrap_or(state.initial_sl);
        if state.is_tightening(current_sl, candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Proposes a new stop for `state`, or `None` ("no update"). This is the
/// pure, synchronous heart of the Trailing Engine; the monitoring loop
/// fetches `inputs` and interprets `None` from an ATR-unavailable path
/// as the trigger for the alert cadence (§4.6, §7).
pub fn propose(state: &TradeState, rules: &ResolvedRuleSnapshot, inputs: &TrailingInputs) -> Option<Decimal> {
    if !rules.trailing_enabled {
        return None;
    }
    let current_sl = state.current_sl.unwrap_or(state.initial_sl);

    let raw = if inputs.atr.is_some() {
        compute_candidate(state, rules, inputs)
    } else {
        fallback_candidate(state, rules)
    }?;

    enforce_tightening(state, current_sl, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::ResolvedRuleSnapshot;
    use crate::domain::types::{Session, StrategyType};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn buy_state() -> TradeState {
        TradeState {
            ticket: 1,
            symbol: "BTCUSDc".to_string(),
            strategy_type: StrategyType::BreakoutIbVolatilityTrap,
            direction: Direction::Buy,
            session: Session::London,
            entry_price: dec!(84000),
            initial_sl: dec!(83800),
            initial_tp: Some(dec!(84500)),
            rules: ResolvedRuleSnapshot::builtin_default(),
            owner: crate::domain::types::OwnerId::universal(),
            baseline_atr: Some(dec!(50)),
            initial_volume: dec!(1.0),
            breakeven_triggered: true,
            partial_taken: false,
            last_trailing_sl: None,
            last_sl_modification_time: None,
            registered_at: Utc::now(),
            plan_id: None,
            current_price: dec!(84300),
            current_sl: Some(dec!(84000)),
            current_volume: dec!(1.0),
            r_multiple_achieved: dec!(2.5),
            last_check_time: None,
        }
    }

    #[test]
    fn atr_basic_buy_trails_below_price() {
        let mut state = buy_state();
        // Breakeven stop sits well past the tight-shrink threshold
        // (half of 50*1.5=75 is 37.5) so the full multiplier applies.
        state.current_sl = Some(dec!(83950));
        let rules = ResolvedRuleSnapshot {
            trailing_method: TrailingMethod::AtrBasic,
            atr_multiplier: dec!(1.5),
            ..ResolvedRuleSnapshot::builtin_default()
        };
        let inputs = TrailingInputs { atr: Some(dec!(50)), ..Default::default() };
        let candidate = propose(&state, &rules, &inputs);
        assert_eq!(candidate, Some(dec!(84225)));
    }

    #[test]
    fn atr_basic_shrinks_multiplier_when_breakeven_stop_is_tight() {
        let mut state = buy_state();
        // current_sl == entry_price: the tightest possible breakeven stop.
        state.current_sl = Some(state.entry_price);
        let rules = ResolvedRuleSnapshot {
            trailing_method: TrailingMethod::AtrBasic,
            atr_multiplier: dec!(1.5),
            ..ResolvedRuleSnapshot::builtin_default()
        };
        let inputs = TrailingInputs { atr: Some(dec!(50)), ..Default::default() };
        // shrunk multiplier = 1.5 * 0.5 = 0.75 -> distance 37.5 -> 84300-37.5=84262.5
        assert_eq!(propose(&state, &rules, &inputs), Some(dec!(84262.5)));
    }

    #[test]
    fn sell_atr_basic_rejects_widening_candidate() {
        let mut state = buy_state();
        state.direction = Direction::Sell;
        state.entry_price = dec!(84000);
        state.initial_sl = dec!(84200);
        state.current_sl = Some(dec!(83875));
        state.current_price = dec!(83900);
        let rules = ResolvedRuleSnapshot {
            trailing_method: TrailingMethod::AtrBasic,
            atr_multiplier: dec!(1.5),
            ..ResolvedRuleSnapshot::builtin_default()
        };
        let inputs = TrailingInputs { atr: Some(dec!(50)), ..Default::default() };
        // 83900 + 75 = 83975 > 83875 current -> widening, rejected.
        assert_eq!(propose(&state, &rules, &inputs), None);
    }

    #[test]
    fn sell_atr_basic_accepts_tightening_candidate() {
        let mut state = buy_state();
        state.direction = Direction::Sell;
        state.entry_price = dec!(84000);
        state.initial_sl = dec!(84200);
        // Breakeven stop sits past the tight-shrink threshold (half of
        // 50*1.5=75 is 37.5) so the full multiplier applies.
        state.current_sl = Some(dec!(84050));
        state.current_price = dec!(83800);
        let rules = ResolvedRuleSnapshot {
            trailing_method: TrailingMethod::AtrBasic,
            atr_multiplier: dec!(1.5),
            ..ResolvedRuleSnapshot::builtin_default()
        };
        let inputs = TrailingInputs { atr: Some(dec!(50)), ..Default::default() };
        assert_eq!(propose(&state, &rules, &inputs), Some(dec!(83875)));
    }

    #[test]
    fn minimal_be_only_never_trails() {
        let state = buy_state();
        let rules = ResolvedRuleSnapshot {
            trailing_method: TrailingMethod::MinimalBeOnly,
            ..ResolvedRuleSnapshot::builtin_default()
        };
        let inputs = TrailingInputs { atr: Some(dec!(50)), ..Default::default() };
        assert_eq!(propose(&state, &rules, &inputs), None);
    }

    #[test]
    fn fallback_to_fixed_distance_when_atr_unavailable() {
        let mut state = buy_state();
        state.symbol = "XAUUSDc".to_string();
        state.direction = Direction::Sell;
        state.entry_price = dec!(2000);
        state.initial_sl = dec!(2010);
        state.current_sl = Some(dec!(2005));
        state.current_price = dec!(2000);
        let rules = ResolvedRuleSnapshot::builtin_default();
        let inputs = TrailingInputs { atr: None, ..Default::default() };
        // fixed_distance(XAUUSDc) = 1.5, candidate = 2000 + 1.5 = 2001.5 < 2005 -> tightening.
        assert_eq!(propose(&state, &rules, &inputs), Some(dec!(2001.5)));
    }

    #[test]
    fn structure_atr_hybrid_returns_tighter_of_the_two() {
        let state = buy_state();
        let rules = ResolvedRuleSnapshot {
            trailing_method: TrailingMethod::StructureAtrHybrid,
            atr_multiplier: dec!(1.5),
            atr_buffer: dec!(0.5),
            structure_lookback: 1,
            ..ResolvedRuleSnapshot::builtin_default()
        };
        let candles: Vec<Candle> = vec![
            Candle { open: dec!(84300), high: dec!(84350), low: dec!(84250), close: dec!(84300), volume: dec!(1), time: Utc::now() },
            Candle { open: dec!(84250), high: dec!(84280), low: dec!(84150), close: dec!(84200), volume: dec!(1), time: Utc::now() },
            Candle { open: dec!(84200), high: dec!(84260), low: dec!(84220), close: dec!(84250), volume: dec!(1), time: Utc::now() },
        ];
        let inputs = TrailingInputs {
            atr: Some(dec!(50)),
            structure_candles: candles,
            ..Default::default()
        };
        // structure candidate = 84150 - 0.5*50 = 84125; atr candidate = 84300 - 1.5*50 = 84225.
        // tighter for BUY = max(84125, 84225) = 84225.
        assert_eq!(propose(&state, &rules, &inputs), Some(dec!(84225)));
    }
}
