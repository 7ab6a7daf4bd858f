//! Swing-point and displacement helpers shared by the structure-aware
//! trailing methods (§4.6).

use crate::domain::ports::Candle;
use rust_decimal::Decimal;

/// Whether `candles[idx]` is a swing low: its low is strictly below every
/// low within `lookback` bars on both sides.
fn is_swing_low(candles: &[Candle], idx: usize, lookback: usize) -> bool {
    if idx < lookback || idx + lookback >= candles.len() {
        return false;
    }
    let pivot = candles[idx].low;
    (idx - lookback..idx + lookback + 1)
        .filter(|&i| i != idx)
        .all(|i| candles[i].low > pivot)
}

fn is_swing_high(candles: &[Candle], idx: usize, lookback: usize) -> bool {
    if idx < lookback || idx + lookback >= candles.len() {
        return false;
    }
    let pivot = candles[idx].high;
    (idx - lookback..idx + lookback + 1)
        .filter(|&i| i != idx)
        .all(|i| candles[i].high < pivot)
}

/// Most recent confirmed swing low in `candles`, scanning back from the
/// newest bar that still has a full lookback window on both sides.
pub fn most_recent_swing_low(candles: &[Candle], lookback: usize) -> Option<Decimal> {
    if candles.len() < lookback * 2 + 1 {
        return None;
    }
    (lookback..candles.len() - lookback)
        .rev()
        .find(|&i| is_swing_low(candles, i, lookback))
        .map(|i| candles[i].low)
}

pub fn most_recent_swing_high(candles: &[Candle], lookback: usize) -> Option<Decimal> {
    if candles.len() < lookback * 2 + 1 {
        return None;
    }
    (lookback..candles.len() - lookback)
        .rev()
        .find(|&i| is_swing_high(candles, i, lookback))
        .map(|i| candles[i].high)
}

/// Average true range proxy over raw high-low bar ranges (not ATR, just
/// a local volatility measure for displacement detection).
pub fn average_range(candles: &[Candle]) -> Option<Decimal> {
    if candles.is_empty() {
        return None;
    }
    let sum: Decimal = candles.iter().map(|c| c.high - c.low).sum();
    Some(sum / Decimal::from(candles.len() as u64))
}

/// A displacement sequence: net directional move over the window
/// exceeds `1.5x` the average bar range. Returns the first candle of
/// the sequence if detected.
pub fn detect_displacement(candles: &[Candle]) -> Option<Candle> {
    if candles.len() < 2 {
        return None;
    }
    let avg_range = average_range(candles)?;
    if avg_range.is_zero() {
        return None;
    }
    let net_move = (candles.last().unwrap().close - candles.first().unwrap().open).abs();
    if net_move <= avg_range * Decimal::new(15, 1) {
        return None;
    }
    candles
        .iter()
        .find(|c| (c.high - c.low) > avg_range)
        .copied()
}
