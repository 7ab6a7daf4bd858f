//! Symbol-keyed distance defaults (§4.6 fallback table, §4.7 gate 5).
//!
//! Grounded in the fixed fallback distances the original implementation
//! hard-codes per symbol when ATR is unavailable. The same table doubles
//! as the broker-minimum-distance default when `MarketService::symbol_info`
//! does not report one.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fallback fixed price distance for `symbol` when ATR cannot be used.
pub fn fixed_distance(symbol: &str) -> Decimal {
    match symbol {
        "XAUUSDc" => dec!(1.5),
        "BTCUSDc" => dec!(50.0),
        "EURUSDc" | "GBPUSDc" => dec!(0.0005),
        "USDJPYc" => dec!(0.05),
        s if s.starts_with("XAU") || s.contains("XAG") => dec!(1.5),
        s if s.contains("BTC") || s.contains("ETH") => dec!(50.0),
        _ => dec!(0.0005),
    }
}

/// Fallback percentage of current price, used by the `percentage` method.
pub const PERCENTAGE_FALLBACK: Decimal = dec!(0.001);

/// Default broker minimum stop distance when `symbol_info` is unavailable.
///
/// Uses the same order-of-magnitude table as [`fixed_distance`] since
/// neither the original source nor the spec distinguishes the two when
/// broker metadata cannot be fetched.
pub fn default_min_stop_distance(symbol: &str) -> Decimal {
    fixed_distance(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_symbols_use_documented_distances() {
        assert_eq!(fixed_distance("XAUUSDc"), dec!(1.5));
        assert_eq!(fixed_distance("BTCUSDc"), dec!(50.0));
        assert_eq!(fixed_distance("EURUSDc"), dec!(0.0005));
        assert_eq!(fixed_distance("USDJPYc"), dec!(0.05));
    }

    #[test]
    fn unknown_major_falls_back_to_generic_pip_distance() {
        assert_eq!(fixed_distance("AUDUSDc"), dec!(0.0005));
    }
}
