//! Trade classifier (§4.5).
//!
//! Assigns a [`TradeClass`] to a newly observed position from whatever
//! inputs are available, in strict priority order. Never fails: any
//! unexpected input degrades to `INTRADAY` at confidence 0.0, never a
//! panic or propagated error.

use crate::domain::types::TradeClass;
use crate::application::session::WEEKEND_SYMBOL;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

const SCALP_KEYWORDS: &[&str] = &[
    "scalp", "scalping", "scalper", "micro", "quick", "fast", "rapid", "short", "brief",
    "momentum",
];

const INTRADAY_KEYWORDS: &[&str] = &[
    "swing", "intraday", "hold", "position", "trend", "runner", "daily", "session", "full target",
    "let it run",
];

/// Epsilon used when comparing the stop/ATR ratio to 1.0 (§4.5 point 4,
/// §8 boundary: a ratio of exactly 1.0 classifies as SCALP).
const STOP_ATR_EPSILON: f64 = 1e-9;

/// Base class before the volatility overlay is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BaseClass {
    Scalp,
    Intraday,
    Weekend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolatilityRegime {
    Normal,
    Volatile,
}

#[derive(Debug, Clone)]
pub struct SessionStrategyInfo {
    pub strategy_label: String,
}

/// Inputs accepted by [`classify`].
#[derive(Debug, Clone)]
pub struct ClassificationInput<'a> {
    pub symbol: &'a str,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub comment: Option<&'a str>,
    pub session_info: Option<&'a SessionStrategyInfo>,
    pub h1_atr: Option<Decimal>,
    pub volatility_regime: Option<VolatilityRegime>,
    pub is_weekend: bool,
}

/// Factor trace recording which signal decided the classification.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorTrace {
    pub base_class: String,
    pub reason: &'static str,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub trade_class: TradeClass,
    pub confidence: f64,
    pub reasoning: String,
    pub factors: FactorTrace,
}

/// Classifies a position per the priority order in §4.5. Never panics or
/// returns an error — any internal inconsistency degrades to INTRADAY at
/// confidence 0.0 with the problem recorded in the factor trace.
pub fn classify(input: ClassificationInput) -> ClassificationResult {
    let (base, confidence, reasoning, reason_tag) = classify_base(&input);

    let trade_class = match (base, input.volatility_regime) {
        // Weekend is never overlaid.
        (BaseClass::Weekend, _) => TradeClass::Weekend,
        (BaseClass::Scalp, Some(VolatilityRegime::Volatile)) => TradeClass::VolatileScalp,
        (BaseClass::Intraday, Some(VolatilityRegime::Volatile)) => TradeClass::VolatileIntraday,
        (BaseClass::Scalp, _) => TradeClass::Scalp,
        (BaseClass::Intraday, _) => TradeClass::Intraday,
    };

    let base_class_name = match base {
        BaseClass::Scalp => "SCALP",
        BaseClass::Intraday => "INTRADAY",
        BaseClass::Weekend => "WEEKEND",
    };

    ClassificationResult {
        trade_class,
        confidence,
        reasoning,
        factors: FactorTrace {
            base_class: base_class_name.to_string(),
            reason: reason_tag,
            error: None,
        },
    }
}

fn classify_base(input: &ClassificationInput) -> (BaseClass, f64, String, &'static str) {
    // 1. Weekend gate — highest priority, applies only to the designated
    //    crypto pair.
    if input.is_weekend && input.symbol == WEEKEND_SYMBOL {
        return (
            BaseClass::Weekend,
            1.0,
            format!("{} is in its weekend trading window", input.symbol),
            "weekend_gate",
        );
    }

    // 2. Explicit override in the comment (case-insensitive).
    if let Some(comment) = input.comment {
        let lower = comment.to_lowercase();
        if lower.contains("!force:scalp") {
            return (
                BaseClass::Scalp,
                1.0,
                "explicit !force:scalp override".to_string(),
                "force_override",
            );
        }
        if lower.contains("!force:intraday") {
            return (
                BaseClass::Intraday,
                1.0,
                "explicit !force:intraday override".to_string(),
                "force_override",
            );
        }

        // 3. Comment keywords.
        if let Some(kw) = SCALP_KEYWORDS.iter().find(|kw| lower.contains(*kw)) {
            return (
                BaseClass::Scalp,
                0.85,
                format!("comment keyword '{}' suggests SCALP", kw),
                "comment_keyword",
            );
        }
        if let Some(kw) = INTRADAY_KEYWORDS.iter().find(|kw| lower.contains(*kw)) {
            return (
                BaseClass::Intraday,
                0.85,
                format!("comment keyword '{}' suggests INTRADAY", kw),
                "comment_keyword",
            );
        }
    }

    // 4. Stop size vs. H1 ATR.
    if let Some(atr) = input.h1_atr {
        if !atr.is_zero() {
            let stop_size = (input.entry_price - input.stop_loss).abs();
            if !stop_size.is_zero() {
                let ratio = stop_size / atr;
                let ratio_f64 = ratio.to_f64().unwrap_or(f64::MAX);
                if ratio_f64 <= 1.0 + STOP_ATR_EPSILON {
                    return (
                        BaseClass::Scalp,
                        0.75,
                        format!("stop/ATR ratio {:.3} <= 1.0", ratio_f64),
                        "stop_atr_ratio",
                    );
                } else {
                    return (
                        BaseClass::Intraday,
                        0.70,
                        format!("stop/ATR ratio {:.3} > 1.0", ratio_f64),
                        "stop_atr_ratio",
                    );
                }
            }
        }
    }

    // 5. Session strategy label.
    if let Some(info) = input.session_info {
        let label = info.strategy_label.to_lowercase();
        if label == "scalping" || label == "range_trading" {
            return (
                BaseClass::Scalp,
                0.65,
                format!("session strategy '{}' suggests SCALP", label),
                "session_strategy",
            );
        }
        if label == "trend_following" || label == "breakout" || label == "breakout_and_trend" {
            return (
                BaseClass::Intraday,
                0.65,
                format!("session strategy '{}' suggests INTRADAY", label),
                "session_strategy",
            );
        }
    }

    // 6. Default.
    (
        BaseClass::Intraday,
        0.50,
        "no stronger signal available, defaulting to INTRADAY".to_string(),
        "default",
    )
}
