//! Closed enumerations shared across the manager.
//!
//! These mirror the data model in the specification: trading sessions,
//! the strategy taxonomy this engine is allowed to manage, trade
//! direction, and the classifier's output taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A block of the trading day named after the dominant financial center.
///
/// Boundaries are UTC and fixed: Asia 00:00–08:00, London 08:00–13:00,
/// London/NY overlap 13:00–16:00, NY 16:00–21:00, Late NY 21:00–24:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Session {
    Asia,
    London,
    LondonNyOverlap,
    Ny,
    LateNy,
}

impl Session {
    /// Maps a UTC hour-of-day (0..=23) to its session.
    ///
    /// Hour 13 belongs to the overlap, not London; hour 16 belongs to NY.
    pub fn from_utc_hour(hour: u32) -> Session {
        match hour {
            0..=7 => Session::Asia,
            8..=12 => Session::London,
            13..=15 => Session::LondonNyOverlap,
            16..=20 => Session::Ny,
            _ => Session::LateNy,
        }
    }

    pub fn from_utc_timestamp(dt: chrono::DateTime<chrono::Utc>) -> Session {
        use chrono::Timelike;
        Session::from_utc_hour(dt.hour())
    }

    pub fn as_config_key(&self) -> &'static str {
        match self {
            Session::Asia => "ASIA",
            Session::London => "LONDON",
            Session::LondonNyOverlap => "LONDON_NY_OVERLAP",
            Session::Ny => "NY",
            Session::LateNy => "LATE_NY",
        }
    }

    /// Parses a persisted session key, falling back to [`Session::London`]
    /// for unrecognized strings (a malformed persisted row should degrade
    /// rather than block recovery of the rest of the record).
    pub fn parse_or_default(s: &str) -> Session {
        match s {
            "ASIA" => Session::Asia,
            "LONDON" => Session::London,
            "LONDON_NY_OVERLAP" => Session::LondonNyOverlap,
            "NY" => Session::Ny,
            "LATE_NY" => Session::LateNy,
            _ => Session::London,
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_config_key())
    }
}

/// The closed taxonomy of strategies that may produce a managed position.
///
/// `MICRO_SCALP` is the only variant outside `UNIVERSAL_MANAGED`; every
/// other member is handled by this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    BreakoutIbVolatilityTrap,
    BreakoutBos,
    TrendContinuationPullback,
    TrendContinuationBos,
    LiquiditySweepReversal,
    OrderBlockRejection,
    MeanReversionRangeScalp,
    MeanReversionVwapFade,
    DefaultStandard,
    MicroScalp,
    BreakerBlock,
    MarketStructureShift,
    FvgRetracement,
    MitigationBlock,
    InducementReversal,
    PremiumDiscountArray,
    SessionLiquidityRun,
    KillZone,
}

impl StrategyType {
    /// Whether this engine manages positions opened under this strategy.
    ///
    /// `MICRO_SCALP` is the sole exclusion; it is delegated to a legacy
    /// manager.
    pub fn is_universal_managed(&self) -> bool {
        !matches!(self, StrategyType::MicroScalp)
    }

    /// Config-file key used to look this strategy up in `strategies`.
    pub fn as_config_key(&self) -> &'static str {
        match self {
            StrategyType::BreakoutIbVolatilityTrap => "breakout_ib_volatility_trap",
            StrategyType::BreakoutBos => "breakout_bos",
            StrategyType::TrendContinuationPullback => "trend_continuation_pullback",
            StrategyType::TrendContinuationBos => "trend_continuation_bos",
            StrategyType::LiquiditySweepReversal => "liquidity_sweep_reversal",
            StrategyType::OrderBlockRejection => "order_block_rejection",
            StrategyType::MeanReversionRangeScalp => "mean_reversion_range_scalp",
            StrategyType::MeanReversionVwapFade => "mean_reversion_vwap_fade",
            StrategyType::DefaultStandard => "default_standard",
            StrategyType::MicroScalp => "micro_scalp",
            StrategyType::BreakerBlock => "breaker_block",
            StrategyType::MarketStructureShift => "market_structure_shift",
            StrategyType::FvgRetracement => "fvg_retracement",
            StrategyType::MitigationBlock => "mitigation_block",
            StrategyType::InducementReversal => "inducement_reversal",
            StrategyType::PremiumDiscountArray => "premium_discount_array",
            StrategyType::SessionLiquidityRun => "session_liquidity_run",
            StrategyType::KillZone => "kill_zone",
        }
    }

    /// Parses a strategy-type config key, falling back to
    /// [`StrategyType::DefaultStandard`] for unrecognized strings.
    pub fn parse_or_default(s: &str) -> StrategyType {
        match s.to_lowercase().as_str() {
            "breakout_ib_volatility_trap" => StrategyType::BreakoutIbVolatilityTrap,
            "breakout_bos" => StrategyType::BreakoutBos,
            "trend_continuation_pullback" => StrategyType::TrendContinuationPullback,
            "trend_continuation_bos" => StrategyType::TrendContinuationBos,
            "liquidity_sweep_reversal" => StrategyType::LiquiditySweepReversal,
            "order_block_rejection" => StrategyType::OrderBlockRejection,
            "mean_reversion_range_scalp" => StrategyType::MeanReversionRangeScalp,
            "mean_reversion_vwap_fade" => StrategyType::MeanReversionVwapFade,
            "micro_scalp" => StrategyType::MicroScalp,
            "breaker_block" => StrategyType::BreakerBlock,
            "market_structure_shift" => StrategyType::MarketStructureShift,
            "fvg_retracement" => StrategyType::FvgRetracement,
            "mitigation_block" => StrategyType::MitigationBlock,
            "inducement_reversal" => StrategyType::InducementReversal,
            "premium_discount_array" => StrategyType::PremiumDiscountArray,
            "session_liquidity_run" => StrategyType::SessionLiquidityRun,
            "kill_zone" => StrategyType::KillZone,
            _ => StrategyType::DefaultStandard,
        }
    }
}

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// Parses a persisted direction string, defaulting to `Buy` for
    /// anything unrecognized.
    pub fn parse_or_default(s: &str) -> Direction {
        match s {
            "SELL" => Direction::Sell,
            _ => Direction::Buy,
        }
    }
}

/// The classifier's output taxonomy, distinct from [`StrategyType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeClass {
    Scalp,
    Intraday,
    Weekend,
    VolatileScalp,
    VolatileIntraday,
}

impl fmt::Display for TradeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeClass::Scalp => "SCALP",
            TradeClass::Intraday => "INTRADAY",
            TradeClass::Weekend => "WEEKEND",
            TradeClass::VolatileScalp => "VOLATILE_SCALP",
            TradeClass::VolatileIntraday => "VOLATILE_INTRADAY",
        };
        write!(f, "{}", s)
    }
}

/// Tag identifying the subsystem that currently owns a position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub const UNIVERSAL: &'static str = "universal";
    pub const DTMS: &'static str = "dtms";
    pub const LEGACY_EXIT: &'static str = "legacy_exit";

    pub fn universal() -> Self {
        OwnerId(Self::UNIVERSAL.to_string())
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The defensive subsystem's reported posture for a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefensiveState {
    Normal,
    Hedged,
    WarningL2,
}

impl DefensiveState {
    /// Whether this posture must preempt universal trailing (§4.7 gate 2).
    pub fn is_preempting(&self) -> bool {
        matches!(self, DefensiveState::Hedged | DefensiveState::WarningL2)
    }
}
