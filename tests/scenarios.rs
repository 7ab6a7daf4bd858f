//! End-to-end scenarios, one per literal example.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sltpm_core::application::classifier::{ClassificationInput, VolatilityRegime, classify};
use sltpm_core::application::recovery;
use sltpm_core::application::registry::TradeRegistry;
use sltpm_core::application::rule_resolver;
use sltpm_core::application::safeguard::{self, GateFailure, Outcome};
use sltpm_core::application::trailing::{self, TrailingInputs};
use sltpm_core::domain::config::UniversalRules;
use sltpm_core::domain::ports::{
    Candle, ClosePartialResult, MarketService, ModifyResult, PlanLookup, PositionView, SymbolInfo, Tick,
};
use sltpm_core::domain::repositories::{PersistenceStore, PersistentRecord};
use sltpm_core::domain::trading::{ResolvedRuleSnapshot, TradeState, TrailingMethod};
use sltpm_core::domain::types::{DefensiveState, Direction, OwnerId, Session, StrategyType};
use std::sync::Mutex;

struct FakeMarket {
    min_stop_distance: Decimal,
}

#[async_trait]
impl MarketService for FakeMarket {
    async fn positions(&self) -> anyhow::Result<Vec<PositionView>> {
        Ok(vec![])
    }
    async fn position(&self, _ticket: u64) -> anyhow::Result<Option<PositionView>> {
        Ok(None)
    }
    async fn candles(&self, _symbol: &str, _timeframe: &str, _limit: usize) -> anyhow::Result<Vec<Candle>> {
        Ok(vec![])
    }
    async fn atr(&self, _symbol: &str, _timeframe: &str, _period: usize) -> anyhow::Result<Option<Decimal>> {
        Ok(None)
    }
    async fn symbol_info(&self, _symbol: &str) -> anyhow::Result<Option<SymbolInfo>> {
        Ok(Some(SymbolInfo {
            min_stop_distance: self.min_stop_distance,
            point_value: dec!(1),
            volume_step: dec!(0.01),
        }))
    }
    async fn modify_stop(&self, _ticket: u64, _new_sl: Option<Decimal>, _new_tp: Option<Decimal>) -> anyhow::Result<ModifyResult> {
        Ok(ModifyResult { ok: true, retcode: 0, comment: "ok".to_string() })
    }
    async fn close_partial(&self, _ticket: u64, _volume: Decimal) -> anyhow::Result<ClosePartialResult> {
        Ok(ClosePartialResult { ok: true, retcode: 0, comment: "ok".to_string() })
    }
    async fn symbol_tick(&self, _symbol: &str) -> anyhow::Result<Option<Tick>> {
        Ok(None)
    }
}

struct FakeDefensive(DefensiveState);

#[async_trait]
impl sltpm_core::domain::ports::DefensiveManager for FakeDefensive {
    async fn state(&self, _ticket: u64) -> DefensiveState {
        self.0
    }
}

struct FakeStore {
    records: Mutex<Vec<PersistentRecord>>,
}

impl FakeStore {
    fn new() -> Self {
        FakeStore { records: Mutex::new(vec![]) }
    }
}

#[async_trait]
impl PersistenceStore for FakeStore {
    async fn upsert(&self, record: &PersistentRecord) -> anyhow::Result<()> {
        let mut records = self.records.lock().unwrap();
        records.retain(|r| r.ticket != record.ticket);
        records.push(record.clone());
        Ok(())
    }
    async fn load(&self, ticket: u64) -> anyhow::Result<Option<PersistentRecord>> {
        Ok(self.records.lock().unwrap().iter().find(|r| r.ticket == ticket).cloned())
    }
    async fn load_all(&self) -> anyhow::Result<Vec<PersistentRecord>> {
        Ok(self.records.lock().unwrap().clone())
    }
    async fn delete(&self, ticket: u64) -> anyhow::Result<()> {
        self.records.lock().unwrap().retain(|r| r.ticket != ticket);
        Ok(())
    }
}

struct FakePlanLookup {
    plans: std::collections::HashMap<String, StrategyType>,
}

impl FakePlanLookup {
    fn new(plans: Vec<(&str, StrategyType)>) -> Self {
        FakePlanLookup { plans: plans.into_iter().map(|(id, s)| (id.to_string(), s)).collect() }
    }
}

#[async_trait]
impl PlanLookup for FakePlanLookup {
    async fn resolve_strategy(&self, plan_id: &str) -> anyhow::Result<Option<StrategyType>> {
        Ok(self.plans.get(plan_id).copied())
    }
}

fn btc_buy_state() -> TradeState {
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
        owner: OwnerId::universal(),
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

/// Scenario 1: BUY breakout_ib_volatility_trap on a BTC-class symbol,
/// structure_atr_hybrid picks the tighter of structure and ATR legs,
/// and the safeguard chain commits it.
#[tokio::test]
async fn scenario_buy_structure_atr_hybrid_commits_tighter_leg() {
    let rules = ResolvedRuleSnapshot {
        trailing_method: TrailingMethod::StructureAtrHybrid,
        atr_multiplier: dec!(1.5),
        atr_buffer: dec!(0.5),
        structure_lookback: 1,
        ..ResolvedRuleSnapshot::builtin_default()
    };
    let state = TradeState { rules: rules.clone(), ..btc_buy_state() };

    let candles: Vec<Candle> = vec![
        Candle { open: dec!(84300), high: dec!(84350), low: dec!(84250), close: dec!(84300), volume: dec!(1), time: Utc::now() },
        Candle { open: dec!(84250), high: dec!(84280), low: dec!(84150), close: dec!(84200), volume: dec!(1), time: Utc::now() },
        Candle { open: dec!(84200), high: dec!(84260), low: dec!(84220), close: dec!(84250), volume: dec!(1), time: Utc::now() },
    ];
    let inputs = TrailingInputs { atr: Some(dec!(50)), structure_candles: candles, ..Default::default() };

    // structure leg = 84150 - 0.5*50 = 84125; atr leg = 84300 - 1.5*50 = 84225; tighter = 84225.
    let candidate = trailing::propose(&state, &rules, &inputs).unwrap();
    assert_eq!(candidate, dec!(84225));

    let registry = TradeRegistry::new();
    registry.put(1, state).await;
    let market = FakeMarket { min_stop_distance: dec!(1) };
    let defensive = FakeDefensive(DefensiveState::Normal);
    let store = FakeStore::new();

    let outcome = safeguard::try_modify(&registry, &market, &store, &defensive, 1, candidate, "trail", Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Committed { new_sl: dec!(84225) });
}

/// Scenario 2: SELL atr_basic accepts a tightening candidate, then
/// rejects a later widening candidate once price retraces.
#[tokio::test]
async fn scenario_sell_atr_basic_tightens_then_rejects_widening() {
    let rules = ResolvedRuleSnapshot {
        trailing_method: TrailingMethod::AtrBasic,
        atr_multiplier: dec!(1.5),
        ..ResolvedRuleSnapshot::builtin_default()
    };

    let mut state = TradeState {
        direction: Direction::Sell,
        entry_price: dec!(84000),
        initial_sl: dec!(84200),
        // Far enough from entry that the breakeven-tightness shrink does
        // not kick in, so the full 1.5x multiplier applies.
        current_sl: Some(dec!(84050)),
        current_price: dec!(83800),
        baseline_atr: Some(dec!(50)),
        rules: rules.clone(),
        ..btc_buy_state()
    };

    let inputs = TrailingInputs { atr: Some(dec!(50)), ..Default::default() };
    let first = trailing::propose(&state, &rules, &inputs).unwrap();
    assert_eq!(first, dec!(83875));

    state.current_sl = Some(first);
    state.current_price = dec!(83900);
    let second = trailing::propose(&state, &rules, &inputs);
    assert_eq!(second, None);
}

/// Scenario 3: recovery resolves `plan_id:abc123` against the plan
/// registry to `default_standard` for a ticket with no persisted record
/// and no comment keyword of its own.
#[tokio::test]
async fn scenario_recovery_infers_strategy_from_comment() {
    struct RecoveryMarket;

    #[async_trait]
    impl MarketService for RecoveryMarket {
        async fn positions(&self) -> anyhow::Result<Vec<PositionView>> {
            Ok(vec![PositionView {
                ticket: 172588621,
                symbol: "EURUSDc".to_string(),
                direction: Direction::Buy,
                entry_price: dec!(1.1000),
                current_price: dec!(1.1010),
                current_sl: Some(dec!(1.0950)),
                current_tp: Some(dec!(1.1100)),
                volume: dec!(1.0),
                open_time: Utc::now(),
                comment: Some("plan_id:abc123".to_string()),
            }])
        }
        async fn position(&self, _ticket: u64) -> anyhow::Result<Option<PositionView>> {
            Ok(None)
        }
        async fn candles(&self, _symbol: &str, _timeframe: &str, _limit: usize) -> anyhow::Result<Vec<Candle>> {
            Ok(vec![])
        }
        async fn atr(&self, _symbol: &str, _timeframe: &str, _period: usize) -> anyhow::Result<Option<Decimal>> {
            Ok(None)
        }
        async fn symbol_info(&self, _symbol: &str) -> anyhow::Result<Option<SymbolInfo>> {
            Ok(None)
        }
        async fn modify_stop(&self, _ticket: u64, _new_sl: Option<Decimal>, _new_tp: Option<Decimal>) -> anyhow::Result<ModifyResult> {
            anyhow::bail!("not used")
        }
        async fn close_partial(&self, _ticket: u64, _volume: Decimal) -> anyhow::Result<ClosePartialResult> {
            anyhow::bail!("not used")
        }
        async fn symbol_tick(&self, _symbol: &str) -> anyhow::Result<Option<Tick>> {
            Ok(None)
        }
    }

    let registry = TradeRegistry::new();
    let market = RecoveryMarket;
    let store = FakeStore::new();
    let plan_lookup = FakePlanLookup::new(vec![("abc123", StrategyType::DefaultStandard)]);
    let rules = UniversalRules::default();

    recovery::run(&registry, &market, &store, &plan_lookup, &rules).await.unwrap();

    let state = registry.get(172588621).await.unwrap();
    assert_eq!(state.strategy_type, StrategyType::DefaultStandard);
    assert_eq!(state.plan_id, Some("abc123".to_string()));
    assert_eq!(state.owner, OwnerId::universal());
}

/// Scenario 4: a trailing candidate improving by enough R is rejected
/// on cooldown, then accepted once the cooldown has elapsed.
#[tokio::test]
async fn scenario_cooldown_rejects_then_accepts() {
    let mut state = btc_buy_state();
    state.rules.sl_modification_cooldown_seconds = 30;
    state.last_sl_modification_time = Some(Utc::now() - chrono::Duration::seconds(10));
    state.current_sl = Some(dec!(84000));

    let registry = TradeRegistry::new();
    registry.put(1, state.clone()).await;
    let market = FakeMarket { min_stop_distance: dec!(1) };
    let defensive = FakeDefensive(DefensiveState::Normal);
    let store = FakeStore::new();

    // Candidate improving by 0.2R (40 points on a 200-point 1R).
    let candidate = dec!(84040);
    let outcome = safeguard::try_modify(&registry, &market, &store, &defensive, 1, candidate, "trail", Utc::now())
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Rejected(GateFailure::Cooldown { .. })));

    let mut later_state = registry.get(1).await.unwrap();
    later_state.last_sl_modification_time = Some(Utc::now() - chrono::Duration::seconds(35));
    registry.put(1, later_state).await;

    let outcome = safeguard::try_modify(&registry, &market, &store, &defensive, 1, candidate, "trail", Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Committed { new_sl: candidate });
}

/// Scenario 5: ATR unavailable on XAU falls back to fixed distance and
/// still commits a tightening candidate.
#[tokio::test]
async fn scenario_xau_atr_unavailable_falls_back_to_fixed_distance() {
    let rules = ResolvedRuleSnapshot::builtin_default();
    let state = TradeState {
        symbol: "XAUUSDc".to_string(),
        direction: Direction::Sell,
        entry_price: dec!(2000),
        initial_sl: dec!(2010),
        current_sl: Some(dec!(2005)),
        current_price: dec!(2000.0),
        rules: rules.clone(),
        ..btc_buy_state()
    };

    let inputs = TrailingInputs { atr: None, ..Default::default() };
    let candidate = trailing::propose(&state, &rules, &inputs).unwrap();
    assert_eq!(candidate, dec!(2001.5));

    let registry = TradeRegistry::new();
    registry.put(1, state).await;
    let market = FakeMarket { min_stop_distance: dec!(0.1) };
    let defensive = FakeDefensive(DefensiveState::Normal);
    let store = FakeStore::new();

    let outcome = safeguard::try_modify(&registry, &market, &store, &defensive, 1, candidate, "fallback", Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Committed { new_sl: dec!(2001.5) });
}

/// Scenario 6: a `"scalp quick"` comment wins over the ATR-ratio-derived
/// base class, per the classifier's keyword-priority rule.
#[tokio::test]
async fn scenario_classification_keyword_overrides_atr_ratio() {
    let result = classify(ClassificationInput {
        symbol: "EURUSDc",
        entry_price: dec!(1.1000),
        stop_loss: dec!(1.0900),
        comment: Some("scalp quick"),
        session_info: None,
        h1_atr: Some(dec!(0.0050)),
        volatility_regime: Some(VolatilityRegime::Normal),
        is_weekend: false,
    });
    assert_eq!(result.trade_class, sltpm_core::domain::types::TradeClass::Scalp);
    assert!((result.confidence - 0.85).abs() < 1e-9);
}

/// Also checks the rule-resolver merge path feeds a sane snapshot into
/// the hybrid scenario above, grounding the end-to-end registration
/// path rather than hand-building `ResolvedRuleSnapshot` everywhere.
#[tokio::test]
async fn resolved_rules_feed_trailing_engine_directly() {
    let rules_doc = UniversalRules::default();
    let snapshot = rule_resolver::resolve(&rules_doc, StrategyType::BreakoutIbVolatilityTrap, "BTCUSDc", Session::London);
    assert_eq!(snapshot.trailing_method, TrailingMethod::AtrBasic);
    assert!(snapshot.trailing_enabled);
}
