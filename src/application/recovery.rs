//! Recovery Coordinator (§4.4).
//!
//! Runs once at process start, before the monitoring loop is allowed to
//! issue any modification. Rebuilds `TradeState` for every broker
//! position this engine already manages — either from its own persisted
//! record, or by resolving the comment's `plan_id` against the plan
//! registry, or, failing that, by keyword-matching the broker comment —
//! then prunes persisted rows for positions that closed while the
//! process was offline.

use crate::application::registry::TradeRegistry;
use crate::application::rule_resolver;
use crate::application::session::session_for_timestamp;
use crate::domain::config::UniversalRules;
use crate::domain::ports::{MarketService, PlanLookup, PositionView};
use crate::domain::repositories::{PersistenceStore, PersistentRecord};
use crate::domain::trading::{ResolvedRuleSnapshot, TradeState};
use crate::domain::types::{Direction, OwnerId, Session, StrategyType};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{info, warn};

/// Every strategy this engine recognizes by comment keyword, checked in
/// declaration order.
const KNOWN_STRATEGIES: &[StrategyType] = &[
    StrategyType::BreakoutIbVolatilityTrap,
    StrategyType::BreakoutBos,
    StrategyType::TrendContinuationPullback,
    StrategyType::TrendContinuationBos,
    StrategyType::LiquiditySweepReversal,
    StrategyType::OrderBlockRejection,
    StrategyType::MeanReversionRangeScalp,
    StrategyType::MeanReversionVwapFade,
    StrategyType::BreakerBlock,
    StrategyType::MarketStructureShift,
    StrategyType::FvgRetracement,
    StrategyType::MitigationBlock,
    StrategyType::InducementReversal,
    StrategyType::PremiumDiscountArray,
    StrategyType::SessionLiquidityRun,
    StrategyType::KillZone,
    StrategyType::MicroScalp,
    StrategyType::DefaultStandard,
];

/// Extracts a `plan_id:<id>` tag and/or a recognized strategy keyword
/// from a broker comment. The keyword match is only the fallback that
/// applies when the plan id (if any) fails to resolve against the plan
/// registry — see [`resolve_strategy`].
fn infer_strategy_type(comment: &str) -> (Option<String>, Option<StrategyType>) {
    let lower = comment.to_lowercase();

    let plan_id = lower.split("plan_id:").nth(1).and_then(|rest| {
        let token: String = rest
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        (!token.is_empty()).then_some(token)
    });

    let strategy = KNOWN_STRATEGIES
        .iter()
        .copied()
        .find(|s| lower.contains(s.as_config_key()));

    (plan_id, strategy)
}

/// Resolves the strategy for a position with no persisted record of its
/// own (§4.4, §8 scenario 3): prefer the plan registry's answer for the
/// comment's `plan_id`, falling back to keyword matching when there is
/// no plan id, the plan registry has no row for it, or the lookup fails.
async fn resolve_strategy(
    plan_lookup: &dyn PlanLookup,
    ticket: u64,
    comment: &str,
) -> (Option<String>, Option<StrategyType>) {
    let (plan_id, keyword_strategy) = infer_strategy_type(comment);

    let Some(plan_id) = plan_id else {
        return (None, keyword_strategy);
    };

    match plan_lookup.resolve_strategy(&plan_id).await {
        Ok(Some(strategy)) => (Some(plan_id), Some(strategy)),
        Ok(None) => (Some(plan_id), keyword_strategy),
        Err(e) => {
            warn!(ticket, plan_id = %plan_id, error = %e, "plan lookup failed, falling back to comment keyword");
            (Some(plan_id), keyword_strategy)
        }
    }
}

/// Rebuilds a `TradeState` from our own persisted record plus the
/// live position's runtime fields. Falls back to the built-in rule
/// snapshot if the persisted blob failed to deserialize (§4.3 failure
/// mode) rather than dropping the trade.
fn rebuild_from_record(record: &PersistentRecord, position: &PositionView) -> TradeState {
    let rules: ResolvedRuleSnapshot = serde_json::from_str(&record.resolved_trailing_rules)
        .unwrap_or_else(|e| {
            warn!(ticket = record.ticket, error = %e, "resolved rule snapshot failed to deserialize, using builtin default");
            ResolvedRuleSnapshot::builtin_default()
        });

    TradeState {
        ticket: record.ticket,
        symbol: record.symbol.clone(),
        strategy_type: StrategyType::parse_or_default(&record.strategy_type),
        direction: Direction::parse_or_default(&record.direction),
        session: Session::parse_or_default(&record.session),
        entry_price: record.entry_price,
        initial_sl: record.initial_sl,
        initial_tp: record.initial_tp,
        rules,
        owner: OwnerId(record.managed_by.clone()),
        baseline_atr: record.baseline_atr,
        initial_volume: record.initial_volume,
        breakeven_triggered: record.breakeven_triggered,
        partial_taken: record.partial_taken,
        last_trailing_sl: record.last_trailing_sl,
        last_sl_modification_time: record.last_sl_modification_time,
        registered_at: record.registered_at,
        plan_id: record.plan_id.clone(),
        current_price: position.current_price,
        current_sl: position.current_sl,
        current_volume: position.volume,
        r_multiple_achieved: Decimal::ZERO,
        last_check_time: None,
    }
}

/// Reconstructs a brand-new `TradeState` for a position we never
/// persisted, inferred purely from the broker-reported comment.
fn reconstruct_from_inference(
    position: &PositionView,
    strategy_type: StrategyType,
    rules_doc: &UniversalRules,
    plan_id: Option<String>,
) -> TradeState {
    let session = session_for_timestamp(position.open_time);
    let rules = rule_resolver::resolve(rules_doc, strategy_type, &position.symbol, session);
    let initial_sl = position.current_sl.unwrap_or(position.entry_price);

    TradeState {
        ticket: position.ticket,
        symbol: position.symbol.clone(),
        strategy_type,
        direction: position.direction,
        session,
        entry_price: position.entry_price,
        initial_sl,
        initial_tp: position.current_tp,
        rules,
        owner: OwnerId::universal(),
        baseline_atr: None,
        initial_volume: position.volume,
        breakeven_triggered: false,
        partial_taken: false,
        last_trailing_sl: None,
        last_sl_modification_time: None,
        registered_at: position.open_time,
        plan_id,
        current_price: position.current_price,
        current_sl: position.current_sl,
        current_volume: position.volume,
        r_multiple_achieved: Decimal::ZERO,
        last_check_time: None,
    }
}

/// Runs recovery once at startup. Returns an error (aborting, not
/// partially completing) if the broker position list cannot be read at
/// all — the monitoring loop must not start on a failed recovery.
pub async fn run(
    registry: &TradeRegistry,
    market: &dyn MarketService,
    store: &dyn PersistenceStore,
    plan_lookup: &dyn PlanLookup,
    rules_doc: &UniversalRules,
) -> Result<()> {
    let positions = market
        .positions()
        .await
        .context("recovery: market service unavailable, aborting")?;

    let mut broker_tickets = HashSet::with_capacity(positions.len());

    for position in &positions {
        broker_tickets.insert(position.ticket);

        if registry.is_owner(position.ticket, &OwnerId::universal()).await {
            continue;
        }

        if let Some(record) = store
            .load(position.ticket)
            .await
            .context("recovery: persistence load failed")?
        {
            if record.managed_by == OwnerId::UNIVERSAL {
                info!(ticket = position.ticket, "recovered trade from persistent record");
                registry.put(position.ticket, rebuild_from_record(&record, position)).await;
                continue;
            }
        }

        let comment = position.comment.as_deref().unwrap_or("");
        let (plan_id, inferred) = resolve_strategy(plan_lookup, position.ticket, comment).await;
        if let Some(strategy_type) = inferred
            && strategy_type.is_universal_managed()
        {
            info!(ticket = position.ticket, strategy = strategy_type.as_config_key(), "recovered trade by comment inference");
            let state = reconstruct_from_inference(position, strategy_type, rules_doc, plan_id);
            registry.put(position.ticket, state).await;
        }
    }

    for record in store
        .load_all()
        .await
        .context("recovery: failed to list persisted trades")?
    {
        if !broker_tickets.contains(&record.ticket) {
            info!(ticket = record.ticket, "pruning persisted record for closed position");
            store
                .delete(record.ticket)
                .await
                .context("recovery: failed to prune stale record")?;
        }
    }

    Ok(())
}
