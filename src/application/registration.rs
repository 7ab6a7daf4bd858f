//! Registration Hook (§6).
//!
//! The entry point an external order-execution layer calls the moment a
//! new position opens. Idempotent: a second call for an already-managed
//! ticket returns the existing state instead of re-registering it.

use crate::application::registry::TradeRegistry;
use crate::application::rule_resolver;
use crate::domain::config::UniversalRules;
use crate::domain::repositories::PersistenceStore;
use crate::domain::trading::TradeState;
use crate::domain::types::{Direction, OwnerId, Session, StrategyType};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Registers a newly opened position for universal management.
///
/// Returns `None` when `strategy_type` (or its `DEFAULT_STANDARD`
/// fallback) is not in `UNIVERSAL_MANAGED` — the caller should leave
/// such positions to the legacy manager that already owns them.
#[allow(clippy::too_many_arguments)]
pub async fn register(
    registry: &TradeRegistry,
    store: &dyn PersistenceStore,
    rules_doc: &UniversalRules,
    ticket: u64,
    symbol: &str,
    strategy_type: Option<StrategyType>,
    direction: Direction,
    entry: Decimal,
    sl: Decimal,
    tp: Option<Decimal>,
    volume: Decimal,
    plan_id: Option<String>,
    now: DateTime<Utc>,
) -> Option<TradeState> {
    if let Some(existing) = registry.get(ticket).await {
        warn!(ticket, "register called for an already-registered ticket, returning existing state");
        return Some(existing);
    }

    let strategy_type = strategy_type.unwrap_or(StrategyType::DefaultStandard);
    if !strategy_type.is_universal_managed() {
        info!(
            ticket,
            strategy = strategy_type.as_config_key(),
            "strategy is not universally managed, delegating registration"
        );
        return None;
    }

    let session = Session::from_utc_timestamp(now);
    let rules = rule_resolver::resolve(rules_doc, strategy_type, symbol, session);

    let state = TradeState {
        ticket,
        symbol: symbol.to_string(),
        strategy_type,
        direction,
        session,
        entry_price: entry,
        initial_sl: sl,
        initial_tp: tp,
        rules,
        owner: OwnerId::universal(),
        baseline_atr: None,
        initial_volume: volume,
        breakeven_triggered: false,
        partial_taken: false,
        last_trailing_sl: None,
        last_sl_modification_time: None,
        registered_at: now,
        plan_id,
        current_price: entry,
        current_sl: Some(sl),
        current_volume: volume,
        r_multiple_achieved: Decimal::ZERO,
        last_check_time: None,
    };

    registry.put(ticket, state.clone()).await;
    if let Err(e) = store.upsert(&state.to_persistent_record()).await {
        warn!(ticket, error = %e, "failed to persist newly registered trade");
    }
    info!(ticket, symbol, strategy = strategy_type.as_config_key(), "registered new trade");
    Some(state)
}
