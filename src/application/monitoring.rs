//! Monitoring Loop (§4.8, §5).
//!
//! The single background worker that advances every managed ticket
//! through breakeven, partial, trailing, and stall phases each cycle.
//! Every `MarketService` call is time-bounded; a failure on one ticket
//! is logged and the loop moves on to the next.

use crate::application::registry::TradeRegistry;
use crate::application::safeguard;
use crate::application::trailing::{self, TrailingInputs};
use crate::domain::ports::{Candle, DefensiveManager, MarketService, PositionView};
use crate::domain::repositories::PersistenceStore;
use crate::domain::trading::ResolvedRuleSnapshot;
use crate::domain::types::Direction;
use crate::infrastructure::observability::alerts::AlertSink;
use crate::infrastructure::observability::metrics::Metrics;
use anyhow::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{info, warn};

const ATR_PERIOD: usize = 14;
const MICRO_TIMEFRAME: &str = "M1";
const DISPLACEMENT_WINDOW_BARS: usize = 15;
const STALL_CANDLE_LOOKBACK: usize = 5;
/// SL within this fraction of entry counts as "at breakeven" (§4.8d).
const BREAKEVEN_TOLERANCE_PCT: Decimal = dec!(0.001);
/// ATR above this multiple of baseline triggers the volatility override (§4.6).
const VOLATILITY_OVERRIDE_THRESHOLD: Decimal = dec!(1.5);
const VOLATILITY_OVERRIDE_MULTIPLIER: Decimal = dec!(1.2);
/// ATR above this multiple of baseline shortens the partial trigger (§4.8e).
const PARTIAL_SHORTEN_THRESHOLD: Decimal = dec!(1.2);
const PARTIAL_SHORTEN_FACTOR: Decimal = dec!(0.8);

async fn bounded<T>(call_timeout: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(call_timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("market service call timed out after {:?}", call_timeout)),
    }
}

async fn unregister(
    registry: &TradeRegistry,
    store: &dyn PersistenceStore,
    metrics: &Metrics,
    ticket: u64,
    reason: &str,
) {
    registry.remove(ticket).await;
    if let Err(e) = store.delete(ticket).await {
        warn!(ticket, error = %e, "failed to delete persisted record during unregistration");
    }
    metrics.record_unregistration(reason);
    info!(ticket, reason, "unregistered ticket");
}

fn is_doji(c: &Candle) -> bool {
    let range = c.high - c.low;
    if range.is_zero() {
        return false;
    }
    let body = (c.close - c.open).abs();
    body / range <= dec!(0.1)
}

/// Three consecutive doji-like candles approximate momentum exhaustion
/// (§4.8g); a real deployment may layer cumulative-volume-delta
/// divergence or volume decline on top of this.
fn is_momentum_exhausted(candles: &[Candle]) -> bool {
    if candles.len() < 3 {
        return false;
    }
    candles[candles.len() - 3..].iter().all(is_doji)
}

async fn fetch_candles_logged(
    market: &dyn MarketService,
    symbol: &str,
    timeframe: &str,
    limit: usize,
    call_timeout: Duration,
) -> Vec<Candle> {
    match bounded(call_timeout, market.candles(symbol, timeframe, limit)).await {
        Ok(candles) => candles,
        Err(e) => {
            warn!(symbol, timeframe, error = %e, "candle fetch failed");
            vec![]
        }
    }
}

async fn fetch_trailing_candles(
    market: &dyn MarketService,
    symbol: &str,
    rules: &ResolvedRuleSnapshot,
    call_timeout: Duration,
) -> (Vec<Candle>, Vec<Candle>, Vec<Candle>) {
    use crate::domain::trading::TrailingMethod;
    let mut structure_candles = vec![];
    let mut micro_candles = vec![];
    let mut displacement_window = vec![];

    match rules.trailing_method {
        TrailingMethod::StructureBased | TrailingMethod::StructureAtrHybrid => {
            structure_candles = fetch_candles_logged(
                market, symbol, &rules.trailing_timeframe, rules.structure_timeframe_bars, call_timeout,
            )
            .await;
        }
        TrailingMethod::MicroChoch => {
            micro_candles = fetch_candles_logged(market, symbol, MICRO_TIMEFRAME, 20, call_timeout).await;
        }
        TrailingMethod::DisplacementOrStructure => {
            displacement_window = fetch_candles_logged(
                market, symbol, &rules.trailing_timeframe, DISPLACEMENT_WINDOW_BARS, call_timeout,
            )
            .await;
            structure_candles = fetch_candles_logged(
                market, symbol, &rules.trailing_timeframe, rules.structure_timeframe_bars, call_timeout,
            )
            .await;
        }
        TrailingMethod::AtrBasic | TrailingMethod::MinimalBeOnly => {}
    }

    (structure_candles, micro_candles, displacement_window)
}

async fn persist_ticket(registry: &TradeRegistry, store: &dyn PersistenceStore, ticket: u64, what: &str) {
    if let Some(updated) = registry.get(ticket).await
        && let Err(e) = store.upsert(&updated.to_persistent_record()).await
    {
        warn!(ticket, error = %e, what, "failed to persist trade state");
    }
}

async fn apply_safeguarded(
    registry: &TradeRegistry,
    market: &dyn MarketService,
    store: &dyn PersistenceStore,
    defensive: &dyn DefensiveManager,
    metrics: &Metrics,
    ticket: u64,
    candidate: Decimal,
    reason: &'static str,
) {
    match safeguard::try_modify(registry, market, store, defensive, ticket, candidate, reason, Utc::now()).await {
        Ok(safeguard::Outcome::Committed { .. }) => metrics.record_modification(reason),
        Ok(safeguard::Outcome::Rejected(gate)) => metrics.record_safeguard_rejection(gate.label()),
        Ok(safeguard::Outcome::BrokerRejected { retcode, comment }) => {
            warn!(ticket, retcode, %comment, reason, "broker rejected stop modification");
        }
        Err(e) => warn!(ticket, error = %e, reason, "safeguard check failed"),
    }
}

/// Advances a single ticket through steps (a)-(h) of §4.8. Any internal
/// error is logged and this function simply returns, leaving the ticket
/// to be retried next cycle.
async fn process_ticket(
    ticket: u64,
    registry: &TradeRegistry,
    market: &dyn MarketService,
    store: &dyn PersistenceStore,
    defensive: &dyn DefensiveManager,
    alerts: &dyn AlertSink,
    metrics: &Metrics,
    call_timeout: Duration,
) {
    if registry.get(ticket).await.is_none() {
        return;
    }

    // a. fetch broker position.
    let position: PositionView = match bounded(call_timeout, market.position(ticket)).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            unregister(registry, store, metrics, ticket, "position_closed").await;
            return;
        }
        Err(e) => {
            warn!(ticket, error = %e, "position fetch failed, skipping ticket this cycle");
            return;
        }
    };

    // b. volume change detection.
    if position.volume.is_zero() {
        unregister(registry, store, metrics, ticket, "volume_zero").await;
        return;
    }
    let stored_volume = match registry.get(ticket).await {
        Some(s) => s.current_volume,
        None => return,
    };
    if position.volume != stored_volume {
        if position.volume < stored_volume {
            info!(ticket, "manual partial close detected, updating stored volume");
        } else {
            warn!(ticket, "position volume increased, scale-ins are not supported");
        }
        registry.mutate(ticket, |s| s.current_volume = position.volume).await;
        persist_ticket(registry, store, ticket, "volume_change").await;
    }

    // c. refresh runtime fields.
    let Some(state) = registry.get(ticket).await else { return };
    let r_multiple = state.r_multiple_at(position.current_price);
    registry
        .mutate(ticket, |s| {
            s.current_price = position.current_price;
            s.current_sl = position.current_sl;
            s.r_multiple_achieved = r_multiple;
        })
        .await;

    // d. breakeven phase.
    let Some(state) = registry.get(ticket).await else { return };
    if !state.breakeven_triggered {
        let current_sl = state.current_sl.unwrap_or(state.initial_sl);
        let tolerance = state.entry_price.abs() * BREAKEVEN_TOLERANCE_PCT;
        if (current_sl - state.entry_price).abs() <= tolerance {
            registry.mutate(ticket, |s| s.breakeven_triggered = true).await;
            persist_ticket(registry, store, ticket, "breakeven_trigger").await;
        } else {
            // Breakeven is the intelligent-exit partner's responsibility.
            registry.mutate(ticket, |s| s.last_check_time = Some(Utc::now())).await;
            return;
        }
    }

    let Some(state) = registry.get(ticket).await else { return };

    let current_atr = match bounded(
        call_timeout,
        market.atr(&state.symbol, &state.rules.trailing_timeframe, ATR_PERIOD),
    )
    .await
    {
        Ok(atr) => atr,
        Err(e) => {
            warn!(ticket, error = %e, "atr fetch failed");
            None
        }
    };

    // e. partial phase.
    if !state.partial_taken
        && let (Some(trigger_r), Some(close_pct)) = (state.rules.partial_trigger_r, state.rules.partial_close_pct)
    {
        let shorten = match (current_atr, state.baseline_atr) {
            (Some(atr), Some(baseline)) if !baseline.is_zero() && atr > baseline * PARTIAL_SHORTEN_THRESHOLD => {
                PARTIAL_SHORTEN_FACTOR
            }
            _ => Decimal::ONE,
        };
        let effective_trigger = trigger_r * shorten;
        if state.r_multiple_achieved >= effective_trigger {
            let close_volume = state.current_volume * close_pct;
            match bounded(call_timeout, market.close_partial(ticket, close_volume)).await {
                Ok(result) if result.ok => {
                    let remainder = state.current_volume - close_volume;
                    registry
                        .mutate(ticket, |s| {
                            s.partial_taken = true;
                            s.current_volume = remainder;
                        })
                        .await;
                    metrics.record_modification("partial");
                    persist_ticket(registry, store, ticket, "partial_close").await;
                }
                Ok(result) => warn!(ticket, retcode = result.retcode, comment = %result.comment, "broker rejected partial close"),
                Err(e) => warn!(ticket, error = %e, "partial close call failed"),
            }
        }
    }

    // f. trailing phase.
    let Some(state) = registry.get(ticket).await else { return };
    if state.breakeven_triggered && state.rules.trailing_enabled {
        let override_multiplier = match (current_atr, state.baseline_atr) {
            (Some(atr), Some(baseline)) if !baseline.is_zero() && atr > baseline * VOLATILITY_OVERRIDE_THRESHOLD => {
                Some(state.rules.atr_multiplier * VOLATILITY_OVERRIDE_MULTIPLIER)
            }
            _ => None,
        };

        if current_atr.is_none() {
            if metrics.record_data_unavailable(&state.symbol, "atr") {
                alerts.alert(&state.symbol, "atr", "ATR repeatedly unavailable for trailing").await;
            }
        } else {
            metrics.reset_data_unavailable_streak(&state.symbol);
        }

        let (structure_candles, micro_candles, displacement_window) =
            fetch_trailing_candles(market, &state.symbol, &state.rules, call_timeout).await;

        let inputs = TrailingInputs {
            atr: current_atr,
            structure_candles,
            micro_candles,
            displacement_window,
            override_multiplier,
        };

        if let Some(candidate) = trailing::propose(&state, &state.rules, &inputs) {
            apply_safeguarded(registry, market, store, defensive, metrics, ticket, candidate, "trail").await;
        }
    }

    // g. stall phase.
    let Some(state) = registry.get(ticket).await else { return };
    if !state.rules.stall_lock_r.is_zero() {
        let recent = fetch_candles_logged(
            market, &state.symbol, &state.rules.trailing_timeframe, STALL_CANDLE_LOOKBACK, call_timeout,
        )
        .await;
        if is_momentum_exhausted(&recent) {
            let lock_distance = state.one_r() * state.rules.stall_lock_r;
            let candidate = match state.direction {
                Direction::Buy => state.entry_price + lock_distance,
                Direction::Sell => state.entry_price - lock_distance,
            };
            let current_sl = state.current_sl.unwrap_or(state.initial_sl);
            if state.is_tightening(current_sl, candidate) {
                apply_safeguarded(registry, market, store, defensive, metrics, ticket, candidate, "stall_tighten").await;
            }
        }
    }

    // h. update last_check_time.
    registry.mutate(ticket, |s| s.last_check_time = Some(Utc::now())).await;
}

/// Runs one full monitoring cycle (§4.8 steps 1-4). `shutdown` is
/// consulted between tickets so a shutdown request takes effect within
/// one ticket's processing, not mid-ticket.
pub async fn run_cycle(
    registry: &TradeRegistry,
    market: &dyn MarketService,
    store: &dyn PersistenceStore,
    defensive: &dyn DefensiveManager,
    alerts: &dyn AlertSink,
    metrics: &Metrics,
    call_timeout: Duration,
    shutdown: &watch::Receiver<bool>,
) -> Result<()> {
    let broker_positions = match bounded(call_timeout, market.positions()).await {
        Ok(positions) => positions,
        Err(e) => {
            warn!(error = %e, "market service not ready, skipping monitoring cycle");
            return Ok(());
        }
    };
    let broker_tickets: HashSet<u64> = broker_positions.iter().map(|p| p.ticket).collect();

    let tickets = registry.ticket_snapshot().await;
    metrics.managed_trades.set(tickets.len() as f64);

    for ticket in tickets {
        if *shutdown.borrow() {
            info!("shutdown requested, stopping monitoring cycle early");
            return Ok(());
        }
        process_ticket(ticket, registry, market, store, defensive, alerts, metrics, call_timeout).await;
    }

    let persisted = store.load_all().await.unwrap_or_else(|e| {
        warn!(error = %e, "failed to list persisted trades during reconciliation");
        vec![]
    });
    for record in persisted {
        if !broker_tickets.contains(&record.ticket) {
            unregister(registry, store, metrics, record.ticket, "reconciliation_stale").await;
        }
    }

    Ok(())
}

/// Drives `run_cycle` on a fixed interval until `shutdown` signals true,
/// matching the teacher's `tokio::time::interval` + `tokio::select!`
/// scheduling idiom, extended with a shutdown arm.
pub async fn run(
    registry: Arc<TradeRegistry>,
    market: Arc<dyn MarketService>,
    store: Arc<dyn PersistenceStore>,
    defensive: Arc<dyn DefensiveManager>,
    alerts: Arc<dyn AlertSink>,
    metrics: Metrics,
    interval: Duration,
    call_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let start = Instant::now();
                if let Err(e) = run_cycle(
                    &registry, market.as_ref(), store.as_ref(), defensive.as_ref(), alerts.as_ref(),
                    &metrics, call_timeout, &shutdown,
                ).await {
                    warn!(error = %e, "monitoring cycle failed");
                }
                metrics.last_cycle_seconds.set(start.elapsed().as_secs_f64());
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("monitoring loop received shutdown signal");
                    break;
                }
            }
        }
    }
}
