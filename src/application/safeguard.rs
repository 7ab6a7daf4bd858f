//! Safeguard Layer (§4.7).
//!
//! Every proposed stop modification passes through this chain in order;
//! the first failing gate short-circuits the rest. On success the
//! modification is committed: `MarketService::modify_stop`, a timestamp
//! update, and a persistence write.

use crate::application::registry::TradeRegistry;
use crate::application::symbol_distance::default_min_stop_distance;
use crate::domain::errors::{ManagerError, ManagerResult};
use crate::domain::ports::{DefensiveManager, MarketService};
use crate::domain::repositories::PersistenceStore;
use crate::domain::types::OwnerId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// A gate rejected the proposed modification; carries enough detail for
/// a debug-level log line and metrics labeling.
#[derive(Debug, Clone, PartialEq)]
pub enum GateFailure {
    Ownership,
    DefensiveMode,
    InsufficientImprovement { required: Decimal, actual: Decimal },
    Cooldown { remaining_seconds: i64 },
    BrokerMinDistance { required: Decimal, actual: Decimal },
}

impl GateFailure {
    pub fn label(&self) -> &'static str {
        match self {
            GateFailure::Ownership => "ownership",
            GateFailure::DefensiveMode => "defensive_mode",
            GateFailure::InsufficientImprovement { .. } => "insufficient_improvement",
            GateFailure::Cooldown { .. } => "cooldown",
            GateFailure::BrokerMinDistance { .. } => "broker_min_distance",
        }
    }
}

/// Outcome of a safeguarded modification attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Committed { new_sl: Decimal },
    Rejected(GateFailure),
    /// Gates passed but the broker rejected the request; state is left
    /// unchanged for a retry next cycle.
    BrokerRejected { retcode: i32, comment: String },
}

/// Attempts to move `ticket`'s stop to `candidate_sl`, gating through
/// §4.7 in order, and commits on success.
pub async fn try_modify(
    registry: &TradeRegistry,
    market: &dyn MarketService,
    store: &dyn PersistenceStore,
    defensive: &dyn DefensiveManager,
    ticket: u64,
    candidate_sl: Decimal,
    reason: &'static str,
    now: DateTime<Utc>,
) -> ManagerResult<Outcome> {
    let owner = OwnerId::universal();

    // Gate 1: ownership.
    if !registry.is_owner(ticket, &owner).await {
        debug!(ticket, "safeguard rejected: not owner");
        return Ok(Outcome::Rejected(GateFailure::Ownership));
    }

    let state = match registry.get(ticket).await {
        Some(s) => s,
        None => return Ok(Outcome::Rejected(GateFailure::Ownership)),
    };

    // Gate 2: defensive-mode priority.
    let defensive_state = defensive.state(ticket).await;
    if defensive_state.is_preempting() {
        info!(ticket, "yielding to defensive subsystem");
        return Ok(Outcome::Rejected(GateFailure::DefensiveMode));
    }

    let current_sl = state.current_sl.unwrap_or(state.initial_sl);

    // Gate 3: strict improvement in R.
    let improvement = state.r_multiple_at(candidate_sl) - state.r_multiple_at(current_sl);
    if improvement < state.rules.min_sl_change_r {
        debug!(
            ticket,
            ?improvement,
            required = ?state.rules.min_sl_change_r,
            "safeguard rejected: insufficient improvement"
        );
        return Ok(Outcome::Rejected(GateFailure::InsufficientImprovement {
            required: state.rules.min_sl_change_r,
            actual: improvement,
        }));
    }

    // Gate 4: cooldown.
    if let Some(last) = state.last_sl_modification_time {
        let elapsed = (now - last).num_seconds();
        if elapsed < state.rules.sl_modification_cooldown_seconds {
            return Ok(Outcome::Rejected(GateFailure::Cooldown {
                remaining_seconds: state.rules.sl_modification_cooldown_seconds - elapsed,
            }));
        }
    }

    // Gate 5: broker minimum distance.
    let min_distance = market
        .symbol_info(&state.symbol)
        .await
        .map_err(|e| ManagerError::TransientExternal {
            reason: e.to_string(),
            retcode: None,
        })?
        .map(|info| info.min_stop_distance)
        .unwrap_or_else(|| default_min_stop_distance(&state.symbol));
    let distance = (candidate_sl - current_sl).abs();
    if distance < min_distance {
        return Ok(Outcome::Rejected(GateFailure::BrokerMinDistance {
            required: min_distance,
            actual: distance,
        }));
    }

    // Commit.
    let result = market
        .modify_stop(ticket, Some(candidate_sl), state.initial_tp)
        .await
        .map_err(|e| ManagerError::TransientExternal {
            reason: e.to_string(),
            retcode: None,
        })?;

    if !result.ok {
        warn!(ticket, retcode = result.retcode, reason, "broker rejected stop modification");
        return Ok(Outcome::BrokerRejected {
            retcode: result.retcode,
            comment: result.comment,
        });
    }

    let applied = registry
        .mutate(ticket, |s| {
            s.current_sl = Some(candidate_sl);
            s.last_trailing_sl = Some(candidate_sl);
            s.last_sl_modification_time = Some(now);
        })
        .await;

    if !applied {
        return Ok(Outcome::Rejected(GateFailure::Ownership));
    }

    if let Some(updated) = registry.get(ticket).await {
        let record = updated.to_persistent_record();
        if let Err(e) = store.upsert(&record).await {
            warn!(ticket, error = %e, "persistence write failed after stop modification");
        }
    }

    info!(ticket, new_sl = %candidate_sl, reason, "stop modification committed");
    Ok(Outcome::Committed { new_sl: candidate_sl })
}
