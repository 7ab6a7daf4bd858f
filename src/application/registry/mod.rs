//! Trade Registry (§4.2, §5).
//!
//! The single source of truth other subsystems consult before acting on
//! a position. Backed by one `tokio::sync::RwLock` guarding a plain
//! `HashMap`; critical sections are map lookups/mutations only, no
//! external I/O runs while the lock is held (§5).

use crate::domain::trading::TradeState;
use crate::domain::types::{DefensiveState, OwnerId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-wide ownership map: ticket -> TradeState.
///
/// Invariant: at most one `TradeState` per ticket (§3). `may_modify`
/// additionally consults the defensive subsystem so that a DTMS
/// escalation overrides the universal owner's answer without the
/// registry itself needing to track defensive state as owned data
/// (§4.7 gate 2, §4.2 invariant).
pub struct TradeRegistry {
    inner: RwLock<HashMap<u64, TradeState>>,
}

impl Default for TradeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TradeRegistry {
    pub fn new() -> Self {
        TradeRegistry {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, ticket: u64) -> Option<TradeState> {
        self.inner.read().await.get(&ticket).cloned()
    }

    pub async fn put(&self, ticket: u64, state: TradeState) {
        self.inner.write().await.insert(ticket, state);
    }

    pub async fn remove(&self, ticket: u64) -> Option<TradeState> {
        self.inner.write().await.remove(&ticket)
    }

    pub async fn contains(&self, ticket: u64) -> bool {
        self.inner.read().await.contains_key(&ticket)
    }

    /// Snapshot of currently-owned tickets, taken under the lock and
    /// released immediately (§5 snapshotting).
    pub async fn ticket_snapshot(&self) -> Vec<u64> {
        self.inner.read().await.keys().copied().collect()
    }

    /// Raw ownership check, ignoring defensive posture (§4.7 gate 1).
    pub async fn is_owner(&self, ticket: u64, owner_id: &OwnerId) -> bool {
        match self.inner.read().await.get(&ticket) {
            Some(state) => &state.owner == owner_id,
            None => false,
        }
    }

    /// `owner_id` is allowed to modify `ticket`'s stops right now.
    ///
    /// True iff a state exists for `ticket`, its stored owner equals
    /// `owner_id`, and the defensive subsystem is not in a preempting
    /// posture for it.
    pub async fn may_modify(
        &self,
        ticket: u64,
        owner_id: &OwnerId,
        defensive_state: DefensiveState,
    ) -> bool {
        if defensive_state.is_preempting() {
            return false;
        }
        self.is_owner(ticket, owner_id).await
    }

    /// Applies a mutation to an existing entry, returning `false` if the
    /// ticket was concurrently removed (race with unregistration, §5).
    pub async fn mutate<F>(&self, ticket: u64, f: F) -> bool
    where
        F: FnOnce(&mut TradeState),
    {
        let mut guard = self.inner.write().await;
        match guard.get_mut(&ticket) {
            Some(state) => {
                f(state);
                true
            }
            None => false,
        }
    }
}
