//! Persistence port (§4.3, §6).
//!
//! `PersistentRecord` mirrors `TradeState` minus its runtime-derived
//! fields; the resolved rule snapshot travels as an opaque serialized
//! blob the store never inspects.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// One durable row, keyed by `ticket`.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistentRecord {
    pub ticket: u64,
    pub symbol: String,
    pub strategy_type: String,
    pub direction: String,
    pub session: String,
    pub entry_price: Decimal,
    pub initial_sl: Decimal,
    pub initial_tp: Option<Decimal>,
    /// Opaque serialized `ResolvedRuleSnapshot` (JSON).
    pub resolved_trailing_rules: String,
    pub managed_by: String,
    pub baseline_atr: Option<Decimal>,
    pub initial_volume: Decimal,
    pub breakeven_triggered: bool,
    pub partial_taken: bool,
    pub last_trailing_sl: Option<Decimal>,
    pub last_sl_modification_time: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
    pub plan_id: Option<String>,
}

/// Durable key-value store for managed trades, upsert-by-ticket.
///
/// Failures are logged and the in-memory state remains authoritative
/// for the current process run (§4.3 failure mode) — implementations
/// should not propagate store errors into the monitoring loop's
/// control flow; callers already treat `Err` that way.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn upsert(&self, record: &PersistentRecord) -> Result<()>;
    async fn load(&self, ticket: u64) -> Result<Option<PersistentRecord>>;
    async fn load_all(&self) -> Result<Vec<PersistentRecord>>;
    async fn delete(&self, ticket: u64) -> Result<()>;
}
