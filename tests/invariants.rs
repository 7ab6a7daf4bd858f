//! Cross-cutting invariants from the testable-properties list.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sltpm_core::application::registration::register;
use sltpm_core::application::registry::TradeRegistry;
use sltpm_core::domain::config::UniversalRules;
use sltpm_core::domain::repositories::{PersistenceStore, PersistentRecord};
use sltpm_core::domain::types::{Direction, Session, StrategyType};
use std::sync::Mutex;

struct FakeStore {
    records: Mutex<Vec<PersistentRecord>>,
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

/// Registering the same ticket twice produces exactly one `TradeState`;
/// the second call returns the first, unaffected by the second call's
/// (different) parameters.
#[tokio::test]
async fn registering_same_ticket_twice_is_idempotent() {
    let registry = TradeRegistry::new();
    let store = FakeStore { records: Mutex::new(vec![]) };
    let rules = UniversalRules::default();

    let first = register(
        &registry, &store, &rules, 7, "EURUSDc", None, Direction::Buy,
        dec!(1.1000), dec!(1.0950), None, dec!(1.0), None, Utc::now(),
    )
    .await
    .unwrap();

    let second = register(
        &registry, &store, &rules, 7, "GBPUSDc", Some(StrategyType::BreakoutBos), Direction::Sell,
        dec!(2.0), dec!(2.1), None, dec!(5.0), Some("other-plan".to_string()), Utc::now(),
    )
    .await
    .unwrap();

    assert_eq!(first, second);
    assert_eq!(registry.ticket_snapshot().await, vec![7]);
    assert_eq!(store.records.lock().unwrap().len(), 1);
}

/// Persisting and reloading a `TradeState` preserves every registration
/// field; only the runtime-derived fields are expected to reset on
/// reload (they are not persisted at all, per `to_persistent_record`).
#[tokio::test]
async fn persisted_record_round_trips_registration_fields() {
    let registry = TradeRegistry::new();
    let store = FakeStore { records: Mutex::new(vec![]) };
    let rules = UniversalRules::default();

    let state = register(
        &registry, &store, &rules, 9, "BTCUSDc", Some(StrategyType::BreakoutIbVolatilityTrap), Direction::Buy,
        dec!(84000), dec!(83800), Some(dec!(84500)), dec!(1.0), Some("plan-9".to_string()), Utc::now(),
    )
    .await
    .unwrap();

    let record = store.load(9).await.unwrap().unwrap();
    assert_eq!(record.ticket, state.ticket);
    assert_eq!(record.symbol, state.symbol);
    assert_eq!(record.entry_price, state.entry_price);
    assert_eq!(record.initial_sl, state.initial_sl);
    assert_eq!(record.initial_tp, state.initial_tp);
    assert_eq!(record.plan_id, state.plan_id);
    assert_eq!(record.session, state.session.as_config_key());
}

/// `MicroScalp` is outside `UNIVERSAL_MANAGED`; registration must leave
/// it untouched for the legacy manager that already owns it.
#[tokio::test]
async fn micro_scalp_never_enters_the_registry() {
    let registry = TradeRegistry::new();
    let store = FakeStore { records: Mutex::new(vec![]) };
    let rules = UniversalRules::default();

    let result = register(
        &registry, &store, &rules, 11, "EURUSDc", Some(StrategyType::MicroScalp), Direction::Buy,
        dec!(1.1), dec!(1.09), None, dec!(1.0), None, Utc::now(),
    )
    .await;

    assert!(result.is_none());
    assert!(registry.ticket_snapshot().await.is_empty());
    assert!(store.records.lock().unwrap().is_empty());
}

/// UTC hour boundaries: 13:00 is the London/NY overlap, not London;
/// 16:00 is NY, matching the session table exactly at its edges.
#[test]
fn session_boundary_hours_resolve_to_the_correct_block() {
    assert_eq!(Session::from_utc_hour(12), Session::London);
    assert_eq!(Session::from_utc_hour(13), Session::LondonNyOverlap);
    assert_eq!(Session::from_utc_hour(15), Session::LondonNyOverlap);
    assert_eq!(Session::from_utc_hour(16), Session::Ny);
}
