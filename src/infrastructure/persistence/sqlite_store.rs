//! Sqlite-backed `PersistenceStore` (§4.3, §6).

use crate::domain::repositories::{PersistenceStore, PersistentRecord};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

pub struct SqlitePersistenceStore {
    pool: SqlitePool,
}

impl SqlitePersistenceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn parse_decimal(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_default()
}

fn parse_opt_decimal(s: Option<String>) -> Option<Decimal> {
    s.map(|s| parse_decimal(&s))
}

fn parse_opt_timestamp(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<PersistentRecord> {
    let registered_at: String = row.try_get("registered_at")?;
    Ok(PersistentRecord {
        ticket: row.try_get::<i64, _>("ticket")? as u64,
        symbol: row.try_get("symbol")?,
        strategy_type: row.try_get("strategy_type")?,
        direction: row.try_get("direction")?,
        session: row.try_get("session")?,
        entry_price: parse_decimal(&row.try_get::<String, _>("entry_price")?),
        initial_sl: parse_decimal(&row.try_get::<String, _>("initial_sl")?),
        initial_tp: parse_opt_decimal(row.try_get("initial_tp")?),
        resolved_trailing_rules: row.try_get("resolved_trailing_rules")?,
        managed_by: row.try_get("managed_by")?,
        baseline_atr: parse_opt_decimal(row.try_get("baseline_atr")?),
        initial_volume: parse_decimal(&row.try_get::<String, _>("initial_volume")?),
        breakeven_triggered: row.try_get::<i64, _>("breakeven_triggered")? != 0,
        partial_taken: row.try_get::<i64, _>("partial_taken")? != 0,
        last_trailing_sl: parse_opt_decimal(row.try_get("last_trailing_sl")?),
        last_sl_modification_time: parse_opt_timestamp(row.try_get("last_sl_modification_time")?),
        registered_at: DateTime::parse_from_rfc3339(&registered_at)
            .context("malformed registered_at")?
            .with_timezone(&Utc),
        plan_id: row.try_get("plan_id")?,
    })
}

#[async_trait]
impl PersistenceStore for SqlitePersistenceStore {
    async fn upsert(&self, record: &PersistentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO managed_trades (
                ticket, symbol, strategy_type, direction, session, entry_price,
                initial_sl, initial_tp, resolved_trailing_rules, managed_by,
                baseline_atr, initial_volume, breakeven_triggered, partial_taken,
                last_trailing_sl, last_sl_modification_time, registered_at, plan_id
            ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)
            ON CONFLICT(ticket) DO UPDATE SET
                symbol = excluded.symbol,
                strategy_type = excluded.strategy_type,
                direction = excluded.direction,
                session = excluded.session,
                entry_price = excluded.entry_price,
                initial_sl = excluded.initial_sl,
                initial_tp = excluded.initial_tp,
                resolved_trailing_rules = excluded.resolved_trailing_rules,
                managed_by = excluded.managed_by,
                baseline_atr = excluded.baseline_atr,
                initial_volume = excluded.initial_volume,
                breakeven_triggered = excluded.breakeven_triggered,
                partial_taken = excluded.partial_taken,
                last_trailing_sl = excluded.last_trailing_sl,
                last_sl_modification_time = excluded.last_sl_modification_time,
                plan_id = excluded.plan_id
            "#,
        )
        .bind(record.ticket as i64)
        .bind(&record.symbol)
        .bind(&record.strategy_type)
        .bind(&record.direction)
        .bind(&record.session)
        .bind(record.entry_price.to_string())
        .bind(record.initial_sl.to_string())
        .bind(record.initial_tp.map(|d| d.to_string()))
        .bind(&record.resolved_trailing_rules)
        .bind(&record.managed_by)
        .bind(record.baseline_atr.map(|d| d.to_string()))
        .bind(record.initial_volume.to_string())
        .bind(record.breakeven_triggered as i64)
        .bind(record.partial_taken as i64)
        .bind(record.last_trailing_sl.map(|d| d.to_string()))
        .bind(record.last_sl_modification_time.map(|t| t.to_rfc3339()))
        .bind(record.registered_at.to_rfc3339())
        .bind(&record.plan_id)
        .execute(&self.pool)
        .await
        .context("failed to upsert managed trade")?;
        Ok(())
    }

    async fn load(&self, ticket: u64) -> Result<Option<PersistentRecord>> {
        let row = sqlx::query("SELECT * FROM managed_trades WHERE ticket = ?")
            .bind(ticket as i64)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load managed trade")?;
        row.map(row_to_record).transpose()
    }

    async fn load_all(&self) -> Result<Vec<PersistentRecord>> {
        let rows = sqlx::query("SELECT * FROM managed_trades")
            .fetch_all(&self.pool)
            .await
            .context("failed to load managed trades")?;
        rows.into_iter().map(row_to_record).collect()
    }

    async fn delete(&self, ticket: u64) -> Result<()> {
        sqlx::query("DELETE FROM managed_trades WHERE ticket = ?")
            .bind(ticket as i64)
            .execute(&self.pool)
            .await
            .context("failed to delete managed trade")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::database::Database;
    use rust_decimal_macros::dec;

    fn sample_record(ticket: u64) -> PersistentRecord {
        PersistentRecord {
            ticket,
            symbol: "EURUSDc".to_string(),
            strategy_type: "default_standard".to_string(),
            direction: "BUY".to_string(),
            session: "LONDON".to_string(),
            entry_price: dec!(1.1000),
            initial_sl: dec!(1.0950),
            initial_tp: Some(dec!(1.1100)),
            resolved_trailing_rules: "{}".to_string(),
            managed_by: "universal".to_string(),
            baseline_atr: Some(dec!(0.0010)),
            initial_volume: dec!(1.0),
            breakeven_triggered: false,
            partial_taken: false,
            last_trailing_sl: None,
            last_sl_modification_time: None,
            registered_at: Utc::now(),
            plan_id: Some("abc123".to_string()),
        }
    }

    #[tokio::test]
    async fn upsert_then_load_round_trips() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let store = SqlitePersistenceStore::new(db.pool.clone());
        let record = sample_record(1);
        store.upsert(&record).await.unwrap();
        let loaded = store.load(1).await.unwrap().unwrap();
        assert_eq!(loaded.symbol, record.symbol);
        assert_eq!(loaded.entry_price, record.entry_price);
        assert_eq!(loaded.plan_id, record.plan_id);
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_ticket() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let store = SqlitePersistenceStore::new(db.pool.clone());
        store.upsert(&sample_record(1)).await.unwrap();
        let mut updated = sample_record(1);
        updated.breakeven_triggered = true;
        store.upsert(&updated).await.unwrap();
        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].breakeven_triggered);
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let store = SqlitePersistenceStore::new(db.pool.clone());
        store.upsert(&sample_record(1)).await.unwrap();
        store.delete(1).await.unwrap();
        assert!(store.load(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn load_all_returns_every_ticket() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let store = SqlitePersistenceStore::new(db.pool.clone());
        store.upsert(&sample_record(1)).await.unwrap();
        store.upsert(&sample_record(2)).await.unwrap();
        assert_eq!(store.load_all().await.unwrap().len(), 2);
    }
}
