//! Sqlite-backed `PlanLookup` (§4.4).
//!
//! `trade_plans` is populated by the trading-plan system upstream of this
//! crate; recovery only ever reads it.

use crate::domain::ports::PlanLookup;
use crate::domain::types::StrategyType;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use sqlx::{Row, SqlitePool};

pub struct SqlitePlanLookup {
    pool: SqlitePool,
}

impl SqlitePlanLookup {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Deserialize)]
struct PlanConditions {
    strategy_type: Option<String>,
}

#[async_trait]
impl PlanLookup for SqlitePlanLookup {
    async fn resolve_strategy(&self, plan_id: &str) -> Result<Option<StrategyType>> {
        let row = sqlx::query("SELECT conditions FROM trade_plans WHERE plan_id = ?")
            .bind(plan_id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to query trade_plans")?;

        let Some(row) = row else { return Ok(None) };
        let conditions: String = row.try_get("conditions")?;
        let conditions: PlanConditions = match serde_json::from_str(&conditions) {
            Ok(c) => c,
            Err(_) => return Ok(None),
        };
        Ok(conditions.strategy_type.map(|s| StrategyType::parse_or_default(&s)))
    }
}
