use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Owns the sqlite pool and schema migrations for the manager.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to connect to sqlite database")?;

        info!(db_url, "connected to persistence store");

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS managed_trades (
                ticket INTEGER PRIMARY KEY,
                symbol TEXT NOT NULL,
                strategy_type TEXT NOT NULL,
                direction TEXT NOT NULL,
                session TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                initial_sl TEXT NOT NULL,
                initial_tp TEXT,
                resolved_trailing_rules TEXT NOT NULL,
                managed_by TEXT NOT NULL,
                baseline_atr TEXT,
                initial_volume TEXT NOT NULL,
                breakeven_triggered INTEGER NOT NULL DEFAULT 0,
                partial_taken INTEGER NOT NULL DEFAULT 0,
                last_trailing_sl TEXT,
                last_sl_modification_time TEXT,
                registered_at TEXT NOT NULL,
                plan_id TEXT
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create managed_trades table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trade_plans (
                plan_id TEXT PRIMARY KEY,
                conditions TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create trade_plans table")?;

        Ok(())
    }
}
