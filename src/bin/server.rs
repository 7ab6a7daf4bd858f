//! USLTPM Server - headless universal stop-loss/take-profit manager.
//!
//! Loads configuration and the `universal_sl_tp_rules` document, runs
//! recovery once, then drives the monitoring loop until SIGINT.

use anyhow::Result;
use sltpm_core::application::monitoring;
use sltpm_core::application::recovery;
use sltpm_core::application::registry::TradeRegistry;
use sltpm_core::config::{self, Config};
use sltpm_core::domain::ports::{DefensiveManager, MarketService, PlanLookup};
use sltpm_core::domain::repositories::PersistenceStore;
use sltpm_core::infrastructure::defensive::AlwaysNormalDefensiveManager;
use sltpm_core::infrastructure::market::unavailable::UnavailableMarketService;
use sltpm_core::infrastructure::observability::{AlertSink, Metrics, TracingAlertSink};
use sltpm_core::infrastructure::persistence::database::Database;
use sltpm_core::infrastructure::persistence::plan_lookup::SqlitePlanLookup;
use sltpm_core::infrastructure::persistence::sqlite_store::SqlitePersistenceStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("USLTPM server {} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let rules_doc = Arc::new(config::load_rule_document(&config.rules_path).await);

    let database = Database::new(&config.database_url).await?;
    let store: Arc<dyn PersistenceStore> = Arc::new(SqlitePersistenceStore::new(database.pool.clone()));
    let plan_lookup: Arc<dyn PlanLookup> = Arc::new(SqlitePlanLookup::new(database.pool));

    let registry = Arc::new(TradeRegistry::new());
    let market: Arc<dyn MarketService> = Arc::new(UnavailableMarketService);
    let defensive: Arc<dyn DefensiveManager> = Arc::new(AlwaysNormalDefensiveManager);
    let alerts: Arc<dyn AlertSink> = Arc::new(TracingAlertSink);
    let metrics = Metrics::new()?;

    recovery::run(registry.as_ref(), market.as_ref(), store.as_ref(), plan_lookup.as_ref(), &rules_doc).await?;
    info!("recovery complete, starting monitoring loop");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let monitoring_handle = tokio::spawn(monitoring::run(
        registry,
        market,
        store,
        defensive,
        alerts,
        metrics,
        Duration::from_secs(config.monitoring_interval_seconds),
        Duration::from_secs(config.market_service_timeout_seconds),
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, finishing current ticket before exit");
    shutdown_tx.send(true).ok();
    monitoring_handle.await?;

    Ok(())
}
