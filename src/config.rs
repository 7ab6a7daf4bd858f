//! Process configuration (§2 ambient stack, §6).
//!
//! Environment variables configure the process shell (database location,
//! scheduling cadence, observability); the `universal_sl_tp_rules.toml`
//! document configures trading rules and is loaded separately by
//! [`load_rule_document`] so that a malformed rules file degrades to the
//! built-in default (§4.1) without aborting the process.

use anyhow::{Context, Result};
use std::env;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub rules_path: String,
    pub monitoring_interval_seconds: u64,
    pub market_service_timeout_seconds: u64,
    pub observability_enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/sltpm.db".to_string());

        let rules_path = env::var("RULES_PATH")
            .unwrap_or_else(|_| "universal_sl_tp_rules.toml".to_string());

        let monitoring_interval_seconds = env::var("MONITORING_INTERVAL_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("failed to parse MONITORING_INTERVAL_SECONDS")?;

        let market_service_timeout_seconds = env::var("MARKET_SERVICE_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u64>()
            .context("failed to parse MARKET_SERVICE_TIMEOUT_SECONDS")?;

        let observability_enabled = env::var("OBSERVABILITY_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        Ok(Config {
            database_url,
            rules_path,
            monitoring_interval_seconds,
            market_service_timeout_seconds,
            observability_enabled,
        })
    }
}

/// Loads the `universal_sl_tp_rules` document, degrading to an empty
/// (all-default) document on any read or parse failure (§4.1 failure
/// mode) rather than aborting process startup.
pub async fn load_rule_document(path: &str) -> crate::domain::config::UniversalRules {
    if !Path::new(path).exists() {
        warn!(path, "rules file not found, using built-in defaults");
        return crate::domain::config::UniversalRules::default();
    }
    match tokio::fs::read_to_string(path).await {
        Ok(content) => match toml::from_str::<crate::domain::config::RuleDocument>(&content) {
            Ok(doc) => {
                info!(path, "loaded universal_sl_tp_rules.toml");
                doc.universal_sl_tp_rules
            }
            Err(e) => {
                warn!(path, error = %e, "failed to parse rules file, using built-in defaults");
                crate::domain::config::UniversalRules::default()
            }
        },
        Err(e) => {
            warn!(path, error = %e, "failed to read rules file, using built-in defaults");
            crate::domain::config::UniversalRules::default()
        }
    }
}
