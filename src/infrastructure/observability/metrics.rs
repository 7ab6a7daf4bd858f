//! Prometheus metrics for the manager.
//!
//! All metrics use the `sltpm_` prefix and are read-only from outside
//! this module.

use prometheus::{
    CounterVec, Gauge, GaugeVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge, GenericGaugeVec},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Managed ticket count, gauge.
    pub managed_trades: GenericGauge<AtomicF64>,
    /// Stop modifications committed, by reason (breakeven, partial, trail, stall_tighten).
    pub modifications_total: CounterVec,
    /// Safeguard gate rejections, by gate name.
    pub safeguard_rejections_total: CounterVec,
    /// Data-unavailable incidents, by symbol and kind (atr, candles, tick).
    pub data_unavailable_total: CounterVec,
    /// Per-symbol consecutive data-unavailable streak, used to decide
    /// the 1st-and-every-10th alert cadence.
    pub data_unavailable_streak: GenericGaugeVec<AtomicF64>,
    /// Registry/persistence reconciliation deletions.
    pub unregistrations_total: CounterVec,
    /// Monitoring cycle duration, most recent, in seconds.
    pub last_cycle_seconds: GenericGauge<AtomicF64>,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let managed_trades = Gauge::with_opts(Opts::new(
            "sltpm_managed_trades",
            "Number of tickets currently owned by the universal manager",
        ))?;
        registry.register(Box::new(managed_trades.clone()))?;

        let modifications_total = CounterVec::new(
            Opts::new(
                "sltpm_modifications_total",
                "Stop modifications committed, by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(modifications_total.clone()))?;

        let safeguard_rejections_total = CounterVec::new(
            Opts::new(
                "sltpm_safeguard_rejections_total",
                "Safeguard gate rejections, by gate",
            ),
            &["gate"],
        )?;
        registry.register(Box::new(safeguard_rejections_total.clone()))?;

        let data_unavailable_total = CounterVec::new(
            Opts::new(
                "sltpm_data_unavailable_total",
                "Data-unavailable incidents, by symbol and kind",
            ),
            &["symbol", "kind"],
        )?;
        registry.register(Box::new(data_unavailable_total.clone()))?;

        let data_unavailable_streak = GaugeVec::new(
            Opts::new(
                "sltpm_data_unavailable_streak",
                "Consecutive data-unavailable count per symbol",
            ),
            &["symbol"],
        )?;
        registry.register(Box::new(data_unavailable_streak.clone()))?;

        let unregistrations_total = CounterVec::new(
            Opts::new(
                "sltpm_unregistrations_total",
                "Tickets unregistered, by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(unregistrations_total.clone()))?;

        let last_cycle_seconds = Gauge::with_opts(Opts::new(
            "sltpm_last_cycle_seconds",
            "Wall-clock duration of the most recent monitoring cycle",
        ))?;
        registry.register(Box::new(last_cycle_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            managed_trades,
            modifications_total,
            safeguard_rejections_total,
            data_unavailable_total,
            data_unavailable_streak,
            unregistrations_total,
            last_cycle_seconds,
        })
    }

    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn record_modification(&self, reason: &str) {
        self.modifications_total.with_label_values(&[reason]).inc();
    }

    pub fn record_safeguard_rejection(&self, gate: &str) {
        self.safeguard_rejections_total
            .with_label_values(&[gate])
            .inc();
    }

    pub fn record_unregistration(&self, reason: &str) {
        self.unregistrations_total.with_label_values(&[reason]).inc();
    }

    /// Increments the data-unavailable counter and streak for `symbol`,
    /// returning true when this occurrence should trigger an alert
    /// (1st failure, then every 10th).
    pub fn record_data_unavailable(&self, symbol: &str, kind: &str) -> bool {
        self.data_unavailable_total
            .with_label_values(&[symbol, kind])
            .inc();
        let gauge = self.data_unavailable_streak.with_label_values(&[symbol]);
        gauge.inc();
        let streak = gauge.get() as u64;
        streak == 1 || streak % 10 == 0
    }

    pub fn reset_data_unavailable_streak(&self, symbol: &str) {
        self.data_unavailable_streak
            .with_label_values(&[symbol])
            .set(0.0);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to build default metrics registry")
    }
}
