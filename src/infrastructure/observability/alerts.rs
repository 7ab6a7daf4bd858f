//! Alert notification seam (§7).
//!
//! Chat/Discord/telemetry presentation is out of scope; this crate only
//! exposes the hook repeated data-unavailable failures are emitted
//! through. The default implementation logs at error level.

use async_trait::async_trait;

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn alert(&self, symbol: &str, kind: &str, message: &str);
}

/// Logs alerts through `tracing`; the collaborator that would forward
/// these to chat/Discord lives outside this crate.
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn alert(&self, symbol: &str, kind: &str, message: &str) {
        tracing::error!(symbol, kind, message, "repeated data-unavailable failures");
    }
}
