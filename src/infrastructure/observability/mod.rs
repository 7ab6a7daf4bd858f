pub mod alerts;
pub mod metrics;

pub use alerts::{AlertSink, TracingAlertSink};
pub use metrics::Metrics;
