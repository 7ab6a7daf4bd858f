pub mod rule_snapshot;
pub mod trade_state;

pub use rule_snapshot::{FallbackMethod, ResolvedRuleSnapshot, TrailingMethod};
pub use trade_state::TradeState;
