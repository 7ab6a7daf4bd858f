//! Placeholder `MarketService` (§1, §6).
//!
//! Broker connectivity and tick/candle ingestion are deliberately out of
//! scope for this crate; a real deployment wires a concrete
//! `MarketService` against the broker adapter that lives outside it.
//! This stub lets the binary start, recover, and run its monitoring
//! loop against an empty position set rather than needing a live broker
//! connection to boot at all.

use crate::domain::ports::{
    Candle, ClosePartialResult, MarketService, ModifyResult, PositionView, SymbolInfo, Tick,
};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

pub struct UnavailableMarketService;

#[async_trait]
impl MarketService for UnavailableMarketService {
    async fn positions(&self) -> Result<Vec<PositionView>> {
        Ok(vec![])
    }

    async fn position(&self, _ticket: u64) -> Result<Option<PositionView>> {
        Ok(None)
    }

    async fn candles(&self, _symbol: &str, _timeframe: &str, _limit: usize) -> Result<Vec<Candle>> {
        Ok(vec![])
    }

    async fn atr(&self, _symbol: &str, _timeframe: &str, _period: usize) -> Result<Option<Decimal>> {
        Ok(None)
    }

    async fn symbol_info(&self, _symbol: &str) -> Result<Option<SymbolInfo>> {
        Ok(None)
    }

    async fn modify_stop(
        &self,
        _ticket: u64,
        _new_sl: Option<Decimal>,
        _new_tp: Option<Decimal>,
    ) -> Result<ModifyResult> {
        anyhow::bail!("no market service configured")
    }

    async fn close_partial(&self, _ticket: u64, _volume: Decimal) -> Result<ClosePartialResult> {
        anyhow::bail!("no market service configured")
    }

    async fn symbol_tick(&self, _symbol: &str) -> Result<Option<Tick>> {
        Ok(None)
    }
}
