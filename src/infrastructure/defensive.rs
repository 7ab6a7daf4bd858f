//! Placeholder `DefensiveManager` (§1, §6).
//!
//! The DTMS defensive engine is an external collaborator this crate only
//! consults; a real deployment wires a concrete `DefensiveManager`
//! against that engine's status feed. This stub reports every ticket as
//! `NORMAL`, i.e. the universal manager never yields to it.

use crate::domain::ports::DefensiveManager;
use crate::domain::types::DefensiveState;
use async_trait::async_trait;

pub struct AlwaysNormalDefensiveManager;

#[async_trait]
impl DefensiveManager for AlwaysNormalDefensiveManager {
    async fn state(&self, _ticket: u64) -> DefensiveState {
        DefensiveState::Normal
    }
}
