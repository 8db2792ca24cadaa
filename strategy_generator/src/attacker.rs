use core::ops::RangeInclusive;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use slot_clock::SlotClock;
use strategy_types::{Epoch, FeedBackInfo, ProposerDuty, Slot, Strategy, ValidatorIndex};

/// What a library strategy may do to the running engine.
#[async_trait]
pub trait Attacker: Send + Sync {
    async fn submit_strategy(&self, strategy: Strategy) -> Result<()>;

    fn strategy_feedback(&self, uid: &str) -> Result<FeedBackInfo>;

    fn clock(&self) -> SlotClock;

    /// Highest slot seen at any checkpoint.
    fn current_slot(&self) -> Slot;

    async fn proposer_duties(&self, epoch: Epoch) -> Result<Vec<ProposerDuty>>;
}

#[derive(Clone)]
pub struct LibraryParams {
    pub attacker: Arc<dyn Attacker>,
    pub malicious_validators: RangeInclusive<ValidatorIndex>,
}
