use anyhow::Result;
use async_trait::async_trait;
use slot_clock::{ClockError, SlotClock};
use strategy_types::{AttestReward, Epoch, H256, ProposerDuty, Slot, UnixSeconds};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ChainParameters {
    pub seconds_per_slot: u64,
    pub slots_per_epoch: u64,
    pub genesis_time: UnixSeconds,
}

impl ChainParameters {
    pub fn clock(self) -> Result<SlotClock, ClockError> {
        SlotClock::new(self.seconds_per_slot, self.slots_per_epoch, self.genesis_time)
    }
}

#[async_trait]
pub trait BeaconNode: Send + Sync {
    async fn chain_parameters(&self) -> Result<ChainParameters>;

    async fn head_slot(&self) -> Result<Slot>;

    /// Root of the canonical block proposed at `slot`, or `None` if the slot is empty.
    async fn block_root(&self, slot: Slot) -> Result<Option<H256>>;

    async fn proposer_duties(&self, epoch: Epoch) -> Result<Vec<ProposerDuty>>;

    /// Total attestation rewards of every active validator in `epoch`.
    async fn attestation_rewards(&self, epoch: Epoch) -> Result<Vec<AttestReward>>;
}
