use anyhow::Result;
use async_trait::async_trait;
use attestation_pool::{AttestationPacker, AttestationPool, SignedAttestationLog};
use slot_clock::{SlotClock, SlotWatermark};
use strategy_types::{Attestation, AttestationData, H256, SignedBeaconBlock, Slot};

/// Engine state that actions read and mutate.
#[async_trait]
pub trait Backend: Send + Sync {
    fn clock(&self) -> SlotClock;

    fn slot_watermark(&self) -> &SlotWatermark;

    fn attestation_pool(&self) -> &AttestationPool;

    fn signed_attestations(&self) -> &SignedAttestationLog;

    fn packer(&self) -> AttestationPacker;

    /// Canonical block root at `slot`.
    async fn slot_root(&self, slot: Slot) -> Result<H256>;
}

/// Decoded checkpoint payload.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Payload {
    Block(Box<SignedBeaconBlock>),
    AttestationData(AttestationData),
    Attestation(Box<Attestation>),
    Root(H256),
}
