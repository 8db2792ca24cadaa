use core::{mem, time::Duration};

use log::{debug, info, warn};
use slot_clock::SlotClock;
use strategy_types::{AttackerCommand, AttestationData, H256, Slot};

use crate::{
    backend::{Backend, Payload},
    error::ParseError,
    kind::{self, ActionKind},
};

/// A parsed action with its parameters bound.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Action {
    spec: String,
    kind: ActionKind,
    effect: Effect,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Effect {
    Signal(AttackerCommand),
    AddToPool,
    StoreSigned,
    Delay(Delay),
    ModifyAttestation { field: AttestField, slot: Slot },
    ModifyParentRoot { slot: Slot },
    PackPooled,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AttestField {
    Source,
    Target,
    Head,
}

/// When a delay action resumes. Targets anchored to slots refer to the start of the slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Delay {
    Seconds(u64),
    NextSlot,
    AfterNextSlot(u64),
    NextNEpochStart(u64),
    NextNEpochEnd(u64),
    NextNEpochHalf(u64),
    EpochEnd,
    HalfEpoch,
    UntilUnixMillis(u64),
}

impl Delay {
    /// Time left to wait at `now` (measured from the Unix epoch) for a call at `slot`.
    #[must_use]
    pub fn duration(self, clock: SlotClock, slot: Slot, now: Duration) -> Duration {
        let epoch = clock.epoch_at_slot(slot);
        let half_epoch = clock.slots_per_epoch() / 2;

        let until_slot = |target: Slot| Duration::from_secs(clock.slot_start_time(target));

        let target = match self {
            Self::Seconds(seconds) => return Duration::from_secs(seconds),
            Self::HalfEpoch => {
                return Duration::from_secs(clock.seconds_per_slot().saturating_mul(half_epoch));
            }
            Self::UntilUnixMillis(millis) => Duration::from_millis(millis),
            Self::NextSlot => until_slot(slot.saturating_add(1)),
            Self::AfterNextSlot(seconds) => until_slot(slot.saturating_add(1))
                .saturating_add(Duration::from_secs(seconds)),
            Self::NextNEpochStart(epochs) => {
                until_slot(clock.epoch_start_slot(epoch.saturating_add(epochs)))
            }
            Self::NextNEpochEnd(epochs) => {
                until_slot(clock.epoch_end_slot(epoch.saturating_add(epochs)))
            }
            Self::NextNEpochHalf(epochs) => until_slot(
                clock
                    .epoch_start_slot(epoch.saturating_add(epochs))
                    .saturating_add(half_epoch),
            ),
            Self::EpochEnd => until_slot(clock.epoch_end_slot(epoch)),
        };

        target.saturating_sub(now)
    }
}

/// Result of running an action.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct ActionOutcome {
    pub command: AttackerCommand,
    /// Replacement for the caller's payload. `None` leaves it unchanged.
    pub payload: Option<Payload>,
}

impl ActionOutcome {
    const fn new(command: AttackerCommand, payload: Option<Payload>) -> Self {
        Self { command, payload }
    }

    const fn declined() -> Self {
        Self::new(AttackerCommand::Null, None)
    }
}

impl Action {
    pub fn parse(spec: &str) -> Result<Self, ParseError> {
        let mut segments = spec.split('#').map(|segment| {
            let (kind, params) = kind::parse_segment(segment)?;
            kind.build(&params).map(|effect| (kind, effect))
        });

        let (kind, effect) = segments.next().ok_or(ParseError::Empty)??;

        for segment in segments {
            segment?;
        }

        Ok(Self {
            spec: spec.trim().to_owned(),
            kind,
            effect,
        })
    }

    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        self.kind
    }

    #[must_use]
    pub const fn effect(&self) -> Effect {
        self.effect
    }

    #[must_use]
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Delays suspend the calling task. Failed lookups make mutations decline instead of failing.
    pub async fn run<B: Backend + ?Sized>(
        &self,
        backend: &B,
        slot: Slot,
        pubkey: &str,
        payload: Option<Payload>,
    ) -> ActionOutcome {
        info!("running action {} at slot {slot}", self.kind);

        match self.effect {
            Effect::Signal(command) => ActionOutcome::new(command, None),
            Effect::AddToPool => {
                match payload {
                    Some(Payload::Attestation(attestation)) => {
                        backend.attestation_pool().add(slot, pubkey, *attestation);
                    }
                    other => warn!("{} expects an attestation, got {other:?}", self.kind),
                }

                ActionOutcome::declined()
            }
            Effect::StoreSigned => {
                match payload {
                    Some(Payload::Attestation(attestation)) => {
                        backend.signed_attestations().record(slot, pubkey, *attestation);
                    }
                    other => warn!("{} expects an attestation, got {other:?}", self.kind),
                }

                ActionOutcome::declined()
            }
            Effect::Delay(delay) => {
                let now = slot_clock::since_unix_epoch().unwrap_or_default();
                let duration = delay.duration(backend.clock(), slot, now);

                debug!("{} at slot {slot} sleeping for {duration:?}", self.kind);

                tokio::time::sleep(duration).await;

                ActionOutcome::declined()
            }
            Effect::ModifyAttestation { field, slot: root_slot } => {
                let Some(mut payload) = payload else {
                    return ActionOutcome::declined();
                };

                let data = match &mut payload {
                    Payload::AttestationData(data) => data,
                    Payload::Attestation(attestation) => &mut attestation.data,
                    other => {
                        warn!("{} expects attestation data, got {other:?}", self.kind);
                        return ActionOutcome::declined();
                    }
                };

                match backend.slot_root(root_slot).await {
                    Ok(root) => {
                        set_root(data, field, root);
                        ActionOutcome::new(AttackerCommand::UpdateState, Some(payload))
                    }
                    Err(error) => {
                        warn!("{} declined: no root for slot {root_slot}: {error:#}", self.kind);
                        ActionOutcome::declined()
                    }
                }
            }
            Effect::ModifyParentRoot { slot: root_slot } => {
                match backend.slot_root(root_slot).await {
                    Ok(root) => {
                        ActionOutcome::new(AttackerCommand::Null, Some(Payload::Root(root)))
                    }
                    Err(error) => {
                        warn!("{} declined: no root for slot {root_slot}: {error:#}", self.kind);
                        ActionOutcome::declined()
                    }
                }
            }
            Effect::PackPooled => {
                let mut block = match payload {
                    Some(Payload::Block(block)) => block,
                    other => {
                        warn!("{} expects a block, got {other:?}", self.kind);
                        return ActionOutcome::declined();
                    }
                };

                let pooled = backend.attestation_pool().take();
                let included = mem::take(&mut block.message.body.attestations);

                block.message.body.attestations = backend.packer().pack(slot, included, pooled);

                info!(
                    "packed {} attestations into block at slot {slot}",
                    block.message.body.attestations.len(),
                );

                ActionOutcome::new(AttackerCommand::Null, Some(Payload::Block(block)))
            }
        }
    }
}

fn set_root(data: &mut AttestationData, field: AttestField, root: H256) {
    match field {
        AttestField::Source => data.source.root = root,
        AttestField::Target => data.target.root = root,
        AttestField::Head => data.beacon_block_root = root,
    }
}
