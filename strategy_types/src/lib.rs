//! Data model shared by the strategy engine, the interception gateway and its transport.

pub use ethereum_types::H256;

pub use crate::{
    command::{AttackerCommand, AttackerResponse},
    containers::{
        AggregationBits, AttestReward, Attestation, AttestationData, BeaconBlock,
        BeaconBlockBody, Checkpoint, ProposerDuty, SignatureBytes, SignedBeaconBlock,
    },
    injection_point::{InjectionPoint, PayloadKind},
    primitives::{CommitteeIndex, Epoch, Slot, UnixSeconds, ValidatorIndex},
    strategy::{
        FeedBackInfo, InvalidSlotSelector, Role, SlotSelector, SlotStrategy, Strategy,
        StrategyEndEvent, ValidatorStrategy,
    },
};

pub mod string_or_native;
pub mod wire;

mod command;
mod containers;
mod injection_point;
mod primitives;
mod strategy;
