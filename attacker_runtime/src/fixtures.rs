use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use beacon_api::{BeaconNode, ChainParameters};
use futures::channel::mpsc::{self, UnboundedReceiver};
use lifecycle_tracker::ToTracker;
use slot_clock::SlotClock;
use strategy_storage::{MemoryStore, RewardStore, StrategyStore};
use strategy_types::{AttestReward, Epoch, H256, ProposerDuty, Slot, ValidatorIndex};

use crate::{config::EngineConfig, engine::Engine};

pub const SLOTS_PER_EPOCH: u64 = 32;

#[derive(Default)]
pub struct FakeBeacon {
    pub head_slot: Slot,
    pub roots: BTreeMap<Slot, H256>,
    /// Target reward of each validator in every epoch.
    pub targets: BTreeMap<ValidatorIndex, i64>,
}

#[async_trait]
impl BeaconNode for FakeBeacon {
    async fn chain_parameters(&self) -> Result<ChainParameters> {
        Ok(ChainParameters {
            seconds_per_slot: 12,
            slots_per_epoch: SLOTS_PER_EPOCH,
            genesis_time: 0,
        })
    }

    async fn head_slot(&self) -> Result<Slot> {
        Ok(self.head_slot)
    }

    async fn block_root(&self, slot: Slot) -> Result<Option<H256>> {
        Ok(self.roots.get(&slot).copied())
    }

    async fn proposer_duties(&self, _epoch: Epoch) -> Result<Vec<ProposerDuty>> {
        Ok(vec![])
    }

    async fn attestation_rewards(&self, epoch: Epoch) -> Result<Vec<AttestReward>> {
        Ok(self
            .targets
            .iter()
            .map(|(validator_index, target)| AttestReward {
                epoch,
                validator_index: *validator_index,
                head: 0,
                target: *target,
                source: 0,
            })
            .collect())
    }
}

pub struct Fixture {
    pub engine: Engine,
    pub store: Arc<MemoryStore>,
    pub to_tracker_rx: UnboundedReceiver<ToTracker>,
}

/// Validators `0..=9` are malicious.
pub fn fixture(beacon: FakeBeacon) -> Fixture {
    let store = Arc::new(MemoryStore::default());
    let strategies: Arc<dyn StrategyStore> = Arc::<MemoryStore>::clone(&store);
    let rewards: Arc<dyn RewardStore> = Arc::<MemoryStore>::clone(&store);
    let (to_tracker_tx, to_tracker_rx) = mpsc::unbounded();

    let config = EngineConfig {
        malicious_validators: 0..=9,
        ..EngineConfig::default()
    };

    let clock = SlotClock::new(12, SLOTS_PER_EPOCH, 0).expect("parameters are nonzero");

    let engine = Engine::new(
        config,
        clock,
        Arc::new(beacon),
        strategies,
        rewards,
        to_tracker_tx,
    );

    Fixture {
        engine,
        store,
        to_tracker_rx,
    }
}
