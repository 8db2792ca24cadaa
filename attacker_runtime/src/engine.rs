use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};

use action_engine::{Backend, ParseError};
use anyhow::{Error as AnyhowError, Result, anyhow, bail};
use async_trait::async_trait;
use attestation_pool::{AttestationPacker, AttestationPool, SignedAttestationLog};
use beacon_api::BeaconNode;
use futures::channel::mpsc::UnboundedSender;
use lifecycle_tracker::{StrategyScore, ToTracker};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use rpc_api::Admin;
use slot_clock::{SlotClock, SlotWatermark};
use strategy_generator::Attacker;
use strategy_resolver::{ParsedStrategy, StrategyResolver};
use strategy_storage::{RewardStore, StrategyRecord, StrategyStore};
use strategy_types::{
    Epoch, FeedBackInfo, H256, ProposerDuty, Slot, SlotStrategy, Strategy, StrategyEndEvent,
};
use thiserror::Error;

use crate::config::EngineConfig;

// Rewards of an epoch are final once the chain is two epochs past it.
const REWARD_DELAY_EPOCHS: u64 = 2;
const MAX_EPOCHS_PER_COLLECTION: u64 = 32;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("strategy {0} already exists")]
    Duplicate(String),
    #[error("strategy is invalid")]
    Parse(#[from] ParseError),
    #[error("failed to store strategy")]
    Storage(#[source] AnyhowError),
}

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("strategy {0} has not finished")]
    NotFinished(String),
    #[error("strategy {0} does not exist")]
    NotFound(String),
    #[error("failed to load strategy")]
    Storage(#[source] AnyhowError),
}

pub struct Engine {
    config: EngineConfig,
    clock: SlotClock,
    watermark: SlotWatermark,
    pool: AttestationPool,
    signed: SignedAttestationLog,
    resolver: Arc<StrategyResolver>,
    beacon: Arc<dyn BeaconNode>,
    strategies: Arc<dyn StrategyStore>,
    rewards: Arc<dyn RewardStore>,
    feedback: RwLock<HashMap<String, FeedBackInfo>>,
    // Serializes submissions so that the duplicate check and the insert cannot interleave.
    submission: Mutex<()>,
    to_tracker_tx: UnboundedSender<ToTracker>,
}

impl Engine {
    #[must_use]
    pub fn new(
        config: EngineConfig,
        clock: SlotClock,
        beacon: Arc<dyn BeaconNode>,
        strategies: Arc<dyn StrategyStore>,
        rewards: Arc<dyn RewardStore>,
        to_tracker_tx: UnboundedSender<ToTracker>,
    ) -> Self {
        Self {
            config,
            clock,
            watermark: SlotWatermark::default(),
            pool: AttestationPool::default(),
            signed: SignedAttestationLog::default(),
            resolver: Arc::default(),
            beacon,
            strategies,
            rewards,
            feedback: RwLock::default(),
            submission: Mutex::new(()),
            to_tracker_tx,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn resolver(&self) -> Arc<StrategyResolver> {
        Arc::clone(&self.resolver)
    }

    /// Checks, parses, stores, merges and tracks `strategy`, in that order.
    /// Nothing is merged if an earlier step fails.
    ///
    /// Strategies without a uid are only merged.
    pub fn submit(&self, strategy: &Strategy) -> Result<(), SubmitError> {
        let _submission = self.submission.lock();

        let Strategy { uid, category, .. } = strategy;

        if uid.is_empty() {
            let parsed = self.resolver.merge(strategy)?;
            info!("merged anonymous strategy with {} slot strategies", parsed.slots.len());
            return Ok(());
        }

        if self
            .strategies
            .by_uid(uid)
            .map_err(SubmitError::Storage)?
            .is_some()
        {
            return Err(SubmitError::Duplicate(uid.clone()));
        }

        let parsed = ParsedStrategy::parse(strategy)?;

        self.strategies
            .insert(StrategyRecord::new(strategy))
            .map_err(SubmitError::Storage)?;

        self.resolver.apply(&parsed);

        ToTracker::Track {
            uid: uid.clone(),
            selectors: parsed.selectors(),
        }
        .send(&self.to_tracker_tx);

        info!(
            "submitted strategy {uid} ({category}) with {} slot strategies",
            parsed.slots.len(),
        );

        Ok(())
    }

    pub fn query_feedback(&self, uid: &str) -> Result<FeedBackInfo, FeedbackError> {
        if let Some(feedback) = self.feedback.read().get(uid) {
            return Ok(*feedback);
        }

        match self.strategies.by_uid(uid).map_err(FeedbackError::Storage)? {
            Some(StrategyRecord {
                is_end: true,
                feedback: Some(feedback),
                ..
            }) => Ok(feedback),
            Some(_) => Err(FeedbackError::NotFinished(uid.to_owned())),
            None => Err(FeedbackError::NotFound(uid.to_owned())),
        }
    }

    /// Scores an ended strategy. Feedback is recorded once, and only after the record is
    /// persisted. Later events for the same uid are ignored.
    pub fn on_strategy_end(&self, event: &StrategyEndEvent) -> Result<()> {
        let StrategyEndEvent {
            uid,
            min_epoch,
            max_epoch,
        } = event;

        if self.feedback.read().contains_key(uid) {
            warn!("feedback for strategy {uid} is already recorded");
            return Ok(());
        }

        let StrategyScore {
            feedback,
            impact_validator_count,
        } = lifecycle_tracker::strategy_feedback(
            self.rewards.as_ref(),
            event,
            self.config.normal_target_amount,
            &self.config.malicious_validators,
        )?;

        let Some(mut record) = self.strategies.by_uid(uid)? else {
            bail!("ended strategy {uid} is not stored");
        };

        if record.is_end {
            warn!("strategy {uid} is already scored");
            return Ok(());
        }

        record.finish(*min_epoch, *max_epoch, feedback, impact_validator_count);

        self.strategies.update(record)?;

        match self.feedback.write().entry(uid.clone()) {
            Entry::Occupied(_) => {
                warn!("feedback for strategy {uid} is already recorded");
                return Ok(());
            }
            Entry::Vacant(vacant) => {
                vacant.insert(feedback);
            }
        }

        info!(
            "strategy {uid} ended (epochs {min_epoch}..={max_epoch}, \
             honest lose rate: {}, attacker lose rate: {}, \
             impacted validators: {impact_validator_count})",
            feedback.honest_lose_rate, feedback.attacker_lose_rate,
        );

        Ok(())
    }

    /// Stores attestation rewards of epochs that are at least two epochs behind the head,
    /// starting with `next_epoch` and advancing it.
    pub async fn collect_rewards(&self, next_epoch: &mut Epoch) -> Result<()> {
        let head_slot = self.beacon.head_slot().await?;
        let head_epoch = self.clock.epoch_at_slot(head_slot);

        let Some(last_final) = head_epoch.checked_sub(REWARD_DELAY_EPOCHS) else {
            return Ok(());
        };

        let last = last_final.min(next_epoch.saturating_add(MAX_EPOCHS_PER_COLLECTION - 1));

        while *next_epoch <= last {
            let epoch = *next_epoch;
            let rewards = self.beacon.attestation_rewards(epoch).await?;

            debug!("storing {} attestation rewards for epoch {epoch}", rewards.len());

            self.rewards.insert_rewards(epoch, rewards)?;

            *next_epoch = epoch + 1;
        }

        Ok(())
    }

    /// First epoch without stored rewards.
    pub fn first_uncollected_epoch(&self) -> Result<Epoch> {
        Ok(self
            .rewards
            .latest_reward_epoch()?
            .map_or(0, |epoch| epoch + 1))
    }
}

#[async_trait]
impl Backend for Engine {
    fn clock(&self) -> SlotClock {
        self.clock
    }

    fn slot_watermark(&self) -> &SlotWatermark {
        &self.watermark
    }

    fn attestation_pool(&self) -> &AttestationPool {
        &self.pool
    }

    fn signed_attestations(&self) -> &SignedAttestationLog {
        &self.signed
    }

    fn packer(&self) -> AttestationPacker {
        AttestationPacker::new(self.clock, self.config.max_attestations)
    }

    async fn slot_root(&self, slot: Slot) -> Result<H256> {
        self.beacon
            .block_root(slot)
            .await?
            .ok_or_else(|| anyhow!("no canonical block at slot {slot}"))
    }
}

#[async_trait]
impl Admin for Engine {
    async fn submit_strategy(&self, strategy: Strategy) -> Result<()> {
        Ok(self.submit(&strategy)?)
    }

    fn feedback(&self, uid: &str) -> Result<FeedBackInfo> {
        Ok(self.query_feedback(uid)?)
    }

    fn current_slot(&self) -> Slot {
        self.watermark.get()
    }

    fn slot_strategies(&self) -> Vec<SlotStrategy> {
        self.resolver
            .entries()
            .iter()
            .map(|entry| entry.to_slot_strategy())
            .collect()
    }
}

#[async_trait]
impl Attacker for Engine {
    async fn submit_strategy(&self, strategy: Strategy) -> Result<()> {
        Ok(self.submit(&strategy)?)
    }

    fn strategy_feedback(&self, uid: &str) -> Result<FeedBackInfo> {
        Ok(self.query_feedback(uid)?)
    }

    fn clock(&self) -> SlotClock {
        self.clock
    }

    fn current_slot(&self) -> Slot {
        self.watermark.get()
    }

    async fn proposer_duties(&self, epoch: Epoch) -> Result<Vec<ProposerDuty>> {
        self.beacon.proposer_duties(epoch).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use futures::{StreamExt as _, channel::mpsc::UnboundedReceiver, future::FutureExt as _};
    use strategy_storage::MemoryStore;
    use strategy_types::SlotSelector;
    use test_case::test_case;

    use crate::fixtures::{FakeBeacon, Fixture, SLOTS_PER_EPOCH, fixture};

    use super::*;

    fn strategy(uid: &str, slot: &str, action: &str) -> Strategy {
        Strategy {
            uid: uid.to_owned(),
            category: "test".to_owned(),
            slots: vec![SlotStrategy {
                slot: slot.to_owned(),
                level: 0,
                actions: BTreeMap::from([("BlockBeforeSign".to_owned(), action.to_owned())]),
            }],
            validators: vec![],
        }
    }

    fn tracked(rx: &mut UnboundedReceiver<ToTracker>) -> Option<String> {
        rx.next().now_or_never().flatten().map(|message| match message {
            ToTracker::Track { uid, .. } => uid,
        })
    }

    #[test]
    fn submitted_strategy_is_stored_merged_and_tracked() -> Result<()> {
        let Fixture {
            engine,
            store,
            mut to_tracker_rx,
        } = fixture(FakeBeacon::default());

        engine.submit(&strategy("a1", "5", "return"))?;

        assert!(store.by_uid("a1")?.is_some());
        assert_eq!(engine.resolver.entries().len(), 1);
        assert_eq!(engine.resolver.entries()[0].slot, SlotSelector::Fixed(5));
        assert_eq!(tracked(&mut to_tracker_rx).as_deref(), Some("a1"));

        Ok(())
    }

    #[test]
    fn duplicate_uid_is_rejected_without_merging() -> Result<()> {
        let Fixture {
            engine,
            mut to_tracker_rx,
            ..
        } = fixture(FakeBeacon::default());

        engine.submit(&strategy("a1", "5", "return"))?;
        tracked(&mut to_tracker_rx);

        let error = engine
            .submit(&strategy("a1", "6", "null"))
            .expect_err("uid is taken");

        assert!(matches!(error, SubmitError::Duplicate(uid) if uid == "a1"));
        assert_eq!(engine.resolver.entries().len(), 1);
        assert_eq!(tracked(&mut to_tracker_rx), None);

        Ok(())
    }

    #[test]
    fn invalid_strategy_leaves_no_trace() -> Result<()> {
        let Fixture {
            engine,
            store,
            mut to_tracker_rx,
        } = fixture(FakeBeacon::default());

        let error = engine
            .submit(&strategy("a1", "5", "jump"))
            .expect_err("action is unknown");

        assert!(matches!(error, SubmitError::Parse(_)));
        assert!(store.by_uid("a1")?.is_none());
        assert!(engine.resolver.entries().is_empty());
        assert_eq!(tracked(&mut to_tracker_rx), None);

        Ok(())
    }

    #[test]
    fn anonymous_strategy_is_only_merged() -> Result<()> {
        let Fixture {
            engine,
            store,
            mut to_tracker_rx,
        } = fixture(FakeBeacon::default());

        engine.submit(&strategy("", "*", "null"))?;
        engine.submit(&strategy("", "*", "return"))?;

        assert!(store.by_uid("")?.is_none());
        assert_eq!(engine.resolver.entries().len(), 1);
        assert_eq!(tracked(&mut to_tracker_rx), None);

        Ok(())
    }

    #[test_case("a1" => matches Err(FeedbackError::NotFinished(_)); "running")]
    #[test_case("b2" => matches Err(FeedbackError::NotFound(_)); "unknown")]
    fn feedback_of_unscored_strategy(uid: &str) -> Result<FeedBackInfo, FeedbackError> {
        let Fixture { engine, .. } = fixture(FakeBeacon::default());

        engine
            .submit(&strategy("a1", "5", "return"))
            .expect("strategy is valid");

        engine.query_feedback(uid)
    }

    #[tokio::test]
    async fn ended_strategy_is_scored_once() -> Result<()> {
        let beacon = FakeBeacon {
            head_slot: 2 * SLOTS_PER_EPOCH,
            targets: BTreeMap::from([(3, 0), (42, NORMAL)]),
            ..FakeBeacon::default()
        };

        let Fixture { engine, store, .. } = fixture(beacon);

        engine.submit(&strategy("a1", "5", "return"))?;

        let mut next_epoch = engine.first_uncollected_epoch()?;
        engine.collect_rewards(&mut next_epoch).await?;

        assert_eq!(next_epoch, 1);

        let event = StrategyEndEvent {
            uid: "a1".to_owned(),
            min_epoch: 0,
            max_epoch: 0,
        };

        engine.on_strategy_end(&event)?;

        let expected = FeedBackInfo {
            honest_lose_rate: 0.0,
            attacker_lose_rate: 1.0,
        };

        assert_eq!(engine.query_feedback("a1")?, expected);

        let record = store.by_uid("a1")?.expect("strategy was stored");

        assert!(record.is_end);
        assert_eq!(record.feedback, Some(expected));
        assert_eq!(record.impact_validator_count, Some(0));

        // Rewards change but the recorded feedback does not.
        store.insert_rewards(0, vec![])?;
        engine.on_strategy_end(&event)?;

        assert_eq!(engine.query_feedback("a1")?, expected);
        assert_eq!(store.by_uid("a1")?, Some(record));

        Ok(())
    }

    #[tokio::test]
    async fn unstored_strategy_gets_no_feedback() -> Result<()> {
        let beacon = FakeBeacon {
            head_slot: 2 * SLOTS_PER_EPOCH,
            targets: BTreeMap::from([(3, 0)]),
            ..FakeBeacon::default()
        };

        let Fixture { engine, .. } = fixture(beacon);

        let mut next_epoch = 0;
        engine.collect_rewards(&mut next_epoch).await?;

        let event = StrategyEndEvent {
            uid: "ghost".to_owned(),
            min_epoch: 0,
            max_epoch: 0,
        };

        engine
            .on_strategy_end(&event)
            .expect_err("strategy was never stored");

        assert!(matches!(
            engine.query_feedback("ghost"),
            Err(FeedbackError::NotFound(_)),
        ));

        Ok(())
    }

    struct ReadOnlyStore(MemoryStore);

    impl StrategyStore for ReadOnlyStore {
        fn insert(&self, record: StrategyRecord) -> Result<()> {
            self.0.insert(record)
        }

        fn by_uid(&self, uid: &str) -> Result<Option<StrategyRecord>> {
            self.0.by_uid(uid)
        }

        fn update(&self, record: StrategyRecord) -> Result<()> {
            bail!("cannot update strategy {}", record.uid)
        }
    }

    #[test]
    fn failed_update_leaves_feedback_unrecorded() -> Result<()> {
        let store = Arc::new(ReadOnlyStore(MemoryStore::default()));
        let strategies: Arc<dyn StrategyStore> = Arc::<ReadOnlyStore>::clone(&store);
        let rewards: Arc<dyn RewardStore> = Arc::new(MemoryStore::default());
        let (to_tracker_tx, _to_tracker_rx) = futures::channel::mpsc::unbounded();

        let engine = Engine::new(
            EngineConfig::default(),
            SlotClock::new(12, SLOTS_PER_EPOCH, 0)?,
            Arc::new(FakeBeacon::default()),
            strategies,
            rewards,
            to_tracker_tx,
        );

        engine.submit(&strategy("a1", "5", "return"))?;

        let event = StrategyEndEvent {
            uid: "a1".to_owned(),
            min_epoch: 0,
            max_epoch: 0,
        };

        engine
            .on_strategy_end(&event)
            .expect_err("update should fail");

        assert!(matches!(
            engine.query_feedback("a1"),
            Err(FeedbackError::NotFinished(_)),
        ));
        assert_eq!(
            store.by_uid("a1")?.map(|record| record.is_end),
            Some(false),
        );

        Ok(())
    }

    const NORMAL: i64 = lifecycle_tracker::NORMAL_TARGET_AMOUNT;

    #[tokio::test]
    async fn rewards_are_collected_two_epochs_behind_head() -> Result<()> {
        let beacon = FakeBeacon {
            head_slot: 5 * SLOTS_PER_EPOCH + 7,
            targets: BTreeMap::from([(1, NORMAL)]),
            ..FakeBeacon::default()
        };

        let Fixture { engine, store, .. } = fixture(beacon);

        let mut next_epoch = engine.first_uncollected_epoch()?;
        engine.collect_rewards(&mut next_epoch).await?;

        assert_eq!(next_epoch, 4);
        assert_eq!(store.latest_reward_epoch()?, Some(3));
        assert_eq!(store.rewards_at(3)?.len(), 1);
        assert_eq!(engine.first_uncollected_epoch()?, 4);

        engine.collect_rewards(&mut next_epoch).await?;

        assert_eq!(next_epoch, 4);

        Ok(())
    }

    #[tokio::test]
    async fn collection_catches_up_in_batches() -> Result<()> {
        let beacon = FakeBeacon {
            head_slot: 100 * SLOTS_PER_EPOCH,
            ..FakeBeacon::default()
        };

        let Fixture { engine, .. } = fixture(beacon);

        let mut next_epoch = 0;

        engine.collect_rewards(&mut next_epoch).await?;
        assert_eq!(next_epoch, 32);

        engine.collect_rewards(&mut next_epoch).await?;
        engine.collect_rewards(&mut next_epoch).await?;
        assert_eq!(next_epoch, 96);

        engine.collect_rewards(&mut next_epoch).await?;
        assert_eq!(next_epoch, 99);

        Ok(())
    }

    #[tokio::test]
    async fn empty_slot_has_no_root() -> Result<()> {
        let beacon = FakeBeacon {
            roots: BTreeMap::from([(3, H256::repeat_byte(3))]),
            ..FakeBeacon::default()
        };

        let Fixture { engine, .. } = fixture(beacon);

        assert_eq!(engine.slot_root(3).await?, H256::repeat_byte(3));

        engine.slot_root(4).await.expect_err("slot 4 is empty");

        Ok(())
    }
}
