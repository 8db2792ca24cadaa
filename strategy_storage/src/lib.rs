//! Persistence seams. [`MemoryStore`] keeps everything in memory for the lifetime of the process.

use std::collections::BTreeMap;

use anyhow::Result;
use parking_lot::RwLock;
use serde::Serialize;
use strategy_types::{AttestReward, Epoch, FeedBackInfo, Strategy};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("strategy {0} already exists")]
    DuplicateUid(String),
    #[error("strategy {0} does not exist")]
    UnknownUid(String),
}

#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct StrategyRecord {
    pub uid: String,
    pub category: String,
    pub content: Strategy,
    pub is_end: bool,
    pub min_epoch: Option<Epoch>,
    pub max_epoch: Option<Epoch>,
    pub feedback: Option<FeedBackInfo>,
    /// Validators that did not get the target reward their side was expected to get, summed
    /// over every epoch of the strategy.
    pub impact_validator_count: Option<u64>,
}

impl StrategyRecord {
    #[must_use]
    pub fn new(strategy: &Strategy) -> Self {
        Self {
            uid: strategy.uid.clone(),
            category: strategy.category.clone(),
            content: strategy.clone(),
            is_end: false,
            min_epoch: None,
            max_epoch: None,
            feedback: None,
            impact_validator_count: None,
        }
    }

    /// The only update a record receives after creation.
    pub fn finish(
        &mut self,
        min_epoch: Epoch,
        max_epoch: Epoch,
        feedback: FeedBackInfo,
        impact_validator_count: u64,
    ) {
        self.is_end = true;
        self.min_epoch = Some(min_epoch);
        self.max_epoch = Some(max_epoch);
        self.feedback = Some(feedback);
        self.impact_validator_count = Some(impact_validator_count);
    }
}

pub trait StrategyStore: Send + Sync {
    /// Fails with [`StorageError::DuplicateUid`] if the uid is taken.
    fn insert(&self, record: StrategyRecord) -> Result<()>;

    fn by_uid(&self, uid: &str) -> Result<Option<StrategyRecord>>;

    fn update(&self, record: StrategyRecord) -> Result<()>;
}

pub trait RewardStore: Send + Sync {
    fn insert_rewards(&self, epoch: Epoch, rewards: Vec<AttestReward>) -> Result<()>;

    /// Latest epoch with stored rewards. This is the safe epoch for feedback.
    fn latest_reward_epoch(&self) -> Result<Option<Epoch>>;

    fn rewards_at(&self, epoch: Epoch) -> Result<Vec<AttestReward>>;
}

#[derive(Default)]
pub struct MemoryStore {
    strategies: RwLock<BTreeMap<String, StrategyRecord>>,
    rewards: RwLock<BTreeMap<Epoch, Vec<AttestReward>>>,
}

impl StrategyStore for MemoryStore {
    fn insert(&self, record: StrategyRecord) -> Result<()> {
        let mut strategies = self.strategies.write();

        if strategies.contains_key(&record.uid) {
            return Err(StorageError::DuplicateUid(record.uid).into());
        }

        strategies.insert(record.uid.clone(), record);

        Ok(())
    }

    fn by_uid(&self, uid: &str) -> Result<Option<StrategyRecord>> {
        Ok(self.strategies.read().get(uid).cloned())
    }

    fn update(&self, record: StrategyRecord) -> Result<()> {
        let mut strategies = self.strategies.write();

        let Some(existing) = strategies.get_mut(&record.uid) else {
            return Err(StorageError::UnknownUid(record.uid).into());
        };

        *existing = record;

        Ok(())
    }
}

impl RewardStore for MemoryStore {
    fn insert_rewards(&self, epoch: Epoch, mut rewards: Vec<AttestReward>) -> Result<()> {
        for reward in &mut rewards {
            reward.epoch = epoch;
        }

        self.rewards.write().insert(epoch, rewards);

        Ok(())
    }

    fn latest_reward_epoch(&self) -> Result<Option<Epoch>> {
        Ok(self.rewards.read().keys().next_back().copied())
    }

    fn rewards_at(&self, epoch: Epoch) -> Result<Vec<AttestReward>> {
        Ok(self
            .rewards
            .read()
            .get(&epoch)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy(uid: &str) -> Strategy {
        Strategy {
            uid: uid.to_owned(),
            category: "test".to_owned(),
            ..Strategy::default()
        }
    }

    #[test]
    fn duplicate_uids_are_rejected() -> Result<()> {
        let store = MemoryStore::default();

        store.insert(StrategyRecord::new(&strategy("a")))?;

        let error = store
            .insert(StrategyRecord::new(&strategy("a")))
            .expect_err("second insert should fail");

        assert!(matches!(
            error.downcast_ref(),
            Some(StorageError::DuplicateUid(uid)) if uid == "a",
        ));

        Ok(())
    }

    #[test]
    fn finished_records_can_be_updated() -> Result<()> {
        let store = MemoryStore::default();
        let mut record = StrategyRecord::new(&strategy("b"));

        store.insert(record.clone())?;

        record.finish(2, 4, FeedBackInfo::default(), 7);
        store.update(record.clone())?;

        assert_eq!(store.by_uid("b")?, Some(record));
        assert_eq!(store.by_uid("c")?, None);
        store
            .update(StrategyRecord::new(&strategy("c")))
            .expect_err("unknown records cannot be updated");

        Ok(())
    }

    #[test]
    fn latest_reward_epoch_is_the_highest_stored() -> Result<()> {
        let store = MemoryStore::default();

        assert_eq!(store.latest_reward_epoch()?, None);

        let reward = AttestReward {
            epoch: 0,
            validator_index: 3,
            head: 1,
            target: 2,
            source: 3,
        };

        store.insert_rewards(7, vec![reward])?;
        store.insert_rewards(5, vec![])?;

        assert_eq!(store.latest_reward_epoch()?, Some(7));
        assert_eq!(store.rewards_at(7)?[0].epoch, 7);
        assert!(store.rewards_at(6)?.is_empty());

        Ok(())
    }
}
