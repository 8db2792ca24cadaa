use core::ops::RangeInclusive;

use anyhow::{Result, ensure};
use strategy_storage::RewardStore;
use strategy_types::{AttestReward, FeedBackInfo, StrategyEndEvent, ValidatorIndex};

use crate::span::UNBOUNDED_EPOCH;

/// Target reward of a validator that attested correctly and on time, in Gwei.
pub const NORMAL_TARGET_AMOUNT: i64 = 290_680;

/// Mean loss rate of honest and attacking validators in one epoch.
///
/// A validator's loss rate is the share of the normal target reward it did not receive.
/// Sides without any rewards have a loss rate of 0.
#[must_use]
#[expect(clippy::cast_precision_loss)]
#[expect(clippy::float_arithmetic)]
pub fn epoch_lose_rates(
    rewards: &[AttestReward],
    normal_target_amount: i64,
    attackers: &RangeInclusive<ValidatorIndex>,
) -> FeedBackInfo {
    let mut honest_sum = 0.0;
    let mut honest_count = 0_u64;
    let mut attacker_sum = 0.0;
    let mut attacker_count = 0_u64;

    for reward in rewards {
        let lose_rate = normal_target_amount.saturating_sub(reward.target) as f64
            / normal_target_amount as f64;

        if attackers.contains(&reward.validator_index) {
            attacker_sum += lose_rate;
            attacker_count += 1;
        } else {
            honest_sum += lose_rate;
            honest_count += 1;
        }
    }

    let mean = |sum: f64, count: u64| {
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    };

    FeedBackInfo {
        honest_lose_rate: mean(honest_sum, honest_count),
        attacker_lose_rate: mean(attacker_sum, attacker_count),
    }
}

/// Honest validators that missed part of the normal target reward plus attackers that did not.
#[must_use]
pub fn epoch_impact_count(
    rewards: &[AttestReward],
    normal_target_amount: i64,
    attackers: &RangeInclusive<ValidatorIndex>,
) -> u64 {
    rewards
        .iter()
        .filter(|reward| {
            let missed = reward.target < normal_target_amount;
            attackers.contains(&reward.validator_index) != missed
        })
        .count()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct StrategyScore {
    pub feedback: FeedBackInfo,
    pub impact_validator_count: u64,
}

/// Averages [`epoch_lose_rates`] and sums [`epoch_impact_count`] over every epoch the strategy
/// spans.
#[expect(clippy::cast_precision_loss)]
#[expect(clippy::float_arithmetic)]
pub fn strategy_feedback(
    rewards: &dyn RewardStore,
    event: &StrategyEndEvent,
    normal_target_amount: i64,
    attackers: &RangeInclusive<ValidatorIndex>,
) -> Result<StrategyScore> {
    ensure!(
        event.max_epoch < UNBOUNDED_EPOCH,
        "strategy {} has no last epoch",
        event.uid,
    );

    ensure!(
        normal_target_amount > 0,
        "normal target amount must be positive",
    );

    let mut total = FeedBackInfo::default();
    let mut impact_validator_count = 0_u64;

    for epoch in event.min_epoch..=event.max_epoch {
        let epoch_rewards = rewards.rewards_at(epoch)?;
        let rates = epoch_lose_rates(&epoch_rewards, normal_target_amount, attackers);

        total.honest_lose_rate += rates.honest_lose_rate;
        total.attacker_lose_rate += rates.attacker_lose_rate;

        impact_validator_count = impact_validator_count.saturating_add(epoch_impact_count(
            &epoch_rewards,
            normal_target_amount,
            attackers,
        ));
    }

    let epochs = (event.max_epoch.saturating_sub(event.min_epoch) + 1) as f64;

    Ok(StrategyScore {
        feedback: FeedBackInfo {
            honest_lose_rate: total.honest_lose_rate / epochs,
            attacker_lose_rate: total.attacker_lose_rate / epochs,
        },
        impact_validator_count,
    })
}

#[cfg(test)]
mod tests {
    use strategy_storage::MemoryStore;
    use test_case::test_case;

    use super::*;

    fn reward(validator_index: ValidatorIndex, target: i64) -> AttestReward {
        AttestReward {
            epoch: 0,
            validator_index,
            head: 0,
            target,
            source: 0,
        }
    }

    #[test]
    fn lose_rates_are_averaged_per_side() {
        let rewards = [
            reward(0, 0),
            reward(1, NORMAL_TARGET_AMOUNT),
            reward(2, NORMAL_TARGET_AMOUNT / 2),
            reward(3, NORMAL_TARGET_AMOUNT),
        ];

        let rates = epoch_lose_rates(&rewards, NORMAL_TARGET_AMOUNT, &(0..=1));

        assert!((rates.attacker_lose_rate - 0.5).abs() < 1e-9);
        assert!((rates.honest_lose_rate - 0.25).abs() < 1e-9);
    }

    #[test]
    fn empty_epoch_loses_nothing() {
        assert_eq!(
            epoch_lose_rates(&[], NORMAL_TARGET_AMOUNT, &(0..=9)),
            FeedBackInfo::default(),
        );
    }

    #[test_case(0, 0 => 0; "attacker that lost")]
    #[test_case(0, NORMAL_TARGET_AMOUNT => 1; "attacker that did not lose")]
    #[test_case(5, NORMAL_TARGET_AMOUNT - 1 => 1; "honest validator that lost")]
    #[test_case(5, NORMAL_TARGET_AMOUNT + 1 => 0; "honest validator that did not lose")]
    fn impact_depends_on_side(validator_index: ValidatorIndex, target: i64) -> u64 {
        epoch_impact_count(
            &[reward(validator_index, target)],
            NORMAL_TARGET_AMOUNT,
            &(0..=1),
        )
    }

    #[test]
    fn feedback_is_averaged_over_span() -> Result<()> {
        let store = MemoryStore::default();

        store.insert_rewards(4, vec![reward(0, 0), reward(5, NORMAL_TARGET_AMOUNT)])?;
        store.insert_rewards(5, vec![reward(0, NORMAL_TARGET_AMOUNT), reward(5, 0)])?;

        let event = StrategyEndEvent {
            uid: "x".to_owned(),
            min_epoch: 4,
            max_epoch: 5,
        };

        let StrategyScore {
            feedback,
            impact_validator_count,
        } = strategy_feedback(&store, &event, NORMAL_TARGET_AMOUNT, &(0..=1))?;

        assert!((feedback.attacker_lose_rate - 0.5).abs() < 1e-9);
        assert!((feedback.honest_lose_rate - 0.5).abs() < 1e-9);
        assert_eq!(impact_validator_count, 2);

        Ok(())
    }

    #[test]
    fn unbounded_strategies_have_no_feedback() {
        let event = StrategyEndEvent {
            uid: "y".to_owned(),
            min_epoch: 0,
            max_epoch: UNBOUNDED_EPOCH,
        };

        let error = strategy_feedback(
            &MemoryStore::default(),
            &event,
            NORMAL_TARGET_AMOUNT,
            &(0..=1),
        )
        .expect_err("unbounded span should be rejected");

        assert!(error.to_string().contains("no last epoch"));
    }
}
