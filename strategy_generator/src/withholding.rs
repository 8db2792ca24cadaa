use core::ops::RangeInclusive;
use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use slot_clock::SlotClock;
use strategy_types::{InjectionPoint, ProposerDuty, SlotStrategy, ValidatorIndex};
use tokio_util::sync::CancellationToken;

use crate::{attacker::LibraryParams, duty_watcher, library_strategy::LibraryStrategy};

const MIN_RUN_LENGTH: usize = 5;
const RELEASE_SLOT_OFFSET: u64 = 8;
const RELEASE_LEAD_MILLIS: u64 = 3000;
const RELEASE_STEP_MILLIS: u64 = 100;

/// Withholds a run of consecutive attacker blocks at the end of an epoch and releases them
/// together shortly before slot `epoch_end + 8`.
pub struct Withholding;

#[async_trait]
impl LibraryStrategy for Withholding {
    fn name(&self) -> &'static str {
        "withholding"
    }

    fn description(&self) -> &'static str {
        "Looks for at least five consecutive attacker proposers ending at an epoch boundary and \
         delays broadcasting their blocks until just before the eighth slot of the next epoch."
    }

    async fn run(&self, cancel: CancellationToken, params: &LibraryParams) -> Result<()> {
        duty_watcher::plan_next_epochs(self.name(), plan, cancel, params).await
    }
}

fn plan(
    clock: SlotClock,
    malicious: &RangeInclusive<ValidatorIndex>,
    duties: &[ProposerDuty],
) -> Vec<SlotStrategy> {
    // Only the last run is withheld.
    let Some(run) = withholdable_runs(clock, malicious, duties).pop() else {
        return vec![];
    };

    let Some(first_slot) = run.first().map(|duty| duty.slot) else {
        return vec![];
    };

    run.iter()
        .map(|duty| {
            let epoch_end = clock.epoch_end_slot(clock.epoch_at_slot(duty.slot));
            let release_slot = epoch_end.saturating_add(RELEASE_SLOT_OFFSET);
            let release_time = clock
                .slot_start_time(release_slot)
                .saturating_mul(1000)
                .saturating_sub(RELEASE_LEAD_MILLIS)
                .saturating_add(RELEASE_STEP_MILLIS * (duty.slot - first_slot));

            SlotStrategy {
                slot: duty.slot.to_string(),
                level: 1,
                actions: BTreeMap::from([(
                    InjectionPoint::BlockBeforeBroadCast.to_string(),
                    format!("delayToMilliTime:{release_time}"),
                )]),
            }
        })
        .collect()
}

fn withholdable_runs<'duties>(
    clock: SlotClock,
    malicious: &RangeInclusive<ValidatorIndex>,
    duties: &'duties [ProposerDuty],
) -> Vec<&'duties [ProposerDuty]> {
    duties
        .split(|duty| !malicious.contains(&duty.validator_index))
        .filter(|run| run.len() >= MIN_RUN_LENGTH)
        .filter(|run| {
            run.last().is_some_and(|last| {
                last.slot == clock.epoch_end_slot(clock.epoch_at_slot(last.slot))
            })
        })
        .collect()
}
