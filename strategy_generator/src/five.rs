use core::ops::RangeInclusive;
use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use itertools::Itertools as _;
use slot_clock::SlotClock;
use strategy_types::{InjectionPoint, ProposerDuty, SlotStrategy, ValidatorIndex};
use tokio_util::sync::CancellationToken;

use crate::{attacker::LibraryParams, duty_watcher, library_strategy::LibraryStrategy};

/// Builds the third block of every attacker-honest-attacker proposer triple on top of the first,
/// orphaning the honest block in between.
pub struct Five;

#[async_trait]
impl LibraryStrategy for Five {
    fn name(&self) -> &'static str {
        "five"
    }

    fn description(&self) -> &'static str {
        "Looks for two attacker proposers with one honest proposer between them in the next \
         epoch and makes the second attacker block point to the first attacker block as its parent."
    }

    async fn run(&self, cancel: CancellationToken, params: &LibraryParams) -> Result<()> {
        duty_watcher::plan_next_epochs(self.name(), plan, cancel, params).await
    }
}

fn plan(
    _clock: SlotClock,
    malicious: &RangeInclusive<ValidatorIndex>,
    duties: &[ProposerDuty],
) -> Vec<SlotStrategy> {
    let is_malicious = |duty: &ProposerDuty| malicious.contains(&duty.validator_index);

    duties
        .iter()
        .tuple_windows()
        .filter(|(first, honest, third)| {
            is_malicious(first) && !is_malicious(honest) && is_malicious(third)
        })
        .map(|(first, _, third)| SlotStrategy {
            slot: third.slot.to_string(),
            level: 1,
            actions: BTreeMap::from([(
                InjectionPoint::BlockGetNewParentRoot.to_string(),
                format!("modifyParentRoot:{}", first.slot),
            )]),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duties(proposers: &[ValidatorIndex]) -> Vec<ProposerDuty> {
        (64..)
            .zip(proposers)
            .map(|(slot, validator_index)| ProposerDuty {
                pubkey: format!("0x{validator_index:02x}"),
                validator_index: *validator_index,
                slot,
            })
            .collect()
    }

    #[test]
    fn third_block_of_each_triple_is_reparented() -> Result<()> {
        let clock = SlotClock::new(12, 32, 0)?;

        // Attackers are 0..=9.
        let slots = plan(clock, &(0..=9), &duties(&[1, 20, 2, 30, 3, 40, 41, 4]));

        assert_eq!(
            slots,
            [
                SlotStrategy {
                    slot: "66".to_owned(),
                    level: 1,
                    actions: BTreeMap::from([(
                        "BlockGetNewParentRoot".to_owned(),
                        "modifyParentRoot:64".to_owned(),
                    )]),
                },
                SlotStrategy {
                    slot: "68".to_owned(),
                    level: 1,
                    actions: BTreeMap::from([(
                        "BlockGetNewParentRoot".to_owned(),
                        "modifyParentRoot:66".to_owned(),
                    )]),
                },
            ],
        );

        Ok(())
    }

    #[test]
    fn honest_epoch_yields_nothing() -> Result<()> {
        let clock = SlotClock::new(12, 32, 0)?;

        assert!(plan(clock, &(0..=9), &duties(&[10, 11, 12, 1, 13])).is_empty());

        Ok(())
    }
}
