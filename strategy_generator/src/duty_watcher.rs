use core::{ops::RangeInclusive, pin::pin, time::Duration};

use anyhow::Result;
use futures::{FutureExt as _, StreamExt as _, select};
use log::{debug, info, warn};
use slot_clock::SlotClock;
use strategy_types::{Epoch, ProposerDuty, SlotStrategy, Strategy, ValidatorIndex};
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::attacker::LibraryParams;

pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Turns the proposer duties of the next epoch, sorted by slot, into slot strategies.
pub type Planner =
    fn(SlotClock, &RangeInclusive<ValidatorIndex>, &[ProposerDuty]) -> Vec<SlotStrategy>;

/// Plans every epoch once, one epoch ahead, and submits whatever the planner produces.
/// Epochs whose duties cannot be fetched are retried on the next poll.
pub async fn plan_next_epochs(
    category: &'static str,
    planner: Planner,
    cancel: CancellationToken,
    params: &LibraryParams,
) -> Result<()> {
    let mut polls = IntervalStream::new(tokio::time::interval(POLL_INTERVAL)).fuse();
    let mut cancelled = pin!(cancel.cancelled().fuse());
    let mut planned_epoch = None;

    info!("started strategy {category}");

    loop {
        select! {
            () = cancelled => break,
            _ = polls.select_next_some() => {
                let clock = params.attacker.clock();
                let epoch = clock.epoch_at_slot(params.attacker.current_slot());

                if planned_epoch != Some(epoch)
                    && plan_epoch(category, planner, clock, params, epoch + 1).await
                {
                    planned_epoch = Some(epoch);
                }
            }
        }
    }

    info!("stopped strategy {category}");

    Ok(())
}

async fn plan_epoch(
    category: &'static str,
    planner: Planner,
    clock: SlotClock,
    params: &LibraryParams,
    epoch: Epoch,
) -> bool {
    let mut duties = match params.attacker.proposer_duties(epoch).await {
        Ok(duties) => duties,
        Err(error) => {
            warn!("{category} failed to get proposer duties for epoch {epoch}: {error:?}");
            return false;
        }
    };

    duties.sort_by_key(|duty| duty.slot);

    let slots = planner(clock, &params.malicious_validators, &duties);

    if slots.is_empty() {
        debug!("{category} found no opportunity in epoch {epoch}");
        return true;
    }

    let strategy = Strategy {
        uid: Uuid::new_v4().to_string(),
        category: category.to_owned(),
        slots,
        validators: vec![],
    };

    let uid = strategy.uid.clone();

    match params.attacker.submit_strategy(strategy).await {
        Ok(()) => info!("{category} submitted strategy {uid} for epoch {epoch}"),
        Err(error) => warn!("{category} failed to submit strategy for epoch {epoch}: {error:?}"),
    }

    true
}
