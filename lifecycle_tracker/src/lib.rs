//! Tracks submitted strategies until their effects are fully visible in stored rewards.
//!
//! The tracker owns its map of strategies. Other tasks reach it through [`ToTracker`] messages.
//! On every tick it compares each strategy's [`EpochSpan`] with the latest epoch that has
//! rewards stored and emits a [`StrategyEndEvent`] once the span is safely behind it.

use core::{pin::pin, time::Duration};
use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use futures::{
    StreamExt as _,
    channel::mpsc::{UnboundedReceiver, UnboundedSender},
    future::FutureExt as _,
    select,
};
use itertools::Itertools as _;
use log::{debug, info, warn};
use slot_clock::SlotClock;
use strategy_storage::RewardStore;
use strategy_types::{Epoch, SlotSelector, StrategyEndEvent};
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;

pub use crate::{
    feedback::{
        NORMAL_TARGET_AMOUNT, StrategyScore, epoch_impact_count, epoch_lose_rates,
        strategy_feedback,
    },
    messages::ToTracker,
    span::{EpochSpan, TrackedStrategy, UNBOUNDED_EPOCH},
};

mod feedback;
mod messages;
mod span;

pub const DEFAULT_SAFETY_MARGIN: u64 = 3;
pub const DEFAULT_TICK: Duration = Duration::from_secs(10);

pub struct LifecycleTracker {
    clock: SlotClock,
    rewards: Arc<dyn RewardStore>,
    safety_margin: u64,
    tick: Duration,
    strategies: BTreeMap<String, TrackedStrategy>,
    to_tracker_rx: UnboundedReceiver<ToTracker>,
    end_tx: UnboundedSender<StrategyEndEvent>,
}

impl LifecycleTracker {
    #[must_use]
    pub fn new(
        clock: SlotClock,
        rewards: Arc<dyn RewardStore>,
        safety_margin: u64,
        tick: Duration,
        to_tracker_rx: UnboundedReceiver<ToTracker>,
        end_tx: UnboundedSender<StrategyEndEvent>,
    ) -> Self {
        Self {
            clock,
            rewards,
            safety_margin,
            tick,
            strategies: BTreeMap::new(),
            to_tracker_rx,
            end_tx,
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let mut ticks = IntervalStream::new(tokio::time::interval(self.tick)).fuse();
        let mut cancelled = pin!(cancel.cancelled().fuse());

        loop {
            select! {
                () = cancelled => {
                    debug!("lifecycle tracker stopped with {} strategies", self.strategies.len());
                    break Ok(());
                }

                message = self.to_tracker_rx.select_next_some() => match message {
                    ToTracker::Track { uid, selectors } => self.track(uid, selectors),
                },

                _ = ticks.select_next_some() => self.check(),
            }
        }
    }

    fn track(&mut self, uid: String, selectors: Vec<SlotSelector>) {
        debug!("tracking strategy {uid}");

        if self
            .strategies
            .insert(uid.clone(), TrackedStrategy::new(selectors))
            .is_some()
        {
            warn!("strategy {uid} was already tracked");
        }
    }

    fn check(&mut self) {
        let safe_epoch = match self.rewards.latest_reward_epoch() {
            Ok(Some(epoch)) => epoch,
            Ok(None) => return,
            Err(error) => {
                warn!("unable to load safe epoch: {error:?}");
                return;
            }
        };

        for event in self.ended(safe_epoch) {
            self.strategies.remove(&event.uid);

            info!(
                "strategy {} ended (epochs {}..={}, safe epoch {safe_epoch})",
                event.uid, event.min_epoch, event.max_epoch,
            );

            if self.end_tx.unbounded_send(event).is_err() {
                debug!("send of strategy end event failed because the receiver was dropped");
            }
        }
    }

    fn ended(&mut self, safe_epoch: Epoch) -> Vec<StrategyEndEvent> {
        let clock = self.clock;
        let safety_margin = self.safety_margin;

        self.strategies
            .iter_mut()
            .filter_map(|(uid, tracked)| {
                let span = tracked.span(clock);

                span.is_end(safe_epoch, safety_margin)
                    .then(|| StrategyEndEvent {
                        uid: uid.clone(),
                        min_epoch: span.min,
                        max_epoch: span.max,
                    })
            })
            .collect_vec()
    }
}
