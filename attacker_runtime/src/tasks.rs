use core::{pin::pin, time::Duration};
use std::sync::Arc;

use action_engine::Backend as _;
use anyhow::Result;
use futures::{StreamExt as _, channel::mpsc::UnboundedReceiver, future::FutureExt as _, select};
use log::{debug, warn};
use strategy_types::StrategyEndEvent;
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;

use crate::engine::Engine;

pub async fn run_feedback_handler(
    engine: Arc<Engine>,
    mut end_rx: UnboundedReceiver<StrategyEndEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut cancelled = pin!(cancel.cancelled().fuse());

    loop {
        select! {
            () = cancelled => break Ok(()),

            event = end_rx.select_next_some() => {
                if let Err(error) = engine.on_strategy_end(&event) {
                    warn!("unable to record feedback for strategy {}: {error:?}", event.uid);
                }
            }
        }
    }
}

pub async fn run_reward_collector(
    engine: Arc<Engine>,
    interval: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let mut next_epoch = engine.first_uncollected_epoch()?;
    let mut ticks = IntervalStream::new(tokio::time::interval(interval)).fuse();
    let mut cancelled = pin!(cancel.cancelled().fuse());

    loop {
        select! {
            () = cancelled => {
                debug!("reward collector stopped before epoch {next_epoch}");
                break Ok(());
            }

            _ = ticks.select_next_some() => {
                if let Err(error) = engine.collect_rewards(&mut next_epoch).await {
                    warn!("unable to collect rewards for epoch {next_epoch}: {error:?}");
                }
            }
        }
    }
}

/// Advances the slot watermark with the wall clock so that slot-driven tasks make progress
/// between checkpoint calls.
pub async fn run_slot_ticker(engine: Arc<Engine>, cancel: CancellationToken) -> Result<()> {
    let mut slots = pin!(engine.clock().slots()?.fuse());
    let mut cancelled = pin!(cancel.cancelled().fuse());

    loop {
        select! {
            () = cancelled => break Ok(()),

            slot = slots.select_next_some() => {
                let slot = slot?;

                debug!("slot {slot} started");

                engine.slot_watermark().record(slot);
            }
        }
    }
}
