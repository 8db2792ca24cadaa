//! Conversions between wall-clock time and slots, and a [`Stream`] of slot starts.
//!
//! Chain parameters are supplied once at startup. Slot numbering starts at 0 at genesis.
//! Times before genesis map to slot 0.
//!
//! The slot stream is implemented with [`Interval`], which works with opaque [`Instant`]s.
//! The `Instant` and [`SystemTime`] sampled when the stream is created are assumed to describe
//! the same moment. The resulting error is negligible next to clock differences between nodes.
//!
//! [`Instant`]:  tokio::time::Instant
//! [`Interval`]: tokio::time::Interval

use core::{
    num::NonZeroU64,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use std::time::{Instant, SystemTime, SystemTimeError};

use anyhow::Result;
use futures::stream::{Stream, StreamExt as _};
use strategy_types::{Epoch, Slot, UnixSeconds};
use thiserror::Error;
use tokio_stream::wrappers::IntervalStream;

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum ClockError {
    #[error("seconds per slot must be positive")]
    ZeroSecondsPerSlot,
    #[error("slots per epoch must be positive")]
    ZeroSlotsPerEpoch,
    #[error("time of next slot overflowed")]
    NextInstantOverflow,
    #[error("ran out of slots")]
    RanOutOfSlots,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SlotClock {
    seconds_per_slot: NonZeroU64,
    slots_per_epoch: NonZeroU64,
    genesis_time: UnixSeconds,
}

impl SlotClock {
    pub fn new(
        seconds_per_slot: u64,
        slots_per_epoch: u64,
        genesis_time: UnixSeconds,
    ) -> Result<Self, ClockError> {
        Ok(Self {
            seconds_per_slot: NonZeroU64::new(seconds_per_slot)
                .ok_or(ClockError::ZeroSecondsPerSlot)?,
            slots_per_epoch: NonZeroU64::new(slots_per_epoch)
                .ok_or(ClockError::ZeroSlotsPerEpoch)?,
            genesis_time,
        })
    }

    #[must_use]
    pub const fn seconds_per_slot(self) -> u64 {
        self.seconds_per_slot.get()
    }

    #[must_use]
    pub const fn slots_per_epoch(self) -> u64 {
        self.slots_per_epoch.get()
    }

    #[must_use]
    pub const fn genesis_time(self) -> UnixSeconds {
        self.genesis_time
    }

    #[must_use]
    pub const fn slot_duration(self) -> Duration {
        Duration::from_secs(self.seconds_per_slot.get())
    }

    #[must_use]
    pub const fn epoch_at_slot(self, slot: Slot) -> Epoch {
        slot / self.slots_per_epoch.get()
    }

    #[must_use]
    pub const fn epoch_start_slot(self, epoch: Epoch) -> Slot {
        epoch.saturating_mul(self.slots_per_epoch.get())
    }

    #[must_use]
    pub const fn epoch_end_slot(self, epoch: Epoch) -> Slot {
        epoch
            .saturating_add(1)
            .saturating_mul(self.slots_per_epoch.get())
            .saturating_sub(1)
    }

    #[must_use]
    pub const fn slot_start_time(self, slot: Slot) -> UnixSeconds {
        self.genesis_time
            .saturating_add(slot.saturating_mul(self.seconds_per_slot.get()))
    }

    #[must_use]
    pub const fn slot_at_time(self, time: UnixSeconds) -> Slot {
        time.saturating_sub(self.genesis_time) / self.seconds_per_slot.get()
    }

    pub fn current_slot(self) -> Result<Slot, SystemTimeError> {
        since_unix_epoch().map(|duration| self.slot_at_time(duration.as_secs()))
    }

    pub fn current_epoch(self) -> Result<Epoch, SystemTimeError> {
        self.current_slot().map(|slot| self.epoch_at_slot(slot))
    }

    /// Yields every slot number when the slot starts, beginning with the next one.
    pub fn slots(self) -> Result<impl Stream<Item = Result<Slot>>> {
        let (mut next_slot, next_instant) =
            self.next_slot_with_instant(Instant::now(), since_unix_epoch()?)?;

        let interval = tokio::time::interval_at(next_instant.into(), self.slot_duration());

        Ok(IntervalStream::new(interval).map(move |_| {
            let current_slot = next_slot;
            next_slot = current_slot
                .checked_add(1)
                .ok_or(ClockError::RanOutOfSlots)?;
            Ok(current_slot)
        }))
    }

    fn next_slot_with_instant(
        self,
        now_instant: Instant,
        since_unix_epoch: Duration,
    ) -> Result<(Slot, Instant), ClockError> {
        let genesis = Duration::from_secs(self.genesis_time);

        let (next_slot, now_to_next_slot) = if since_unix_epoch <= genesis {
            (0, genesis - since_unix_epoch)
        } else {
            let since_genesis = since_unix_epoch - genesis;
            let current_slot = since_genesis.as_secs() / self.seconds_per_slot();
            let next_slot = current_slot
                .checked_add(1)
                .ok_or(ClockError::RanOutOfSlots)?;
            let genesis_to_next_slot = Duration::from_secs(next_slot * self.seconds_per_slot());

            (next_slot, genesis_to_next_slot - since_genesis)
        };

        let next_instant = now_instant
            .checked_add(now_to_next_slot)
            .ok_or(ClockError::NextInstantOverflow)?;

        Ok((next_slot, next_instant))
    }
}

pub fn since_unix_epoch() -> Result<Duration, SystemTimeError> {
    SystemTime::now().duration_since(SystemTime::UNIX_EPOCH)
}

/// Highest slot any checkpoint has been called for.
#[derive(Default, Debug)]
pub struct SlotWatermark(AtomicU64);

impl SlotWatermark {
    pub fn record(&self, slot: Slot) {
        self.0.fetch_max(slot, Ordering::AcqRel);
    }

    #[must_use]
    pub fn get(&self) -> Slot {
        self.0.load(Ordering::Acquire)
    }
}
