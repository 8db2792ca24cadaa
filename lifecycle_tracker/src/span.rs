use slot_clock::SlotClock;
use strategy_types::{Epoch, SlotSelector};

/// Stands in for the last epoch of a strategy with a [`SlotSelector::Deferred`] entry.
///
/// Kept well below [`Epoch::MAX`] so that adding a safety margin cannot overflow.
pub const UNBOUNDED_EPOCH: Epoch = (1 << 63) - 100;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EpochSpan {
    pub min: Epoch,
    pub max: Epoch,
}

impl EpochSpan {
    #[must_use]
    pub fn compute(selectors: &[SlotSelector], clock: SlotClock) -> Self {
        let mut min = UNBOUNDED_EPOCH;
        let mut max = 0;
        let mut deferred = false;

        for selector in selectors {
            match *selector {
                SlotSelector::Fixed(slot) => {
                    let epoch = clock.epoch_at_slot(slot);
                    min = min.min(epoch);
                    max = max.max(epoch);
                }
                SlotSelector::Deferred => deferred = true,
            }
        }

        if deferred {
            max = UNBOUNDED_EPOCH;
        }

        if min > max {
            core::mem::swap(&mut min, &mut max);
        }

        Self { min, max }
    }

    #[must_use]
    pub const fn is_unbounded(self) -> bool {
        self.max >= UNBOUNDED_EPOCH
    }

    #[must_use]
    pub const fn is_end(self, safe_epoch: Epoch, safety_margin: u64) -> bool {
        !self.is_unbounded() && safe_epoch >= self.max.saturating_add(safety_margin)
    }
}

pub struct TrackedStrategy {
    selectors: Vec<SlotSelector>,
    span: Option<EpochSpan>,
}

impl TrackedStrategy {
    #[must_use]
    pub const fn new(selectors: Vec<SlotSelector>) -> Self {
        Self {
            selectors,
            span: None,
        }
    }

    /// Computed on first use and cached afterwards.
    pub fn span(&mut self, clock: SlotClock) -> EpochSpan {
        let selectors = &self.selectors;
        *self
            .span
            .get_or_insert_with(|| EpochSpan::compute(selectors, clock))
    }
}
