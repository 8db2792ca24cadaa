use core::cmp::Reverse;
use std::collections::BTreeMap;

use itertools::Itertools as _;
use log::{debug, warn};
use slot_clock::SlotClock;
use strategy_types::{AggregationBits, Attestation, CommitteeIndex, Slot};

use crate::{misc, pool::PooledAttestations};

pub const DEFAULT_MAX_ATTESTATIONS: usize = 128;

/// Selects the attestations to embed in a block built by an attacker validator.
///
/// This is a greedy approximation of maximum coverage. The exact grouping and tie-breaking order
/// matters more than optimality.
#[derive(Clone, Copy, Debug)]
pub struct AttestationPacker {
    clock: SlotClock,
    max_attestations: usize,
}

impl AttestationPacker {
    #[must_use]
    pub const fn new(clock: SlotClock, max_attestations: usize) -> Self {
        Self {
            clock,
            max_attestations,
        }
    }

    #[must_use]
    pub const fn max_attestations(&self) -> usize {
        self.max_attestations
    }

    /// Pooled attestations outside the previous and current epoch of `block_slot` are dropped.
    #[must_use]
    pub fn pack(
        &self,
        block_slot: Slot,
        block_attestations: Vec<Attestation>,
        pool: PooledAttestations,
    ) -> Vec<Attestation> {
        let epoch = self.clock.epoch_at_slot(block_slot);
        let window_start = self.clock.epoch_start_slot(epoch.saturating_sub(1));
        let window_end = self.clock.epoch_end_slot(epoch);

        let pooled = pool
            .range(window_start..=window_end)
            .flat_map(|(_, by_pubkey)| by_pubkey.values().cloned())
            .collect_vec();

        let block_count = block_attestations.len();
        let pooled_count = pooled.len();

        let deduplicated = misc::dedup(block_attestations.into_iter().chain(pooled));
        let aggregated = misc::dedup(aggregate(deduplicated));
        let mut packed = sort_by_profitability(aggregated);

        packed.truncate(self.max_attestations);

        debug!(
            "packed {} attestations for block at slot {block_slot} \
             (from block: {block_count}, from pool: {pooled_count}, \
             window: {window_start}..={window_end})",
            packed.len(),
        );

        packed
    }
}

// Within each group, attestations with more bits are merged first.
fn aggregate(attestations: Vec<Attestation>) -> Vec<Attestation> {
    misc::group_by_data(attestations)
        .into_values()
        .flat_map(|group| {
            let mut aggregates = Vec::<Attestation>::new();

            let sorted = group
                .into_iter()
                .sorted_by_key(|attestation| Reverse(attestation.aggregation_bits.count_ones()));

            for attestation in sorted {
                let merged = aggregates
                    .iter_mut()
                    .filter(|aggregate| {
                        aggregate
                            .aggregation_bits
                            .is_disjoint(&attestation.aggregation_bits)
                    })
                    .any(|aggregate| match misc::aggregate_into(aggregate, &attestation) {
                        Ok(()) => true,
                        Err(error) => {
                            warn!("keeping attestation separate: {error}");
                            false
                        }
                    });

                if !merged {
                    aggregates.push(attestation);
                }
            }

            aggregates
        })
        .collect()
}

// Newer slots first. Within a slot, committees take turns. Each turn contributes the next entry in
// every committee's max cover order, with entries in a turn ordered by bit count.
fn sort_by_profitability(attestations: Vec<Attestation>) -> Vec<Attestation> {
    let mut by_slot = BTreeMap::<Reverse<Slot>, BTreeMap<CommitteeIndex, Vec<_>>>::new();

    for attestation in attestations {
        by_slot
            .entry(Reverse(attestation.data.slot))
            .or_default()
            .entry(attestation.data.index)
            .or_default()
            .push(attestation);
    }

    by_slot
        .into_values()
        .flat_map(|by_committee| {
            let mut committees = by_committee
                .into_values()
                .map(|committee| max_cover_order(committee).into_iter())
                .collect_vec();

            let mut ordered = vec![];

            loop {
                let round = committees.iter_mut().filter_map(Iterator::next).collect_vec();

                if round.is_empty() {
                    break ordered;
                }

                ordered.extend(round.into_iter().sorted_by_key(|attestation| {
                    Reverse(attestation.aggregation_bits.count_ones())
                }));
            }
        })
        .collect()
}

fn max_cover_order(candidates: Vec<Attestation>) -> Vec<Attestation> {
    let mut remaining = candidates
        .into_iter()
        .sorted_by_key(|attestation| Reverse(attestation.aggregation_bits.count_ones()))
        .collect_vec();

    let committee_size = remaining
        .iter()
        .map(|attestation| attestation.aggregation_bits.len())
        .max()
        .unwrap_or_default();

    let mut covered = AggregationBits::with_len(committee_size);
    let mut selected = vec![];

    loop {
        // `max_by_key` returns the last maximum, so search in reverse to prefer earlier entries.
        let best = remaining
            .iter()
            .enumerate()
            .rev()
            .map(|(index, attestation)| {
                (index, attestation.aggregation_bits.count_uncovered(&covered))
            })
            .max_by_key(|(_, uncovered)| *uncovered);

        match best {
            Some((index, uncovered)) if uncovered > 0 => {
                let attestation = remaining.remove(index);
                covered.union_with(&attestation.aggregation_bits);
                selected.push(attestation);
            }
            _ => break,
        }
    }

    selected.sort_by_key(|attestation| Reverse(attestation.aggregation_bits.count_ones()));
    selected.extend(remaining);
    selected
}
