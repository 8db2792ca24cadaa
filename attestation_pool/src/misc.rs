use std::collections::BTreeMap;

use blst::{
    min_pk::{AggregateSignature, Signature},
    BLST_ERROR,
};
use strategy_types::{Attestation, AttestationData, SignatureBytes};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("invalid signature: {0:?}")]
    InvalidSignature(BLST_ERROR),
    #[error("attestations with different data cannot be aggregated")]
    DataMismatch,
    #[error("attestations with overlapping bits cannot be aggregated")]
    Overlap,
}

/// Groups attestations by data, preserving the order within each group.
pub fn group_by_data(
    attestations: impl IntoIterator<Item = Attestation>,
) -> BTreeMap<AttestationData, Vec<Attestation>> {
    let mut groups = BTreeMap::<_, Vec<_>>::new();

    for attestation in attestations {
        groups.entry(attestation.data).or_default().push(attestation);
    }

    groups
}

/// Removes attestations whose bits are a strict subset of another attestation with the same data.
/// Of several attestations with identical bits only the first is kept.
pub fn dedup(attestations: impl IntoIterator<Item = Attestation>) -> Vec<Attestation> {
    group_by_data(attestations)
        .into_values()
        .flat_map(|group| {
            let redundant = group
                .iter()
                .enumerate()
                .map(|(index, candidate)| {
                    group.iter().enumerate().any(|(other_index, other)| {
                        let bits = &candidate.aggregation_bits;
                        let other_bits = &other.aggregation_bits;

                        index != other_index
                            && bits.is_subset_of(other_bits)
                            && (bits != other_bits || other_index < index)
                    })
                })
                .collect::<Vec<_>>();

            group
                .into_iter()
                .zip(redundant)
                .filter_map(|(attestation, redundant)| (!redundant).then_some(attestation))
        })
        .collect()
}

pub fn aggregate_into(
    target: &mut Attestation,
    other: &Attestation,
) -> Result<(), AggregationError> {
    if target.data != other.data {
        return Err(AggregationError::DataMismatch);
    }

    if !target.aggregation_bits.is_disjoint(&other.aggregation_bits) {
        return Err(AggregationError::Overlap);
    }

    target.signature = aggregate_signatures(&target.signature, &other.signature)?;
    target.aggregation_bits.union_with(&other.aggregation_bits);

    Ok(())
}

fn aggregate_signatures(
    first: &SignatureBytes,
    second: &SignatureBytes,
) -> Result<SignatureBytes, AggregationError> {
    let first =
        Signature::from_bytes(first.as_bytes()).map_err(AggregationError::InvalidSignature)?;
    let second =
        Signature::from_bytes(second.as_bytes()).map_err(AggregationError::InvalidSignature)?;

    let mut aggregate = AggregateSignature::from_signature(&first);

    aggregate
        .add_signature(&second, true)
        .map_err(AggregationError::InvalidSignature)?;

    Ok(aggregate.to_signature().to_bytes().into())
}
