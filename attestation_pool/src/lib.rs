pub use crate::{
    attestation_packer::{AttestationPacker, DEFAULT_MAX_ATTESTATIONS},
    misc::AggregationError,
    pool::{AttestationPool, PooledAttestations, SignedAttestationLog},
};

mod attestation_packer;
mod misc;
mod pool;
