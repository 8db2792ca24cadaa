use core::mem;
use std::collections::BTreeMap;

use parking_lot::Mutex;
use strategy_types::{Attestation, Slot};

/// Pending attestations keyed by slot and then by the signer's public key.
pub type PooledAttestations = BTreeMap<Slot, BTreeMap<String, Attestation>>;

/// Attestations signed by attacker validators, waiting to be packed into a block.
#[derive(Default)]
pub struct AttestationPool {
    attestations: Mutex<PooledAttestations>,
}

impl AttestationPool {
    /// Replaces any attestation previously added for the same slot and public key.
    pub fn add(&self, slot: Slot, pubkey: impl Into<String>, attestation: Attestation) {
        self.attestations
            .lock()
            .entry(slot)
            .or_default()
            .insert(pubkey.into(), attestation);
    }

    #[must_use]
    pub fn snapshot(&self) -> PooledAttestations {
        self.attestations.lock().clone()
    }

    /// Empties the pool and returns everything that was in it.
    ///
    /// Every attestation added concurrently ends up either in the returned map or in the pool,
    /// never in both.
    #[must_use]
    pub fn take(&self) -> PooledAttestations {
        mem::take(&mut *self.attestations.lock())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attestations.lock().values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attestations.lock().is_empty()
    }
}

/// Audit trail of signed attestations.
#[derive(Default)]
pub struct SignedAttestationLog {
    attestations: Mutex<BTreeMap<Slot, Vec<(String, Attestation)>>>,
}

impl SignedAttestationLog {
    pub fn record(&self, slot: Slot, pubkey: impl Into<String>, attestation: Attestation) {
        self.attestations
            .lock()
            .entry(slot)
            .or_default()
            .push((pubkey.into(), attestation));
    }

    #[must_use]
    pub fn at_slot(&self, slot: Slot) -> Vec<(String, Attestation)> {
        self.attestations
            .lock()
            .get(&slot)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attestations.lock().values().map(Vec::len).sum()
    }
}
