use core::fmt::{Debug, Formatter, Result as FmtResult};

use bitvec::{order::Lsb0, vec::BitVec};
use derive_more::From;
use ethereum_types::H256;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

use crate::{
    primitives::{CommitteeIndex, Epoch, Slot, ValidatorIndex},
    string_or_native,
};

pub const SIGNATURE_SIZE: usize = 96;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Checkpoint {
    pub epoch: Epoch,
    pub root: H256,
}

/// The full value is the identity used to group attestations for deduplication and aggregation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AttestationData {
    pub slot: Slot,
    pub index: CommitteeIndex,
    pub beacon_block_root: H256,
    pub source: Checkpoint,
    pub target: Checkpoint,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Attestation {
    pub aggregation_bits: AggregationBits,
    pub data: AttestationData,
    pub signature: SignatureBytes,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BeaconBlockBody {
    pub randao_reveal: SignatureBytes,
    pub graffiti: H256,
    pub attestations: Vec<Attestation>,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BeaconBlock {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: H256,
    pub state_root: H256,
    pub body: BeaconBlockBody,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SignedBeaconBlock {
    pub message: BeaconBlock,
    pub signature: SignatureBytes,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct ProposerDuty {
    pub pubkey: String,
    #[serde(with = "string_or_native")]
    pub validator_index: ValidatorIndex,
    #[serde(with = "string_or_native")]
    pub slot: Slot,
}

/// Attestation reward of one validator for one epoch, in Gwei.
/// Penalties make the amounts negative.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct AttestReward {
    #[serde(default)]
    pub epoch: Epoch,
    #[serde(with = "string_or_native")]
    pub validator_index: ValidatorIndex,
    #[serde(with = "string_or_native")]
    pub head: i64,
    #[serde(with = "string_or_native")]
    pub target: i64,
    #[serde(with = "string_or_native")]
    pub source: i64,
}

/// Committee participation bits.
///
/// Serialized as a string of `0` and `1` characters, first validator first.
#[derive(Clone, PartialEq, Eq, Hash, Default, Debug)]
pub struct AggregationBits(BitVec<u8, Lsb0>);

impl AggregationBits {
    #[must_use]
    pub fn with_len(len: usize) -> Self {
        Self(BitVec::repeat(false, len))
    }

    #[must_use]
    pub fn from_indices(len: usize, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut bits = Self::with_len(len);

        for index in indices {
            bits.set(index, true);
        }

        bits
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.0.count_ones()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        self.0.get(index).is_some_and(|bit| *bit)
    }

    /// Out of range indices are ignored.
    pub fn set(&mut self, index: usize, value: bool) {
        if index < self.0.len() {
            self.0.set(index, value);
        }
    }

    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter_ones()
    }

    /// Bit lists of different lengths describe different committees and are never subsets.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.len() == other.len() && self.ones().all(|index| other.get(index))
    }

    #[must_use]
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.len() == other.len() && self.ones().all(|index| !other.get(index))
    }

    pub fn union_with(&mut self, other: &Self) {
        for index in other.ones() {
            self.set(index, true);
        }
    }

    /// Number of bits set in `self` but not in `covered`.
    #[must_use]
    pub fn count_uncovered(&self, covered: &Self) -> usize {
        self.ones().filter(|index| !covered.get(*index)).count()
    }
}

impl Serialize for AggregationBits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let string = self
            .0
            .iter()
            .map(|bit| if *bit { '1' } else { '0' })
            .collect::<String>();

        serializer.serialize_str(&string)
    }
}

impl<'de> Deserialize<'de> for AggregationBits {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let string = String::deserialize(deserializer)?;

        string
            .chars()
            .map(|character| match character {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(D::Error::custom(format!(
                    "unexpected character in aggregation bits: {other:?}"
                ))),
            })
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, From)]
pub struct SignatureBytes([u8; SIGNATURE_SIZE]);

impl Default for SignatureBytes {
    fn default() -> Self {
        Self([0; SIGNATURE_SIZE])
    }
}

impl Debug for SignatureBytes {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        write!(formatter, "0x{}", hex::encode(self.0))
    }
}

impl SignatureBytes {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }
}

impl Serialize for SignatureBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("{self:?}"))
    }
}

impl<'de> Deserialize<'de> for SignatureBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let string = String::deserialize(deserializer)?;
        let digits = string.strip_prefix("0x").unwrap_or(&string);
        let mut bytes = [0; SIGNATURE_SIZE];

        hex::decode_to_slice(digits, &mut bytes).map_err(D::Error::custom)?;

        Ok(Self(bytes))
    }
}
