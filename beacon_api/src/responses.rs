use serde::Deserialize;
use strategy_types::{AttestReward, H256, Slot, UnixSeconds, string_or_native};

#[derive(Deserialize)]
pub struct Data<T> {
    pub data: T,
}

#[derive(Deserialize)]
pub struct SpecResponse {
    #[serde(rename = "SECONDS_PER_SLOT", with = "string_or_native")]
    pub seconds_per_slot: u64,
    #[serde(rename = "SLOTS_PER_EPOCH", with = "string_or_native")]
    pub slots_per_epoch: u64,
}

#[derive(Deserialize)]
pub struct GenesisResponse {
    #[serde(with = "string_or_native")]
    pub genesis_time: UnixSeconds,
}

#[derive(Deserialize)]
pub struct HeaderResponse {
    pub root: H256,
    pub header: SignedHeader,
}

#[derive(Deserialize)]
pub struct SignedHeader {
    pub message: HeaderMessage,
}

#[derive(Deserialize)]
pub struct HeaderMessage {
    #[serde(with = "string_or_native")]
    pub slot: Slot,
}

#[derive(Deserialize)]
pub struct AttestationRewardsResponse {
    pub total_rewards: Vec<AttestReward>,
}
