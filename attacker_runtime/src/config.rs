use core::{net::SocketAddr, ops::RangeInclusive, time::Duration};

use attestation_pool::DEFAULT_MAX_ATTESTATIONS;
use lifecycle_tracker::{DEFAULT_SAFETY_MARGIN, DEFAULT_TICK, NORMAL_TARGET_AMOUNT};
use strategy_types::{Strategy, ValidatorIndex};

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub malicious_validators: RangeInclusive<ValidatorIndex>,
    /// Epochs that must pass after the last epoch of a strategy before it is scored.
    pub safety_margin: u64,
    pub tracker_tick: Duration,
    pub max_attestations: usize,
    /// Target reward of an attestation that was included on time, in Gwei.
    pub normal_target_amount: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            malicious_validators: 0..=0,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            tracker_tick: DEFAULT_TICK,
            max_attestations: DEFAULT_MAX_ATTESTATIONS,
            normal_target_amount: NORMAL_TARGET_AMOUNT,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub strategies: Vec<String>,
    pub duration_per_strategy: Duration,
}

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub engine: EngineConfig,
    pub rpc_address: SocketAddr,
    /// Submitted before any checkpoint is served.
    pub initial_strategy: Option<Strategy>,
    pub generator: Option<GeneratorConfig>,
}
