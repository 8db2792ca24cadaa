use core::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU64,
    time::Duration,
};
use std::path::PathBuf;

use anyhow::{Context as _, Result, ensure};
use attacker_runtime::{EngineConfig, GeneratorConfig, RuntimeConfig};
use attestation_pool::DEFAULT_MAX_ATTESTATIONS;
use clap::Parser;
use lifecycle_tracker::{DEFAULT_SAFETY_MARGIN, NORMAL_TARGET_AMOUNT};
use nonzero_ext::nonzero;
use strategy_types::{Strategy, ValidatorIndex};
use url::Url;

pub const APPLICATION_NAME: &str = "attacker";

const DEFAULT_BEACON_NODE_URL: &str = "http://127.0.0.1:3500";
const DEFAULT_RPC_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const DEFAULT_RPC_PORT: u16 = 10000;
const DEFAULT_MINUTES_PER_STRATEGY: NonZeroU64 = nonzero!(10_u64);
const DEFAULT_TRACKER_TICK_SECONDS: u64 = 10;

/// Injects Byzantine behavior into instrumented consensus clients
#[derive(Parser)]
#[clap(display_name = APPLICATION_NAME, verbatim_doc_comment)]
pub struct AttackerArgs {
    /// Beacon node REST API URL used for duties, block roots and rewards
    #[clap(long, default_value = DEFAULT_BEACON_NODE_URL)]
    beacon_node_url: Url,

    /// Address to serve JSON-RPC checkpoint and admin calls on
    #[clap(long, default_value_t = DEFAULT_RPC_ADDRESS)]
    rpc_address: IpAddr,

    /// Port to serve JSON-RPC checkpoint and admin calls on
    #[clap(long, default_value_t = DEFAULT_RPC_PORT)]
    rpc_port: u16,

    /// Strategy to submit at startup, in YAML or JSON
    #[clap(long, value_name = "FILE")]
    strategy_file: Option<PathBuf>,

    /// Library strategies to run, or `all`
    #[clap(long, value_delimiter = ',')]
    strategies: Vec<String>,

    /// Minutes each library strategy runs for when several are selected
    #[clap(long, default_value_t = DEFAULT_MINUTES_PER_STRATEGY)]
    minutes_per_strategy: NonZeroU64,

    /// Lowest index of validators controlled by the attacker
    #[clap(long, default_value_t = 0)]
    min_malicious_index: ValidatorIndex,

    /// Highest index of validators controlled by the attacker
    #[clap(long, default_value_t = 0)]
    max_malicious_index: ValidatorIndex,

    /// Epochs to wait after the last epoch of a strategy before scoring it
    #[clap(long, default_value_t = DEFAULT_SAFETY_MARGIN)]
    safety_margin: u64,

    /// Seconds between checks for ended strategies
    #[clap(long, default_value_t = DEFAULT_TRACKER_TICK_SECONDS)]
    tracker_tick: u64,

    /// Maximum number of attestations packed into a block
    #[clap(long, default_value_t = DEFAULT_MAX_ATTESTATIONS)]
    max_attestations: usize,

    /// Target reward of an honest attestation in Gwei, used to compute lose rates
    #[clap(long, default_value_t = NORMAL_TARGET_AMOUNT)]
    normal_target_amount: i64,
}

#[derive(Debug)]
pub struct AttackerConfig {
    pub beacon_node_url: Url,
    pub runtime: RuntimeConfig,
}

impl AttackerArgs {
    pub fn try_into_config(self) -> Result<AttackerConfig> {
        let Self {
            beacon_node_url,
            rpc_address,
            rpc_port,
            strategy_file,
            strategies,
            minutes_per_strategy,
            min_malicious_index,
            max_malicious_index,
            safety_margin,
            tracker_tick,
            max_attestations,
            normal_target_amount,
        } = self;

        ensure!(
            min_malicious_index <= max_malicious_index,
            "--min-malicious-index must not exceed --max-malicious-index",
        );

        ensure!(
            normal_target_amount > 0,
            "--normal-target-amount must be positive",
        );

        let initial_strategy = strategy_file.map(load_strategy).transpose()?;

        let generator = (!strategies.is_empty()).then(|| GeneratorConfig {
            strategies,
            duration_per_strategy: Duration::from_secs(minutes_per_strategy.get() * 60),
        });

        let engine = EngineConfig {
            malicious_validators: min_malicious_index..=max_malicious_index,
            safety_margin,
            tracker_tick: Duration::from_secs(tracker_tick),
            max_attestations,
            normal_target_amount,
        };

        Ok(AttackerConfig {
            beacon_node_url,
            runtime: RuntimeConfig {
                engine,
                rpc_address: SocketAddr::new(rpc_address, rpc_port),
                initial_strategy,
                generator,
            },
        })
    }
}

// JSON is a subset of YAML, so this handles both.
fn load_strategy(path: PathBuf) -> Result<Strategy> {
    let contents = fs_err::read_to_string(&path)?;

    serde_yaml::from_str(&contents)
        .with_context(|| format!("invalid strategy in {}", path.display()))
}
