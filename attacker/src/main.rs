use core::time::Duration;
use std::{process::ExitCode, sync::Arc};

use anyhow::Result;
use beacon_api::{BeaconClient, BeaconNode as _, ChainParameters};
use clap::{Error as ClapError, Parser as _};
use log::{error, info, warn};
use reqwest::Client;
use tokio::runtime::Builder;

use crate::attacker_args::{AttackerArgs, AttackerConfig};

mod attacker_args;

const CHAIN_PARAMETERS_RETRY_DELAY: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    if let Err(error) = try_main() {
        error.downcast_ref().map(ClapError::exit);
        error!("{error:?}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn try_main() -> Result<()> {
    binary_utils::initialize_logger(module_path!(), false)?;

    let AttackerConfig {
        beacon_node_url,
        runtime,
    } = AttackerArgs::try_parse()?.try_into_config()?;

    info!("starting attacker with beacon node at {beacon_node_url}");

    block_on(async move {
        let beacon = Arc::new(BeaconClient::new(Client::new(), beacon_node_url));
        let parameters = wait_for_chain_parameters(&beacon).await;

        info!(
            "chain parameters: {} seconds per slot, {} slots per epoch, genesis at {}",
            parameters.seconds_per_slot, parameters.slots_per_epoch, parameters.genesis_time,
        );

        attacker_runtime::run(runtime, parameters.clock()?, beacon).await
    })
}

async fn wait_for_chain_parameters(beacon: &BeaconClient) -> ChainParameters {
    loop {
        match beacon.chain_parameters().await {
            Ok(parameters) => break parameters,
            Err(error) => {
                warn!("beacon node is not ready: {error:?}");
                tokio::time::sleep(CHAIN_PARAMETERS_RETRY_DELAY).await;
            }
        }
    }
}

fn block_on(future: impl Future<Output = Result<()>>) -> Result<()> {
    // This is roughly what `#[tokio::main]` expands to.
    Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(future)
}
