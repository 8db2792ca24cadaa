use std::sync::Arc;

use anyhow::{Context as _, Result};
use beacon_api::BeaconNode;
use futures::channel::mpsc;
use interception_gateway::Gateway;
use lifecycle_tracker::LifecycleTracker;
use log::info;
use rpc_api::{Admin, RpcServer, RpcState};
use slot_clock::SlotClock;
use strategy_generator::{Attacker, Generator, LibraryParams, Registry};
use strategy_storage::{MemoryStore, RewardStore, StrategyStore};
use tokio::select;
#[cfg(unix)]
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;

use crate::{
    config::{GeneratorConfig, RuntimeConfig},
    engine::Engine,
    tasks,
};

/// Runs the engine and all of its tasks until a signal is received or a task fails.
pub async fn run(
    config: RuntimeConfig,
    clock: SlotClock,
    beacon: Arc<dyn BeaconNode>,
) -> Result<()> {
    let RuntimeConfig {
        engine: engine_config,
        rpc_address,
        initial_strategy,
        generator,
    } = config;

    let store = Arc::new(MemoryStore::default());
    let strategies: Arc<dyn StrategyStore> = Arc::<MemoryStore>::clone(&store);
    let rewards: Arc<dyn RewardStore> = store;

    let (to_tracker_tx, to_tracker_rx) = mpsc::unbounded();
    let (end_tx, end_rx) = mpsc::unbounded();

    let tracker = LifecycleTracker::new(
        clock,
        Arc::clone(&rewards),
        engine_config.safety_margin,
        engine_config.tracker_tick,
        to_tracker_rx,
        end_tx,
    );

    let malicious_validators = engine_config.malicious_validators.clone();

    let engine = Arc::new(Engine::new(
        engine_config,
        clock,
        beacon,
        strategies,
        rewards,
        to_tracker_tx,
    ));

    if let Some(strategy) = initial_strategy {
        engine
            .submit(&strategy)
            .context("initial strategy was rejected")?;
    }

    let admin: Arc<dyn Admin> = Arc::<Engine>::clone(&engine);

    let rpc_server = RpcServer {
        address: rpc_address,
        state: RpcState {
            gateway: Arc::new(Gateway::new(Arc::clone(&engine), engine.resolver())),
            admin,
        },
    };

    let generator = generator.map(
        |GeneratorConfig {
             strategies,
             duration_per_strategy,
         }| {
            let attacker: Arc<dyn Attacker> = Arc::<Engine>::clone(&engine);

            let params = LibraryParams {
                attacker,
                malicious_validators,
            };

            Generator::new(
                Registry::default().select(&strategies),
                params,
                duration_per_strategy,
            )
        },
    );

    let cancel = CancellationToken::new();

    let run_generator = {
        let cancel = cancel.clone();

        async move {
            if let Some(generator) = generator {
                generator.run(cancel).await?;
            }

            // The generator finishing on its own is not a reason to stop serving checkpoints.
            core::future::pending::<Result<()>>().await
        }
    };

    info!("attacker started for slots of {} seconds", clock.seconds_per_slot());

    let result = select! {
        result = spawn_fallible(tracker.run(cancel.clone())) => result,
        result = spawn_fallible(rpc_server.run(cancel.clone())) => result,
        result = spawn_fallible(tasks::run_feedback_handler(
            Arc::clone(&engine),
            end_rx,
            cancel.clone(),
        )) => result,
        result = spawn_fallible(tasks::run_reward_collector(
            Arc::clone(&engine),
            clock.slot_duration(),
            cancel.clone(),
        )) => result,
        result = spawn_fallible(tasks::run_slot_ticker(
            Arc::clone(&engine),
            cancel.clone(),
        )) => result,
        result = spawn_fallible(run_generator) => result,
        result = wait_for_signal() => result,
    };

    cancel.cancel();

    info!("attacker stopped");

    result
}

async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut interrupt = tokio::signal::unix::signal(SignalKind::interrupt())?;
        let mut terminate = tokio::signal::unix::signal(SignalKind::terminate())?;

        select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}

// This exists mainly to flatten the nested `Result` returned by `tokio::spawn`.
async fn spawn_fallible<T: Send + 'static>(
    task: impl Future<Output = Result<T>> + Send + 'static,
) -> Result<T> {
    tokio::spawn(task).await?
}
