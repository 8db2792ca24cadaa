use std::io::Write as _;

use anyhow::Result;
use chrono::{Local, SecondsFormat};
use env_logger::{Builder, Env};
use log::LevelFilter;

pub const LOG_ENV_VAR: &str = "ATTACKER_LOG";

const WORKSPACE_CRATES: &[&str] = &[
    "action_engine",
    "attacker_runtime",
    "attestation_pool",
    "beacon_api",
    "interception_gateway",
    "lifecycle_tracker",
    "rpc_api",
    "slot_clock",
    "strategy_generator",
    "strategy_resolver",
    "strategy_storage",
    "strategy_types",
];

/// Logs messages from workspace crates at `info` and above.
/// Directives in `ATTACKER_LOG` (same syntax as `RUST_LOG`) are applied on top.
pub fn initialize_logger(module_path: &str, always_write_style: bool) -> Result<()> {
    let mut builder = Builder::new();

    builder.filter_level(LevelFilter::Off);

    for module in WORKSPACE_CRATES.iter().copied().chain([module_path, module_path!()]) {
        builder.filter_module(module, LevelFilter::Info);
    }

    builder.parse_env(Env::new().filter(LOG_ENV_VAR));

    if always_write_style {
        builder.write_style(env_logger::WriteStyle::Always);
    }

    builder.format(|formatter, record| {
        let level_style = formatter.default_level_style(record.level());

        writeln!(
            formatter,
            "[{}] {level_style}{:<5}{level_style:#} {}",
            Local::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            record.level(),
            record.args(),
        )
    });

    builder.try_init()?;

    Ok(())
}
