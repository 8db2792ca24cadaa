//! The attacker engine and the wiring of its tasks.
//!
//! [`Engine`] owns all state shared between checkpoint calls: the slot watermark, the
//! attestation pool, the merged strategy set and the feedback results. It is created once and
//! passed by [`Arc`] to every component that needs it.
//!
//! [`Arc`]: std::sync::Arc

pub use crate::{
    config::{EngineConfig, GeneratorConfig, RuntimeConfig},
    engine::{Engine, FeedbackError, SubmitError},
    runtime::run,
};

mod config;
mod engine;
#[cfg(test)]
mod fixtures;
mod runtime;
mod tasks;
