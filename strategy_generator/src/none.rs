use anyhow::Result;
use async_trait::async_trait;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::{attacker::LibraryParams, library_strategy::LibraryStrategy};

/// Behaves honestly. Useful as a baseline for feedback.
pub struct Idle;

#[async_trait]
impl LibraryStrategy for Idle {
    fn name(&self) -> &'static str {
        "none"
    }

    fn description(&self) -> &'static str {
        "Submits nothing."
    }

    async fn run(&self, cancel: CancellationToken, _params: &LibraryParams) -> Result<()> {
        info!("started strategy {}", self.name());
        cancel.cancelled().await;
        info!("stopped strategy {}", self.name());
        Ok(())
    }
}
