use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::attacker::LibraryParams;

#[async_trait]
pub trait LibraryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Runs until `cancel` is cancelled. Returning early ends the strategy for this round.
    async fn run(&self, cancel: CancellationToken, params: &LibraryParams) -> Result<()>;
}
