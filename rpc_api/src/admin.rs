use anyhow::Result;
use async_trait::async_trait;
use strategy_types::{FeedBackInfo, Slot, SlotStrategy, Strategy};

#[async_trait]
pub trait Admin: Send + Sync {
    async fn submit_strategy(&self, strategy: Strategy) -> Result<()>;

    fn feedback(&self, uid: &str) -> Result<FeedBackInfo>;

    /// Highest slot seen at any checkpoint.
    fn current_slot(&self) -> Slot;

    fn slot_strategies(&self) -> Vec<SlotStrategy>;
}
