use core::time::Duration;
use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use itertools::Itertools as _;
use log::{error, info, warn};
use rand::seq::SliceRandom as _;
use tokio_util::sync::CancellationToken;

use crate::{
    attacker::LibraryParams, five::Five, library_strategy::LibraryStrategy, none::Idle,
    withholding::Withholding,
};

/// Selects every registered strategy.
pub const ALL: &str = "all";

pub struct Registry {
    strategies: BTreeMap<&'static str, Arc<dyn LibraryStrategy>>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self {
            strategies: BTreeMap::new(),
        };

        registry.register(Arc::new(Idle));
        registry.register(Arc::new(Five));
        registry.register(Arc::new(Withholding));

        registry
    }
}

impl Registry {
    pub fn register(&mut self, strategy: Arc<dyn LibraryStrategy>) {
        self.strategies.insert(strategy.name(), strategy);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn LibraryStrategy>> {
        self.strategies.get(name).map(Arc::clone)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.strategies.keys().copied()
    }

    /// Strategies named in `names`, or all of them if `names` contains [`ALL`].
    /// Unknown names are skipped.
    #[must_use]
    pub fn select(&self, names: &[String]) -> Vec<Arc<dyn LibraryStrategy>> {
        if names.iter().any(|name| name == ALL) {
            return self.strategies.values().map(Arc::clone).collect();
        }

        names
            .iter()
            .unique()
            .filter_map(|name| {
                let strategy = self.get(name);

                if strategy.is_none() {
                    warn!("skipping unknown strategy {name}");
                }

                strategy
            })
            .collect()
    }
}

/// Runs library strategies one at a time.
///
/// A single strategy runs until the generator is cancelled.
/// With several, a random one is picked for each round of `duration_per_strategy`.
pub struct Generator {
    strategies: Vec<Arc<dyn LibraryStrategy>>,
    params: LibraryParams,
    duration_per_strategy: Duration,
}

impl Generator {
    #[must_use]
    pub fn new(
        strategies: Vec<Arc<dyn LibraryStrategy>>,
        params: LibraryParams,
        duration_per_strategy: Duration,
    ) -> Self {
        for strategy in &strategies {
            info!("added strategy {}: {}", strategy.name(), strategy.description());
        }

        Self {
            strategies,
            params,
            duration_per_strategy,
        }
    }

    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        info!("strategy generator started");

        match self.strategies.as_slice() {
            [] => error!("no strategy to run"),
            [strategy] => self.run_one(strategy, cancel.child_token()).await,
            strategies => {
                while !cancel.is_cancelled() {
                    let Some(strategy) = strategies.choose(&mut rand::thread_rng()) else {
                        break;
                    };

                    let round = cancel.child_token();

                    let outcome = tokio::time::timeout(
                        self.duration_per_strategy,
                        self.run_one(strategy, round.clone()),
                    )
                    .await;

                    round.cancel();

                    if outcome.is_err() {
                        info!("strategy {} reached its deadline", strategy.name());
                    }
                }
            }
        }

        info!("strategy generator stopped");

        Ok(())
    }

    async fn run_one(&self, strategy: &Arc<dyn LibraryStrategy>, cancel: CancellationToken) {
        if let Err(error) = strategy.run(cancel.clone(), &self.params).await {
            error!("strategy {} failed: {error:?}", strategy.name());
        }

        // A strategy that gives up early would otherwise be restarted in a busy loop.
        cancel.cancelled().await;
    }
}
