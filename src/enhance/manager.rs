//! Strategy registry and chain application.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use super::strategy::{EnhancedOutput, EnhancementStrategy, StageInput};
use crate::agent::{Agent, AgentRequest};
use crate::config::{SharedSettings, read_settings};
use crate::error::AgentError;

/// Ordered name → strategy registry that applies the enabled chain.
pub struct StrategyManager {
    strategies: RwLock<Vec<(String, Arc<dyn EnhancementStrategy>)>>,
    settings: SharedSettings,
}

impl StrategyManager {
    /// Creates an empty manager reading the enabled list from `settings`.
    #[must_use]
    pub fn new(settings: SharedSettings) -> Self {
        Self {
            strategies: RwLock::new(Vec::new()),
            settings,
        }
    }

    /// Registers a strategy. An existing entry with the same name is
    /// replaced in place.
    pub fn register(&self, name: &str, strategy: Arc<dyn EnhancementStrategy>) {
        let mut strategies = self
            .strategies
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = strategies.iter_mut().find(|(n, _)| n == name) {
            warn!(strategy = name, "strategy already registered, replacing");
            slot.1 = strategy;
        } else {
            strategies.push((name.to_string(), strategy));
        }
    }

    /// Looks up a strategy by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn EnhancementStrategy>> {
        self.strategies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| Arc::clone(s))
    }

    /// Registered names in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.strategies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Removes a strategy. Returns `true` if it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut strategies = self
            .strategies
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = strategies.len();
        strategies.retain(|(n, _)| n != name);
        strategies.len() != before
    }

    /// Removes every strategy.
    pub fn clear(&self) {
        self.strategies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Runs `request` through the enabled chain.
    ///
    /// With enhancement off for the request, or no strategy enabled, this is
    /// exactly `agent.invoke`. Otherwise each enabled, registered strategy
    /// runs in order on the previous stage's result; a failing stage is
    /// logged and skipped. If no stage produced a result the agent is
    /// called directly.
    ///
    /// # Errors
    ///
    /// Only an error from the direct agent call escapes.
    pub async fn apply(
        &self,
        agent: &dyn Agent,
        request: &AgentRequest,
    ) -> Result<EnhancedOutput, AgentError> {
        if !request.enhance {
            return Self::direct(agent, request).await;
        }

        let names = read_settings(&self.settings).enabled_strategies();
        if names.is_empty() {
            return Self::direct(agent, request).await;
        }

        let mut current: Option<EnhancedOutput> = None;
        for name in &names {
            let Some(strategy) = self.get(name) else {
                debug!(strategy = %name, "enabled strategy not registered");
                continue;
            };
            let config =
                read_settings(&self.settings).strategy_config(name, strategy.local_config());
            if !strategy.is_enabled(&config) {
                debug!(strategy = %name, "strategy disabled");
                continue;
            }

            let input = StageInput {
                request,
                previous: current.as_ref(),
            };
            match strategy.enhance(agent, &input, &config).await {
                Ok(mut output) => {
                    debug!(strategy = %name, "strategy applied");
                    if let Some(previous) = current.take() {
                        let mut metadata = previous.metadata;
                        metadata.append(&mut output.metadata);
                        output.metadata = metadata;
                        // A later stage cannot clear an exhausted step bound.
                        if previous.outcome.is_error() {
                            output.outcome = previous.outcome;
                        }
                    }
                    current = Some(output);
                }
                Err(e) => {
                    warn!(strategy = %name, error = %e, "strategy failed, skipping");
                }
            }
        }

        match current {
            Some(output) => Ok(output),
            None => Self::direct(agent, request).await,
        }
    }

    async fn direct(
        agent: &dyn Agent,
        request: &AgentRequest,
    ) -> Result<EnhancedOutput, AgentError> {
        Ok(agent.invoke(request).await?.into())
    }
}

impl std::fmt::Debug for StrategyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyManager")
            .field("strategies", &self.list())
            .finish_non_exhaustive()
    }
}
