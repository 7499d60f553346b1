//! Built-in tools, agents and strategies, registered explicitly at startup.

pub mod jokes;

use std::sync::Arc;

use crate::agent::prompt::JOKE_SYSTEM_PROMPT;
use crate::config::Options;
use crate::enhance::{REFLECTION, ReflectionStrategy, StrategyManager};
use crate::registry::{AgentDefinition, AgentRegistry, ToolRegistry};

pub use jokes::JOKE_GROUP;

/// Name of the built-in joke agent.
pub const JOKE_AGENT: &str = "joke";

/// The joke agent definition.
#[must_use]
pub fn joke_agent() -> AgentDefinition {
    AgentDefinition::new(JOKE_AGENT)
        .display_name("笑话Agent")
        .description("专门用于讲笑话的Agent")
        .system_prompt(JOKE_SYSTEM_PROMPT)
        .tool_group(JOKE_GROUP)
        .default_option("verbose", true)
        .default_option("max_iterations", 5)
}

/// Registers the joke tools and the joke agent.
pub fn register_builtins(tools: &ToolRegistry, agents: &AgentRegistry) {
    tools.register_all(jokes::joke_tools(), JOKE_GROUP);
    agents.register(joke_agent());
}

/// Registers the reflection strategy. It reads its settings from the
/// shared and legacy `reflection` blocks.
pub fn register_strategies(strategies: &StrategyManager) {
    strategies.register(REFLECTION, Arc::new(ReflectionStrategy::new(Options::new())));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn test_register_builtins() {
        let tools = ToolRegistry::new();
        let agents = AgentRegistry::new();
        register_builtins(&tools, &agents);
        // Idempotent: same tools into the same group are skipped.
        register_builtins(&tools, &agents);

        assert_eq!(tools.tool_names(Some(JOKE_GROUP)), vec!["GetRandomJoke", "SearchJoke"]);
        let def = agents.get(JOKE_AGENT);
        assert_eq!(def.as_ref().map(|d| d.display_name.as_str()), Some("笑话Agent"));
        assert_eq!(
            def.as_ref().and_then(|d| d.default_options.get_usize("max_iterations")),
            Some(5)
        );
    }

    #[test]
    fn test_register_strategies() {
        let manager = StrategyManager::new(Settings::builder().shared());
        register_strategies(&manager);
        assert_eq!(manager.list(), vec![REFLECTION]);
    }
}
