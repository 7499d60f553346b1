//! Agent registry: name → agent definition.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::warn;

use crate::config::Options;

/// How to build an agent: prompt, tool groups and default options.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentDefinition {
    /// Unique name.
    pub name: String,
    /// Display name.
    pub display_name: String,
    /// Description.
    pub description: String,
    /// System prompt for the agent's runtime.
    #[serde(skip)]
    pub system_prompt: String,
    /// Tool groups, concatenated in order.
    pub tool_groups: Vec<String>,
    /// Lowest-precedence runtime options.
    pub default_options: Options,
}

impl AgentDefinition {
    /// A definition with no prompt, groups or options.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            description: String::new(),
            system_prompt: String::new(),
            tool_groups: Vec::new(),
            default_options: Options::new(),
            name,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Appends a tool group.
    #[must_use]
    pub fn tool_group(mut self, group: impl Into<String>) -> Self {
        self.tool_groups.push(group.into());
        self
    }

    /// Sets one default option.
    #[must_use]
    pub fn default_option(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.default_options.set(key, value);
        self
    }
}

/// Catalog of agent definitions. Definitions are immutable once registered.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: RwLock<BTreeMap<String, Arc<AgentDefinition>>>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition, replacing any with the same name.
    pub fn register(&self, definition: AgentDefinition) {
        let mut agents = self.agents.write().unwrap_or_else(PoisonError::into_inner);
        if agents.contains_key(&definition.name) {
            warn!(agent = %definition.name, "agent already registered, replacing");
        }
        agents.insert(definition.name.clone(), Arc::new(definition));
    }

    /// Looks up a definition.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<AgentDefinition>> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// All definitions, sorted by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<Arc<AgentDefinition>> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Removes a definition. Returns `true` if it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.agents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    /// Removes every definition.
    pub fn clear(&self) {
        self.agents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
