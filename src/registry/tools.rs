//! Tool registry: name → tool map plus named groups.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::warn;

use crate::agent::Tool;

#[derive(Default)]
struct Inner {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    groups: BTreeMap<String, Vec<String>>,
}

/// Catalog of tools, tagged by group.
///
/// Groups hold tool names. A group may keep a name after the tool was
/// unregistered; every group lookup skips such stale names.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<Inner>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under `group`.
    ///
    /// Re-registering a name already listed in the same group is a no-op.
    /// Any other existing tool with the name is replaced with a warning.
    pub fn register(&self, tool: Arc<dyn Tool>, group: &str) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let name = tool.name().to_string();

        if inner.tools.contains_key(&name) {
            let in_group = inner
                .groups
                .get(group)
                .is_some_and(|names| names.contains(&name));
            if in_group {
                return;
            }
            warn!(tool = %name, group, "tool already registered, replacing");
        }

        inner.tools.insert(name.clone(), tool);
        let members = inner.groups.entry(group.to_string()).or_default();
        if !members.contains(&name) {
            members.push(name);
        }
    }

    /// Registers several tools under one group.
    pub fn register_all<I>(&self, tools: I, group: &str)
    where
        I: IntoIterator<Item = Arc<dyn Tool>>,
    {
        for tool in tools {
            self.register(tool, group);
        }
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.read().tools.get(name).cloned()
    }

    /// Tools of a group that are still registered, in group order.
    #[must_use]
    pub fn tools_in_group(&self, group: &str) -> Vec<Arc<dyn Tool>> {
        let inner = self.read();
        inner
            .groups
            .get(group)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| inner.tools.get(n).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Registered tool names, optionally restricted to one group.
    #[must_use]
    pub fn tool_names(&self, group: Option<&str>) -> Vec<String> {
        let inner = self.read();
        match group {
            Some(group) => inner
                .groups
                .get(group)
                .map(|names| {
                    names
                        .iter()
                        .filter(|n| inner.tools.contains_key(*n))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
            None => inner.tools.keys().cloned().collect(),
        }
    }

    /// Group names.
    #[must_use]
    pub fn list_groups(&self) -> Vec<String> {
        self.read().groups.keys().cloned().collect()
    }

    /// Removes a tool from the catalog. Group entries are left in place and
    /// skipped by lookups. Returns `true` if the tool was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .tools
            .remove(name)
            .is_some()
    }

    /// Removes every tool and group.
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.tools.clear();
        inner.groups.clear();
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().tools.len()
    }

    /// `true` when no tool is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_names(None))
            .field("groups", &self.list_groups())
            .finish()
    }
}
