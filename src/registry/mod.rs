//! Name-keyed catalogs of tools and agent definitions.
//!
//! Registries are plain values owned by the service and populated by
//! explicit registration calls at startup (see
//! [`register_builtins`](crate::builtin::register_builtins)). Strategies
//! live in the [`StrategyManager`](crate::enhance::StrategyManager).

pub mod agents;
pub mod tools;

pub use agents::{AgentDefinition, AgentRegistry};
pub use tools::ToolRegistry;
