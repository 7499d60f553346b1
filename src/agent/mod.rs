//! Agent runtime.
//!
//! A [`BaseAgent`] binds a model handle, a tool set and runtime options
//! behind the single [`Agent::invoke`] contract. Model backends plug in
//! through [`LlmProvider`]; the built-in ones are created by a
//! [`BackendFactory`].
//!
//! # Architecture
//!
//! ```text
//! AgentRequest → BaseAgent::invoke
//!   ├── agentic_loop (model turn → tool calls → observations → …)
//!   ├── transcript::final_answer (ordered selection rules + marker extraction)
//!   └── AgentResponse { output, outcome }
//!
//! ReflectionAgent (tool-less) → critique / revise, one model call each
//! ```

pub mod agentic_loop;
pub mod base;
pub mod client;
pub mod executor;
pub mod message;
#[cfg(test)]
pub(crate) mod mock;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod reflection;
pub mod tool;
pub mod traits;
pub mod transcript;

// Re-export key types
pub use base::{BaseAgent, DEFAULT_MAX_STEPS};
pub use client::BackendFactory;
#[cfg(feature = "openai")]
pub use client::DefaultBackendFactory;
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use provider::LlmProvider;
pub use reflection::{Critique, KeywordClassifier, ReflectionAgent, VerdictClassifier};
pub use tool::{FnTool, Tool, ToolCall, ToolDefinition, ToolResult, ToolSet};
pub use traits::{Agent, AgentRequest, AgentResponse, RunOutcome};
