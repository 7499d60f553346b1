//! refine-rs: tool-calling LLM agents with a pluggable enhancement chain.
//!
//! An [`AgentService`] resolves agents by name from the
//! [`registry`], builds them on a configured backend, and runs every
//! invocation through the [`enhance`] strategy chain. The built-in
//! reflection strategy critiques an answer and revises it a bounded
//! number of times.
//!
//! ```no_run
//! use std::sync::Arc;
//! use refine_rs::agent::DefaultBackendFactory;
//! use refine_rs::config::Settings;
//! use refine_rs::service::AgentService;
//!
//! # async fn run() {
//! let service = AgentService::with_builtins(
//!     Settings::builder().shared(),
//!     Arc::new(DefaultBackendFactory::new()),
//! );
//! let result = service.invoke_agent(Some("joke"), "讲个笑话").await;
//! assert!(result.success, "{}", result.output);
//! # }
//! ```

pub mod agent;
pub mod builtin;
#[cfg(feature = "openai")]
pub mod cli;
pub mod config;
pub mod enhance;
pub mod error;
pub mod logging;
pub mod registry;
pub mod service;

pub use config::{Settings, SharedSettings};
pub use error::{AgentError, Error, Result};
pub use service::{AgentService, InvocationResult};
