//! Pluggable LLM provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into backend-specific calls. Agents only ever see this contract, so they
//! stay independent of where and how a model is hosted.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse};
use crate::error::AgentError;

/// Trait for LLM provider backends.
///
/// Implementations handle the transport layer (HTTP, retries, timeouts)
/// for a specific backend while presenting a uniform interface to agents.
/// Any failure is reported as an opaque [`AgentError`].
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Backend name (e.g., `"ollama"`, `"gemini"`).
    fn name(&self) -> &'static str;

    /// Model identifier sent with every request.
    fn model(&self) -> &str;

    /// Sampling temperature applied when the caller sets none.
    fn temperature(&self) -> Option<f32> {
        None
    }

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures, timeouts, or parse errors.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;
}
