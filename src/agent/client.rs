//! Backend factory.
//!
//! Validates a resolved backend configuration and creates the matching
//! [`LlmProvider`]. The service only talks to [`BackendFactory`], so tests
//! and embedders can inject their own providers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::provider::LlmProvider;
use crate::config::{BackendKind, ResolvedBackend};
use crate::error::AgentError;

/// Creates model providers for configured backends.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    /// Backends this factory can create.
    fn backends(&self) -> &[BackendKind];

    /// `true` when the configuration is usable (key present, host reachable).
    async fn validate(&self, backend: &ResolvedBackend) -> bool;

    /// Creates a provider for a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when the backend cannot be constructed.
    fn create(&self, backend: &ResolvedBackend) -> Result<Arc<dyn LlmProvider>, AgentError>;
}

#[cfg(feature = "openai")]
pub use http::DefaultBackendFactory;

#[cfg(feature = "openai")]
mod http {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tracing::debug;

    use super::BackendFactory;
    use crate::agent::provider::LlmProvider;
    use crate::agent::providers::OpenAiProvider;
    use crate::config::{BackendKind, ResolvedBackend};
    use crate::error::AgentError;

    /// Timeout for the Ollama reachability probe.
    const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

    /// Factory for the built-in `OpenAI`-compatible backends.
    ///
    /// Ollama is validated by probing `GET {base_url}/api/tags`; keyed
    /// backends only need a non-empty API key.
    #[derive(Debug, Clone, Default)]
    pub struct DefaultBackendFactory {
        http: reqwest::Client,
    }

    impl DefaultBackendFactory {
        /// Creates a factory with its own HTTP client for probes.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        async fn probe_ollama(&self, base_url: &str) -> bool {
            let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
            match self.http.get(&url).timeout(PROBE_TIMEOUT).send().await {
                Ok(response) => response.status().is_success(),
                Err(e) => {
                    debug!(url = %url, error = %e, "ollama probe failed");
                    false
                }
            }
        }
    }

    #[async_trait]
    impl BackendFactory for DefaultBackendFactory {
        fn backends(&self) -> &[BackendKind] {
            &BackendKind::ALL
        }

        async fn validate(&self, backend: &ResolvedBackend) -> bool {
            match backend.kind {
                BackendKind::Ollama => self.probe_ollama(&backend.base_url).await,
                BackendKind::Gemini | BackendKind::DeepSeek => backend.is_complete(),
            }
        }

        fn create(&self, backend: &ResolvedBackend) -> Result<Arc<dyn LlmProvider>, AgentError> {
            Ok(Arc::new(OpenAiProvider::new(backend)?))
        }
    }
}
