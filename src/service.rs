//! Agent service: resolves agents by name, caches built instances and
//! turns failures into user-facing reports.
//!
//! Built agents are cached per `(agent, backend)` pair. Configuration
//! updates invalidate only the affected entries.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentRequest, BackendFactory, BaseAgent, RunOutcome, ToolSet};
use crate::builtin::{register_builtins, register_strategies};
use crate::config::{
    BackendConfig, BackendKind, Options, SharedSettings, read_settings, write_settings,
};
use crate::enhance::{EnhancedOutput, StrategyManager};
use crate::error::AgentError;
use crate::logging::LlmLogger;
use crate::registry::{AgentRegistry, ToolRegistry};

/// Cache key for a built agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Agent name.
    pub agent: String,
    /// Backend the agent runs on.
    pub backend: BackendKind,
}

/// Failure category of an invocation, in classification order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Account balance exhausted (HTTP 402).
    InsufficientBalance,
    /// Key rejected by the backend (HTTP 401).
    InvalidApiKey,
    /// Request timed out.
    Timeout,
    /// Key missing or malformed.
    ApiKey,
    /// Connection failure.
    Network,
    /// Too many requests (HTTP 429).
    RateLimited,
    /// Unknown or invalid model name.
    ModelNotFound,
    /// The agent used up its step bound without a final answer.
    StepLimit,
    /// Agent or backend could not be built from the configuration.
    Configuration,
    /// Anything else.
    Other,
}

impl ErrorCategory {
    /// Classifies raw error text. The first matching category wins.
    #[must_use]
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if has(&["402", "insufficient balance", "余额不足"]) {
            Self::InsufficientBalance
        } else if has(&["401", "unauthorized", "invalid api key"]) {
            Self::InvalidApiKey
        } else if has(&["timeout", "timed out"]) {
            Self::Timeout
        } else if has(&["api key", "api_key"]) {
            Self::ApiKey
        } else if has(&["connection", "network"]) {
            Self::Network
        } else if has(&["rate limit", "429"]) {
            Self::RateLimited
        } else if lower.contains("model") && has(&["not found", "invalid"]) {
            Self::ModelNotFound
        } else {
            Self::Other
        }
    }

    /// Category of an agent error.
    #[must_use]
    pub fn of(error: &AgentError) -> Self {
        match error {
            AgentError::ApiKeyMissing { .. } => Self::ApiKey,
            AgentError::UnknownAgent { .. }
            | AgentError::UnsupportedProvider { .. }
            | AgentError::BackendUnavailable { .. }
            | AgentError::NoTools { .. } => Self::Configuration,
            AgentError::ApiRequest {
                message,
                status: Some(status),
            } => Self::classify(&format!("{status} {message}")),
            other => Self::classify(&other.to_string()),
        }
    }

    /// User-facing message for this category. `detail` is the raw error text.
    #[must_use]
    pub fn message(self, detail: &str) -> String {
        match self {
            Self::InsufficientBalance => "账户余额不足，请充值后重试。".to_string(),
            Self::InvalidApiKey => "API Key无效或已过期，请检查API Key是否正确。".to_string(),
            Self::Timeout => "请求超时，请检查网络连接。如果使用Gemini，可能需要VPN。".to_string(),
            Self::ApiKey => format!("API Key错误: {detail}"),
            Self::Network => "网络连接失败，请检查网络或VPN设置。".to_string(),
            Self::RateLimited => "请求频率过高，请稍后再试。".to_string(),
            Self::ModelNotFound => format!("模型不存在或无效: {detail}"),
            Self::StepLimit => format!("已达到最大步数限制: {detail}"),
            Self::Configuration => format!("配置错误: {detail}"),
            Self::Other => detail.to_string(),
        }
    }
}

/// A classified failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    /// Failure category.
    pub category: ErrorCategory,
    /// User-facing message.
    pub message: String,
    /// Original error text.
    pub detail: String,
}

impl ErrorReport {
    /// Classifies an agent error.
    #[must_use]
    pub fn from_error(error: &AgentError) -> Self {
        let category = ErrorCategory::of(error);
        let detail = error.to_string();
        Self {
            category,
            message: category.message(&detail),
            detail,
        }
    }

    /// Report for a run stopped at its step bound.
    #[must_use]
    pub fn step_limit(max_steps: usize) -> Self {
        let category = ErrorCategory::StepLimit;
        let detail = format!("agent stopped after {max_steps} steps without a final answer");
        Self {
            category,
            message: category.message(&detail),
            detail,
        }
    }
}

/// Result of [`AgentService::invoke_agent`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationResult {
    /// `true` when the run completed with an answer.
    pub success: bool,
    /// The answer, or `错误: <message>` on failure.
    pub output: String,
    /// Agent that handled the request.
    pub agent_name: String,
    /// Backend in use.
    pub model_type: String,
    /// Strategy metadata such as the `reflection` summary.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Failure details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

/// A partial configuration update. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    /// New active backend.
    pub model_type: Option<String>,
    /// New default agent.
    pub agent_name: Option<String>,
    /// Model for the target backend.
    pub model: Option<String>,
    /// API key for the target backend.
    pub api_key: Option<String>,
    /// Service URL for the target backend.
    pub base_url: Option<String>,
    /// Temperature for the target backend.
    pub temperature: Option<f32>,
}

/// Result of [`AgentService::update_config`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigUpdateOutcome {
    /// Active backend after the update.
    pub model_type: String,
    /// Default agent after the update.
    pub agent_name: String,
    /// The active backend's block, key masked.
    pub backend_config: BackendConfig,
    /// Status message.
    pub message: String,
    /// Set when the new configuration is stored but not usable yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Read-only view of the configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigSnapshot {
    /// Active backend.
    pub model_type: String,
    /// Default agent.
    pub default_agent: String,
    /// Backends the factory can build.
    pub available_models: Vec<String>,
    /// Registered agents.
    pub available_agents: Vec<String>,
    /// The active backend's block, key masked.
    pub current_model_config: BackendConfig,
}

/// Owns the registries, the strategy chain and the agent cache.
pub struct AgentService {
    settings: SharedSettings,
    tools: Arc<ToolRegistry>,
    agents: Arc<AgentRegistry>,
    strategies: Arc<StrategyManager>,
    factory: Arc<dyn BackendFactory>,
    cache: RwLock<HashMap<CacheKey, Arc<dyn Agent>>>,
}

impl AgentService {
    /// Creates a service with empty registries and no strategies.
    #[must_use]
    pub fn new(settings: SharedSettings, factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            strategies: Arc::new(StrategyManager::new(Arc::clone(&settings))),
            settings,
            tools: Arc::new(ToolRegistry::new()),
            agents: Arc::new(AgentRegistry::new()),
            factory,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a service with the built-in tools, agents and strategies.
    #[must_use]
    pub fn with_builtins(settings: SharedSettings, factory: Arc<dyn BackendFactory>) -> Self {
        let service = Self::new(settings, factory);
        register_builtins(&service.tools, &service.agents);
        register_strategies(&service.strategies);
        service
    }

    /// Shared settings.
    #[must_use]
    pub const fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    /// Tool registry.
    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Agent registry.
    #[must_use]
    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// Strategy chain.
    #[must_use]
    pub fn strategies(&self) -> &StrategyManager {
        &self.strategies
    }

    /// Backends the factory can build.
    #[must_use]
    pub fn backends(&self) -> &[BackendKind] {
        self.factory.backends()
    }

    /// Returns the cached agent for `(agent, backend)`, building it on a miss.
    ///
    /// `None` selects the configured default agent or active backend.
    pub async fn get_agent(
        &self,
        agent: Option<&str>,
        backend: Option<&str>,
    ) -> Result<Arc<dyn Agent>, AgentError> {
        let (agent_name, backend_name) = {
            let settings = read_settings(&self.settings);
            (
                agent.map_or_else(|| settings.default_agent.clone(), str::to_string),
                backend.map_or_else(|| settings.model_type.clone(), str::to_string),
            )
        };
        let key = CacheKey {
            agent: agent_name,
            backend: backend_name.parse()?,
        };

        let cached = self.read_cache().get(&key).cloned();
        if let Some(agent) = cached {
            debug!(agent = %key.agent, backend = %key.backend, "agent cache hit");
            return Ok(agent);
        }

        let built = self.build_agent(&key).await?;
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(key).or_insert(built)))
    }

    async fn build_agent(&self, key: &CacheKey) -> Result<Arc<dyn Agent>, AgentError> {
        let definition = self
            .agents
            .get(&key.agent)
            .ok_or_else(|| AgentError::UnknownAgent {
                name: key.agent.clone(),
                available: self.agents.list().join(", "),
            })?;

        if !self.factory.backends().contains(&key.backend) {
            return Err(AgentError::UnsupportedProvider {
                name: key.backend.name().to_string(),
                available: self
                    .factory
                    .backends()
                    .iter()
                    .map(|b| b.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        let (backend, global_options) = {
            let settings = read_settings(&self.settings);
            (
                key.backend.resolve(settings.backend(key.backend)),
                settings.agent.clone(),
            )
        };
        if !self.factory.validate(&backend).await {
            return Err(AgentError::BackendUnavailable {
                name: key.backend.name().to_string(),
            });
        }
        let provider = self.factory.create(&backend)?;

        let tools = ToolSet::from_tools(
            definition
                .tool_groups
                .iter()
                .flat_map(|group| self.tools.tools_in_group(group)),
        );
        if tools.is_empty() {
            return Err(AgentError::NoTools {
                name: definition.name.clone(),
                groups: definition.tool_groups.join(", "),
            });
        }

        let options = Options::layered([&definition.default_options, &global_options]);
        info!(
            agent = %definition.name,
            backend = %key.backend,
            model = %backend.model,
            tools = tools.len(),
            "agent built"
        );
        Ok(Arc::new(BaseAgent::new(
            definition.name.clone(),
            definition.system_prompt.clone(),
            tools,
            provider,
            options,
        )))
    }

    /// Runs `input` through the agent and the enabled strategy chain.
    ///
    /// Never fails: errors are classified into the result.
    pub async fn invoke_agent(&self, agent: Option<&str>, input: &str) -> InvocationResult {
        self.invoke_request(agent, AgentRequest::new(input)).await
    }

    /// Like [`invoke_agent`](Self::invoke_agent) with a prepared request.
    /// An interaction logger is attached unless the request carries an
    /// observer already.
    pub async fn invoke_request(
        &self,
        agent: Option<&str>,
        mut request: AgentRequest,
    ) -> InvocationResult {
        let (agent_name, model_type, logging) = {
            let settings = read_settings(&self.settings);
            (
                agent.map_or_else(|| settings.default_agent.clone(), str::to_string),
                settings.model_type.clone(),
                settings.logging.clone(),
            )
        };
        if request.observer.is_none() {
            request = request.with_observer(Arc::new(LlmLogger::new(&logging)));
        }

        let result = match self.get_agent(Some(&agent_name), None).await {
            Ok(runner) => self.strategies.apply(runner.as_ref(), &request).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(EnhancedOutput {
                output,
                mut metadata,
                outcome: RunOutcome::StepLimitReached { max_steps },
            }) => {
                let report = ErrorReport::step_limit(max_steps);
                warn!(
                    agent = %agent_name,
                    backend = %model_type,
                    error = %report.detail,
                    "agent run incomplete"
                );
                metadata.insert("partial_output".to_string(), Value::String(output));
                InvocationResult {
                    success: false,
                    output: format!("错误: {}", report.message),
                    agent_name,
                    model_type,
                    metadata,
                    error: Some(report),
                }
            }
            Ok(enhanced) => InvocationResult {
                success: true,
                output: enhanced.output,
                agent_name,
                model_type,
                metadata: enhanced.metadata,
                error: None,
            },
            Err(e) => {
                let report = ErrorReport::from_error(&e);
                warn!(
                    agent = %agent_name,
                    backend = %model_type,
                    category = ?report.category,
                    error = %report.detail,
                    "agent invocation failed"
                );
                InvocationResult {
                    success: false,
                    output: format!("错误: {}", report.message),
                    agent_name,
                    model_type,
                    metadata: Map::new(),
                    error: Some(report),
                }
            }
        }
    }

    /// Applies a configuration update.
    ///
    /// Targets are validated before anything changes. An explicit
    /// `model_type` receives `model`, `api_key`, `base_url` and
    /// `temperature`; without one they go to the active backend, except
    /// that an API key for a keyless active backend goes to `deepseek`.
    /// Cached agents for the named agent or any changed backend are
    /// dropped; an update naming neither clears the cache. When the new
    /// backend is usable the agent is rebuilt eagerly; a failure there is
    /// reported as a warning, not an error.
    ///
    /// # Errors
    ///
    /// [`AgentError::UnsupportedProvider`] or [`AgentError::UnknownAgent`]
    /// for an unknown target; settings are unchanged in that case.
    pub async fn update_config(
        &self,
        update: ConfigUpdate,
    ) -> Result<ConfigUpdateOutcome, AgentError> {
        let kind = update
            .model_type
            .as_deref()
            .map(str::parse::<BackendKind>)
            .transpose()?;
        if let Some(agent) = &update.agent_name
            && self.agents.get(agent).is_none()
        {
            return Err(AgentError::UnknownAgent {
                name: agent.clone(),
                available: self.agents.list().join(", "),
            });
        }

        let (active, touched) = {
            let mut settings = write_settings(&self.settings);
            let mut touched: Vec<BackendKind> = kind.into_iter().collect();
            if let Some(kind) = kind {
                settings.model_type = kind.name().to_string();
            }
            if let Some(agent) = &update.agent_name {
                settings.default_agent.clone_from(agent);
            }

            let active = kind
                .or_else(|| settings.model_type.parse().ok())
                .unwrap_or(BackendKind::Ollama);
            if let Some(api_key) = update.api_key {
                let key_target = if kind.is_none() && !active.requires_api_key() {
                    BackendKind::DeepSeek
                } else {
                    active
                };
                if key_target.requires_api_key() {
                    settings.backend_mut(key_target).api_key = Some(api_key);
                    if !touched.contains(&key_target) {
                        touched.push(key_target);
                    }
                } else {
                    debug!(backend = %key_target, "ignoring API key for keyless backend");
                }
            }
            let routed = update.model.is_some()
                || update.base_url.is_some()
                || update.temperature.is_some();
            if routed && !touched.contains(&active) {
                touched.push(active);
            }
            let block = settings.backend_mut(active);
            if let Some(model) = update.model {
                block.model = Some(model);
            }
            if let Some(base_url) = update.base_url {
                block.base_url = Some(base_url);
            }
            if let Some(temperature) = update.temperature {
                block.temperature = Some(temperature);
            }
            (active, touched)
        };

        let agent = update.agent_name.as_deref();
        let dropped = if agent.is_none() && kind.is_none() {
            self.invalidate(None, None)
        } else if touched.is_empty() {
            self.invalidate(agent, None)
        } else {
            touched
                .iter()
                .map(|&backend| self.invalidate(agent, Some(backend)))
                .sum()
        };
        info!(backend = %active, dropped, "configuration updated");

        let (agent_name, resolved, backend_config) = {
            let settings = read_settings(&self.settings);
            (
                settings.default_agent.clone(),
                active.resolve(settings.backend(active)),
                settings.backend(active).redacted(),
            )
        };
        let mut outcome = ConfigUpdateOutcome {
            model_type: active.name().to_string(),
            agent_name,
            backend_config,
            message: "配置已更新".to_string(),
            warning: None,
        };

        if kind.is_some() {
            if !resolved.is_complete() {
                outcome.message = "模型类型已切换，请输入API Key".to_string();
                outcome.warning = Some("API Key未设置，请先输入API Key".to_string());
            } else if let Err(e) = self
                .get_agent(Some(&outcome.agent_name), Some(active.name()))
                .await
            {
                warn!(backend = %active, error = %e, "agent rebuild after update failed");
                outcome.message = "模型类型已切换，但配置验证失败".to_string();
                outcome.warning = Some(format!("请检查配置: {e}"));
            }
        }
        Ok(outcome)
    }

    /// Drops cached agents built for `agent` or running on `backend`. With
    /// both unset the whole cache is cleared. Returns the number of entries
    /// removed.
    pub fn invalidate(&self, agent: Option<&str>, backend: Option<BackendKind>) -> usize {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let before = cache.len();
        if agent.is_none() && backend.is_none() {
            cache.clear();
        } else {
            cache.retain(|key, _| {
                let agent_match = agent.is_some_and(|a| a == key.agent);
                let backend_match = backend.is_some_and(|b| b == key.backend);
                !(agent_match || backend_match)
            });
        }
        before - cache.len()
    }

    /// Current configuration, API keys masked.
    #[must_use]
    pub fn get_config(&self) -> ConfigSnapshot {
        let settings = read_settings(&self.settings);
        let current_model_config = settings
            .model_type
            .parse::<BackendKind>()
            .map(|kind| settings.backend(kind).redacted())
            .unwrap_or_default();
        ConfigSnapshot {
            model_type: settings.model_type.clone(),
            default_agent: settings.default_agent.clone(),
            available_models: self
                .factory
                .backends()
                .iter()
                .map(|b| b.name().to_string())
                .collect(),
            available_agents: self.agents.list(),
            current_model_config,
        }
    }

    /// Number of cached agents.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.read_cache().len()
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, HashMap<CacheKey, Arc<dyn Agent>>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AgentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentService")
            .field("tools", &self.tools)
            .field("agents", &self.agents.list())
            .field("strategies", &self.strategies)
            .field("cached", &self.cached_len())
            .finish_non_exhaustive()
    }
}
