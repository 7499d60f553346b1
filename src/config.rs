//! Settings with builder pattern, JSON file and environment variable support.
//!
//! Settings are resolved in order: defaults → config file → environment
//! variables. The recognised key set mirrors the nested configuration
//! mapping consumed by the service:
//!
//! ```json
//! {
//!   "model_type": "ollama",
//!   "default_agent": "joke",
//!   "ollama":   { "model": "qwen2.5:1.5b", "base_url": "http://localhost:11434", "temperature": 0.7 },
//!   "gemini":   { "model": "...", "api_key": "...", "temperature": 0.7 },
//!   "deepseek": { "model": "...", "api_key": "...", "base_url": "...", "temperature": 0.7 },
//!   "agent": { "verbose": true, "max_iterations": 20 },
//!   "enhancement": {
//!     "strategies": ["reflection"],
//!     "reflection": { "enable": true, "max_iterations": 2, "log_reflection": true }
//!   },
//!   "logging": { "llm_console_output": false, "llm_log_file": "logs/llm_interactions.log" }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AgentError, ConfigError};

/// Default backend name.
pub const DEFAULT_MODEL_TYPE: &str = "ollama";
/// Default agent name.
pub const DEFAULT_AGENT: &str = "joke";
/// Default LLM interaction log path.
pub const DEFAULT_LLM_LOG_FILE: &str = "logs/llm_interactions.log";
/// Default sampling temperature for every backend.
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Settings shared between the service and the strategy manager.
pub type SharedSettings = Arc<RwLock<Settings>>;

/// Acquires a read guard, recovering the data from a poisoned lock.
pub fn read_settings(settings: &SharedSettings) -> RwLockReadGuard<'_, Settings> {
    settings.read().unwrap_or_else(PoisonError::into_inner)
}

/// Acquires a write guard, recovering the data from a poisoned lock.
pub fn write_settings(settings: &SharedSettings) -> RwLockWriteGuard<'_, Settings> {
    settings.write().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// A free-form option block (agent runtime options, strategy config).
///
/// Layers are merged key by key with [`Options::layered`]; later layers win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(Map<String, Value>);

impl Options {
    /// Creates an empty option block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges option layers from lowest to highest precedence.
    ///
    /// For strategy configuration the layers are, in order: the legacy
    /// top-level block, the shared `enhancement.<name>` block, and the
    /// strategy's own config.
    #[must_use]
    pub fn layered<'a, I>(layers: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
    {
        let mut merged = Map::new();
        for layer in layers {
            for (key, value) in &layer.0 {
                merged.insert(key.clone(), value.clone());
            }
        }
        Self(merged)
    }

    /// Sets a key, returning `self` for chaining.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets a key in place.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Raw value lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Boolean lookup. Non-boolean values read as absent.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Unsigned integer lookup. Negative or non-integer values read as absent.
    #[must_use]
    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.0
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
    }

    /// String lookup.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// The conventional `enable` flag, `false` when absent.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.get_bool("enable").unwrap_or(false)
    }

    /// Returns `true` if the block has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Options {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Known model backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local Ollama server.
    Ollama,
    /// Google Gemini.
    Gemini,
    /// `DeepSeek` models, official API or `SiliconFlow`.
    DeepSeek,
}

impl BackendKind {
    /// All backends in display order.
    pub const ALL: [Self; 3] = [Self::Ollama, Self::Gemini, Self::DeepSeek];

    /// Backend name as used in configuration and cache keys.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Gemini => "gemini",
            Self::DeepSeek => "deepseek",
        }
    }

    /// Comma-separated list of all backend names.
    #[must_use]
    pub fn available() -> String {
        Self::ALL.map(Self::name).join(", ")
    }

    /// Whether the backend authenticates with an API key.
    #[must_use]
    pub const fn requires_api_key(self) -> bool {
        !matches!(self, Self::Ollama)
    }

    /// Default model identifier.
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Ollama => "qwen2.5:1.5b",
            Self::Gemini => "gemini-2.0-flash-exp",
            Self::DeepSeek => "deepseek-ai/DeepSeek-V3.2-Exp",
        }
    }

    /// Default service URL.
    #[must_use]
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            Self::DeepSeek => "https://api.siliconflow.cn/v1",
        }
    }

    /// Environment variables consulted for the API key, in priority order.
    #[must_use]
    pub const fn api_key_env(self) -> &'static [&'static str] {
        match self {
            Self::Ollama => &[],
            Self::Gemini => &["GOOGLE_API_KEY"],
            Self::DeepSeek => &["DEEPSEEK_API_KEY", "SILICONFLOW_API_KEY"],
        }
    }

    /// Environment variable overriding the default service URL.
    #[must_use]
    pub const fn base_url_env(self) -> Option<&'static str> {
        match self {
            Self::Ollama => Some("OLLAMA_BASE_URL"),
            Self::Gemini | Self::DeepSeek => None,
        }
    }

    /// Fills unset fields of `config` from defaults and the environment.
    #[must_use]
    pub fn resolve(self, config: &BackendConfig) -> ResolvedBackend {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                self.api_key_env()
                    .iter()
                    .find_map(|var| std::env::var(var).ok().filter(|k| !k.trim().is_empty()))
            });

        ResolvedBackend {
            kind: self,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| self.default_model().to_string()),
            api_key,
            base_url: config
                .base_url
                .clone()
                .or_else(|| {
                    self.base_url_env()
                        .and_then(|var| std::env::var(var).ok())
                        .filter(|url| !url.trim().is_empty())
                })
                .unwrap_or_else(|| self.default_base_url().to_string()),
            temperature: config.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "gemini" => Ok(Self::Gemini),
            "deepseek" => Ok(Self::DeepSeek),
            other => Err(AgentError::UnsupportedProvider {
                name: other.to_string(),
                available: Self::available(),
            }),
        }
    }
}

/// Per-backend configuration block. Unset fields fall back to backend defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Model identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// API key (keyed backends only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Service URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl BackendConfig {
    /// Copy with the API key masked, for display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            api_key: self.api_key.as_ref().map(|_| "***".to_string()),
            ..self.clone()
        }
    }
}

/// A backend configuration with every field resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBackend {
    /// Which backend.
    pub kind: BackendKind,
    /// Model identifier.
    pub model: String,
    /// API key from config or environment.
    pub api_key: Option<String>,
    /// Service URL.
    pub base_url: String,
    /// Sampling temperature.
    pub temperature: f32,
}

impl ResolvedBackend {
    /// `true` unless the backend needs an API key and none is set.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        !self.kind.requires_api_key() || self.api_key.is_some()
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// The `enhancement` block: enabled strategy list plus per-strategy blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementSettings {
    /// Strategy names applied in order.
    pub strategies: Vec<String>,
    /// Shared per-strategy blocks keyed by strategy name.
    #[serde(flatten)]
    pub blocks: BTreeMap<String, Options>,
}

/// The `logging` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Mirror LLM call previews to the console log.
    pub llm_console_output: bool,
    /// File receiving full LLM interaction records.
    pub llm_log_file: PathBuf,
    /// Default `tracing` filter for the binary.
    pub log_level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            llm_console_output: false,
            llm_log_file: PathBuf::from(DEFAULT_LLM_LOG_FILE),
            log_level: "info".to_string(),
        }
    }
}

/// Global configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Active backend name.
    pub model_type: String,
    /// Agent used when a request names none.
    pub default_agent: String,
    /// Ollama block.
    pub ollama: BackendConfig,
    /// Gemini block.
    pub gemini: BackendConfig,
    /// `DeepSeek` block.
    pub deepseek: BackendConfig,
    /// Global agent runtime options (`verbose`, `max_iterations`).
    pub agent: Options,
    /// Enhancement strategy configuration.
    pub enhancement: EnhancementSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Unrecognised top-level keys, kept so a save round-trips them.
    /// Object values are legacy blocks such as a top-level `reflection`.
    #[serde(flatten)]
    pub legacy: BTreeMap<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_type: DEFAULT_MODEL_TYPE.to_string(),
            default_agent: DEFAULT_AGENT.to_string(),
            ollama: BackendConfig::default(),
            gemini: BackendConfig::default(),
            deepseek: BackendConfig::default(),
            agent: Options::new().with("verbose", true),
            enhancement: EnhancementSettings::default(),
            logging: LoggingSettings::default(),
            legacy: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Creates a new builder starting from defaults.
    #[must_use]
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Loads settings: defaults → file → environment.
    ///
    /// With `path` set the file must exist. Without it the per-user file
    /// (`<config dir>/refine-rs/config.json`) is read when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        settings.apply_env();
        Ok(settings)
    }

    /// Parses a JSON settings file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Writes the settings as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let raw = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(path, raw).map_err(write_err)
    }

    /// Overrides the active backend and default agent from the environment.
    pub fn apply_env(&mut self) {
        if let Ok(model_type) = std::env::var("MODEL_TYPE")
            && !model_type.trim().is_empty()
        {
            self.model_type = model_type;
        }
        if let Ok(agent) = std::env::var("DEFAULT_AGENT")
            && !agent.trim().is_empty()
        {
            self.default_agent = agent;
        }
    }

    /// The block for a backend.
    #[must_use]
    pub const fn backend(&self, kind: BackendKind) -> &BackendConfig {
        match kind {
            BackendKind::Ollama => &self.ollama,
            BackendKind::Gemini => &self.gemini,
            BackendKind::DeepSeek => &self.deepseek,
        }
    }

    /// Mutable block for a backend.
    pub const fn backend_mut(&mut self, kind: BackendKind) -> &mut BackendConfig {
        match kind {
            BackendKind::Ollama => &mut self.ollama,
            BackendKind::Gemini => &mut self.gemini,
            BackendKind::DeepSeek => &mut self.deepseek,
        }
    }

    /// Strategy names to apply, in order.
    ///
    /// Uses `enhancement.strategies`; when that list is empty, falls back to
    /// the legacy convention of a top-level `reflection.enable` flag.
    #[must_use]
    pub fn enabled_strategies(&self) -> Vec<String> {
        if !self.enhancement.strategies.is_empty() {
            return self.enhancement.strategies.clone();
        }
        if self
            .legacy_options("reflection")
            .is_some_and(|block| block.enabled())
        {
            return vec!["reflection".to_string()];
        }
        Vec::new()
    }

    /// Effective configuration for a strategy.
    ///
    /// Precedence, highest first: `local` → `enhancement.<name>` → legacy
    /// top-level `<name>` block.
    #[must_use]
    pub fn strategy_config(&self, name: &str, local: &Options) -> Options {
        let empty = Options::new();
        let legacy = self.legacy_options(name).unwrap_or_default();
        Options::layered([
            &legacy,
            self.enhancement.blocks.get(name).unwrap_or(&empty),
            local,
        ])
    }

    /// A legacy top-level block. Non-object values read as absent.
    #[must_use]
    pub fn legacy_options(&self, name: &str) -> Option<Options> {
        match self.legacy.get(name)? {
            Value::Object(map) => Some(Options(map.clone())),
            _ => None,
        }
    }
}

/// Per-user settings file location.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("refine-rs").join("config.json"))
}

/// Builder for [`Settings`].
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// Sets the active backend name.
    #[must_use]
    pub fn model_type(mut self, model_type: impl Into<String>) -> Self {
        self.settings.model_type = model_type.into();
        self
    }

    /// Sets the default agent.
    #[must_use]
    pub fn default_agent(mut self, agent: impl Into<String>) -> Self {
        self.settings.default_agent = agent.into();
        self
    }

    /// Replaces a backend block.
    #[must_use]
    pub fn backend(mut self, kind: BackendKind, config: BackendConfig) -> Self {
        *self.settings.backend_mut(kind) = config;
        self
    }

    /// Sets a global agent option.
    #[must_use]
    pub fn agent_option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.settings.agent.set(key, value);
        self
    }

    /// Sets the enabled strategy list.
    #[must_use]
    pub fn strategies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings.enhancement.strategies = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the shared `enhancement.<name>` block.
    #[must_use]
    pub fn strategy_block(mut self, name: &str, block: Options) -> Self {
        self.settings
            .enhancement
            .blocks
            .insert(name.to_string(), block);
        self
    }

    /// Sets a legacy top-level block.
    #[must_use]
    pub fn legacy_block(mut self, name: &str, block: Options) -> Self {
        self.settings
            .legacy
            .insert(name.to_string(), Value::Object(block.0));
        self
    }

    /// Sets the LLM interaction log file.
    #[must_use]
    pub fn llm_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.logging.llm_log_file = path.into();
        self
    }

    /// Enables console mirroring of LLM calls.
    #[must_use]
    pub const fn llm_console_output(mut self, enabled: bool) -> Self {
        self.settings.logging.llm_console_output = enabled;
        self
    }

    /// Builds the [`Settings`].
    #[must_use]
    pub fn build(self) -> Settings {
        self.settings
    }

    /// Builds shared settings.
    #[must_use]
    pub fn shared(self) -> SharedSettings {
        Arc::new(RwLock::new(self.settings))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.model_type, "ollama");
        assert_eq!(settings.default_agent, "joke");
        assert_eq!(settings.agent.get_bool("verbose"), Some(true));
        assert!(settings.enabled_strategies().is_empty());
        assert_eq!(
            settings.logging.llm_log_file,
            PathBuf::from(DEFAULT_LLM_LOG_FILE)
        );
    }

    #[test]
    fn test_layered_later_wins() {
        let low = Options::new().with("enable", false).with("max_iterations", 5);
        let mid = Options::new().with("max_iterations", 3);
        let high = Options::new().with("enable", true);
        let merged = Options::layered([&low, &mid, &high]);
        assert!(merged.enabled());
        assert_eq!(merged.get_usize("max_iterations"), Some(3));
    }

    #[test]
    fn test_strategy_config_three_way_precedence() {
        let settings = Settings::builder()
            .legacy_block(
                "reflection",
                Options::new()
                    .with("enable", true)
                    .with("max_iterations", 9)
                    .with("log_reflection", false),
            )
            .strategy_block("reflection", Options::new().with("max_iterations", 4))
            .build();
        let local = Options::new().with("log_reflection", true);

        let merged = settings.strategy_config("reflection", &local);
        assert!(merged.enabled());
        assert_eq!(merged.get_usize("max_iterations"), Some(4));
        assert_eq!(merged.get_bool("log_reflection"), Some(true));
    }

    #[test]
    fn test_strategy_config_unknown_strategy_uses_local_only() {
        let settings = Settings::default();
        let local = Options::new().with("enable", true);
        assert_eq!(settings.strategy_config("upper", &local), local);
    }

    #[test]
    fn test_enabled_strategies_legacy_fallback() {
        let settings = Settings::builder()
            .legacy_block("reflection", Options::new().with("enable", true))
            .build();
        assert_eq!(settings.enabled_strategies(), vec!["reflection"]);

        let settings = Settings::builder()
            .legacy_block("reflection", Options::new().with("enable", true))
            .strategies(["upper"])
            .build();
        assert_eq!(settings.enabled_strategies(), vec!["upper"]);
    }

    #[test]
    fn test_deserialize_nested_shape() {
        let raw = json!({
            "model_type": "gemini",
            "gemini": { "api_key": "k", "model": "gemini-pro" },
            "agent": { "verbose": false, "max_iterations": 7 },
            "enhancement": {
                "strategies": ["reflection"],
                "reflection": { "enable": true, "max_iterations": 1 }
            },
            "reflection": { "enable": false },
            "logging": { "llm_console_output": true }
        });
        let settings: Settings =
            serde_json::from_value(raw).unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert_eq!(settings.model_type, "gemini");
        assert_eq!(settings.gemini.model.as_deref(), Some("gemini-pro"));
        assert_eq!(settings.agent.get_usize("max_iterations"), Some(7));
        assert_eq!(settings.enhancement.strategies, vec!["reflection"]);
        assert_eq!(
            settings.enhancement.blocks["reflection"].get_usize("max_iterations"),
            Some(1)
        );
        assert_eq!(
            settings
                .legacy_options("reflection")
                .and_then(|block| block.get_bool("enable")),
            Some(false)
        );
        assert!(settings.logging.llm_console_output);
        assert_eq!(settings.default_agent, "joke");
    }

    #[test]
    fn test_scalar_top_level_keys_are_tolerated() {
        let raw = json!({
            "version": 1,
            "reflection": { "enable": true, "max_iterations": 3 },
            "note": "hand edited"
        });
        let settings: Settings =
            serde_json::from_value(raw).unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert_eq!(settings.legacy_options("version"), None);
        assert_eq!(settings.enabled_strategies(), vec!["reflection"]);
        assert_eq!(
            settings
                .strategy_config("reflection", &Options::new())
                .get_usize("max_iterations"),
            Some(3)
        );

        let saved = serde_json::to_value(&settings).unwrap_or_else(|e| panic!("save failed: {e}"));
        assert_eq!(saved["version"], 1);
        assert_eq!(saved["note"], "hand edited");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"default_agent": "code"}"#)
            .unwrap_or_else(|e| panic!("write failed: {e}"));
        let settings = Settings::from_file(&path).unwrap_or_else(|e| panic!("load failed: {e}"));
        assert_eq!(settings.default_agent, "code");
        assert_eq!(settings.model_type, "ollama");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let path = dir.path().join("nested").join("config.json");
        let settings = Settings::builder()
            .model_type("deepseek")
            .strategies(["reflection"])
            .strategy_block("reflection", Options::new().with("enable", true))
            .build();
        settings.save(&path).unwrap_or_else(|e| panic!("save failed: {e}"));
        let loaded = Settings::from_file(&path).unwrap_or_else(|e| panic!("load failed: {e}"));
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_from_file_invalid_json() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap_or_else(|e| panic!("write failed: {e}"));
        let result = Settings::from_file(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("Gemini".parse::<BackendKind>().ok(), Some(BackendKind::Gemini));
        let err = "claude".parse::<BackendKind>();
        assert!(matches!(err, Err(AgentError::UnsupportedProvider { .. })));
    }

    #[test]
    fn test_resolve_uses_defaults_and_explicit_key() {
        let resolved = BackendKind::Ollama.resolve(&BackendConfig::default());
        assert_eq!(resolved.model, "qwen2.5:1.5b");
        assert_eq!(resolved.base_url, "http://localhost:11434");
        assert!(resolved.is_complete());

        let config = BackendConfig {
            api_key: Some("sk-test".to_string()),
            temperature: Some(0.2),
            ..BackendConfig::default()
        };
        let resolved = BackendKind::DeepSeek.resolve(&config);
        assert_eq!(resolved.api_key.as_deref(), Some("sk-test"));
        assert!((resolved.temperature - 0.2).abs() < f32::EPSILON);
        assert!(resolved.is_complete());
    }

    #[test]
    fn test_redacted_masks_key() {
        let config = BackendConfig {
            api_key: Some("secret".to_string()),
            ..BackendConfig::default()
        };
        assert_eq!(config.redacted().api_key.as_deref(), Some("***"));
    }
}
