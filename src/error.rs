//! Error types for refine-rs.
//!
//! Each layer has its own enum: [`AgentError`] for the agent runtime,
//! backends and strategies, [`ConfigError`] for settings loading, and
//! [`CommandError`] for the CLI. [`Error`] unifies them at the crate edge.

use thiserror::Error;

/// Result alias used by the CLI and settings layers.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Agent runtime failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Errors raised by agents, backends, tools and enhancement strategies.
#[derive(Error, Debug)]
pub enum AgentError {
    /// A backend that authenticates with an API key has none configured.
    #[error("API key not set for backend '{backend}'")]
    ApiKeyMissing {
        /// Backend name.
        backend: String,
    },

    /// The model backend rejected or failed a request.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Error text reported by the backend client.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// Backend name not recognised.
    #[error("unsupported backend '{name}' (available: {available})")]
    UnsupportedProvider {
        /// Requested backend name.
        name: String,
        /// Comma-separated list of known backends.
        available: String,
    },

    /// Backend configuration failed validation (missing key, unreachable host).
    #[error("backend '{name}' configuration is invalid or the service is unavailable")]
    BackendUnavailable {
        /// Backend name.
        name: String,
    },

    /// No agent definition registered under this name.
    #[error("unknown agent '{name}' (registered: {available})")]
    UnknownAgent {
        /// Requested agent name.
        name: String,
        /// Comma-separated list of registered agents.
        available: String,
    },

    /// The agent's tool groups resolved to an empty tool set.
    #[error("agent '{name}' has no tools available (groups: {groups})")]
    NoTools {
        /// Agent name.
        name: String,
        /// Comma-separated tool group names.
        groups: String,
    },

    /// A tool invocation failed.
    #[error("tool '{name}' failed: {message}")]
    ToolExecution {
        /// Tool name.
        name: String,
        /// Failure description.
        message: String,
    },

    /// An enhancement strategy failed.
    #[error("strategy '{name}' failed: {message}")]
    Strategy {
        /// Strategy name.
        name: String,
        /// Failure description.
        message: String,
    },
}

/// Errors raised while loading or parsing settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Settings file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// File path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Settings file could not be written.
    #[error("failed to write config file '{path}': {source}")]
    Write {
        /// File path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Settings file is not valid JSON for the settings schema.
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        /// File path.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by CLI commands.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The command ran but did not succeed.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Output could not be rendered in the requested format.
    #[error("output formatting failed: {0}")]
    OutputFormat(String),
}
