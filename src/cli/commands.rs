//! CLI command implementations.
//!
//! Each command builds an [`AgentService`] over the loaded settings and
//! renders the result with [`crate::cli::output`].

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::agent::{AgentRequest, DefaultBackendFactory};
use crate::cli::output::{
    BackendRow, OutputFormat, ToolRow, format_agents, format_backends, format_config,
    format_invocation, format_tools, format_update,
};
use crate::cli::parser::{Cli, Commands, ConfigCommands};
use crate::config::{Options, Settings, default_config_path, read_settings};
use crate::enhance::REFLECTION;
use crate::error::{CommandError, Result};
use crate::service::{AgentService, ConfigUpdate};

/// Parameters for the invoke command.
#[derive(Debug, Clone, Default)]
pub struct InvokeParams<'a> {
    /// User input.
    pub input: &'a str,
    /// Agent override.
    pub agent: Option<&'a str>,
    /// Backend override.
    pub backend: Option<&'a str>,
    /// Force the reflection strategy on.
    pub reflect: bool,
    /// Reflection revise bound.
    pub max_reflections: Option<usize>,
    /// Bypass every strategy.
    pub no_enhance: bool,
}

/// Loads settings from `--config`, or the per-user file when present.
///
/// `config set` may name a file that does not exist yet; it starts from
/// defaults.
///
/// # Errors
///
/// Returns an error if an explicit file is missing or invalid.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let creating = matches!(cli.command, Commands::Config(ConfigCommands::Set { .. }));
    match &cli.config {
        Some(path) if creating && !path.exists() => {
            let mut settings = Settings::default();
            settings.apply_env();
            Ok(settings)
        }
        path => Ok(Settings::load(path.as_deref())?),
    }
}

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
/// * `settings` - Settings loaded with [`load_settings`].
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli, settings: Settings) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Invoke {
            input,
            agent,
            backend,
            reflect,
            max_reflections,
            no_enhance,
        } => {
            let params = InvokeParams {
                input,
                agent: agent.as_deref(),
                backend: backend.as_deref(),
                reflect: *reflect,
                max_reflections: *max_reflections,
                no_enhance: *no_enhance,
            };
            cmd_invoke(settings, &params, format)
        }
        Commands::Agents => {
            let service = service(settings);
            format_agents(&service.agents().definitions(), format)
        }
        Commands::Tools { group } => cmd_tools(&service(settings), group.as_deref(), format),
        Commands::Backends => cmd_backends(&service(settings), format),
        Commands::Config(ConfigCommands::Show) => {
            let service = service(settings);
            let strategies = read_settings(service.settings()).enabled_strategies();
            format_config(&service.get_config(), &strategies, format)
        }
        Commands::Config(ConfigCommands::Set {
            backend,
            agent,
            model,
            api_key,
            base_url,
            temperature,
        }) => {
            let update = ConfigUpdate {
                model_type: backend.clone(),
                agent_name: agent.clone(),
                model: model.clone(),
                api_key: api_key.clone(),
                base_url: base_url.clone(),
                temperature: *temperature,
            };
            cmd_config_set(cli.config.clone(), settings, update, format)
        }
    }
}

fn service(settings: Settings) -> AgentService {
    AgentService::with_builtins(
        Arc::new(RwLock::new(settings)),
        Arc::new(DefaultBackendFactory::new()),
    )
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

/// Applies per-run overrides to the settings before the service sees them.
fn apply_invoke_overrides(settings: &mut Settings, params: &InvokeParams<'_>) {
    if let Some(backend) = params.backend {
        settings.model_type = backend.to_string();
    }
    if params.reflect || params.max_reflections.is_some() {
        if !settings.enabled_strategies().iter().any(|s| s == REFLECTION) {
            let mut names = settings.enabled_strategies();
            names.push(REFLECTION.to_string());
            settings.enhancement.strategies = names;
        }
        let block = settings
            .enhancement
            .blocks
            .entry(REFLECTION.to_string())
            .or_insert_with(Options::new);
        block.set("enable", true);
        if let Some(max) = params.max_reflections {
            block.set("max_iterations", max);
        }
    }
}

fn cmd_invoke(
    mut settings: Settings,
    params: &InvokeParams<'_>,
    format: OutputFormat,
) -> Result<String> {
    apply_invoke_overrides(&mut settings, params);
    let service = service(settings);

    let mut request = AgentRequest::new(params.input);
    if params.no_enhance {
        request = request.without_enhancement();
    }

    let result = runtime()?.block_on(service.invoke_request(params.agent, request));
    let rendered = format_invocation(&result, format)?;
    if result.success {
        Ok(rendered)
    } else {
        Err(CommandError::ExecutionFailed(rendered).into())
    }
}

fn cmd_tools(service: &AgentService, group: Option<&str>, format: OutputFormat) -> Result<String> {
    let groups = group.map_or_else(|| service.tools().list_groups(), |g| vec![g.to_string()]);
    let rows: Vec<ToolRow> = groups
        .iter()
        .flat_map(|group| {
            service
                .tools()
                .tools_in_group(group)
                .into_iter()
                .map(move |tool| ToolRow {
                    name: tool.name().to_string(),
                    group: group.clone(),
                    description: tool.description().to_string(),
                })
        })
        .collect();
    format_tools(&rows, format)
}

fn cmd_backends(service: &AgentService, format: OutputFormat) -> Result<String> {
    let settings = read_settings(service.settings());
    let rows: Vec<BackendRow> = service
        .backends()
        .iter()
        .map(|&kind| {
            let resolved = kind.resolve(settings.backend(kind));
            BackendRow {
                name: kind.name().to_string(),
                configured: resolved.is_complete(),
                model: resolved.model,
                base_url: resolved.base_url,
                requires_api_key: kind.requires_api_key(),
                active: settings.model_type == kind.name(),
            }
        })
        .collect();
    format_backends(&rows, format)
}

fn cmd_config_set(
    path: Option<PathBuf>,
    settings: Settings,
    update: ConfigUpdate,
    format: OutputFormat,
) -> Result<String> {
    let path = path.or_else(default_config_path).ok_or_else(|| {
        CommandError::ExecutionFailed("no settings file path; pass --config".to_string())
    })?;
    let service = service(settings);
    let outcome = runtime()?
        .block_on(service.update_config(update))
        .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
    read_settings(service.settings()).save(&path)?;
    format_update(&outcome, format)
}
