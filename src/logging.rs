//! LLM interaction logging.
//!
//! A [`CallObserver`] is attached to each invocation and sees every model
//! request, response and failure, plus reflection summaries. [`LlmLogger`]
//! is the standard observer: it appends full records to the interaction log
//! file and mirrors short previews to `tracing` when console output is on.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Local;
use tracing::{error, info, warn};

use crate::agent::message::{ChatRequest, ChatResponse};
use crate::agent::provider::LlmProvider;
use crate::config::LoggingSettings;
use crate::error::AgentError;

/// Console preview length in characters.
const PREVIEW_CHARS: usize = 200;

/// Summary of one reflection run.
#[derive(Debug, Clone, Copy)]
pub struct ReflectionRecord<'a> {
    /// Completed revise rounds.
    pub iterations: usize,
    /// The agent's first answer.
    pub original_output: &'a str,
    /// Last critique text.
    pub critique: &'a str,
    /// The answer returned to the caller.
    pub final_output: &'a str,
}

/// Receives model-call events during an invocation.
pub trait CallObserver: Send + Sync {
    /// Called before each model request.
    fn on_request(&self, _request: &ChatRequest) {}
    /// Called after each successful model response.
    fn on_response(&self, _response: &ChatResponse) {}
    /// Called when a model request fails.
    fn on_error(&self, _error: &AgentError) {}
    /// Called once a reflection run finishes.
    fn on_reflection(&self, _record: &ReflectionRecord<'_>) {}
}

/// Sends a chat request, reporting it to `observer` when one is attached.
///
/// # Errors
///
/// Propagates the provider error after reporting it.
pub async fn observed_chat(
    provider: &dyn LlmProvider,
    request: &ChatRequest,
    observer: Option<&dyn CallObserver>,
) -> Result<ChatResponse, AgentError> {
    if let Some(obs) = observer {
        obs.on_request(request);
    }
    let result = provider.chat(request).await;
    if let Some(obs) = observer {
        match &result {
            Ok(response) => obs.on_response(response),
            Err(e) => obs.on_error(e),
        }
    }
    result
}

/// File-backed interaction logger.
#[derive(Debug)]
pub struct LlmLogger {
    path: PathBuf,
    console: bool,
    calls: AtomicU64,
}

impl LlmLogger {
    /// Creates a logger from the `logging` settings block.
    #[must_use]
    pub fn new(settings: &LoggingSettings) -> Self {
        Self {
            path: settings.llm_log_file.clone(),
            console: settings.llm_console_output,
            calls: AtomicU64::new(0),
        }
    }

    /// Number of model requests seen so far.
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn append(&self, section: &str, body: &str) {
        let result = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                writeln!(
                    file,
                    "[{}] {section}\n{body}\n{}",
                    Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    "-".repeat(60)
                )
            });
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failed to write LLM log");
        }
    }
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

impl CallObserver for LlmLogger {
    fn on_request(&self, request: &ChatRequest) {
        let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        let prompt = request
            .messages
            .iter()
            .map(|m| format!("{:?}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        self.append(
            &format!("LLM call #{n} request (model: {})", request.model),
            &prompt,
        );
        if self.console {
            let last = request.messages.last().map_or("", |m| m.content.as_str());
            info!(call = n, model = %request.model, prompt = %preview(last), "LLM request");
        }
    }

    fn on_response(&self, response: &ChatResponse) {
        let n = self.call_count();
        let tools: Vec<_> = response.tool_calls.iter().map(|c| c.name.as_str()).collect();
        let body = if tools.is_empty() {
            response.content.clone()
        } else {
            format!("{}\n[tool calls: {}]", response.content, tools.join(", "))
        };
        self.append(&format!("LLM call #{n} response"), &body);
        if self.console {
            info!(
                call = n,
                tokens = response.usage.total_tokens,
                response = %preview(&response.content),
                "LLM response"
            );
        }
    }

    fn on_error(&self, err: &AgentError) {
        let n = self.call_count();
        self.append(&format!("LLM call #{n} error"), &err.to_string());
        error!(call = n, error = %err, "LLM call failed");
    }

    fn on_reflection(&self, record: &ReflectionRecord<'_>) {
        self.append(
            &format!("Reflection ({} iterations)", record.iterations),
            &format!(
                "original:\n{}\n\ncritique:\n{}\n\nfinal:\n{}",
                record.original_output, record.critique, record.final_output
            ),
        );
        info!(
            iterations = record.iterations,
            changed = record.original_output != record.final_output,
            "reflection finished"
        );
    }
}
