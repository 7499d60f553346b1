//! Tool-less reflection agent: critique a candidate answer, then revise it.
//!
//! Whether a critique asks for a revision is decided by a pluggable
//! [`VerdictClassifier`]. The default [`KeywordClassifier`] reads the
//! `是否需要改进` / `Needs revision` field first and falls back to scanning
//! for improvement phrases.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::message::ChatRequest;
use super::prompt::{build_critique_prompt, build_revise_prompt};
use super::provider::LlmProvider;
use crate::error::AgentError;
use crate::logging::{CallObserver, observed_chat};

/// A critique and its verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Critique {
    /// Raw critique text from the model.
    pub text: String,
    /// Whether the candidate should be revised.
    pub needs_revision: bool,
}

/// Decides whether critique text asks for a revision.
pub trait VerdictClassifier: Send + Sync {
    /// `true` when the critique calls for a revision. Ambiguous text must
    /// return `false`.
    fn needs_revision(&self, critique: &str) -> bool;
}

/// Field-label and keyword based classifier.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    labels: Vec<String>,
    affirmative: Vec<String>,
    negative: Vec<String>,
    keywords: Vec<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(ToString::to_string).collect();
        Self {
            labels: owned(&["是否需要改进", "needs revision"]),
            affirmative: owned(&["是", "需要", "yes"]),
            negative: owned(&["否", "不需要", "无需", "不用", "no"]),
            keywords: owned(&[
                "需要改进",
                "有错误",
                "不完整",
                "不准确",
                "应该改进",
                "需要修正",
                "needs improvement",
                "incomplete",
                "inaccurate",
                "should be improved",
                "has errors",
            ]),
        }
    }
}

impl KeywordClassifier {
    /// Explicit verdict in the value of a field label, if any.
    ///
    /// The value is the rest of the label's line with separators trimmed;
    /// it must start with a verdict token. Negative tokens are checked
    /// first so `不需要` is not read as `需要`.
    fn field_verdict(&self, lower: &str) -> Option<bool> {
        let starts =
            |value: &str, tokens: &[String]| tokens.iter().any(|t| value.starts_with(t.as_str()));
        self.labels.iter().find_map(|label| {
            lower.match_indices(label.as_str()).find_map(|(at, _)| {
                let value = lower[at + label.len()..]
                    .lines()
                    .next()?
                    .trim_start_matches(|c: char| {
                        c.is_whitespace() || matches!(c, ':' | '：' | '*' | '[' | '【' | '"')
                    });
                if starts(value, &self.negative) {
                    Some(false)
                } else if starts(value, &self.affirmative) {
                    Some(true)
                } else {
                    None
                }
            })
        })
    }

    fn keyword_verdict(&self, lower: &str) -> bool {
        let stripped = self
            .labels
            .iter()
            .fold(lower.to_string(), |text, label| text.replace(label.as_str(), " "));
        self.keywords.iter().any(|k| stripped.contains(k.as_str()))
    }
}

impl VerdictClassifier for KeywordClassifier {
    fn needs_revision(&self, critique: &str) -> bool {
        let lower = critique.to_lowercase();
        self.field_verdict(&lower)
            .unwrap_or_else(|| self.keyword_verdict(&lower))
    }
}

/// Stateless critique/revise operations over a model handle.
pub struct ReflectionAgent {
    provider: Arc<dyn LlmProvider>,
    classifier: Arc<dyn VerdictClassifier>,
}

impl ReflectionAgent {
    /// Creates a reflection agent with the default classifier.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            classifier: Arc::new(KeywordClassifier::default()),
        }
    }

    /// Replaces the verdict classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn VerdictClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    async fn ask(
        &self,
        prompt: &str,
        observer: Option<&dyn CallObserver>,
    ) -> Result<String, AgentError> {
        let request =
            ChatRequest::single_turn(self.provider.model(), self.provider.temperature(), prompt);
        let response = observed_chat(self.provider.as_ref(), &request, observer).await?;
        Ok(response.content)
    }

    /// Evaluates a candidate answer with one model call.
    ///
    /// # Errors
    ///
    /// Propagates the model backend error.
    pub async fn critique(
        &self,
        user_input: &str,
        candidate: &str,
        observer: Option<&dyn CallObserver>,
    ) -> Result<Critique, AgentError> {
        let text = self
            .ask(&build_critique_prompt(user_input, candidate), observer)
            .await?;
        let needs_revision = self.classifier.needs_revision(&text);
        debug!(needs_revision, "critique classified");
        Ok(Critique {
            text,
            needs_revision,
        })
    }

    /// Produces a revised answer with one model call.
    ///
    /// # Errors
    ///
    /// Propagates the model backend error.
    pub async fn revise(
        &self,
        user_input: &str,
        previous: &str,
        critique: &str,
        observer: Option<&dyn CallObserver>,
    ) -> Result<String, AgentError> {
        self.ask(&build_revise_prompt(user_input, previous, critique), observer)
            .await
    }
}

impl std::fmt::Debug for ReflectionAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectionAgent")
            .field("provider", &self.provider.name())
            .finish_non_exhaustive()
    }
}
