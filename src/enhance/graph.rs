//! The reflect-and-revise state machine.
//!
//! ```text
//! Execute  -> Critique
//! Critique -> Revise
//! Revise   -> Critique   if needs_revision && iteration < max_iterations
//! Revise   -> Finalize   otherwise
//! ```
//!
//! `iteration` never decreases and a revision only happens while it is
//! below `max_iterations`, so a run makes at most `max_iterations + 1`
//! critique calls, `max_iterations` revise calls and one execution.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::agent::reflection::{Critique, ReflectionAgent};
use crate::agent::{Agent, AgentRequest, AgentResponse, RunOutcome};
use crate::error::AgentError;
use crate::logging::CallObserver;

/// Default revision bound.
pub const DEFAULT_MAX_ITERATIONS: usize = 2;

/// Critique and revise operations used by the state machine.
#[async_trait]
pub trait Critic: Send + Sync {
    /// Evaluates a candidate answer.
    async fn critique(
        &self,
        user_input: &str,
        candidate: &str,
        observer: Option<&dyn CallObserver>,
    ) -> Result<Critique, AgentError>;

    /// Rewrites an answer given its critique.
    async fn revise(
        &self,
        user_input: &str,
        previous: &str,
        critique: &str,
        observer: Option<&dyn CallObserver>,
    ) -> Result<String, AgentError>;
}

#[async_trait]
impl Critic for ReflectionAgent {
    async fn critique(
        &self,
        user_input: &str,
        candidate: &str,
        observer: Option<&dyn CallObserver>,
    ) -> Result<Critique, AgentError> {
        Self::critique(self, user_input, candidate, observer).await
    }

    async fn revise(
        &self,
        user_input: &str,
        previous: &str,
        critique: &str,
        observer: Option<&dyn CallObserver>,
    ) -> Result<String, AgentError> {
        Self::revise(self, user_input, previous, critique, observer).await
    }
}

/// States of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectionStep {
    /// Run the target agent once.
    Execute,
    /// Critique the current answer.
    Critique,
    /// Revise when the critique asks for it.
    Revise,
    /// Expose the result.
    Finalize,
}

/// Per-call machine state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReflectionState {
    /// The user's input.
    pub user_input: String,
    /// The agent's first answer.
    pub agent_output: String,
    /// The answer under review.
    pub current_output: String,
    /// Last critique text.
    pub critique: String,
    /// Completed revisions.
    pub iteration: usize,
    /// Revision bound.
    pub max_iterations: usize,
    /// Verdict of the last critique.
    pub needs_revision: bool,
    /// Set on `Finalize`.
    pub final_output: Option<String>,
}

impl ReflectionState {
    /// Fresh state for one call.
    #[must_use]
    pub fn new(user_input: &str, max_iterations: usize) -> Self {
        Self {
            user_input: user_input.to_string(),
            max_iterations,
            ..Self::default()
        }
    }

    /// `true` when the last critique asked for a revision and the bound allows one.
    #[must_use]
    pub const fn can_revise(&self) -> bool {
        self.needs_revision && self.iteration < self.max_iterations
    }
}

/// The step after `step`, or `None` once finalized.
#[must_use]
pub const fn transition(step: ReflectionStep, state: &ReflectionState) -> Option<ReflectionStep> {
    match step {
        ReflectionStep::Execute => Some(ReflectionStep::Critique),
        ReflectionStep::Critique => Some(ReflectionStep::Revise),
        ReflectionStep::Revise if state.can_revise() => Some(ReflectionStep::Critique),
        ReflectionStep::Revise => Some(ReflectionStep::Finalize),
        ReflectionStep::Finalize => None,
    }
}

/// What a finished run exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflectionOutcome {
    /// Final answer.
    pub output: String,
    /// Completed revisions.
    pub iterations: usize,
    /// Last critique text.
    pub critique: String,
    /// The agent's first answer.
    pub original_output: String,
    /// How the agent's run ended.
    pub run_outcome: RunOutcome,
}

/// One reflect-and-revise run over a target agent.
pub struct ReflectionGraph<'a> {
    agent: &'a dyn Agent,
    critic: &'a dyn Critic,
    max_iterations: usize,
}

impl<'a> ReflectionGraph<'a> {
    /// Creates a run over `agent` reviewed by `critic`.
    #[must_use]
    pub fn new(agent: &'a dyn Agent, critic: &'a dyn Critic, max_iterations: usize) -> Self {
        Self {
            agent,
            critic,
            max_iterations,
        }
    }

    /// Drives the machine to `Finalize`.
    ///
    /// With `seed` set, `Execute` adopts it as the agent's answer instead of
    /// invoking the agent. Otherwise the agent runs once with enhancement
    /// disabled, so an agent wrapped by this strategy does not recurse.
    ///
    /// # Errors
    ///
    /// Propagates agent and critic errors.
    pub async fn run(
        &self,
        request: &AgentRequest,
        seed: Option<AgentResponse>,
    ) -> Result<ReflectionOutcome, AgentError> {
        let observer = request.observer();
        let mut seed = seed;
        let mut run_outcome = RunOutcome::Completed;
        let mut state = ReflectionState::new(&request.text, self.max_iterations);
        let mut step = Some(ReflectionStep::Execute);

        while let Some(current) = step {
            debug!(step = ?current, iteration = state.iteration, "reflection step");
            match current {
                ReflectionStep::Execute => {
                    let response = match seed.take() {
                        Some(response) => response,
                        None => self.agent.invoke(&request.without_enhancement()).await?,
                    };
                    run_outcome = response.outcome;
                    state.agent_output.clone_from(&response.output);
                    state.current_output = response.output;
                    state.iteration = 0;
                }
                ReflectionStep::Critique => {
                    let critique = self
                        .critic
                        .critique(&state.user_input, &state.current_output, observer)
                        .await?;
                    state.critique = critique.text;
                    state.needs_revision = critique.needs_revision;
                }
                ReflectionStep::Revise => {
                    if state.can_revise() {
                        state.current_output = self
                            .critic
                            .revise(
                                &state.user_input,
                                &state.current_output,
                                &state.critique,
                                observer,
                            )
                            .await?;
                        state.iteration += 1;
                    }
                }
                ReflectionStep::Finalize => {
                    state.final_output = Some(state.current_output.clone());
                }
            }
            step = transition(current, &state);
        }

        Ok(ReflectionOutcome {
            output: state.final_output.unwrap_or(state.current_output),
            iterations: state.iteration,
            critique: state.critique,
            original_output: state.agent_output,
            run_outcome,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proptest::prelude::*;

    use crate::agent::mock::{FixedAgent, ScriptedProvider};

    /// Critic with a fixed verdict that counts its calls.
    struct CountingCritic {
        verdict: bool,
        critiques: AtomicUsize,
        revisions: AtomicUsize,
    }

    impl CountingCritic {
        fn new(verdict: bool) -> Self {
            Self {
                verdict,
                critiques: AtomicUsize::new(0),
                revisions: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Critic for CountingCritic {
        async fn critique(
            &self,
            _user_input: &str,
            _candidate: &str,
            _observer: Option<&dyn CallObserver>,
        ) -> Result<Critique, AgentError> {
            self.critiques.fetch_add(1, Ordering::SeqCst);
            Ok(Critique {
                text: if self.verdict { "不完整" } else { "很好" }.to_string(),
                needs_revision: self.verdict,
            })
        }

        async fn revise(
            &self,
            _user_input: &str,
            previous: &str,
            _critique: &str,
            _observer: Option<&dyn CallObserver>,
        ) -> Result<String, AgentError> {
            self.revisions.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{previous}（改进版）"))
        }
    }

    fn agent(output: &str) -> FixedAgent {
        FixedAgent::new(output, ScriptedProvider::fixed("unused"))
    }

    #[test]
    fn test_transitions() {
        let mut state = ReflectionState::new("q", 1);
        assert_eq!(
            transition(ReflectionStep::Execute, &state),
            Some(ReflectionStep::Critique)
        );
        assert_eq!(
            transition(ReflectionStep::Critique, &state),
            Some(ReflectionStep::Revise)
        );
        assert_eq!(
            transition(ReflectionStep::Revise, &state),
            Some(ReflectionStep::Finalize)
        );
        state.needs_revision = true;
        assert_eq!(
            transition(ReflectionStep::Revise, &state),
            Some(ReflectionStep::Critique)
        );
        state.iteration = 1;
        assert_eq!(
            transition(ReflectionStep::Revise, &state),
            Some(ReflectionStep::Finalize)
        );
        assert_eq!(transition(ReflectionStep::Finalize, &state), None);
    }

    #[tokio::test]
    async fn test_never_revise_single_critique() {
        let target = agent("随机笑话A");
        let critic = CountingCritic::new(false);
        let outcome = ReflectionGraph::new(&target, &critic, DEFAULT_MAX_ITERATIONS)
            .run(&AgentRequest::new("讲个笑话"), None)
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));

        assert_eq!(critic.critiques.load(Ordering::SeqCst), 1);
        assert_eq!(critic.revisions.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.output, "随机笑话A");
        assert_eq!(outcome.output, outcome.original_output);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(target.invocations(), 1);
    }

    #[tokio::test]
    async fn test_joke_example_single_iteration() {
        let target = agent("随机笑话A");
        let critic = CountingCritic::new(true);
        let outcome = ReflectionGraph::new(&target, &critic, 1)
            .run(&AgentRequest::new("讲个笑话"), None)
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));

        assert_eq!(outcome.output, "随机笑话A（改进版）");
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.critique, "不完整");
        assert_eq!(outcome.original_output, "随机笑话A");
        assert_eq!(outcome.run_outcome, RunOutcome::Completed);
    }

    #[tokio::test]
    async fn test_seed_skips_execution() {
        let target = agent("unused");
        let critic = CountingCritic::new(false);
        let outcome = ReflectionGraph::new(&target, &critic, 2)
            .run(
                &AgentRequest::new("q"),
                Some(AgentResponse {
                    output: "seeded".to_string(),
                    outcome: RunOutcome::StepLimitReached { max_steps: 3 },
                }),
            )
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        assert_eq!(outcome.output, "seeded");
        assert_eq!(outcome.run_outcome, RunOutcome::StepLimitReached { max_steps: 3 });
        assert_eq!(target.invocations(), 0);
    }

    #[tokio::test]
    async fn test_zero_bound_never_revises() {
        let target = agent("a");
        let critic = CountingCritic::new(true);
        let outcome = ReflectionGraph::new(&target, &critic, 0)
            .run(&AgentRequest::new("q"), None)
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        assert_eq!(outcome.output, "a");
        assert_eq!(critic.critiques.load(Ordering::SeqCst), 1);
        assert_eq!(critic.revisions.load(Ordering::SeqCst), 0);
    }

    proptest! {
        #[test]
        fn prop_always_revise_terminates_within_bound(max_iterations in 0usize..8) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap_or_else(|e| panic!("runtime: {e}"));
            let target = agent("a");
            let critic = CountingCritic::new(true);
            let outcome = runtime
                .block_on(ReflectionGraph::new(&target, &critic, max_iterations)
                    .run(&AgentRequest::new("q"), None))
                .unwrap_or_else(|e| panic!("run failed: {e}"));

            let critiques = critic.critiques.load(Ordering::SeqCst);
            let revisions = critic.revisions.load(Ordering::SeqCst);
            prop_assert!(critiques <= max_iterations + 1);
            prop_assert!(revisions <= max_iterations);
            prop_assert_eq!(revisions, max_iterations);
            prop_assert_eq!(outcome.iterations, max_iterations);
            prop_assert_eq!(target.invocations(), 1);
        }
    }
}
