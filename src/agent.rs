//! Model-driven agent loop
//!
//! Each turn prompts the model with the tool catalog, the question and the
//! previous tool's feedback, then either dispatches the requested tool or
//! returns the model's text as the answer. Runs are bounded by a loop limit,
//! a per-tool repetition cap and a total wall-clock budget that is checked
//! at turn boundaries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::invoker::invoke_with_cancel;
use crate::limits::AgentLimits;
use crate::model::LanguageModel;
use crate::parse::parse_action;
use crate::registry::ToolRegistry;
use crate::types::{
    OrchestratorError, ParsedAction, RunReport, Termination, ToolCallRecord, Turn,
};

const INSTRUCTIONS: &str = "You are a research assistant that answers questions by calling tools.";

const PROTOCOL: &str = r#"To call a tool, reply with only a JSON object:
{"tool": "<tool name>", "input": "<text to pass to the tool>"}
When you have enough information, reply with the final answer as plain text and no JSON."#;

/// Mutable state of one run. Never outlives the `run` call that created it.
struct LoopState {
    started: Instant,
    per_tool_call_counts: HashMap<String, u32>,
    last_feedback: Option<String>,
    turns_taken: u32,
    turns: Vec<Turn>,
}

impl LoopState {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            per_tool_call_counts: HashMap::new(),
            last_feedback: None,
            turns_taken: 0,
            turns: Vec::new(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Count one more dispatch of `tool` and return the new total
    fn record_dispatch(&mut self, tool: &str) -> u32 {
        let count = self.per_tool_call_counts.entry(tool.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

/// The primary, model-driven path
pub struct AgentLoop {
    model: Arc<dyn LanguageModel>,
    registry: Arc<ToolRegistry>,
    limits: AgentLimits,
}

impl AgentLoop {
    /// Fails if the limits are unusable or there are no tools to route to
    pub fn new(
        model: Arc<dyn LanguageModel>,
        registry: Arc<ToolRegistry>,
        limits: AgentLimits,
    ) -> Result<Self, OrchestratorError> {
        limits.validate()?;
        if registry.is_empty() {
            return Err(OrchestratorError::NoTools);
        }
        Ok(Self {
            model,
            registry,
            limits,
        })
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn limits(&self) -> &AgentLimits {
        &self.limits
    }

    /// Prompt for one turn; `feedback` is the previous tool outcome, if any
    pub fn build_prompt(&self, question: &str, feedback: Option<&str>) -> String {
        let mut prompt = format!(
            "{}\n\nAvailable tools:\n{}\n\n{}\n\nQuestion: {}",
            INSTRUCTIONS,
            self.registry.render_catalog(),
            PROTOCOL,
            question
        );
        if let Some(feedback) = feedback {
            prompt.push_str("\n\nTool result:\n");
            prompt.push_str(feedback);
        }
        prompt
    }

    pub async fn run(&self, question: &str) -> Result<RunReport, OrchestratorError> {
        self.run_with_cancel(question, &CancellationToken::new())
            .await
    }

    /// Run the loop for `question`.
    ///
    /// Only a failed model call returns `Err`; every other way a run can end
    /// is reported through [`RunReport::termination`].
    pub async fn run_with_cancel(
        &self,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<RunReport, OrchestratorError> {
        let mut state = LoopState::new();

        while state.turns_taken < self.limits.loop_limit {
            if cancel.is_cancelled() {
                return Ok(self.finish(state, Termination::Cancelled, None));
            }
            if state.elapsed_ms() > self.limits.total_timeout_ms {
                warn!(
                    elapsed_ms = state.elapsed_ms(),
                    limit_ms = self.limits.total_timeout_ms,
                    "Agent run exceeded total timeout"
                );
                let limit_ms = self.limits.total_timeout_ms;
                return Ok(self.finish(state, Termination::TotalTimeout { limit_ms }, None));
            }

            state.turns_taken += 1;
            let index = state.turns_taken;
            let prompt = self.build_prompt(question, state.last_feedback.as_deref());
            debug!(turn = index, prompt_chars = prompt.len(), "Prompting model");

            let response = tokio::select! {
                completed = self.complete(&prompt) => completed.map_err(|e| {
                    OrchestratorError::AgentFailed {
                        turn: index,
                        elapsed_ms: state.elapsed_ms(),
                        source: Box::new(e),
                    }
                })?,
                _ = cancel.cancelled() => {
                    return Ok(self.finish(state, Termination::Cancelled, None));
                }
            };

            let action = parse_action(&response);
            let (name, input) = match &action {
                ParsedAction::ToolCall { name, input } => (name.clone(), input.clone()),
                ParsedAction::FinalAnswer { .. } | ParsedAction::Unparseable { .. } => {
                    info!(turn = index, "Agent produced final answer");
                    let output = response.clone();
                    state.turns.push(Turn {
                        index,
                        prompt,
                        response,
                        action,
                        tool_call: None,
                    });
                    return Ok(self.finish(state, Termination::FinalAnswer, Some(output)));
                }
            };

            let mut turn = Turn {
                index,
                prompt,
                response,
                action,
                tool_call: None,
            };

            let Some(tool) = self.registry.get(&name) else {
                warn!(turn = index, tool = %name, "Model requested unknown tool");
                state.turns.push(turn);
                return Ok(self.finish(state, Termination::UnknownTool { name }, None));
            };

            let count = state.record_dispatch(&name);
            if count > self.limits.max_same_tool_calls {
                let limit = self.limits.max_same_tool_calls;
                warn!(turn = index, tool = %name, limit, "Tool repetition cap exceeded");
                state.turns.push(turn);
                return Ok(self.finish(state, Termination::ToolLimit { tool: name, limit }, None));
            }

            info!(turn = index, tool = %name, call = count, "Dispatching tool");
            let call_started = Instant::now();
            let outcome =
                invoke_with_cancel(tool, &input, self.limits.tool_call_timeout_ms, cancel).await;
            let duration_ms = call_started.elapsed().as_millis() as u64;

            state.last_feedback = Some(outcome.to_feedback(&name));
            turn.tool_call = Some(ToolCallRecord::new(name, input, outcome, duration_ms));
            state.turns.push(turn);
        }

        let limit = self.limits.loop_limit;
        warn!(limit, "Agent exhausted loop limit");
        Ok(self.finish(state, Termination::LoopLimit { limit }, None))
    }

    async fn complete(&self, prompt: &str) -> Result<String, OrchestratorError> {
        match self.limits.model_call_timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), self.model.complete(prompt))
                .await
                .map_err(|_| OrchestratorError::ModelTimeout(ms))?,
            None => self.model.complete(prompt).await,
        }
    }

    fn finish(&self, state: LoopState, termination: Termination, answer: Option<String>) -> RunReport {
        let output = answer
            .or_else(|| termination.abort_message(&self.registry.names()))
            .unwrap_or_default();
        RunReport {
            output,
            termination,
            elapsed_ms: state.elapsed_ms(),
            turns: state.turns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoModel;

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn complete(&self, _prompt: &str) -> Result<String, OrchestratorError> {
            Ok("plain answer".to_string())
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .register_executor("wikipedia_search", "Search Wikipedia.", |q| Ok(q.to_string()))
            .unwrap();
        registry
            .register_executor("rag_search", "Search local documents.", |q| Ok(q.to_string()))
            .unwrap();
        Arc::new(registry)
    }

    fn agent() -> AgentLoop {
        AgentLoop::new(Arc::new(EchoModel), registry(), AgentLimits::default()).unwrap()
    }

    #[test]
    fn test_construction_requires_tools() {
        let result = AgentLoop::new(
            Arc::new(EchoModel),
            Arc::new(ToolRegistry::new()),
            AgentLimits::default(),
        );
        assert!(matches!(result, Err(OrchestratorError::NoTools)));
    }

    #[test]
    fn test_construction_validates_limits() {
        let result = AgentLoop::new(
            Arc::new(EchoModel),
            registry(),
            AgentLimits::default().with_loop_limit(0),
        );
        assert!(matches!(result, Err(OrchestratorError::InvalidLimits(_))));
    }

    #[test]
    fn test_first_prompt_has_catalog_and_question() {
        let prompt = agent().build_prompt("What is Mars?", None);
        let wiki = prompt.find("- wikipedia_search: Search Wikipedia.").unwrap();
        let rag = prompt.find("- rag_search: Search local documents.").unwrap();
        assert!(wiki < rag);
        assert!(prompt.contains("Question: What is Mars?"));
        assert!(!prompt.contains("Tool result:"));
    }

    #[test]
    fn test_follow_up_prompt_appends_feedback() {
        let prompt = agent().build_prompt("What is Mars?", Some("[TOOL RESULT]\nA planet."));
        assert!(prompt.ends_with("Tool result:\n[TOOL RESULT]\nA planet."));
    }

    #[tokio::test]
    async fn test_plain_answer_ends_run() {
        let report = agent().run("What is Mars?").await.unwrap();
        assert_eq!(report.output, "plain answer");
        assert_eq!(report.termination, Termination::FinalAnswer);
        assert_eq!(report.turns.len(), 1);
    }

    #[test]
    fn test_state_counts_per_tool() {
        let mut state = LoopState::new();
        assert_eq!(state.record_dispatch("a"), 1);
        assert_eq!(state.record_dispatch("b"), 1);
        assert_eq!(state.record_dispatch("a"), 2);
    }
}
