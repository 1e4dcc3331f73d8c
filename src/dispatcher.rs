//! Entry point: model-driven loop when available, deterministic fallback otherwise

use std::error::Error as _;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::agent::AgentLoop;
use crate::fallback::FallbackOrchestrator;
use crate::invoker::capture_trace;
use crate::limits::AgentLimits;
use crate::model::LanguageModel;
use crate::registry::ToolRegistry;
use crate::types::{OrchestratorError, RunReport};

const FAILURE_HEADER: &str = "Agent execution failed, falling back.";

/// Routes each question to the agent loop or the fallback.
///
/// Built once per process and shared by reference; holds no per-run state.
pub struct Dispatcher {
    agent: Option<AgentLoop>,
    fallback: FallbackOrchestrator,
}

impl Dispatcher {
    pub fn new(agent: Option<AgentLoop>, fallback: FallbackOrchestrator) -> Self {
        Self { agent, fallback }
    }

    /// Dispatcher with no model-driven loop
    pub fn fallback_only(fallback: FallbackOrchestrator) -> Self {
        Self::new(None, fallback)
    }

    /// Build the agent loop from a model that may have failed to start.
    ///
    /// Any construction failure is logged and leaves the dispatcher on the fallback path.
    pub fn assemble(
        model: Result<Arc<dyn LanguageModel>, OrchestratorError>,
        registry: Arc<ToolRegistry>,
        limits: AgentLimits,
        fallback: FallbackOrchestrator,
    ) -> Self {
        let agent = model.and_then(|model| AgentLoop::new(model, registry, limits));
        match agent {
            Ok(agent) => {
                info!(tools = agent.registry().len(), "Agent loop ready");
                Self::new(Some(agent), fallback)
            }
            Err(e) => {
                warn!(error = %e, "Agent loop unavailable, using fallback only");
                Self::fallback_only(fallback)
            }
        }
    }

    pub fn has_agent(&self) -> bool {
        self.agent.is_some()
    }

    pub fn agent(&self) -> Option<&AgentLoop> {
        self.agent.as_ref()
    }

    /// Answer `question`. Never fails: every failure mode is described in the returned text.
    pub async fn run(&self, question: &str) -> String {
        self.run_with_cancel(question, &CancellationToken::new())
            .await
    }

    pub async fn run_with_cancel(&self, question: &str, cancel: &CancellationToken) -> String {
        let Some(agent) = &self.agent else {
            return self.fallback.run_with_cancel(question, cancel).await;
        };

        match agent.run_with_cancel(question, cancel).await {
            Ok(report) => report.output,
            Err(e) => self.recover(question, e, cancel).await,
        }
    }

    /// Run the agent loop and return its full report, without fallback
    pub async fn run_detailed(&self, question: &str) -> Option<Result<RunReport, OrchestratorError>> {
        match &self.agent {
            Some(agent) => Some(agent.run(question).await),
            None => None,
        }
    }

    async fn recover(&self, question: &str, e: OrchestratorError, cancel: &CancellationToken) -> String {
        error!(error = %e, "Agent run failed, running fallback");
        let details = describe_error(&e);
        let fallback = self.fallback.run_with_cancel(question, cancel).await;
        format!(
            "{}\n\nAgent error:\n{}\n\nFallback result:\n{}",
            FAILURE_HEADER, details, fallback
        )
    }
}

/// Error message, its cause chain and, when enabled, a backtrace
fn describe_error(e: &OrchestratorError) -> String {
    let mut text = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        text.push_str("\ncaused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    let trace = capture_trace();
    if !trace.is_empty() {
        text.push_str("\n\n");
        text.push_str(&trace);
    }
    text
}
