//! Deterministic fallback: primary retrieval, then secondary reference, then nothing

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::invoker::invoke_with_cancel;
use crate::limits::DEFAULT_TOOL_CALL_TIMEOUT_MS;
use crate::registry::{Tool, ToolRegistry};
use crate::types::ToolOutcome;

/// Returned when neither capability produces a usable result
pub const NOTHING_FOUND: &str = "No information found in local RAG or Wikipedia.";

const PRIMARY_LABEL: &str = "[RAG]";
const SECONDARY_LABEL: &str = "[Wikipedia]";

/// Question tokens considered by the relevance gate
const GATE_TOKENS: usize = 5;
/// Results longer than this many words are accepted without a token match
const GATE_MIN_WORDS: usize = 20;

/// Fixed two-step procedure used when the agent loop is missing or fails.
///
/// Holds no per-run state; the same instance serves concurrent runs.
#[derive(Debug, Clone)]
pub struct FallbackOrchestrator {
    primary: Option<Arc<Tool>>,
    secondary: Option<Arc<Tool>>,
    tool_call_timeout_ms: u64,
}

impl FallbackOrchestrator {
    pub fn new(primary: Option<Arc<Tool>>, secondary: Option<Arc<Tool>>) -> Self {
        Self {
            primary,
            secondary,
            tool_call_timeout_ms: DEFAULT_TOOL_CALL_TIMEOUT_MS,
        }
    }

    /// Pick the two capabilities out of a registry by name; missing names are skipped
    pub fn from_registry(registry: &ToolRegistry, primary: &str, secondary: &str) -> Self {
        Self::new(registry.get(primary).cloned(), registry.get(secondary).cloned())
    }

    /// Builder: bound each capability call
    pub fn with_tool_call_timeout_ms(mut self, timeout: u64) -> Self {
        self.tool_call_timeout_ms = timeout;
        self
    }

    pub async fn run(&self, question: &str) -> String {
        self.run_with_cancel(question, &CancellationToken::new())
            .await
    }

    pub async fn run_with_cancel(&self, question: &str, cancel: &CancellationToken) -> String {
        if let Some(primary) = &self.primary {
            match self.call(primary, question, cancel).await {
                Ok(text) if is_relevant(question, &text) => {
                    info!(tool = primary.name(), "Fallback answered from primary retrieval");
                    return format!("{}\n\n{}", PRIMARY_LABEL, text);
                }
                Ok(_) => debug!(tool = primary.name(), "Primary result judged not relevant"),
                Err(report) => return report,
            }
        }

        if let Some(secondary) = &self.secondary {
            match self.call(secondary, question, cancel).await {
                Ok(text) if !text.is_empty() => {
                    info!(tool = secondary.name(), "Fallback answered from secondary reference");
                    return format!("{}\n\n{}", SECONDARY_LABEL, text);
                }
                Ok(_) => debug!(tool = secondary.name(), "Secondary reference returned nothing"),
                Err(report) => return report,
            }
        }

        NOTHING_FOUND.to_string()
    }

    /// Text on success; on failure, the error report that ends the fallback
    async fn call(
        &self,
        tool: &Arc<Tool>,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<String, String> {
        match invoke_with_cancel(tool, question, self.tool_call_timeout_ms, cancel).await {
            ToolOutcome::Success { text } => Ok(text),
            ToolOutcome::Timeout { elapsed_ms } => Err(format!(
                "Fallback orchestrator error: tool '{}' timed out after {}ms",
                tool.name(),
                elapsed_ms
            )),
            ToolOutcome::Failure { error, trace } => Err(format!(
                "Fallback orchestrator error: {}\n\nTraceback:\n{}",
                error,
                if trace.is_empty() {
                    format!("in tool '{}' (set RUST_BACKTRACE=1 for a backtrace)", tool.name())
                } else {
                    trace
                }
            )),
        }
    }
}

/// Relevance gate applied to the primary retrieval result.
///
/// Any text containing "no relevant" is a miss. Otherwise the result is
/// accepted when one of the first few longer question tokens occurs in it,
/// or when it is long enough to be a real passage.
pub fn is_relevant(question: &str, result: &str) -> bool {
    let lower = result.to_lowercase();
    if lower.contains("no relevant") {
        return false;
    }

    let matched = question
        .split_whitespace()
        .filter(|token| token.chars().count() > 2)
        .take(GATE_TOKENS)
        .any(|token| lower.contains(&token.to_lowercase()));

    matched || result.split_whitespace().count() > GATE_MIN_WORDS
}
