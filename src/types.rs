//! Core types for agent runs

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tagged result of a single tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The tool returned within its timeout. Empty text is still a success.
    Success { text: String },
    /// The tool did not return in time; its result is discarded
    Timeout { elapsed_ms: u64 },
    /// The tool returned an error or panicked
    Failure { error: String, trace: String },
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success { .. })
    }

    /// Render the outcome as feedback text for the next model prompt
    pub fn to_feedback(&self, tool_name: &str) -> String {
        match self {
            ToolOutcome::Success { text } => format!("[TOOL RESULT]\n{}", text),
            ToolOutcome::Timeout { elapsed_ms } => format!(
                "[TOOL TIMEOUT] Tool '{}' did not respond within {}ms. \
                 Try a different tool or answer with the information you already have.",
                tool_name, elapsed_ms
            ),
            ToolOutcome::Failure { error, trace } => {
                let mut block = format!("[TOOL ERROR] Tool '{}' failed: {}", tool_name, error);
                if !trace.is_empty() {
                    block.push_str("\n\nTrace:\n");
                    block.push_str(trace);
                }
                block
            }
        }
    }
}

/// Action extracted from a raw model response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedAction {
    /// The model asked for a tool to be run
    ToolCall { name: String, input: String },
    /// The model answered in plain text
    FinalAnswer { text: String },
    /// A brace-delimited span was present but was not a tool request
    Unparseable { raw: String },
}

/// Record of a single dispatched tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Name of the tool that was called
    pub tool_name: String,
    /// Input passed to the tool
    pub input: String,
    /// What the invocation produced
    pub outcome: ToolOutcome,
    /// Wall-clock duration of the invocation in milliseconds
    pub duration_ms: u64,
}

impl ToolCallRecord {
    pub fn new(tool_name: String, input: String, outcome: ToolOutcome, duration_ms: u64) -> Self {
        Self {
            tool_name,
            input,
            outcome,
            duration_ms,
        }
    }
}

/// One request/response cycle with the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// 1-based turn number within the run
    pub index: u32,
    /// Prompt sent to the model
    pub prompt: String,
    /// Raw model response
    pub response: String,
    /// Action parsed from the response
    pub action: ParsedAction,
    /// Tool call made during this turn, if any
    pub tool_call: Option<ToolCallRecord>,
}

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    FinalAnswer,
    UnknownTool { name: String },
    ToolLimit { tool: String, limit: u32 },
    TotalTimeout { limit_ms: u64 },
    LoopLimit { limit: u32 },
    Cancelled,
}

impl Termination {
    /// Human-readable abort message; `None` for a final answer
    pub fn abort_message(&self, available_tools: &[&str]) -> Option<String> {
        match self {
            Termination::FinalAnswer => None,
            Termination::UnknownTool { name } => Some(format!(
                "Unknown tool requested: '{}'. Available tools: {}",
                name,
                available_tools.join(", ")
            )),
            Termination::ToolLimit { tool, limit } => Some(format!(
                "Aborting: tool '{}' was requested more than {} times (possible loop).",
                tool, limit
            )),
            Termination::TotalTimeout { limit_ms } => Some(format!(
                "Aborting: agent exceeded its total timeout of {}ms.",
                limit_ms
            )),
            Termination::LoopLimit { limit } => Some(format!(
                "Aborting: agent exceeded reasoning loop limit ({} turns) without a final answer.",
                limit
            )),
            Termination::Cancelled => Some("Run cancelled.".to_string()),
        }
    }
}

/// Full result of one model-driven run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// The run's text result: the final answer or an abort message
    pub output: String,
    /// Why the run stopped
    pub termination: Termination,
    /// Every turn taken, in order
    pub turns: Vec<Turn>,
    /// Total wall-clock time in milliseconds
    pub elapsed_ms: u64,
}

impl RunReport {
    /// All tool calls made during the run
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallRecord> {
        self.turns.iter().filter_map(|turn| turn.tool_call.as_ref())
    }

    /// Number of times the named tool was dispatched
    pub fn calls_to(&self, tool_name: &str) -> usize {
        self.tool_calls()
            .filter(|call| call.tool_name == tool_name)
            .count()
    }
}

/// Errors that can occur while building or running the orchestrator
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Language model call failed: {0}")]
    ModelError(String),

    #[error("Language model call timed out after {0}ms")]
    ModelTimeout(u64),

    #[error("Agent failed on turn {turn} after {elapsed_ms}ms: {source}")]
    AgentFailed {
        turn: u32,
        elapsed_ms: u64,
        #[source]
        source: Box<OrchestratorError>,
    },

    #[error("Language model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Invalid agent limits: {0}")]
    InvalidLimits(String),

    #[error("Tool registry is empty")]
    NoTools,

    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_feedback() {
        let outcome = ToolOutcome::Success {
            text: "Mars is the fourth planet.".to_string(),
        };
        assert_eq!(
            outcome.to_feedback("wikipedia_search"),
            "[TOOL RESULT]\nMars is the fourth planet."
        );
    }

    #[test]
    fn test_timeout_feedback_names_tool() {
        let outcome = ToolOutcome::Timeout { elapsed_ms: 500 };
        let feedback = outcome.to_feedback("web_search");
        assert!(feedback.starts_with("[TOOL TIMEOUT]"));
        assert!(feedback.contains("web_search"));
        assert!(feedback.contains("500ms"));
    }

    #[test]
    fn test_failure_feedback_includes_trace() {
        let outcome = ToolOutcome::Failure {
            error: "connection refused".to_string(),
            trace: "at fetch".to_string(),
        };
        let feedback = outcome.to_feedback("arxiv_search");
        assert!(feedback.starts_with("[TOOL ERROR]"));
        assert!(feedback.contains("connection refused"));
        assert!(feedback.contains("at fetch"));
    }

    #[test]
    fn test_abort_messages() {
        let unknown = Termination::UnknownTool {
            name: "calculator".to_string(),
        };
        let msg = unknown.abort_message(&["rag_search"]).unwrap();
        assert!(msg.contains("calculator"));
        assert!(msg.contains("rag_search"));

        let limit = Termination::ToolLimit {
            tool: "rag_search".to_string(),
            limit: 3,
        };
        let msg = limit.abort_message(&[]).unwrap();
        assert!(msg.contains("rag_search"));
        assert!(msg.contains('3'));
        assert!(msg.contains("possible loop"));

        assert!(Termination::FinalAnswer.abort_message(&[]).is_none());
    }

    #[test]
    fn test_report_counts_calls() {
        let record = |name: &str| ToolCallRecord::new(
            name.to_string(),
            "q".to_string(),
            ToolOutcome::Success { text: String::new() },
            1,
        );
        let turn = |index, call| Turn {
            index,
            prompt: String::new(),
            response: String::new(),
            action: ParsedAction::FinalAnswer { text: String::new() },
            tool_call: call,
        };
        let report = RunReport {
            output: "done".to_string(),
            termination: Termination::FinalAnswer,
            turns: vec![
                turn(1, Some(record("a"))),
                turn(2, Some(record("b"))),
                turn(3, Some(record("a"))),
                turn(4, None),
            ],
            elapsed_ms: 3,
        };
        assert_eq!(report.tool_calls().count(), 3);
        assert_eq!(report.calls_to("a"), 2);
        assert_eq!(report.calls_to("c"), 0);
    }
}
