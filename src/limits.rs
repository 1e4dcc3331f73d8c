//! Run limits for the model-driven agent loop

use serde::{Deserialize, Serialize};

use crate::types::OrchestratorError;

// ============================================================================
// Default limit constants
// ============================================================================

/// Per-tool-call timeout (`TOOL_CALL_TIMEOUT`), 30 seconds
pub const DEFAULT_TOOL_CALL_TIMEOUT_MS: u64 = 30_000;
/// Whole-run budget checked at turn boundaries (`AGENT_TOTAL_TIMEOUT`), 2 minutes
pub const DEFAULT_TOTAL_TIMEOUT_MS: u64 = 120_000;
/// Dispatches allowed per tool name per run (`MAX_SAME_TOOL_CALLS`)
pub const DEFAULT_MAX_SAME_TOOL_CALLS: u32 = 3;
/// Turns allowed per run
pub const DEFAULT_LOOP_LIMIT: u32 = 8;

pub const QUICK_TOOL_CALL_TIMEOUT_MS: u64 = 5_000;
pub const QUICK_TOTAL_TIMEOUT_MS: u64 = 20_000;
pub const QUICK_LOOP_LIMIT: u32 = 4;

pub const EXTENDED_TOOL_CALL_TIMEOUT_MS: u64 = 60_000;
pub const EXTENDED_TOTAL_TIMEOUT_MS: u64 = 600_000;
pub const EXTENDED_LOOP_LIMIT: u32 = 16;

/// Limits applied to a single agent run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentLimits {
    /// Timeout for one tool invocation in milliseconds
    pub tool_call_timeout_ms: u64,
    /// Wall-clock budget for the whole run in milliseconds
    pub total_timeout_ms: u64,
    /// Maximum dispatches of the same tool within one run
    pub max_same_tool_calls: u32,
    /// Maximum number of model turns
    pub loop_limit: u32,
    /// Optional timeout for one model call; `None` leaves the call unbounded
    #[serde(default)]
    pub model_call_timeout_ms: Option<u64>,
}

impl Default for AgentLimits {
    fn default() -> Self {
        Self {
            tool_call_timeout_ms: DEFAULT_TOOL_CALL_TIMEOUT_MS,
            total_timeout_ms: DEFAULT_TOTAL_TIMEOUT_MS,
            max_same_tool_calls: DEFAULT_MAX_SAME_TOOL_CALLS,
            loop_limit: DEFAULT_LOOP_LIMIT,
            model_call_timeout_ms: None,
        }
    }
}

impl AgentLimits {
    /// Create new limits with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Tight limits for interactive use
    pub fn quick() -> Self {
        Self {
            tool_call_timeout_ms: QUICK_TOOL_CALL_TIMEOUT_MS,
            total_timeout_ms: QUICK_TOTAL_TIMEOUT_MS,
            loop_limit: QUICK_LOOP_LIMIT,
            ..Default::default()
        }
    }

    /// Generous limits for slow local models
    pub fn extended() -> Self {
        Self {
            tool_call_timeout_ms: EXTENDED_TOOL_CALL_TIMEOUT_MS,
            total_timeout_ms: EXTENDED_TOTAL_TIMEOUT_MS,
            loop_limit: EXTENDED_LOOP_LIMIT,
            ..Default::default()
        }
    }

    /// Builder: set tool call timeout
    pub fn with_tool_call_timeout_ms(mut self, timeout: u64) -> Self {
        self.tool_call_timeout_ms = timeout;
        self
    }

    /// Builder: set total run timeout
    pub fn with_total_timeout_ms(mut self, timeout: u64) -> Self {
        self.total_timeout_ms = timeout;
        self
    }

    /// Builder: set per-tool repetition cap
    pub fn with_max_same_tool_calls(mut self, max: u32) -> Self {
        self.max_same_tool_calls = max;
        self
    }

    /// Builder: set loop limit
    pub fn with_loop_limit(mut self, limit: u32) -> Self {
        self.loop_limit = limit;
        self
    }

    /// Builder: bound each model call
    pub fn with_model_call_timeout_ms(mut self, timeout: u64) -> Self {
        self.model_call_timeout_ms = Some(timeout);
        self
    }

    /// Reject limits under which no run could make progress
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.loop_limit == 0 {
            return Err(OrchestratorError::InvalidLimits(
                "loop_limit must be at least 1".to_string(),
            ));
        }
        if self.tool_call_timeout_ms == 0 {
            return Err(OrchestratorError::InvalidLimits(
                "tool_call_timeout_ms must be positive".to_string(),
            ));
        }
        if self.total_timeout_ms == 0 {
            return Err(OrchestratorError::InvalidLimits(
                "total_timeout_ms must be positive".to_string(),
            ));
        }
        if self.model_call_timeout_ms == Some(0) {
            return Err(OrchestratorError::InvalidLimits(
                "model_call_timeout_ms must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}
