//! QA Orchestrator - tool-routing question answering for local language models
//!
//! A language model is asked, turn by turn, to either call one of a small set of
//! retrieval tools or give a final answer. The loop is bounded on every axis:
//! each tool call runs under a timeout, each tool may only be called a limited
//! number of times per run, the run has a total time budget and a turn limit.
//! When the model is unavailable or the loop fails, a deterministic fallback
//! queries local retrieval first and Wikipedia second.
//!
//! ## Features
//!
//! - **`backends`** (default) - Ollama client and the network-backed tools
//! - **`cli`** - the `qa-cli` interactive binary
//! - **`server`** - the `qa-server` HTTP binary
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use qa_orchestrator::{AgentLimits, AgentLoop, Tool, ToolRegistry};
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(Tool::new("echo", "Repeat the input.", |input| Ok(input.to_string())))?;
//!
//! let agent = AgentLoop::new(model, Arc::new(registry), AgentLimits::default())?;
//! let report = agent.run("What is Mars?").await?;
//! println!("{}", report.output);
//! ```

pub mod agent;
pub mod config;
pub mod dispatcher;
pub mod fallback;
pub mod invoker;
pub mod limits;
pub mod model;
pub mod parse;
pub mod registry;
pub mod tools;
pub mod types;

#[cfg(feature = "backends")]
pub mod bootstrap;

#[cfg(feature = "server")]
pub mod server;

pub use agent::AgentLoop;
pub use config::OrchestratorConfig;
pub use dispatcher::Dispatcher;
pub use fallback::{FallbackOrchestrator, NOTHING_FOUND, is_relevant};
pub use invoker::{invoke, invoke_with_cancel};
pub use limits::{
    AgentLimits,
    // Default limit constants
    DEFAULT_LOOP_LIMIT, DEFAULT_MAX_SAME_TOOL_CALLS, DEFAULT_TOOL_CALL_TIMEOUT_MS,
    DEFAULT_TOTAL_TIMEOUT_MS,
    // Profile constants
    EXTENDED_LOOP_LIMIT, EXTENDED_TOOL_CALL_TIMEOUT_MS, EXTENDED_TOTAL_TIMEOUT_MS,
    QUICK_LOOP_LIMIT, QUICK_TOOL_CALL_TIMEOUT_MS, QUICK_TOTAL_TIMEOUT_MS,
};
pub use model::LanguageModel;
pub use parse::parse_action;
pub use registry::{Tool, ToolExecutor, ToolRegistry};
pub use types::{
    OrchestratorError, ParsedAction, RunReport, Termination, ToolCallRecord, ToolOutcome, Turn,
};

#[cfg(feature = "backends")]
pub use bootstrap::{Services, bootstrap};
#[cfg(feature = "backends")]
pub use model::OllamaModel;
