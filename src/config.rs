//! Process configuration: TOML file plus environment overrides

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::limits::{
    AgentLimits, DEFAULT_LOOP_LIMIT, DEFAULT_MAX_SAME_TOOL_CALLS, DEFAULT_TOOL_CALL_TIMEOUT_MS,
    DEFAULT_TOTAL_TIMEOUT_MS,
};
use crate::types::OrchestratorError;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:8b";
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 60;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub agent: AgentSection,
    pub model: ModelConfig,
    pub rag: RagConfig,
    pub server: ServerConfig,
}

/// `[agent]`: loop limits, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub tool_call_timeout_secs: u64,
    pub total_timeout_secs: u64,
    pub max_same_tool_calls: u32,
    pub loop_limit: u32,
    pub model_call_timeout_secs: Option<u64>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            tool_call_timeout_secs: DEFAULT_TOOL_CALL_TIMEOUT_MS / 1_000,
            total_timeout_secs: DEFAULT_TOTAL_TIMEOUT_MS / 1_000,
            max_same_tool_calls: DEFAULT_MAX_SAME_TOOL_CALLS,
            loop_limit: DEFAULT_LOOP_LIMIT,
            model_call_timeout_secs: None,
        }
    }
}

/// `[model]`: the Ollama endpoint used for the agent and for RAG summaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    /// HTTP request timeout; `None` uses reqwest's default
    pub request_timeout_secs: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            request_timeout_secs: None,
        }
    }
}

/// `[rag]`: local document index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// JSON file of documents; without it the index is empty
    pub documents: Option<PathBuf>,
    pub top_k: usize,
    pub max_context_chars: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            documents: None,
            top_k: 5,
            max_context_chars: 12_000,
        }
    }
}

/// `[server]`: HTTP front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub default_timeout_secs: u64,
    pub uploads_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            default_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            uploads_dir: PathBuf::from("uploads"),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, OrchestratorError> {
        toml::from_str(text).map_err(|e| OrchestratorError::Config(e.to_string()))
    }

    /// Load from `path` (if given), then apply process environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, OrchestratorError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    OrchestratorError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the environment, in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), OrchestratorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TOOL_CALL_TIMEOUT") {
            self.agent.tool_call_timeout_secs = parse_override("TOOL_CALL_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("AGENT_TOTAL_TIMEOUT") {
            self.agent.total_timeout_secs = parse_override("AGENT_TOTAL_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("MAX_SAME_TOOL_CALLS") {
            self.agent.max_same_tool_calls = parse_override("MAX_SAME_TOOL_CALLS", &v)?;
        }
        if let Some(v) = lookup("AGENT_LOOP_LIMIT") {
            self.agent.loop_limit = parse_override("AGENT_LOOP_LIMIT", &v)?;
        }
        if let Some(v) = lookup("MODEL_CALL_TIMEOUT") {
            self.agent.model_call_timeout_secs = Some(parse_override("MODEL_CALL_TIMEOUT", &v)?);
        }
        if let Some(v) = lookup("OLLAMA_BASE_URL") {
            self.model.base_url = v;
        }
        if let Some(v) = lookup("OLLAMA_MODEL") {
            self.model.model = v;
        }
        if let Some(v) = lookup("RAG_DOCUMENTS") {
            self.rag.documents = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// Agent limits in milliseconds
    pub fn limits(&self) -> AgentLimits {
        AgentLimits {
            tool_call_timeout_ms: self.agent.tool_call_timeout_secs.saturating_mul(1_000),
            total_timeout_ms: self.agent.total_timeout_secs.saturating_mul(1_000),
            max_same_tool_calls: self.agent.max_same_tool_calls,
            loop_limit: self.agent.loop_limit,
            model_call_timeout_ms: self
                .agent
                .model_call_timeout_secs
                .map(|s| s.saturating_mul(1_000)),
        }
    }
}

fn parse_override<T: FromStr>(key: &str, value: &str) -> Result<T, OrchestratorError> {
    value
        .trim()
        .parse()
        .map_err(|_| OrchestratorError::Config(format!("invalid value for {}: {:?}", key, value)))
}
