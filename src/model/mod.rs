//! Language model capability consumed by the agent loop

use async_trait::async_trait;

use crate::types::OrchestratorError;

#[cfg(feature = "backends")]
mod ollama;

#[cfg(feature = "backends")]
pub use ollama::OllamaModel;

/// A text-completion model. Implementations must be safe to share across runs.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str {
        "model"
    }

    /// Complete `prompt`, returning the raw response text
    async fn complete(&self, prompt: &str) -> Result<String, OrchestratorError>;
}
