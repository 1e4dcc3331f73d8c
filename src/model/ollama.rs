//! Ollama completion client over the `/api/generate` endpoint

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::LanguageModel;
use crate::config::ModelConfig;
use crate::types::OrchestratorError;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Non-streaming Ollama client. Cheap to share: the reqwest client pools connections.
#[derive(Debug, Clone)]
pub struct OllamaModel {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaModel {
    /// Build a client without contacting the server
    pub fn new(config: &ModelConfig) -> Result<Self, OrchestratorError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| OrchestratorError::ModelUnavailable(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }

    /// Build a client and check that the server answers
    pub async fn connect(config: &ModelConfig) -> Result<Self, OrchestratorError> {
        let model = Self::new(config)?;
        let url = format!("{}/api/tags", model.base_url);
        let response = model
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| OrchestratorError::ModelUnavailable(format!("{}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(OrchestratorError::ModelUnavailable(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        debug!(base_url = %model.base_url, model = %model.model, "Ollama reachable");
        Ok(model)
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String, OrchestratorError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(self.generate_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| OrchestratorError::ModelError(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let err_body = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::ModelError(format!(
                "Ollama API error ({}): {}",
                status.as_u16(),
                err_body
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| OrchestratorError::ModelError(format!("invalid response: {}", e)))?;
        Ok(parsed.response)
    }
}
