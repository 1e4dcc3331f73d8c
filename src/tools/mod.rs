//! Retrieval backends exposed to the agent as tools
//!
//! Executors are synchronous because they run on tokio's blocking pool under
//! the invoker's timeout. Network-backed tools bridge back into the runtime
//! through [`HttpContext`].

pub mod bibtex;
pub mod rag;

#[cfg(feature = "backends")]
pub mod arxiv;
#[cfg(feature = "backends")]
pub mod web;
#[cfg(feature = "backends")]
pub mod wikipedia;

pub use rag::{Document, KeywordIndex, RagSearch, Retriever};

pub const RAG_SEARCH: &str = "rag_search";
pub const WIKIPEDIA_SEARCH: &str = "wikipedia_search";
pub const WEB_SEARCH: &str = "web_search";
pub const ARXIV_SEARCH: &str = "arxiv_search";
pub const BIBTEX_PARSE: &str = "bibtex_parse";

/// Prefix of `text` holding at most `max` characters
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(feature = "backends")]
pub use http::HttpContext;

#[cfg(feature = "backends")]
mod http {
    use std::future::Future;
    use std::time::Duration;

    use tokio::runtime::Handle;
    use tokio_util::sync::CancellationToken;

    use crate::types::OrchestratorError;

    /// Shared HTTP client plus the runtime handle used to drive it from blocking threads
    #[derive(Debug, Clone)]
    pub struct HttpContext {
        client: reqwest::Client,
        runtime: Handle,
    }

    impl HttpContext {
        pub fn new(runtime: Handle, request_timeout: Duration) -> Result<Self, OrchestratorError> {
            let client = reqwest::Client::builder()
                .timeout(request_timeout)
                .user_agent(concat!("qa-orchestrator/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| OrchestratorError::Config(format!("HTTP client: {}", e)))?;
            Ok(Self { client, runtime })
        }

        pub fn client(&self) -> &reqwest::Client {
            &self.client
        }

        /// Drive `future` to completion, giving up when `cancel` fires.
        /// Must be called off the async worker threads.
        pub fn block_on<T, F>(&self, future: F, cancel: &CancellationToken) -> Result<T, String>
        where
            F: Future<Output = Result<T, String>>,
        {
            self.runtime.block_on(async {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err("request cancelled".to_string()),
                    result = future => result,
                }
            })
        }

        /// GET `url` with query parameters and return the body as text
        pub fn get_text(
            &self,
            url: &str,
            query: &[(&str, &str)],
            cancel: &CancellationToken,
        ) -> Result<String, String> {
            let request = async {
                let response = self
                    .client
                    .get(url)
                    .query(query)
                    .send()
                    .await
                    .map_err(|e| format!("request to {} failed: {}", url, e))?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(format!("{} returned {}: {}", url, status.as_u16(), body));
                }
                response
                    .text()
                    .await
                    .map_err(|e| format!("reading response from {} failed: {}", url, e))
            };
            self.block_on(request, cancel)
        }

        /// GET `url` and decode a JSON body
        pub fn get_json(
            &self,
            url: &str,
            query: &[(&str, &str)],
            cancel: &CancellationToken,
        ) -> Result<serde_json::Value, String> {
            let body = self.get_text(url, query, cancel)?;
            serde_json::from_str(&body).map_err(|e| format!("invalid JSON from {}: {}", url, e))
        }
    }
}

/// The five standard tools, in the order they are shown to the model
#[cfg(feature = "backends")]
pub fn default_registry(
    http: &HttpContext,
    rag: RagSearch,
) -> Result<crate::registry::ToolRegistry, crate::types::OrchestratorError> {
    let mut registry = crate::registry::ToolRegistry::new();
    registry.register(rag.into_tool())?;
    registry.register(wikipedia::WikipediaSearch::new(http.clone()).into_tool())?;
    registry.register(web::WebSearch::new(http.clone()).into_tool())?;
    registry.register(arxiv::ArxivSearch::new(http.clone()).into_tool())?;
    registry.register(bibtex::tool())?;
    Ok(registry)
}
