//! Process-wide service construction shared by the CLI and the HTTP server

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::config::OrchestratorConfig;
use crate::dispatcher::Dispatcher;
use crate::fallback::FallbackOrchestrator;
use crate::model::{LanguageModel, OllamaModel};
use crate::registry::ToolRegistry;
use crate::tools::{self, HttpContext, KeywordIndex, RagSearch, RAG_SEARCH, WIKIPEDIA_SEARCH};
use crate::types::OrchestratorError;

const HTTP_TIMEOUT_SECS: u64 = 20;

/// Everything a front end needs to answer questions
#[derive(Clone)]
pub struct Services {
    pub dispatcher: Arc<Dispatcher>,
    pub registry: Arc<ToolRegistry>,
}

/// Build the registry and dispatcher. Must run inside a tokio runtime.
///
/// An unreachable model is not an error: the dispatcher then answers through the fallback.
pub async fn bootstrap(config: &OrchestratorConfig) -> Result<Services, OrchestratorError> {
    let limits = config.limits();
    limits.validate()?;

    let runtime = Handle::current();
    let http = HttpContext::new(runtime.clone(), Duration::from_secs(HTTP_TIMEOUT_SECS))?;

    let model: Result<Arc<dyn LanguageModel>, OrchestratorError> =
        OllamaModel::connect(&config.model)
            .await
            .map(|m| Arc::new(m) as Arc<dyn LanguageModel>);
    if let Err(e) = &model {
        warn!(error = %e, "Language model unavailable");
    }

    let index = match &config.rag.documents {
        Some(path) => KeywordIndex::load(path)?,
        None => {
            warn!("No RAG documents configured; local search will find nothing");
            KeywordIndex::default()
        }
    };
    info!(documents = index.len(), "RAG index ready");

    let mut rag = RagSearch::new(Arc::new(index))
        .with_top_k(config.rag.top_k)
        .with_max_context_chars(config.rag.max_context_chars);
    if let Ok(model) = &model {
        rag = rag.with_summarizer(Arc::clone(model), runtime);
    }

    let registry = Arc::new(tools::default_registry(&http, rag)?);
    let fallback = FallbackOrchestrator::from_registry(&registry, RAG_SEARCH, WIKIPEDIA_SEARCH)
        .with_tool_call_timeout_ms(limits.tool_call_timeout_ms);
    let dispatcher = Dispatcher::assemble(model, Arc::clone(&registry), limits, fallback);

    info!(
        tools = ?registry.names(),
        agent = dispatcher.has_agent(),
        "Services ready"
    );

    Ok(Services {
        dispatcher: Arc::new(dispatcher),
        registry,
    })
}
