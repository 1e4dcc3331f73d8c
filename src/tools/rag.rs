//! Local document retrieval with model-written summaries

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{RAG_SEARCH, truncate_chars};
use crate::model::LanguageModel;
use crate::registry::Tool;
use crate::types::OrchestratorError;

pub const NO_DOCUMENTS: &str = "No relevant documents found in the local dataset.";

const DESCRIPTION: &str =
    "Search the internal dataset, summarize findings, and return a short answer with sources.";

/// One row of the local dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub topic: String,
    pub subtopic: String,
    pub detail: String,
    pub date: String,
    pub source: String,
}

impl Document {
    /// Text block indexed and shown to the summarizer
    pub fn page_content(&self) -> String {
        format!(
            "Topic: {}\nSubtopic: {}\nDetail: {}\nDate: {}\nSource: {}",
            self.topic, self.subtopic, self.detail, self.date, self.source
        )
    }
}

/// Ranked snippet lookup. The index behind it is opaque to the tool.
pub trait Retriever: Send + Sync {
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>, String>;
}

/// In-memory index ranking documents by how many query terms they contain
#[derive(Debug, Default, Clone)]
pub struct KeywordIndex {
    documents: Vec<Document>,
    terms: Vec<HashSet<String>>,
}

impl KeywordIndex {
    pub fn new(documents: Vec<Document>) -> Self {
        let terms = documents
            .iter()
            .map(|doc| terms(&doc.page_content()).collect())
            .collect();
        Self { documents, terms }
    }

    /// Load a JSON array of documents
    pub fn load(path: &Path) -> Result<Self, OrchestratorError> {
        let text = std::fs::read_to_string(path)?;
        let documents: Vec<Document> = serde_json::from_str(&text).map_err(|e| {
            OrchestratorError::Config(format!("invalid documents file {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), documents = documents.len(), "Loaded document index");
        Ok(Self::new(documents))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Retriever for KeywordIndex {
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>, String> {
        let query_terms: HashSet<String> = terms(query).collect();
        let mut scored: Vec<(usize, usize)> = self
            .terms
            .iter()
            .enumerate()
            .map(|(i, doc_terms)| (i, query_terms.intersection(doc_terms).count()))
            .filter(|&(_, score)| score > 0)
            .collect();
        // Stable sort keeps dataset order among equal scores
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, _)| self.documents[i].clone())
            .collect())
    }
}

fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2)
        .map(str::to_lowercase)
}

struct Summarizer {
    model: Arc<dyn LanguageModel>,
    runtime: Handle,
}

/// The `rag_search` tool
pub struct RagSearch {
    retriever: Arc<dyn Retriever>,
    summarizer: Option<Summarizer>,
    top_k: usize,
    max_context_chars: usize,
}

impl RagSearch {
    pub fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self {
            retriever,
            summarizer: None,
            top_k: 5,
            max_context_chars: 12_000,
        }
    }

    /// Summarize retrieved passages with `model`, driven on `runtime`
    pub fn with_summarizer(mut self, model: Arc<dyn LanguageModel>, runtime: Handle) -> Self {
        self.summarizer = Some(Summarizer { model, runtime });
        self
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn with_max_context_chars(mut self, max: usize) -> Self {
        self.max_context_chars = max;
        self
    }

    /// Retrieve and summarize. Blocks while the summarizer runs.
    pub fn search(&self, query: &str) -> Result<String, String> {
        self.search_with_cancel(query, &CancellationToken::new())
    }

    /// Like [`search`](Self::search); a cancelled `cancel` drops the summarizer call
    pub fn search_with_cancel(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<String, String> {
        let docs = self
            .retriever
            .retrieve(query, self.top_k)
            .map_err(|e| format!("RAG retriever error: {}", e))?;
        if docs.is_empty() {
            return Ok(NO_DOCUMENTS.to_string());
        }

        let snippets: Vec<String> = docs.iter().map(Document::page_content).collect();
        let sources: BTreeSet<&str> = docs
            .iter()
            .map(|d| d.source.as_str())
            .filter(|s| !s.is_empty())
            .collect();
        let sources = if sources.is_empty() {
            "no source metadata".to_string()
        } else {
            sources.into_iter().collect::<Vec<_>>().join(", ")
        };

        let mut context = snippets.join("\n\n");
        if context.chars().count() > self.max_context_chars {
            context = format!(
                "{}\n\n[TRUNCATED]",
                truncate_chars(&context, self.max_context_chars)
            );
        }

        let Some(summarizer) = &self.summarizer else {
            return Ok(format!("{}\n\nSources: {}", context, sources));
        };

        let prompt = summary_prompt(&context, query);
        let completion = summarizer.runtime.block_on(async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = summarizer.model.complete(&prompt) => Some(result),
            }
        });
        let Some(completion) = completion else {
            debug!("RAG summarization cancelled");
            return Err("RAG summarization cancelled".to_string());
        };
        match completion {
            Ok(mut summary) => {
                if !summary.contains("Sources:") {
                    summary.push_str(&format!("\n\nSources: {}", sources));
                }
                Ok(summary)
            }
            Err(e) => {
                warn!(error = %e, "RAG summarization failed");
                let passages = snippets
                    .iter()
                    .take(3)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("\n\n");
                Ok(format!(
                    "Summarization error: {}\n\nFallback passages:\n\n{}\n\nSources: {}",
                    e, passages, sources
                ))
            }
        }
    }

    pub fn into_tool(self) -> Tool {
        Tool::cancellable(RAG_SEARCH, DESCRIPTION, move |query, cancel| {
            self.search_with_cancel(query, cancel)
        })
    }
}

fn summary_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a concise, factual assistant. Use ONLY the CONTEXT to answer the QUESTION below.\n\
         If the context does not contain the answer, say \"I don't know (not in context).\"\n\n\
         ### CONTEXT:\n{}\n\n\
         ### QUESTION:\n{}\n\n\
         ### INSTRUCTIONS:\n\
         - Answer in 2-4 short sentences.\n\
         - At the end, add a \"Sources:\" line with the distinct source names from the context.\n",
        context, question
    )
}
