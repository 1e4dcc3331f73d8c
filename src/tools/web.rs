//! Web search through the DuckDuckGo instant answer API (no API key)

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{HttpContext, WEB_SEARCH};
use crate::registry::Tool;

const API_URL: &str = "https://api.duckduckgo.com/";
const DESCRIPTION: &str = "Search the web with DuckDuckGo and return titles, links and snippets.";
const MAX_RESULTS: usize = 5;

pub const NO_RESULTS: &str = "No results.";

/// A search result entry
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

pub struct WebSearch {
    http: HttpContext,
    api_url: String,
}

impl WebSearch {
    pub fn new(http: HttpContext) -> Self {
        Self {
            http,
            api_url: API_URL.to_string(),
        }
    }

    pub fn search(&self, query: &str) -> Result<String, String> {
        self.search_with_cancel(query, &CancellationToken::new())
    }

    pub fn search_with_cancel(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<String, String> {
        let data = self
            .http
            .get_json(
                &self.api_url,
                &[("q", query), ("format", "json"), ("no_html", "1")],
                cancel,
            )
            .map_err(|e| format!("DDG error: {}", e))?;
        Ok(render(&instant_answers(&data, MAX_RESULTS)))
    }

    pub fn into_tool(self) -> Tool {
        Tool::cancellable(WEB_SEARCH, DESCRIPTION, move |query, cancel| {
            self.search_with_cancel(query, cancel)
        })
    }
}

/// Abstract first, then related topics, up to `max_results`
fn instant_answers(data: &Value, max_results: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();
    let text = |v: &Value, key: &str| v.get(key).and_then(Value::as_str).unwrap_or("").to_string();

    let abstract_text = text(data, "AbstractText");
    if !abstract_text.is_empty() {
        let heading = text(data, "Heading");
        results.push(SearchResult {
            title: if heading.is_empty() { "Result".to_string() } else { heading },
            url: text(data, "AbstractURL"),
            snippet: abstract_text,
        });
    }

    if let Some(topics) = data.get("RelatedTopics").and_then(Value::as_array) {
        for topic in topics {
            if results.len() >= max_results {
                break;
            }
            let snippet = text(topic, "Text");
            if snippet.is_empty() {
                continue;
            }
            results.push(SearchResult {
                title: snippet.chars().take(80).collect(),
                url: text(topic, "FirstURL"),
                snippet,
            });
        }
    }

    results.truncate(max_results);
    results
}

fn render(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_string();
    }
    results
        .iter()
        .map(|r| format!("{}\n{}\n{}\n", r.title, r.url, r.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}
