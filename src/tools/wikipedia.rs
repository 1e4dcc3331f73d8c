//! Wikipedia lookup through the MediaWiki action API

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{HttpContext, WIKIPEDIA_SEARCH, truncate_chars};
use crate::registry::Tool;

const API_URL: &str = "https://en.wikipedia.org/w/api.php";
const DESCRIPTION: &str = "Search Wikipedia and return a summary and source URL.";

pub const NO_RESULTS: &str = "No Wikipedia results found.";

pub struct WikipediaSearch {
    http: HttpContext,
    api_url: String,
    top_k: usize,
    max_chars: usize,
}

impl WikipediaSearch {
    pub fn new(http: HttpContext) -> Self {
        Self {
            http,
            api_url: API_URL.to_string(),
            top_k: 2,
            max_chars: 4_000,
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn search(&self, query: &str) -> Result<String, String> {
        self.search_with_cancel(query, &CancellationToken::new())
    }

    /// Stops between and during requests once `cancel` fires
    pub fn search_with_cancel(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<String, String> {
        let limit = self.top_k.to_string();
        let results = self.http.get_json(
            &self.api_url,
            &[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
                ("format", "json"),
            ],
            cancel,
        )?;
        let titles = search_titles(&results);
        debug!(query, hits = titles.len(), "Wikipedia search");

        let mut pages = Vec::new();
        for title in titles.iter().take(self.top_k) {
            let extract = self.http.get_json(
                &self.api_url,
                &[
                    ("action", "query"),
                    ("prop", "extracts"),
                    ("exintro", "1"),
                    ("explaintext", "1"),
                    ("redirects", "1"),
                    ("titles", title.as_str()),
                    ("format", "json"),
                ],
                cancel,
            )?;
            if let Some(summary) = page_extract(&extract) {
                pages.push(format_page(title, &summary));
            }
        }

        if pages.is_empty() {
            return Ok(NO_RESULTS.to_string());
        }
        Ok(truncate_chars(&pages.join("\n\n"), self.max_chars).to_string())
    }

    pub fn into_tool(self) -> Tool {
        Tool::cancellable(WIKIPEDIA_SEARCH, DESCRIPTION, move |query, cancel| {
            self.search_with_cancel(query, cancel)
        })
    }
}

fn search_titles(results: &Value) -> Vec<String> {
    results
        .pointer("/query/search")
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .filter_map(|hit| hit.get("title").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn page_extract(response: &Value) -> Option<String> {
    response
        .pointer("/query/pages")?
        .as_object()?
        .values()
        .find_map(|page| page.get("extract").and_then(Value::as_str))
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn format_page(title: &str, summary: &str) -> String {
    format!(
        "Page: {}\nURL: https://en.wikipedia.org/wiki/{}\nSummary: {}",
        title,
        title.replace(' ', "_"),
        summary
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_titles() {
        let results = json!({"query": {"search": [{"title": "Mars"}, {"title": "Mars (mythology)"}]}});
        assert_eq!(search_titles(&results), vec!["Mars", "Mars (mythology)"]);
        assert!(search_titles(&json!({})).is_empty());
    }

    #[test]
    fn test_page_extract() {
        let response = json!({"query": {"pages": {"14640471": {"title": "Mars", "extract": " Mars is the fourth planet. "}}}});
        assert_eq!(page_extract(&response).unwrap(), "Mars is the fourth planet.");

        let missing = json!({"query": {"pages": {"-1": {"title": "Nope", "missing": ""}}}});
        assert!(page_extract(&missing).is_none());
    }

    #[test]
    fn test_format_page() {
        let page = format_page("Agnikul Cosmos", "A launch company.");
        assert!(page.starts_with("Page: Agnikul Cosmos\n"));
        assert!(page.contains("https://en.wikipedia.org/wiki/Agnikul_Cosmos"));
        assert!(page.ends_with("Summary: A launch company."));
    }
}
