//! Academic paper search through the arXiv Atom API

use quick_xml::Reader;
use quick_xml::events::Event;
use tokio_util::sync::CancellationToken;

use super::{ARXIV_SEARCH, HttpContext, truncate_chars};
use crate::registry::Tool;

const API_URL: &str = "http://export.arxiv.org/api/query";
const DESCRIPTION: &str =
    "Search arXiv for academic papers and return titles, authors and abstracts.";

pub const NO_RESULTS: &str = "No arXiv results found.";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArxivEntry {
    pub published: String,
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
}

impl ArxivEntry {
    fn render(&self) -> String {
        format!(
            "Published: {}\nTitle: {}\nAuthors: {}\nSummary: {}",
            self.published.get(..10).unwrap_or(&self.published),
            self.title,
            self.authors.join(", "),
            self.summary
        )
    }
}

pub struct ArxivSearch {
    http: HttpContext,
    api_url: String,
    top_k: usize,
    max_chars: usize,
}

impl ArxivSearch {
    pub fn new(http: HttpContext) -> Self {
        Self {
            http,
            api_url: API_URL.to_string(),
            top_k: 3,
            max_chars: 4_000,
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
        let query = query.trim();
        if query.is_empty() {
            return Err("ERROR: Expected a non-empty query string for arXiv search.".to_string());
        }

        let search = format!("all:{}", query);
        let max_results = self.top_k.to_string();
        let feed = self
            .http
            .get_text(
                &self.api_url,
                &[
                    ("search_query", search.as_str()),
                    ("start", "0"),
                    ("max_results", max_results.as_str()),
                ],
                cancel,
            )
            .map_err(|e| format!("ArXiv lookup error: {}", e))?;

        let entries = parse_feed(&feed).map_err(|e| format!("ArXiv lookup error: {}", e))?;
        if entries.is_empty() {
            return Ok(NO_RESULTS.to_string());
        }
        let text = entries
            .iter()
            .take(self.top_k)
            .map(ArxivEntry::render)
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(truncate_chars(&text, self.max_chars).to_string())
    }

    pub fn into_tool(self) -> Tool {
        Tool::cancellable(ARXIV_SEARCH, DESCRIPTION, move |query, cancel| {
            self.search_with_cancel(query, cancel)
        })
    }
}

/// Extract entries from an Atom feed
pub fn parse_feed(xml: &str) -> Result<Vec<ArxivEntry>, String> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut current: Option<ArxivEntry> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"entry" {
                    current = Some(ArxivEntry::default());
                }
                text.clear();
            }
            Ok(Event::Text(e)) => {
                let chunk = e.unescape().map_err(|e| format!("XML parse error: {}", e))?;
                text.push_str(&chunk);
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if let Some(entry) = current.as_mut() {
                    let value = collapse(&text);
                    match name.as_str() {
                        "title" => entry.title = value,
                        "summary" => entry.summary = value,
                        "published" => entry.published = value,
                        "name" => entry.authors.push(value),
                        "entry" => {
                            if let Some(done) = current.take() {
                                entries.push(done);
                            }
                        }
                        _ => {}
                    }
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {}", e)),
            _ => {}
        }
    }

    Ok(entries)
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:rocket</title>
  <entry>
    <id>http://arxiv.org/abs/2101.00001v1</id>
    <published>2021-01-01T00:00:00Z</published>
    <title>Additive Manufacturing of
      Rocket Engines</title>
    <summary>  We study 3D printed engines &amp; their cooling.  </summary>
    <author><name>A. Rao</name></author>
    <author><name>S. Ravi</name></author>
  </entry>
  <entry>
    <published>2020-05-05T00:00:00Z</published>
    <title>Launch Vehicle Guidance</title>
    <summary>Guidance laws.</summary>
    <author><name>K. Iyer</name></author>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed() {
        let entries = parse_feed(FEED).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Additive Manufacturing of Rocket Engines");
        assert_eq!(entries[0].summary, "We study 3D printed engines & their cooling.");
        assert_eq!(entries[0].authors, vec!["A. Rao", "S. Ravi"]);
        assert_eq!(entries[1].published, "2020-05-05T00:00:00Z");
    }

    #[test]
    fn test_feed_title_not_an_entry() {
        let entries = parse_feed(r#"<feed><title>Empty query</title></feed>"#).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_render_entry() {
        let entry = ArxivEntry {
            published: "2021-01-01T00:00:00Z".to_string(),
            title: "Rockets".to_string(),
            authors: vec!["A. Rao".to_string(), "S. Ravi".to_string()],
            summary: "About rockets.".to_string(),
        };
        assert_eq!(
            entry.render(),
            "Published: 2021-01-01\nTitle: Rockets\nAuthors: A. Rao, S. Ravi\nSummary: About rockets."
        );
    }

    #[test]
    fn test_malformed_feed() {
        assert!(parse_feed("<feed><entry></feed>").is_err());
    }
}
