use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use ragchat_core::traits::WebSearch;
use ragchat_core::types::WebResult;

const DEFAULT_ENDPOINT: &str = "https://api.duckduckgo.com/";

/// DuckDuckGo instant-answer API: the abstract plus (nested) related topics.
#[derive(Clone)]
pub struct DuckDuckGoSearch {
    endpoint: String,
    client: Client,
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl DuckDuckGoSearch {
    pub fn new(endpoint: &str) -> Self {
        Self { endpoint: endpoint.to_string(), client: Client::new() }
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<WebResult>> {
        let url = format!(
            "{}?q={}&format=json&no_redirect=1&no_html=1",
            self.endpoint,
            urlencoding::encode(query)
        );
        let response = self.client.get(&url).send().await.context("DuckDuckGo request")?;
        if !response.status().is_success() {
            return Err(anyhow!("DuckDuckGo search failed: {}", response.status()));
        }
        let payload: Value = response.json().await.context("decoding DuckDuckGo response")?;
        let results = parse_instant_answer(&payload, max_results);
        debug!(query, results = results.len(), "web search");
        Ok(results)
    }
}

pub(crate) fn parse_instant_answer(payload: &Value, max_results: usize) -> Vec<WebResult> {
    let mut results = Vec::new();

    let abstract_text = payload.get("AbstractText").and_then(Value::as_str).unwrap_or("");
    let abstract_url = payload.get("AbstractURL").and_then(Value::as_str).unwrap_or("");
    if !abstract_text.is_empty() && !abstract_url.is_empty() {
        let heading = payload.get("Heading").and_then(Value::as_str).filter(|h| !h.is_empty());
        results.push(WebResult {
            title: heading.unwrap_or_else(|| title_of(abstract_text)).to_string(),
            snippet: abstract_text.to_string(),
            link: abstract_url.to_string(),
        });
    }
    for field in ["Results", "RelatedTopics"] {
        if let Some(items) = payload.get(field).and_then(Value::as_array) {
            collect_topics(items, &mut results);
        }
    }
    results.truncate(max_results);
    results
}

fn collect_topics(items: &[Value], results: &mut Vec<WebResult>) {
    for item in items {
        if let Some(topics) = item.get("Topics").and_then(Value::as_array) {
            collect_topics(topics, results);
            continue;
        }
        let text = item.get("Text").and_then(Value::as_str).unwrap_or("");
        let url = item.get("FirstURL").and_then(Value::as_str).unwrap_or("");
        if text.is_empty() || url.is_empty() {
            continue;
        }
        results.push(WebResult { title: title_of(text).to_string(), snippet: text.to_string(), link: url.to_string() });
    }
}

fn title_of(text: &str) -> &str {
    text.split(" - ").next().unwrap_or(text)
}
