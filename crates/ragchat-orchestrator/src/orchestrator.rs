//! Document-first answering with web fallback.
//!
//! A turn is keyed by the query and the corpus fingerprint. On a miss the
//! orchestrator retrieves and summarises the nearest chunks, falls back to
//! web search when the store yields nothing, prompts the language model and
//! caches the attributed answer together with the time it took.
//!
//! The fingerprint is taken before retrieval. A write landing between the
//! two stores the answer under the pre-write key; the next question sees the
//! new fingerprint and recomputes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use ragchat_core::config::Settings;
use ragchat_core::traits::{EmbeddingProvider, LanguageModel, Summarizer, VectorStore, WebSearch};
use ragchat_core::types::{ConversationTurn, ScoredChunk};
use ragchat_core::{Error, Result};

use crate::cache::{CacheEntry, ResponseCache};
use crate::cache_key::build_key;
use crate::fingerprint::{fingerprint, EMPTY_FINGERPRINT};
use crate::prompt::{build_prompt, compose_context, format_history, with_attribution, ContextPair, DEFAULT_SOURCE};
use crate::summarize::LlmSummarizer;
use crate::timing::TimingLog;

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorOptions {
    pub top_k: usize,
    pub web_max_results: usize,
    pub llm_timeout: Duration,
    pub web_timeout: Duration,
    pub persona: String,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for OrchestratorOptions {
    fn from(s: &Settings) -> Self {
        Self {
            top_k: s.retrieval.top_k,
            web_max_results: s.retrieval.web_max_results,
            llm_timeout: Duration::from_secs(s.timeouts.llm_seconds),
            web_timeout: Duration::from_secs(s.timeouts.web_search_seconds),
            persona: s.prompt.persona.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Time the answer originally took; a cache hit reports the stored value.
    pub elapsed_seconds: f64,
    pub cached: bool,
    pub sources: Vec<String>,
}

pub struct Orchestrator {
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LanguageModel>,
    summarizer: Option<Arc<dyn Summarizer>>,
    web: Option<Arc<dyn WebSearch>>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    /// Retrieved chunks are passed to the prompt verbatim until a summariser
    /// is attached.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, llm: Arc<dyn LanguageModel>, options: OrchestratorOptions) -> Self {
        Self { embedder, llm, summarizer: None, web: None, options }
    }

    /// Builds from settings; `retrieval.summarize` attaches an [`LlmSummarizer`]
    /// over the same model.
    pub fn from_settings(
        settings: &Settings,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        let mut orchestrator = Self::new(embedder, Arc::clone(&llm), OrchestratorOptions::from(settings));
        if settings.retrieval.summarize {
            orchestrator = orchestrator.with_summarizer(Arc::new(LlmSummarizer::new(llm)));
        }
        orchestrator
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn with_web_search(mut self, web: Arc<dyn WebSearch>) -> Self {
        self.web = Some(web);
        self
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub async fn answer(
        &self,
        query: &str,
        history: &[ConversationTurn],
        store: Option<&dyn VectorStore>,
        cache: &ResponseCache,
        timings: &TimingLog,
    ) -> Result<Answer> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("query is empty".into()));
        }
        let start = Instant::now();
        let fp = match store {
            Some(s) => fingerprint(s).await,
            None => EMPTY_FINGERPRINT.to_string(),
        };
        let key = build_key(query, &fp);

        let (entry, cached) = cache
            .get_or_try_compute(&key, self.compute(&key, query, history, store, start))
            .await?;

        if !cached {
            if let Some(s) = store {
                timings.record(s.kind(), entry.latency_seconds).await;
            }
        }
        info!(
            elapsed = entry.latency_seconds,
            cached,
            sources = entry.sources.len(),
            store = store.map(|s| s.kind().as_str()).unwrap_or("none"),
            "answered"
        );
        Ok(Answer { text: entry.answer, elapsed_seconds: entry.latency_seconds, cached, sources: entry.sources })
    }

    async fn compute(
        &self,
        key: &str,
        query: &str,
        history: &[ConversationTurn],
        store: Option<&dyn VectorStore>,
        start: Instant,
    ) -> Result<CacheEntry> {
        let mut pairs = match store {
            Some(s) => match self.retrieve(query, s).await {
                Ok(hits) => self.summarize_hits(hits).await,
                Err(e) => {
                    warn!(error = %e, "retrieval failed, falling back to web search");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        if pairs.is_empty() {
            pairs = self.web_context(query).await;
        }

        let prompt = build_prompt(&self.options.persona, &format_history(history), &compose_context(&pairs), query);
        let completion = timeout(self.options.llm_timeout, self.llm.complete(&prompt))
            .await
            .map_err(|_| Error::answer(anyhow!("language model timed out after {:?}", self.options.llm_timeout)))?
            .map_err(Error::answer)?;

        let sources: Vec<String> = pairs.into_iter().map(|(_, source)| source).collect();
        let text = with_attribution(completion, &sources);
        Ok(CacheEntry::new(key, text, start.elapsed().as_secs_f64(), sources))
    }

    /// Nearest chunks for `query`, or an empty list when the store is empty.
    async fn retrieve(&self, query: &str, store: &dyn VectorStore) -> Result<Vec<ScoredChunk>> {
        let count = store.count().await.map_err(Error::retrieval)?;
        if count == 0 {
            debug!("store is empty");
            return Ok(Vec::new());
        }
        let embedder = Arc::clone(&self.embedder);
        let text = query.to_string();
        let embedding = tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .map_err(Error::retrieval)?
            .map_err(Error::retrieval)?;
        let hits = store.search(&embedding, self.options.top_k).await.map_err(Error::retrieval)?;
        debug!(count, returned = hits.len(), top = hits.first().map(|h| h.score), "retrieved");
        Ok(hits)
    }

    async fn summarize_hits(&self, hits: Vec<ScoredChunk>) -> Vec<ContextPair> {
        let chunks: Vec<(String, String)> = hits
            .into_iter()
            .filter_map(|h| {
                let text = h.chunk.text.trim().to_string();
                if text.is_empty() {
                    return None;
                }
                let source = h.chunk.source().unwrap_or(DEFAULT_SOURCE).to_string();
                Some((text, source))
            })
            .collect();

        let Some(summarizer) = &self.summarizer else {
            return chunks;
        };
        let pending = join_all(chunks.iter().map(|(text, _)| summarizer.summarize(text)));
        let summaries = match timeout(self.options.llm_timeout, pending).await {
            Ok(summaries) => summaries,
            Err(_) => {
                warn!("chunk summaries timed out, using raw text");
                return chunks;
            }
        };
        chunks
            .into_iter()
            .zip(summaries)
            .map(|((text, source), summary)| match summary {
                Ok(s) if !s.trim().is_empty() => (s, source),
                Ok(_) => (text, source),
                Err(e) => {
                    warn!(error = %e, source = %source, "summary failed, using raw text");
                    (text, source)
                }
            })
            .collect()
    }

    async fn web_context(&self, query: &str) -> Vec<ContextPair> {
        let Some(web) = &self.web else {
            debug!("no web search configured");
            return Vec::new();
        };
        match timeout(self.options.web_timeout, web.search(query, self.options.web_max_results)).await {
            Ok(Ok(results)) => {
                debug!(results = results.len(), "web fallback");
                results.into_iter().map(|r| (format!("{}: {}", r.title, r.snippet), r.link)).collect()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "web search failed, answering without context");
                Vec::new()
            }
            Err(_) => {
                warn!(timeout = ?self.options.web_timeout, "web search timed out, answering without context");
                Vec::new()
            }
        }
    }
}
