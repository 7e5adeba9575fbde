#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;

use ragchat_core::traits::{LanguageModel, Summarizer, VectorStore, WebSearch};
use ragchat_core::types::{ChunkId, DocumentChunk, ScoredChunk, StoreKind, WebResult};
use ragchat_core::{Error, Result};
use ragchat_embed::HashEmbedder;
use ragchat_orchestrator::{Orchestrator, OrchestratorOptions};

pub const DIM: usize = 64;

/// Language model double: counts calls, records prompts, can fail the first
/// `fail_first` calls and can be slowed down.
pub struct CountingLlm {
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    reply: String,
    delay: Duration,
    fail_first: AtomicUsize,
}

impl CountingLlm {
    pub fn new(reply: &str) -> Arc<Self> {
        Self::build(reply, Duration::ZERO, 0)
    }

    pub fn slow(reply: &str, delay: Duration) -> Arc<Self> {
        Self::build(reply, delay, 0)
    }

    pub fn failing(reply: &str, fail_first: usize) -> Arc<Self> {
        Self::build(reply, Duration::ZERO, fail_first)
    }

    fn build(reply: &str, delay: Duration, fail_first: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            reply: reply.to_string(),
            delay,
            fail_first: AtomicUsize::new(fail_first),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for CountingLlm {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("model overloaded"));
        }
        Ok(self.reply.clone())
    }
}

/// Web search double returning a fixed result list, or failing.
pub struct ScriptedWeb {
    pub calls: AtomicUsize,
    results: Vec<WebResult>,
    fail: bool,
}

impl ScriptedWeb {
    pub fn returning(results: Vec<WebResult>) -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), results, fail: false })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), results: Vec::new(), fail: true })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearch for ScriptedWeb {
    async fn search(&self, _query: &str, max_results: usize) -> anyhow::Result<Vec<WebResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("network unreachable"));
        }
        Ok(self.results.iter().take(max_results).cloned().collect())
    }
}

pub fn web_result(title: &str, snippet: &str, link: &str) -> WebResult {
    WebResult { title: title.into(), snippet: snippet.into(), link: link.into() }
}

/// Summariser that prefixes text, failing for inputs containing "FAIL".
pub struct TaggingSummarizer;

#[async_trait]
impl Summarizer for TaggingSummarizer {
    async fn summarize(&self, text: &str) -> anyhow::Result<String> {
        if text.contains("FAIL") {
            return Err(anyhow!("summary refused"));
        }
        Ok(format!("summary of [{text}]"))
    }
}

/// Store whose every operation reports the backend as unreachable.
pub struct FailingStore;

#[async_trait]
impl VectorStore for FailingStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Lance
    }
    fn dimension(&self) -> usize {
        DIM
    }
    async fn upsert(&self, _chunks: Vec<DocumentChunk>) -> Result<usize> {
        Err(Error::store("connection refused"))
    }
    async fn clear(&self) -> Result<()> {
        Err(Error::store("connection refused"))
    }
    async fn count(&self) -> Result<usize> {
        Err(Error::store("connection refused"))
    }
    async fn chunk_ids(&self) -> Result<Vec<ChunkId>> {
        Err(Error::store("connection refused"))
    }
    async fn search(&self, _query: &[f32], _k: usize) -> Result<Vec<ScoredChunk>> {
        Err(Error::store("connection refused"))
    }
}

/// Delegating store that counts searches.
pub struct CountingStore {
    pub inner: Arc<dyn VectorStore>,
    pub searches: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn VectorStore>) -> Arc<Self> {
        Arc::new(Self { inner, searches: AtomicUsize::new(0) })
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for CountingStore {
    fn kind(&self) -> StoreKind {
        self.inner.kind()
    }
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
    async fn upsert(&self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        self.inner.upsert(chunks).await
    }
    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }
    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
    async fn chunk_ids(&self) -> Result<Vec<ChunkId>> {
        self.inner.chunk_ids().await
    }
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search(query, k).await
    }
}

/// Store that gains one extra chunk while its first search is running.
pub struct GrowingStore {
    pub inner: Arc<dyn VectorStore>,
    late: Mutex<Option<DocumentChunk>>,
}

impl GrowingStore {
    pub fn new(inner: Arc<dyn VectorStore>, late: DocumentChunk) -> Arc<Self> {
        Arc::new(Self { inner, late: Mutex::new(Some(late)) })
    }
}

#[async_trait]
impl VectorStore for GrowingStore {
    fn kind(&self) -> StoreKind {
        self.inner.kind()
    }
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
    async fn upsert(&self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        self.inner.upsert(chunks).await
    }
    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }
    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
    async fn chunk_ids(&self) -> Result<Vec<ChunkId>> {
        self.inner.chunk_ids().await
    }
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let late = self.late.lock().unwrap().take();
        if let Some(chunk) = late {
            self.inner.upsert(vec![chunk]).await?;
        }
        self.inner.search(query, k).await
    }
}

pub fn embedder() -> Arc<HashEmbedder> {
    Arc::new(HashEmbedder::new(DIM))
}

pub fn orchestrator(llm: Arc<CountingLlm>) -> Orchestrator {
    Orchestrator::new(embedder(), llm, OrchestratorOptions::default())
}

pub fn orchestrator_with(llm: Arc<CountingLlm>, options: OrchestratorOptions) -> Orchestrator {
    Orchestrator::new(embedder(), llm, options)
}
