use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::{ChunkId, DocumentChunk, ScoredChunk, StoreKind, WebResult};

/// Maps text to dense vectors; deterministic for a fixed model.
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hash:d384`).
    fn id(&self) -> &str;
    /// Embedding dimensionality (d).
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| Error::retrieval("embedder returned no vector"))
    }
}

/// Capability set shared by the in-memory and persistent indexes.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn kind(&self) -> StoreKind;
    fn dimension(&self) -> usize;

    /// Appends chunks; returns how many were written.
    async fn upsert(&self, chunks: Vec<DocumentChunk>) -> Result<usize>;

    /// Removes every chunk. Idempotent.
    async fn clear(&self) -> Result<()>;

    /// Swaps the corpus for `chunks`.
    async fn replace(&self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        self.clear().await?;
        self.upsert(chunks).await
    }

    async fn count(&self) -> Result<usize>;

    /// Identities of every chunk currently held, in no particular order.
    async fn chunk_ids(&self) -> Result<Vec<ChunkId>>;

    /// Top-k by descending cosine similarity, ties in insertion order.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<WebResult>>;
}
