use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use ragchat_core::traits::VectorStore;
use ragchat_core::types::{ChunkId, DocumentChunk, ScoredChunk, StoreKind};
use ragchat_core::{Error, Result};

use crate::similarity::{dot, top_k, unit};

struct Entry {
    chunk: DocumentChunk,
    unit: Vec<f32>,
}

/// In-memory exact index. Vectors are normalised once at insert time; a
/// search is a single dot-product scan in insertion order.
pub struct FlatIndex {
    dim: usize,
    entries: RwLock<Vec<Entry>>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self { dim, entries: RwLock::new(Vec::new()) }
    }

    fn prepare(&self, chunks: Vec<DocumentChunk>) -> Result<Vec<Entry>> {
        chunks
            .into_iter()
            .map(|chunk| {
                check_dim(self.dim, &chunk)?;
                let unit = unit(&chunk.embedding);
                Ok(Entry { chunk, unit })
            })
            .collect()
    }
}

pub(crate) fn check_dim(dim: usize, chunk: &DocumentChunk) -> Result<()> {
    if chunk.embedding.len() != dim {
        return Err(Error::InvalidInput(format!(
            "chunk {} has {} dims, store expects {dim}",
            chunk.id,
            chunk.embedding.len()
        )));
    }
    Ok(())
}

#[async_trait]
impl VectorStore for FlatIndex {
    fn kind(&self) -> StoreKind {
        StoreKind::Flat
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    async fn upsert(&self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        let prepared = self.prepare(chunks)?;
        let n = prepared.len();
        self.entries.write().await.extend(prepared);
        Ok(n)
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    async fn replace(&self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        let prepared = self.prepare(chunks)?;
        let n = prepared.len();
        *self.entries.write().await = prepared;
        Ok(n)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn chunk_ids(&self) -> Result<Vec<ChunkId>> {
        Ok(self.entries.read().await.iter().map(|e| e.chunk.id.clone()).collect())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if query.len() != self.dim {
            return Err(Error::InvalidInput(format!("query has {} dims, store expects {}", query.len(), self.dim)));
        }
        let q = unit(query);
        let entries = self.entries.read().await;
        let scored: Vec<(&Entry, f32)> = entries.iter().map(|e| (e, dot(&q, &e.unit))).collect();
        let hits: Vec<ScoredChunk> = top_k(scored, k)
            .into_iter()
            .map(|(e, score)| ScoredChunk { chunk: e.chunk.clone(), score })
            .collect();
        debug!(scanned = entries.len(), returned = hits.len(), "flat search");
        Ok(hits)
    }
}
