use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use ragchat_core::data_processor::IngestBatch;
use ragchat_core::traits::{EmbeddingProvider, VectorStore};
use ragchat_core::types::DocumentChunk;
use ragchat_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    #[default]
    Append,
    /// Swap the whole corpus in one write.
    Replace,
}

/// Embeds texts and writes them into a store as freshly identified chunks.
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedder, batch_size: 64 }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn ingest(&self, store: &dyn VectorStore, batch: IngestBatch, mode: IngestMode) -> Result<usize> {
        self.ingest_with_progress(store, batch, mode, |_| {}).await
    }

    /// Like [`Ingestor::ingest`], calling `on_embedded` with the running
    /// number of embedded texts.
    pub async fn ingest_with_progress(
        &self,
        store: &dyn VectorStore,
        batch: IngestBatch,
        mode: IngestMode,
        mut on_embedded: impl FnMut(usize) + Send,
    ) -> Result<usize> {
        let IngestBatch { texts, metadatas } = batch;
        if texts.len() != metadatas.len() {
            return Err(Error::InvalidInput(format!(
                "{} texts but {} metadata entries",
                texts.len(),
                metadatas.len()
            )));
        }
        if self.embedder.dim() != store.dimension() {
            return Err(Error::ConfigurationError(format!(
                "embedder '{}' produces {} dims, store expects {}",
                self.embedder.id(),
                self.embedder.dim(),
                store.dimension()
            )));
        }

        let mut chunks = Vec::with_capacity(texts.len());
        for (text_batch, meta_batch) in texts.chunks(self.batch_size).zip(metadatas.chunks(self.batch_size)) {
            let embedder = Arc::clone(&self.embedder);
            let owned = text_batch.to_vec();
            let embeddings = tokio::task::spawn_blocking(move || embedder.embed_batch(&owned))
                .await
                .map_err(Error::retrieval)??;
            if embeddings.len() != text_batch.len() {
                return Err(Error::retrieval(format!(
                    "embedder returned {} vectors for {} texts",
                    embeddings.len(),
                    text_batch.len()
                )));
            }
            for ((text, metadata), embedding) in text_batch.iter().zip(meta_batch).zip(embeddings) {
                chunks.push(DocumentChunk {
                    id: Uuid::new_v4().to_string(),
                    text: text.clone(),
                    metadata: metadata.clone(),
                    embedding,
                });
            }
            on_embedded(chunks.len());
        }

        let written = match mode {
            IngestMode::Append => store.upsert(chunks).await?,
            IngestMode::Replace => store.replace(chunks).await?,
        };
        info!(written, ?mode, store = %store.kind(), embedder = self.embedder.id(), "ingested");
        Ok(written)
    }
}
