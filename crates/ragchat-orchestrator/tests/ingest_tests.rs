mod support;

use std::collections::HashMap;
use std::collections::HashSet;

use ragchat_core::data_processor::{DataProcessor, IngestBatch, TextChunker};
use ragchat_core::traits::{EmbeddingProvider, VectorStore};
use ragchat_core::types::SOURCE_KEY;
use ragchat_core::Error;
use ragchat_orchestrator::{IngestMode, Ingestor};
use ragchat_vector::{FlatIndex, LanceStore};

use support::*;

fn texts(items: &[&str]) -> IngestBatch {
    IngestBatch {
        texts: items.iter().map(|s| s.to_string()).collect(),
        metadatas: items.iter().map(|_| HashMap::new()).collect(),
    }
}

#[tokio::test]
async fn mismatched_metadata_is_rejected() {
    let store = FlatIndex::new(DIM);
    let mut batch = texts(&["a", "b"]);
    batch.metadatas.pop();
    let err = Ingestor::new(embedder()).ingest(&store, batch, IngestMode::Append).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn every_chunk_gets_a_fresh_identity() {
    let store = FlatIndex::new(DIM);
    let ingestor = Ingestor::new(embedder()).with_batch_size(2);
    let n = ingestor.ingest(&store, texts(&["same", "same", "other", "more", "last"]), IngestMode::Append).await.unwrap();
    assert_eq!(n, 5);
    let ids: HashSet<_> = store.chunk_ids().await.unwrap().into_iter().collect();
    assert_eq!(ids.len(), 5);
}

#[tokio::test]
async fn replace_mode_swaps_the_corpus() {
    let store = FlatIndex::new(DIM);
    let ingestor = Ingestor::new(embedder());
    ingestor.ingest(&store, texts(&["old one", "old two"]), IngestMode::Append).await.unwrap();
    ingestor.ingest(&store, texts(&["new"]), IngestMode::Replace).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn dimension_mismatch_is_a_configuration_error() {
    let store = FlatIndex::new(DIM + 1);
    let err = Ingestor::new(embedder()).ingest(&store, texts(&["x"]), IngestMode::Append).await.unwrap_err();
    assert!(matches!(err, Error::ConfigurationError(_)));
}

#[tokio::test]
async fn ingested_text_is_its_own_nearest_neighbour() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("rust.md"), "borrow checker enforces aliasing rules").unwrap();
    std::fs::write(tmp.path().join("bread.txt"), "sourdough needs a starter culture").unwrap();
    let batch = DataProcessor::new(TextChunker::default()).process_directory(tmp.path(), None).unwrap();

    let store = FlatIndex::new(DIM);
    let mut progress = Vec::new();
    Ingestor::new(embedder())
        .ingest_with_progress(&store, batch.clone(), IngestMode::Append, |n| progress.push(n))
        .await
        .unwrap();
    assert_eq!(progress.last(), Some(&2));

    let e = embedder();
    for (text, meta) in batch.texts.iter().zip(&batch.metadatas) {
        let hits = store.search(&e.embed(text).unwrap(), 1).await.unwrap();
        assert_eq!(&hits[0].chunk.text, text);
        assert_eq!(hits[0].chunk.metadata.get(SOURCE_KEY), meta.get(SOURCE_KEY));
    }
}

async fn check_reloading_same_docs_does_not_duplicate(store: &dyn VectorStore) {
    let ingestor = Ingestor::new(embedder());
    let docs = ["borrow checker rules", "lifetimes explained"];
    ingestor.ingest(store, texts(&docs), IngestMode::Replace).await.unwrap();
    ingestor.ingest(store, texts(&docs), IngestMode::Replace).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 2);

    let query = embedder().embed("borrow checker rules").unwrap();
    let hits = store.search(&query, 3).await.unwrap();
    let seen: HashSet<_> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
    assert_eq!(seen.len(), hits.len(), "no passage returned twice");
}

#[tokio::test]
async fn flat_reloading_same_docs_does_not_duplicate() {
    check_reloading_same_docs_does_not_duplicate(&FlatIndex::new(DIM)).await;
}

#[tokio::test]
async fn lance_reloading_same_docs_across_reopen_does_not_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let uri = dir.path().to_string_lossy().to_string();
    {
        let store = LanceStore::open(&uri, "documents", DIM).await.unwrap();
        check_reloading_same_docs_does_not_duplicate(&store).await;
    }
    let store = LanceStore::open(&uri, "documents", DIM).await.unwrap();
    check_reloading_same_docs_does_not_duplicate(&store).await;
}
