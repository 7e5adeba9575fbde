//! Persistent vector store on a LanceDB table.
//!
//! Rows carry a monotonically increasing `seq` so that search can recover
//! insertion order for tie-breaking. All mutations go through a write gate;
//! readers hold the read side, so `replace` is observed as a single step.
//! `replace` writes the new rows before deleting the old ones, so a failed
//! write leaves the previous corpus in place.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, Table};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use ragchat_core::traits::VectorStore;
use ragchat_core::types::{ChunkId, DocumentChunk, Meta, ScoredChunk, StoreKind};
use ragchat_core::{Error, Result};

use crate::flat::check_dim;
use crate::schema::{build_chunk_schema, meta_table_name, META_EMBEDDING_DIM, META_SCHEMA_VERSION, SCHEMA_VERSION};
use crate::similarity::{cosine, top_k};
use crate::table::{ensure_table, get_meta, open_db, set_meta};

pub struct LanceStore {
    conn: Connection,
    table: String,
    dim: usize,
    /// Next `seq` to assign; the lock doubles as the mutation gate.
    gate: RwLock<i64>,
}

impl LanceStore {
    /// Opens (or creates) `table` under `uri`. An existing table written with
    /// a different dimension or schema version is refused.
    pub async fn open(uri: &str, table: &str, dim: usize) -> Result<Self> {
        let conn = open_db(uri).await.map_err(Error::store)?;
        let meta_table = meta_table_name(table);

        match get_meta(&conn, &meta_table, META_SCHEMA_VERSION).await.map_err(Error::store)? {
            Some(v) if v != SCHEMA_VERSION => {
                return Err(Error::ConfigurationError(format!(
                    "table '{table}' has schema version {v}, expected {SCHEMA_VERSION}"
                )));
            }
            Some(_) => {}
            None => set_meta(&conn, &meta_table, META_SCHEMA_VERSION, SCHEMA_VERSION).await.map_err(Error::store)?,
        }
        match get_meta(&conn, &meta_table, META_EMBEDDING_DIM).await.map_err(Error::store)? {
            Some(v) if v != dim.to_string() => {
                return Err(Error::ConfigurationError(format!(
                    "table '{table}' stores {v}-dim embeddings, configured dimension is {dim}"
                )));
            }
            Some(_) => {}
            None => set_meta(&conn, &meta_table, META_EMBEDDING_DIM, &dim.to_string()).await.map_err(Error::store)?,
        }

        ensure_table(&conn, table, build_chunk_schema(dim)).await.map_err(Error::store)?;
        let store = Self { conn, table: table.to_string(), dim, gate: RwLock::new(0) };
        let next = store.max_seq().await?.map_or(0, |s| s + 1);
        *store.gate.write().await = next;
        info!(uri, table, dim, next_seq = next, "opened lance store");
        Ok(store)
    }

    async fn open_table(&self) -> Result<Table> {
        self.conn.open_table(&self.table).execute().await.map_err(Error::store)
    }

    async fn max_seq(&self) -> Result<Option<i64>> {
        let t = self.open_table().await?;
        let mut stream = t
            .query()
            .select(Select::columns(&["seq"]))
            .execute()
            .await
            .map_err(Error::store)?;
        let mut max = None;
        while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
            let seqs = column::<Int64Array>(&batch, "seq")?;
            for i in 0..batch.num_rows() {
                let s = seqs.value(i);
                max = Some(max.map_or(s, |m: i64| m.max(s)));
            }
        }
        Ok(max)
    }

    fn to_batch(&self, chunks: &[DocumentChunk], first_seq: i64) -> Result<RecordBatch> {
        let mut ids = Vec::with_capacity(chunks.len());
        let mut seqs = Vec::with_capacity(chunks.len());
        let mut texts = Vec::with_capacity(chunks.len());
        let mut metas = Vec::with_capacity(chunks.len());
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
        for (i, c) in chunks.iter().enumerate() {
            ids.push(c.id.clone());
            seqs.push(first_seq + i as i64);
            texts.push(c.text.clone());
            metas.push(serde_json::to_string(&c.metadata).map_err(|e| Error::InvalidInput(e.to_string()))?);
            vectors.push(Some(c.embedding.iter().map(|&x| Some(x)).collect()));
        }
        RecordBatch::try_new(
            build_chunk_schema(self.dim),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(Int64Array::from(seqs)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(metas)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
                    vectors.into_iter(),
                    self.dim as i32,
                )),
            ],
        )
        .map_err(Error::store)
    }

    /// Appends under an already-held write gate.
    async fn append_locked(&self, next_seq: &mut i64, chunks: Vec<DocumentChunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let n = chunks.len();
        let batch = self.to_batch(&chunks, *next_seq)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        self.open_table().await?.add(reader).execute().await.map_err(Error::store)?;
        *next_seq += n as i64;
        Ok(n)
    }

    async fn delete_all_locked(&self) -> Result<()> {
        self.open_table().await?.delete("true").await.map_err(Error::store)?;
        Ok(())
    }

    /// Appends `chunks` after the current rows, then drops every row older
    /// than the new batch.
    async fn swap_locked(&self, next_seq: &mut i64, chunks: Vec<DocumentChunk>) -> Result<usize> {
        let first_new = *next_seq;
        let n = self.append_locked(next_seq, chunks).await?;
        if first_new == 0 {
            return Ok(n);
        }
        let t = self.open_table().await?;
        if let Err(e) = t.delete(&format!("seq < {first_new}")).await {
            warn!(table = %self.table, error = %e, "dropping replaced rows failed, rolling back new rows");
            if let Err(rollback) = t.delete(&format!("seq >= {first_new}")).await {
                warn!(table = %self.table, error = %rollback, "rollback of new rows failed");
            }
            *next_seq = first_new;
            return Err(Error::store(e));
        }
        Ok(n)
    }
}

fn parse_metadata(raw: &str, id: &str) -> Meta {
    match serde_json::from_str(raw) {
        Ok(meta) => meta,
        Err(e) => {
            warn!(chunk = id, error = %e, "unreadable chunk metadata, dropping it");
            HashMap::new()
        }
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Lance
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    async fn upsert(&self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        for c in &chunks {
            check_dim(self.dim, c)?;
        }
        let mut gate = self.gate.write().await;
        let n = self.append_locked(&mut *gate, chunks).await?;
        debug!(table = %self.table, rows = n, "lance upsert");
        Ok(n)
    }

    async fn clear(&self) -> Result<()> {
        let mut gate = self.gate.write().await;
        self.delete_all_locked().await?;
        *gate = 0;
        Ok(())
    }

    async fn replace(&self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        for c in &chunks {
            check_dim(self.dim, c)?;
        }
        let mut gate = self.gate.write().await;
        let n = self.swap_locked(&mut *gate, chunks).await?;
        debug!(table = %self.table, rows = n, "lance replace");
        Ok(n)
    }

    async fn count(&self) -> Result<usize> {
        let _gate = self.gate.read().await;
        self.open_table().await?.count_rows(None).await.map_err(Error::store)
    }

    async fn chunk_ids(&self) -> Result<Vec<ChunkId>> {
        let _gate = self.gate.read().await;
        let t = self.open_table().await?;
        let mut stream = t
            .query()
            .select(Select::columns(&["id"]))
            .execute()
            .await
            .map_err(Error::store)?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
            let ids = column::<StringArray>(&batch, "id")?;
            out.extend((0..batch.num_rows()).map(|i| ids.value(i).to_string()));
        }
        Ok(out)
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if query.len() != self.dim {
            return Err(Error::InvalidInput(format!("query has {} dims, store expects {}", query.len(), self.dim)));
        }
        let _gate = self.gate.read().await;
        let t = self.open_table().await?;
        let mut stream = t.query().execute().await.map_err(Error::store)?;

        let mut rows: Vec<(i64, DocumentChunk)> = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
            let ids = column::<StringArray>(&batch, "id")?;
            let seqs = column::<Int64Array>(&batch, "seq")?;
            let texts = column::<StringArray>(&batch, "text")?;
            let metas = column::<StringArray>(&batch, "metadata")?;
            let vecs = column::<FixedSizeListArray>(&batch, "embedding")?;
            for i in 0..batch.num_rows() {
                let metadata = parse_metadata(metas.value(i), ids.value(i));
                let embedding = if vecs.is_null(i) {
                    vec![0.0; self.dim]
                } else {
                    vecs.value(i).as_primitive::<Float32Type>().values().to_vec()
                };
                rows.push((
                    seqs.value(i),
                    DocumentChunk { id: ids.value(i).to_string(), text: texts.value(i).to_string(), metadata, embedding },
                ));
            }
        }
        rows.sort_by_key(|(seq, _)| *seq);

        let scanned = rows.len();
        let scored: Vec<(DocumentChunk, f32)> = rows
            .into_iter()
            .map(|(_, chunk)| {
                let score = cosine(query, &chunk.embedding);
                (chunk, score)
            })
            .collect();
        let hits: Vec<ScoredChunk> = top_k(scored, k)
            .into_iter()
            .map(|(chunk, score)| ScoredChunk { chunk, score })
            .collect();
        debug!(table = %self.table, scanned, returned = hits.len(), "lance search");
        Ok(hits)
    }
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::store(anyhow!("column '{name}' missing or mistyped")))
}
