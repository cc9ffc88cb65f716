use anyhow::Result;
use arrow_array::{types::Float32Type, FixedSizeListArray, RecordBatch, RecordBatchIterator, UInt64Array};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use feeder_core::error::Error;
use feeder_core::traits::Embedder;
use feeder_core::types::{Chunk, MetadataRecord, RecordId};

use crate::metadata::RecordStore;
use crate::schema::{build_arrow_schema, TABLE_NAME};
use crate::table::open_db;

const INSERT_BATCH: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport { pub records: usize, pub dim: usize, pub index_path: PathBuf, pub metadata_path: PathBuf }

/// Writes the vector index and its record store as one positionally aligned pair.
pub struct IndexBuilder { index_path: PathBuf, metadata_path: PathBuf, batch_size: usize, show_progress: bool }

impl IndexBuilder {
    pub fn new(index_path: impl Into<PathBuf>, metadata_path: impl Into<PathBuf>) -> Self {
        Self { index_path: index_path.into(), metadata_path: metadata_path.into(), batch_size: 64, show_progress: true }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self { self.batch_size = batch_size.max(1); self }

    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self { self.show_progress = show_progress; self }

    /// Embed `chunks`, then overwrite both artifacts. The index is only replaced once the
    /// metadata is staged, and the metadata only lands after the index is written.
    pub async fn build(&self, chunks: &[Chunk], embedder: &dyn Embedder) -> Result<BuildReport> {
        let records: Vec<MetadataRecord> = chunks
            .iter()
            .filter(|c| !c.text.trim().is_empty())
            .enumerate()
            .map(|(i, c)| MetadataRecord { id: i as RecordId, file_path: c.file_path.clone(), text: c.text.clone() })
            .collect();
        if records.is_empty() { return Err(Error::NoChunks.into()); }

        info!("Generating embeddings for {} chunks (dim={}, max_len={})", records.len(), embedder.dim(), embedder.max_len());
        let vectors = self.embed_all(&records, embedder)?;
        if vectors.is_empty() { return Err(Error::NoEmbeddings.into()); }
        if vectors.len() != records.len() {
            return Err(Error::Operation(format!("embedder returned {} vectors for {} chunks", vectors.len(), records.len())).into());
        }
        let dim = vectors[0].len();
        if dim == 0 || vectors.iter().any(|v| v.len() != dim) {
            return Err(Error::Operation("embedding vectors have inconsistent dimensions".into()).into());
        }

        let staged = RecordStore::stage(&self.metadata_path, &records)?;
        remove_existing(&self.index_path)?;
        fs::create_dir_all(&self.index_path)?;
        let db = open_db(&self.index_path.to_string_lossy()).await?;
        info!("Indexing {} vectors (dim={}) into {}", vectors.len(), dim, self.index_path.display());
        for (batch_no, (ids, vecs)) in records.chunks(INSERT_BATCH).zip(vectors.chunks(INSERT_BATCH)).enumerate() {
            let ids: Vec<RecordId> = ids.iter().map(|r| r.id).collect();
            insert_batch(&db, &ids, vecs, dim, batch_no == 0).await?;
        }
        info!("Index saved to {}", self.index_path.display());

        staged.commit()?;
        info!("Metadata saved to {}", self.metadata_path.display());
        Ok(BuildReport { records: records.len(), dim, index_path: self.index_path.clone(), metadata_path: self.metadata_path.clone() })
    }

    fn embed_all(&self, records: &[MetadataRecord], embedder: &dyn Embedder) -> Result<Vec<Vec<f32>>> {
        let pb = if self.show_progress { ProgressBar::new(records.len() as u64) } else { ProgressBar::hidden() };
        pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?.progress_chars("#>-"));
        let mut vectors = Vec::with_capacity(records.len());
        for batch in records.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
            vectors.extend(embedder.embed_batch(&texts)?);
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("embeddings done");
        Ok(vectors)
    }
}

async fn insert_batch(db: &Connection, ids: &[RecordId], vectors: &[Vec<f32>], dim: usize, create: bool) -> Result<()> {
    let record_batch = to_record_batch(ids, vectors, dim)?; let schema = record_batch.schema();
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
    if create {
        db.create_table(TABLE_NAME, reader).execute().await?;
    } else {
        db.open_table(TABLE_NAME).execute().await?.add(reader).execute().await?;
    }
    Ok(())
}

fn to_record_batch(ids: &[RecordId], vectors: &[Vec<f32>], dim: usize) -> Result<RecordBatch> {
    let dim = i32::try_from(dim)?;
    let vectors = vectors.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
    Ok(RecordBatch::try_new(build_arrow_schema(dim), vec![
        Arc::new(UInt64Array::from(ids.to_vec())),
        Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
    ])?)
}

fn remove_existing(path: &Path) -> Result<()> {
    if path.is_dir() { fs::remove_dir_all(path)?; } else if path.exists() { fs::remove_file(path)?; }
    Ok(())
}
