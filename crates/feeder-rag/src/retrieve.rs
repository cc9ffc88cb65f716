use anyhow::{anyhow, Result};
use std::path::Path;
use tracing::{debug, warn};

use feeder_core::traits::Embedder;
use feeder_core::types::RetrievedChunk;
use feeder_vector::{IndexSearcher, RecordStore};

/// An opened index and record store, queried with one embedder.
pub struct Retriever<'a> { searcher: IndexSearcher, store: RecordStore, embedder: &'a dyn Embedder }

impl<'a> Retriever<'a> {
    /// Both artifacts must exist; a missing or corrupt index is an error.
    pub async fn open(index_path: &Path, metadata_path: &Path, embedder: &'a dyn Embedder) -> Result<Self> {
        let searcher = IndexSearcher::open(index_path).await?;
        if searcher.is_empty().await? { warn!("Index {} holds no vectors; every query will run without context", index_path.display()); }
        let store = RecordStore::load(metadata_path)?;
        Ok(Self { searcher, store, embedder })
    }

    /// Up to `k` chunks by ascending distance. Ids with no metadata record are
    /// dropped, so an empty result means "no results", not failure.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let query_vec = self.embedder.embed_batch(&[query.to_string()])?.pop().ok_or_else(|| anyhow!("embedder returned no vector for the query"))?;
        let hits = self.searcher.search_vec(&query_vec, k).await?;
        let results: Vec<RetrievedChunk> = hits
            .into_iter()
            .filter_map(|hit| match self.store.get(hit.id) {
                Some(r) => Some(RetrievedChunk { id: hit.id, distance: hit.distance, file_path: r.file_path.clone(), text: r.text.clone() }),
                None => { debug!("Dropping hit {} with no metadata record", hit.id); None }
            })
            .collect();
        debug!("Retrieved {} chunks for query", results.len());
        Ok(results)
    }
}

/// Open the artifacts, embed `query` and return its `k` nearest chunks.
pub async fn retrieve(query: &str, index_path: &Path, embedder: &dyn Embedder, metadata_path: &Path, k: usize) -> Result<Vec<RetrievedChunk>> {
    Retriever::open(index_path, metadata_path, embedder).await?.retrieve(query, k).await
}

/// `file_path: text` per chunk, newline-joined.
pub fn build_context(results: &[RetrievedChunk]) -> String {
    results.iter().map(|r| format!("{}: {}", r.file_path, r.text)).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_path_prefixed_lines() {
        let chunk = |file_path: &str, text: &str| RetrievedChunk { id: 0, distance: 0.0, file_path: file_path.into(), text: text.into() };
        assert_eq!(build_context(&[chunk("a.rs", "one"), chunk("b.rs", "two")]), "a.rs: one\nb.rs: two");
        assert_eq!(build_context(&[]), "");
    }
}
