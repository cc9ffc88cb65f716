use anyhow::{anyhow, Result};
use arrow_array::{Float32Array, UInt64Array};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{DistanceType, Table};
use std::path::Path;
use tracing::debug;

use feeder_core::error::Error;
use feeder_core::types::SearchHit;

use crate::schema::{DISTANCE_COLUMN, ID_COLUMN, TABLE_NAME, VECTOR_COLUMN};
use crate::table::{has_chunks_table, open_existing};

/// Exact L2 search over a built index. No ANN index is ever trained, and
/// `bypass_vector_index` keeps it that way even if one appears.
pub struct IndexSearcher { table: Table }

impl IndexSearcher {
    pub async fn open(index_path: &Path) -> Result<Self> {
        let db = open_existing(index_path).await?;
        if !has_chunks_table(&db).await? {
            return Err(Error::NotFound(format!("table '{}' in {}", TABLE_NAME, index_path.display())).into());
        }
        let table = db.open_table(TABLE_NAME).execute().await?;
        Ok(Self { table })
    }

    pub async fn len(&self) -> Result<usize> { Ok(self.table.count_rows(None).await?) }

    pub async fn is_empty(&self) -> Result<bool> { Ok(self.len().await? == 0) }

    /// Up to `k` hits ordered by ascending distance. LanceDB reports squared L2,
    /// which ranks identically.
    pub async fn search_vec(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 { return Ok(Vec::new()); }
        let mut stream = self.table
            .vector_search(query.to_vec())?
            .column(VECTOR_COLUMN)
            .distance_type(DistanceType::L2)
            .bypass_vector_index()
            .select(Select::columns(&[ID_COLUMN]))
            .limit(k)
            .execute()
            .await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let ids = batch.column_by_name(ID_COLUMN).and_then(|c| c.as_any().downcast_ref::<UInt64Array>()).ok_or_else(|| anyhow!("search result has no '{}' column", ID_COLUMN))?;
            let distances = batch.column_by_name(DISTANCE_COLUMN).and_then(|c| c.as_any().downcast_ref::<Float32Array>()).ok_or_else(|| anyhow!("search result has no '{}' column", DISTANCE_COLUMN))?;
            for i in 0..batch.num_rows() { hits.push(SearchHit { id: ids.value(i), distance: distances.value(i) }); }
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        debug!("Vector search returned {} hits (k={})", hits.len(), k);
        Ok(hits)
    }
}
