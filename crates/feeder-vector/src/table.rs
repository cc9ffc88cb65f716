//! LanceDB connection helpers.

use anyhow::Result;
use lancedb::{connect, Connection};
use std::path::Path;

use feeder_core::error::Error;

use crate::schema::TABLE_NAME;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

/// Open an existing index database; a missing path is an error, not an empty index.
pub async fn open_existing(path: &Path) -> Result<Connection> {
    if !path.exists() {
        return Err(Error::NotFound(format!("vector index {}", path.display())).into());
    }
    open_db(&path.to_string_lossy()).await
}

pub async fn has_chunks_table(conn: &Connection) -> Result<bool> {
    let names = conn.table_names().execute().await?;
    Ok(names.iter().any(|n| n == TABLE_NAME))
}
