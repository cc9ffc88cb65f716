//! Domain types that flow through the build and query pipelines.

use serde::{Deserialize, Serialize};

/// Position of a record in the vector index and in the metadata store.
pub type RecordId = u64;

/// A readable source file. Lives only while the corpus is being chunked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub file_path: String,
    pub raw_text: String,
}

/// A fixed-size character window of a document, tagged with its source path.
///
/// Ordinal position is implicit in the chunk's index in the emitted sequence;
/// the index builder turns that position into an explicit `RecordId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub file_path: String,
    pub text: String,
}

/// The `(file_path, text)` pair persisted for each indexed vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub id: RecordId,
    pub file_path: String,
    pub text: String,
}

/// A raw hit from the flat index. Lower `distance` is closer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: RecordId,
    pub distance: f32,
}

/// A hit resolved back to its metadata record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: RecordId,
    pub distance: f32,
    pub file_path: String,
    pub text: String,
}
