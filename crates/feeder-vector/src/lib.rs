//! Flat vector index over chunk embeddings, backed by LanceDB, plus the
//! plain-text record store that maps each row id back to `(file_path, text)`.

pub mod metadata;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use metadata::RecordStore;
pub use search::IndexSearcher;
pub use writer::{BuildReport, IndexBuilder};
