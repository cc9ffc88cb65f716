use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No valid files found in the codebase directory: {0}")]
    EmptyCorpus(String),

    #[error("No valid content to process after chunking")]
    NoChunks,

    #[error("Embedding produced no vectors")]
    NoEmbeddings,

    #[error("Operation failed: {0}")]
    Operation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
