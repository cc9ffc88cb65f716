#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned status {status}")]
    Status { status: reqwest::StatusCode },

    #[error("malformed response line: {0}")]
    Malformed(String),

    #[error("response stream failed: {0}")]
    Stream(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;
