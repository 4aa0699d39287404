use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("upload has no file name: {0}")]
    MissingFileName(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ocr failed: {0}")]
    OcrFailed(String),

    #[error("extraction task failed: {0}")]
    Task(String),

    #[error("index store error: {0}")]
    Store(#[from] SearchError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("index store unavailable: {0}")]
    Unavailable(String),

    #[error("index store call timed out after {0:?}")]
    Timeout(Duration),
}

impl SearchError {
    /// Transport-level failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::Timeout(_) | SearchError::Unavailable(_) => true,
            SearchError::Http(error) => error.is_timeout() || error.is_connect(),
            _ => false,
        }
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
