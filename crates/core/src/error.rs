use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("embedding dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("embedding provider failed: {0}")]
    Embedding(String),

    #[error("embedding provider timed out after {0:?}")]
    EmbeddingTimeout(std::time::Duration),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("api key missing for {0}")]
    MissingApiKey(String),
}

pub type Result<T, E = RagError> = std::result::Result<T, E>;
