//! Custom error types for curator

use thiserror::Error;

/// Main error type for curator operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The page (or an image asset) could not be fetched. Fatal to an
    /// ingestion run when raised for the page itself; per-item otherwise.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Transient embedding provider failure (rate limit, timeout, 5xx).
    /// Retryable by the caller; curator does not retry internally.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Permanently unusable content (empty text, undecodable image bytes).
    /// Never retried; the offending item is skipped.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The collection already exists with a different vector dimension.
    #[error("Schema mismatch for collection '{collection}': expected dimension {expected}, found {found}")]
    SchemaMismatch {
        collection: String,
        expected: usize,
        found: usize,
    },

    #[error("Qdrant error: {0}")]
    Qdrant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Embedding(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Result type alias for curator
pub type Result<T> = std::result::Result<T, Error>;

/// Convert qdrant errors
impl From<qdrant_client::QdrantError> for Error {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Error::Qdrant(err.to_string())
    }
}
