use crate::storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Extraction error: {0}")]
    ExtractionError(String),

    #[error("Middleware error: {0}")]
    MiddlewareError(String),

    #[error("Pipeline error: {0}")]
    PipelineError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Optional component switched off by its settings.
    #[error("Not configured: {0}")]
    NotConfigured(String),
}

pub type ScraperResult<T> = Result<T, ScraperError>;
