use async_trait::async_trait;
use erased_serde::Serialize as ErasedSerialize;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// A scraped record of any serializable shape.
pub type ScrapedItem = Box<dyn ErasedSerialize + Send + Sync>;

pub trait IntoScrapedItem {
    fn into_scraped_item(self) -> ScrapedItem;
}

impl<T: Serialize + Send + Sync + 'static> IntoScrapedItem for T {
    fn into_scraped_item(self) -> ScrapedItem {
        Box::new(self)
    }
}

/// Fully resolved `database.table` a batch is loaded into.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTarget {
    pub database: String,
    pub table: String,
}

impl LoadTarget {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for LoadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("stream load to {target} failed with HTTP {status}: {body}")]
    HttpStatus {
        target: LoadTarget,
        status: u16,
        body: String,
    },

    #[error("stream load to {target} rejected: {message}")]
    LoadRejected { target: LoadTarget, message: String },

    #[error("network error during stream load to {target}: {source}")]
    Transport {
        target: LoadTarget,
        #[source]
        source: reqwest::Error,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        StorageError::SerializationError(error.to_string())
    }
}

#[async_trait]
pub trait BulkLoader: Send + Sync {
    async fn load(&self, target: &LoadTarget, records: &[Value]) -> Result<(), StorageError>;
}
