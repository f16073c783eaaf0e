pub mod base;
pub mod doris;

pub use base::{BulkLoader, IntoScrapedItem, LoadTarget, ScrapedItem, StorageError};
pub use doris::{DorisStreamLoader, DorisStreamLoaderConfig};
