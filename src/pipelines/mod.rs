pub mod doris;

use crate::core::Spider;
use crate::storage::ScrapedItem;
use crate::ScraperResult;
use async_trait::async_trait;

pub use doris::DorisPipeline;

/// A stage every scraped item passes through, in registration order.
#[async_trait]
pub trait ItemPipeline: Send + Sync {
    fn name(&self) -> &str;

    async fn open_spider(&self, _spider: &dyn Spider) -> ScraperResult<()> {
        Ok(())
    }

    /// Returns the item for the next stage, or `None` to drop it.
    async fn process_item(
        &self,
        item: ScrapedItem,
        spider: &dyn Spider,
    ) -> ScraperResult<Option<ScrapedItem>>;

    async fn close_spider(&self, _spider: &dyn Spider) -> ScraperResult<()> {
        Ok(())
    }
}
