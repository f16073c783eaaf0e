pub mod redis_proxy;

use crate::core::Spider;
use crate::http::HttpRequest;
use crate::ScraperResult;
use async_trait::async_trait;

pub use redis_proxy::{ProxyEncoding, ProxySource, RedisProxyMiddleware, RedisProxySource};

/// Hook run on every outgoing request before it is downloaded.
#[async_trait]
pub trait DownloaderMiddleware: Send + Sync {
    fn name(&self) -> &str;

    async fn process_request(
        &self,
        request: &mut HttpRequest,
        spider: &dyn Spider,
    ) -> ScraperResult<()>;
}
