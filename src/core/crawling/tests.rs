use crate::core::{ParseResult, SpiderConfig, SpiderResponse};
use crate::http::HttpRequest;
use crate::middlewares::DownloaderMiddleware;
use crate::pipelines::{DorisPipeline, ItemPipeline};
use crate::scrapers::{MockResponse, MockScraper};
use crate::spiders::quotes::fixtures::*;
use crate::spiders::QuotesSpider;
use crate::storage::{DorisStreamLoader, DorisStreamLoaderConfig, LoadTarget, ScrapedItem};
use crate::{Crawler, ScraperError, ScraperResult, Spider};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn quote_site() -> MockScraper {
    MockScraper::new([
        (FIRST_PAGE_URL, MockResponse::html(FIRST_PAGE)),
        (SECOND_PAGE_URL, MockResponse::html(SECOND_PAGE)),
    ])
}

#[derive(Default)]
struct CollectingPipeline {
    items: Mutex<Vec<Value>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

#[async_trait]
impl ItemPipeline for Arc<CollectingPipeline> {
    fn name(&self) -> &str {
        "collecting"
    }

    async fn open_spider(&self, _spider: &dyn Spider) -> ScraperResult<()> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn process_item(
        &self,
        item: ScrapedItem,
        _spider: &dyn Spider,
    ) -> ScraperResult<Option<ScrapedItem>> {
        self.items.lock().push(serde_json::to_value(&item)?);
        Ok(Some(item))
    }

    async fn close_spider(&self, _spider: &dyn Spider) -> ScraperResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct DroppingPipeline;

#[async_trait]
impl ItemPipeline for DroppingPipeline {
    fn name(&self) -> &str {
        "dropping"
    }

    async fn process_item(
        &self,
        _item: ScrapedItem,
        _spider: &dyn Spider,
    ) -> ScraperResult<Option<ScrapedItem>> {
        Ok(None)
    }
}

struct FixedProxy(&'static str);

#[async_trait]
impl DownloaderMiddleware for FixedProxy {
    fn name(&self) -> &str {
        "fixed_proxy"
    }

    async fn process_request(
        &self,
        request: &mut HttpRequest,
        _spider: &dyn Spider,
    ) -> ScraperResult<()> {
        request.proxy = Some(self.0.to_string());
        Ok(())
    }
}

struct RejectingMiddleware;

#[async_trait]
impl DownloaderMiddleware for RejectingMiddleware {
    fn name(&self) -> &str {
        "rejecting"
    }

    async fn process_request(
        &self,
        _request: &mut HttpRequest,
        _spider: &dyn Spider,
    ) -> ScraperResult<()> {
        Err(ScraperError::MiddlewareError("rejected".to_string()))
    }
}

/// Stops the crawl on its first response.
struct StoppingSpider {
    config: SpiderConfig,
}

#[async_trait]
impl Spider for StoppingSpider {
    fn name(&self) -> String {
        "stopping".to_string()
    }

    fn start_urls(&self) -> Vec<Url> {
        vec![Url::parse(FIRST_PAGE_URL).unwrap()]
    }

    fn config(&self) -> &SpiderConfig {
        &self.config
    }

    fn set_config(&mut self, config: SpiderConfig) {
        self.config = config;
    }

    async fn parse(&self, _response: SpiderResponse) -> ScraperResult<ParseResult> {
        Ok(ParseResult::Stop)
    }
}

#[tokio::test]
async fn test_crawl_follows_pagination_and_collects_items() {
    let scraper = quote_site();
    let collected = Arc::new(CollectingPipeline::default());
    let crawler = Crawler::new(Box::new(scraper.clone()))
        .with_pipeline(Box::new(Arc::clone(&collected)));

    crawler.run(QuotesSpider::new().unwrap()).await.unwrap();

    let items = collected.items.lock();
    assert_eq!(items.len(), 3);
    assert_eq!(items[2]["url"], SECOND_PAGE_URL);
    assert_eq!(items[2]["description"], Value::Null);

    assert_eq!(scraper.requests().len(), 2);
    assert_eq!(collected.opened.load(Ordering::SeqCst), 1);
    assert_eq!(collected.closed.load(Ordering::SeqCst), 1);

    let stats = crawler.stats().get_stats();
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.items_scraped, 3);
}

#[tokio::test]
async fn test_max_depth_limits_crawl() {
    let scraper = quote_site();
    let collected = Arc::new(CollectingPipeline::default());
    let crawler = Crawler::new(Box::new(scraper.clone()))
        .with_pipeline(Box::new(Arc::clone(&collected)));

    let spider = QuotesSpider::new()
        .unwrap()
        .with_config(SpiderConfig::default().with_depth(1));
    crawler.run(spider).await.unwrap();

    assert_eq!(scraper.requests().len(), 1);
    assert_eq!(collected.items.lock().len(), 2);
}

const LOOPING_PAGE: &str = r#"<html><body>
<div class="quote"><span class="text">“Round and round.”</span></div>
<ul class="pager"><li class="next"><a href="/">Next</a></li></ul>
</body></html>"#;

fn looping_site() -> MockScraper {
    MockScraper::new([
        (FIRST_PAGE_URL, MockResponse::html(FIRST_PAGE)),
        (SECOND_PAGE_URL, MockResponse::html(LOOPING_PAGE)),
    ])
}

#[tokio::test]
async fn test_visited_urls_are_not_fetched_again() {
    let scraper = looping_site();
    let crawler = Crawler::new(Box::new(scraper.clone()));

    crawler.run(QuotesSpider::new().unwrap()).await.unwrap();

    let urls: Vec<String> = scraper
        .requests()
        .iter()
        .map(|r| r.url.to_string())
        .collect();
    assert_eq!(urls, vec![FIRST_PAGE_URL, SECOND_PAGE_URL]);
}

#[tokio::test]
async fn test_revisits_are_bounded_by_depth() {
    let scraper = looping_site();
    let crawler = Crawler::new(Box::new(scraper.clone()));

    let spider = QuotesSpider::new().unwrap().with_config(
        SpiderConfig::default()
            .with_depth(4)
            .with_allow_url_revisit(true),
    );
    crawler.run(spider).await.unwrap();

    assert_eq!(scraper.requests().len(), 4);
}

#[tokio::test]
async fn test_zero_concurrency_still_crawls() {
    let scraper = quote_site();
    let crawler = Crawler::new(Box::new(scraper.clone()));

    let spider = QuotesSpider::new().unwrap().with_config(SpiderConfig {
        max_concurrency: 0,
        ..SpiderConfig::default()
    });
    crawler.run(spider).await.unwrap();

    assert_eq!(scraper.requests().len(), 2);
}

#[tokio::test]
async fn test_middleware_runs_before_download() {
    let scraper = quote_site();
    let crawler = Crawler::new(Box::new(scraper.clone()))
        .with_middleware(Box::new(FixedProxy("http://10.0.0.9:3128")));

    crawler.run(QuotesSpider::new().unwrap()).await.unwrap();

    let requests = scraper.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests
        .iter()
        .all(|r| r.proxy.as_deref() == Some("http://10.0.0.9:3128")));
}

#[tokio::test]
async fn test_middleware_error_skips_request() {
    let scraper = quote_site();
    let collected = Arc::new(CollectingPipeline::default());
    let crawler = Crawler::new(Box::new(scraper.clone()))
        .with_middleware(Box::new(RejectingMiddleware))
        .with_pipeline(Box::new(Arc::clone(&collected)));

    crawler.run(QuotesSpider::new().unwrap()).await.unwrap();

    assert!(scraper.requests().is_empty());
    assert!(collected.items.lock().is_empty());
    assert_eq!(collected.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dropped_items_skip_later_pipelines() {
    let collected = Arc::new(CollectingPipeline::default());
    let crawler = Crawler::new(Box::new(quote_site()))
        .with_pipeline(Box::new(DroppingPipeline))
        .with_pipeline(Box::new(Arc::clone(&collected)));

    crawler.run(QuotesSpider::new().unwrap()).await.unwrap();

    assert!(collected.items.lock().is_empty());
    assert_eq!(crawler.stats().get_stats().items_dropped, 3);
}

#[tokio::test]
async fn test_stop_still_closes_pipelines() {
    let collected = Arc::new(CollectingPipeline::default());
    let crawler =
        Crawler::new(Box::new(quote_site())).with_pipeline(Box::new(Arc::clone(&collected)));

    crawler
        .run(StoppingSpider {
            config: SpiderConfig::default(),
        })
        .await
        .unwrap();

    assert!(collected.items.lock().is_empty());
    assert_eq!(collected.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_quotes_are_stream_loaded_per_table() {
    let doris = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Status": "Success"})))
        .mount(&doris)
        .await;

    let loader = DorisStreamLoader::new(DorisStreamLoaderConfig::new(doris.uri())).unwrap();
    let pipeline = DorisPipeline::new(Arc::new(loader), LoadTarget::new("demo", "items"), 2);
    let crawler = Crawler::new(Box::new(quote_site())).with_pipeline(Box::new(pipeline));

    crawler.run(QuotesSpider::new().unwrap()).await.unwrap();

    let received = doris.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);

    let quotes: Vec<Value> = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(received[0].url.path(), "/api/demo/quotes/_stream_load");
    assert_eq!(quotes.len(), 2);

    let unknown: Vec<Value> = serde_json::from_slice(&received[1].body).unwrap();
    assert_eq!(
        received[1].url.path(),
        "/api/demo/quotes_unknown_author/_stream_load"
    );
    assert_eq!(unknown.len(), 1);
    assert_eq!(unknown[0]["title"], "“A quote nobody signed.”");
}

#[tokio::test]
async fn test_failed_final_flush_is_reported() {
    let doris = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/demo/quotes_unknown_author/_stream_load"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&doris)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Status": "Success"})))
        .mount(&doris)
        .await;

    let loader = DorisStreamLoader::new(DorisStreamLoaderConfig::new(doris.uri())).unwrap();
    let pipeline = DorisPipeline::new(Arc::new(loader), LoadTarget::new("demo", "items"), 50);
    let crawler = Crawler::new(Box::new(quote_site())).with_pipeline(Box::new(pipeline));

    let result = crawler.run(QuotesSpider::new().unwrap()).await;

    assert!(matches!(result, Err(ScraperError::StorageError(_))));
    // Both tables are attempted even though one of them fails
    assert_eq!(doris.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_batch_flush_still_feeds_later_pipelines() {
    let doris = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&doris)
        .await;

    let loader = DorisStreamLoader::new(DorisStreamLoaderConfig::new(doris.uri())).unwrap();
    let pipeline = DorisPipeline::new(Arc::new(loader), LoadTarget::new("demo", "items"), 1);
    let collected = Arc::new(CollectingPipeline::default());
    let crawler = Crawler::new(Box::new(quote_site()))
        .with_pipeline(Box::new(pipeline))
        .with_pipeline(Box::new(Arc::clone(&collected)));

    let result = crawler.run(QuotesSpider::new().unwrap()).await;

    assert_eq!(collected.items.lock().len(), 3);
    assert_eq!(crawler.stats().get_stats().pipeline_errors, 0);
    // Still buffered at close, so the final flush reports the outage
    assert!(matches!(result, Err(ScraperError::StorageError(_))));
}
