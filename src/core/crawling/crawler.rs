use crate::core::spider::{ParseResult, SpiderResponse};
use crate::middlewares::DownloaderMiddleware;
use crate::pipelines::ItemPipeline;
use crate::stats::StatsTracker;
use crate::storage::ScrapedItem;
use crate::{HttpRequest, Scraper};
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, error, info, trace, warn};
use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::spawn;
use tokio::task::JoinHandle;

use crate::{ScraperResult, Spider};

type CrawlTask = JoinHandle<ScraperResult<ParseResult>>;

pub struct Crawler {
    scraper: Box<dyn Scraper>,
    middlewares: Vec<Arc<dyn DownloaderMiddleware>>,
    pipelines: Vec<Box<dyn ItemPipeline>>,
    visited_urls: RwLock<HashSet<String>>,
    stats: Arc<StatsTracker>,
}

impl Crawler {
    pub fn new(scraper: Box<dyn Scraper>) -> Self {
        info!("Initializing crawler");
        let stats = Arc::new(StatsTracker::new());
        let mut scraper = scraper;
        scraper.set_stats(Arc::clone(&stats));

        Self {
            scraper,
            middlewares: Vec::new(),
            pipelines: Vec::new(),
            visited_urls: RwLock::new(HashSet::new()),
            stats,
        }
    }

    /// Middlewares run in registration order on every outgoing request.
    pub fn with_middleware(mut self, middleware: Box<dyn DownloaderMiddleware>) -> Self {
        debug!("Registered downloader middleware '{}'", middleware.name());
        self.middlewares.push(Arc::from(middleware));
        self
    }

    /// Pipelines run in registration order on every scraped item.
    pub fn with_pipeline(mut self, pipeline: Box<dyn ItemPipeline>) -> Self {
        debug!("Registered item pipeline '{}'", pipeline.name());
        self.pipelines.push(pipeline);
        self
    }

    pub fn stats(&self) -> Arc<StatsTracker> {
        Arc::clone(&self.stats)
    }

    pub async fn run<S: Spider + 'static>(&self, spider: S) -> ScraperResult<()> {
        let spider = Arc::new(spider);
        let mut futures: FuturesUnordered<CrawlTask> = FuturesUnordered::new();

        info!("Starting spider: {}", spider.name());
        debug!("Max depth: {}", spider.config().max_depth);

        for pipeline in &self.pipelines {
            pipeline.open_spider(&*spider).await?;
        }

        let mut pending: VecDeque<HttpRequest> = spider.start_requests().into();

        loop {
            self.schedule(&mut pending, &spider, &mut futures);

            let Some(result) = futures.next().await else {
                break;
            };

            match result {
                Ok(Ok(ParseResult::Continue(output))) => {
                    self.process_items(output.items, &*spider).await;
                    pending.extend(output.requests);
                }
                Ok(Ok(ParseResult::Skip)) => {
                    debug!("Skipping current URL");
                }
                Ok(Ok(ParseResult::Stop)) => {
                    info!("Spider requested stop");
                    for task in futures.iter() {
                        task.abort();
                    }
                    break;
                }
                Ok(Err(e)) => warn!("Error processing request: {}", e),
                Err(e) => warn!("Task error: {}", e),
            }
        }

        let mut close_error = None;
        for pipeline in &self.pipelines {
            if let Err(e) = pipeline.close_spider(&*spider).await {
                error!("Pipeline '{}' failed to close: {}", pipeline.name(), e);
                close_error.get_or_insert(e);
            }
        }

        self.stats.finish();
        info!(
            "Spider {} completed. Total URLs processed: {}",
            spider.name(),
            self.visited_urls.read().len()
        );
        self.stats.print_summary();

        close_error.map_or(Ok(()), Err)
    }

    /// Starts queued requests until the concurrency limit is reached.
    fn schedule<S: Spider + 'static>(
        &self,
        pending: &mut VecDeque<HttpRequest>,
        spider: &Arc<S>,
        futures: &mut FuturesUnordered<CrawlTask>,
    ) {
        let config = spider.config();
        let max_concurrency = config.max_concurrency.max(1);

        while futures.len() < max_concurrency {
            let Some(request) = pending.pop_front() else {
                break;
            };

            if request.depth >= config.max_depth {
                debug!("Skipping URL {} - max depth reached", request.url);
                continue;
            }

            let url_str = request.url.to_string();
            if !config.allow_url_revisit && self.visited_urls.read().contains(&url_str) {
                debug!("Skipping URL {} - already visited", url_str);
                continue;
            }

            info!("Processing URL: {} at depth {}", url_str, request.depth);
            if let Some(meta) = &request.meta {
                trace!("Request metadata: {:?}", meta);
            }
            self.visited_urls.write().insert(url_str);

            futures.push(self.process_request(request, Arc::clone(spider)));
        }
    }

    fn process_request<S: Spider + 'static>(
        &self,
        mut request: HttpRequest,
        spider: Arc<S>,
    ) -> CrawlTask {
        let scraper = self.scraper.box_clone();
        let middlewares = self.middlewares.clone();
        let stats = Arc::clone(&self.stats);

        spawn(async move {
            for middleware in &middlewares {
                middleware.process_request(&mut request, &*spider).await?;
            }

            let response = scraper.fetch(request, spider.config()).await?;
            let spider_response = SpiderResponse {
                callback: response.from_request.callback.clone(),
                response,
            };
            spider
                .parse(spider_response)
                .await
                .inspect_err(|_| stats.record_parse_error())
        })
    }

    async fn process_items(&self, items: Vec<ScrapedItem>, spider: &dyn Spider) {
        'items: for item in items {
            self.stats.record_item_scraped();

            let mut current = item;
            for pipeline in &self.pipelines {
                match pipeline.process_item(current, spider).await {
                    Ok(Some(next)) => current = next,
                    Ok(None) => {
                        debug!("Pipeline '{}' dropped item", pipeline.name());
                        self.stats.record_item_dropped();
                        continue 'items;
                    }
                    Err(e) => {
                        error!("Pipeline '{}' error: {}", pipeline.name(), e);
                        self.stats.record_pipeline_error();
                        continue 'items;
                    }
                }
            }
            trace!("Item processed by all pipelines");
        }
    }
}
