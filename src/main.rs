use log::info;
use onlyupou::core::spider::SpiderConfig;
use onlyupou::middlewares::RedisProxyMiddleware;
use onlyupou::pipelines::DorisPipeline;
use onlyupou::scrapers::HttpScraper;
use onlyupou::spiders::QuotesSpider;
use onlyupou::{Crawler, ScraperError, ScraperResult, Settings, Spider};

#[tokio::main]
async fn main() -> ScraperResult<()> {
    let settings = Settings::from_env()?;

    env_logger::builder()
        .filter_level(settings.log_level)
        .filter_module("selectors", log::LevelFilter::Warn)
        .filter_module("html5ever", log::LevelFilter::Error)
        .init();

    info!("Starting {}", settings.bot_name);

    let scraper = Box::new(HttpScraper::new()?);
    let mut crawler = Crawler::new(scraper);

    match RedisProxyMiddleware::from_settings(&settings.redis_proxy) {
        Ok(middleware) => crawler = crawler.with_middleware(Box::new(middleware)),
        Err(ScraperError::NotConfigured(reason)) => info!("Redis proxy disabled: {}", reason),
        Err(e) => return Err(e),
    }

    match DorisPipeline::from_settings(&settings.doris) {
        Ok(pipeline) => crawler = crawler.with_pipeline(Box::new(pipeline)),
        Err(ScraperError::NotConfigured(reason)) => info!("Doris pipeline disabled: {}", reason),
        Err(e) => return Err(e),
    }

    let spider_config =
        SpiderConfig::default().with_headers(settings.default_request_headers.clone());
    let spider = QuotesSpider::new()?.with_config(spider_config);

    crawler.run(spider).await?;

    Ok(())
}
