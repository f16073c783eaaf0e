pub mod core;
pub mod http;
pub mod items;
pub mod middlewares;
pub mod pipelines;
pub mod scrapers;
pub mod settings;
pub mod spiders;
pub mod stats;
pub mod storage;

pub use core::Crawler;
pub use core::{ScraperError, ScraperResult, Spider};
pub use http::{HttpRequest, HttpResponse};
pub use scrapers::Scraper;
pub use settings::Settings;
pub use stats::StatsTracker;
