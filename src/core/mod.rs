mod crawling;
mod errors;
pub mod spider;

pub use crawling::Crawler;
pub use errors::{ScraperError, ScraperResult};
pub use spider::{
    ItemRoute, ParseOutput, ParseResult, Spider, SpiderCallback, SpiderConfig, SpiderResponse,
};
