use crate::core::{
    ItemRoute, ParseOutput, ParseResult, Spider, SpiderCallback, SpiderConfig, SpiderResponse,
};
use crate::http::HttpResponse;
use crate::items::ExampleItem;
use crate::storage::IntoScrapedItem;
use crate::{ScraperError, ScraperResult};
use async_trait::async_trait;
use log::{debug, error};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

const START_URL: &str = "http://quotes.toscrape.com/";

/// Crawls quotes.toscrape.com page by page, one item per quote.
pub struct QuotesSpider {
    start_urls: Vec<Url>,
    config: SpiderConfig,
}

impl QuotesSpider {
    pub const DORIS_DATABASE: &'static str = "demo";
    pub const DORIS_TABLE: &'static str = "quotes";
    pub const UNKNOWN_AUTHOR_TABLE: &'static str = "quotes_unknown_author";

    pub fn new() -> ScraperResult<Self> {
        Ok(Self {
            start_urls: vec![Url::parse(START_URL)?],
            config: SpiderConfig::default(),
        })
    }

    pub fn with_start_urls(mut self, start_urls: Vec<Url>) -> Self {
        self.start_urls = start_urls;
        self
    }

    fn parse_quotes(&self, response: &HttpResponse) -> ScraperResult<ParseOutput> {
        let document = Html::parse_document(&response.decoded_body);
        let quote_selector = selector("div.quote")?;
        let text_selector = selector("span.text")?;
        let author_selector = selector("small.author")?;
        let next_selector = selector("li.next a")?;

        let mut output = ParseOutput::new();
        for quote in document.select(&quote_selector) {
            output.add_item(
                ExampleItem {
                    title: first_text(quote, &text_selector),
                    url: response.url.to_string(),
                    description: first_text(quote, &author_selector),
                }
                .into_scraped_item(),
            );
        }

        let next_page = document
            .select(&next_selector)
            .next()
            .and_then(|link| link.value().attr("href"));
        if let Some(href) = next_page {
            output.add_request(response.follow(href, SpiderCallback::ParsePagination)?);
        }

        debug!(
            "Parsed {} quote(s) from {} (next page: {})",
            output.items.len(),
            response.url,
            next_page.unwrap_or("none")
        );
        Ok(output)
    }
}

fn selector(css: &str) -> ScraperResult<Selector> {
    Selector::parse(css)
        .map_err(|e| ScraperError::ExtractionError(format!("invalid selector {css:?}: {e}")))
}

fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|e| e.text().collect::<String>())
}

#[async_trait]
impl Spider for QuotesSpider {
    fn name(&self) -> String {
        "example".to_string()
    }

    fn start_urls(&self) -> Vec<Url> {
        self.start_urls.clone()
    }

    fn config(&self) -> &SpiderConfig {
        &self.config
    }

    fn set_config(&mut self, config: SpiderConfig) {
        self.config = config;
    }

    async fn parse(&self, spider_response: SpiderResponse) -> ScraperResult<ParseResult> {
        match spider_response.callback {
            SpiderCallback::Bootstrap | SpiderCallback::ParsePagination => Ok(
                ParseResult::Continue(self.parse_quotes(&spider_response.response)?),
            ),
            SpiderCallback::ParseItem => {
                error!("Unexpected item callback for {}", spider_response.response.url);
                Ok(ParseResult::Skip)
            }
            SpiderCallback::Custom(ref name) => {
                error!("Unhandled custom callback: {}", name);
                Ok(ParseResult::Skip)
            }
        }
    }

    fn doris_database(&self) -> Option<&str> {
        Some(Self::DORIS_DATABASE)
    }

    fn doris_table(&self) -> Option<&str> {
        Some(Self::DORIS_TABLE)
    }

    fn doris_target(&self, item: &Value) -> ItemRoute {
        let has_author = item
            .get("description")
            .and_then(Value::as_str)
            .is_some_and(|author| !author.is_empty());

        if has_author {
            ItemRoute::new(self.doris_database(), self.doris_table())
        } else {
            ItemRoute::new(self.doris_database(), Some(Self::UNKNOWN_AUTHOR_TABLE))
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const FIRST_PAGE_URL: &str = "http://quotes.toscrape.com/";
    pub const SECOND_PAGE_URL: &str = "http://quotes.toscrape.com/page/2/";

    pub const FIRST_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<div class="quote">
  <span class="text">“The world as we have created it is a process of our thinking.”</span>
  <span>by <small class="author">Albert Einstein</small></span>
</div>
<div class="quote">
  <span class="text">“It is our choices, Harry, that show what we truly are.”</span>
  <span>by <small class="author">J.K. Rowling</small></span>
</div>
<nav><ul class="pager"><li class="next"><a href="/page/2/">Next</a></li></ul></nav>
</body></html>"#;

    pub const SECOND_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<div class="quote">
  <span class="text">“A quote nobody signed.”</span>
</div>
<nav><ul class="pager"><li class="previous"><a href="/">Previous</a></li></ul></nav>
</body></html>"#;
}
