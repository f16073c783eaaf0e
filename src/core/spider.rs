use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::http::{HttpRequest, HttpResponse};
use crate::storage::ScrapedItem;
use crate::ScraperResult;

#[derive(Debug, Clone)]
pub enum SpiderCallback {
    Bootstrap,
    ParsePagination,
    ParseItem,
    Custom(String),
}

#[derive(Debug, Clone)]
pub struct SpiderConfig {
    pub max_depth: usize,
    pub max_concurrency: usize,
    pub allow_url_revisit: bool,
    pub headers: Vec<(String, String)>,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self {
            max_depth: 100,
            max_concurrency: 16,
            allow_url_revisit: false,
            headers: Vec::new(),
        }
    }
}

impl SpiderConfig {
    pub fn with_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_allow_url_revisit(mut self, allow: bool) -> Self {
        self.allow_url_revisit = allow;
        self
    }

    pub fn with_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

#[derive(Debug, Clone)]
pub struct SpiderResponse {
    pub response: HttpResponse,
    pub callback: SpiderCallback,
}

/// Items scraped from one response plus the requests to schedule next.
#[derive(Default)]
pub struct ParseOutput {
    pub items: Vec<ScrapedItem>,
    pub requests: Vec<HttpRequest>,
}

impl ParseOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, item: ScrapedItem) {
        self.items.push(item);
    }

    pub fn add_request(&mut self, request: HttpRequest) {
        self.requests.push(request);
    }
}

pub enum ParseResult {
    Continue(ParseOutput),
    Skip,
    Stop,
}

/// Destination chosen by a spider for one item. Missing parts fall back to
/// the sink's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemRoute {
    pub database: Option<String>,
    pub table: Option<String>,
}

impl ItemRoute {
    pub fn new(database: Option<&str>, table: Option<&str>) -> Self {
        Self {
            database: database.map(str::to_string),
            table: table.map(str::to_string),
        }
    }
}

#[async_trait]
pub trait Spider: Send + Sync {
    fn name(&self) -> String;
    fn start_urls(&self) -> Vec<Url>;
    fn config(&self) -> &SpiderConfig;
    fn set_config(&mut self, config: SpiderConfig);

    fn with_config(mut self, config: SpiderConfig) -> Self
    where
        Self: Sized,
    {
        self.set_config(config);
        self
    }

    fn start_requests(&self) -> Vec<HttpRequest> {
        self.start_urls()
            .into_iter()
            .map(|url| HttpRequest::new(url, SpiderCallback::Bootstrap, 0))
            .collect()
    }

    async fn parse(&self, response: SpiderResponse) -> ScraperResult<ParseResult>;

    /// Database this spider loads into unless `doris_target` says otherwise.
    fn doris_database(&self) -> Option<&str> {
        None
    }

    /// Table this spider loads into unless `doris_target` says otherwise.
    fn doris_table(&self) -> Option<&str> {
        None
    }

    /// Picks the destination for a single item, given its JSON form.
    fn doris_target(&self, _item: &Value) -> ItemRoute {
        ItemRoute::new(self.doris_database(), self.doris_table())
    }
}
