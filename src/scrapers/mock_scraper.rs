use crate::core::SpiderConfig;
use crate::http::{HttpRequest, HttpResponse, ResponseType};
use crate::{ScraperResult, StatsTracker};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::sleep;

use super::Scraper;

#[derive(Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub delay: Option<std::time::Duration>,
}

impl MockResponse {
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            delay: None,
        }
    }
}

/// Serves canned pages by URL and remembers every request it saw.
#[derive(Clone)]
pub struct MockScraper {
    pages: Arc<HashMap<String, MockResponse>>,
    seen: Arc<Mutex<Vec<HttpRequest>>>,
    stats: Arc<StatsTracker>,
}

impl MockScraper {
    pub fn new<I, K>(pages: I) -> Self
    where
        I: IntoIterator<Item = (K, MockResponse)>,
        K: Into<String>,
    {
        Self {
            pages: Arc::new(pages.into_iter().map(|(k, v)| (k.into(), v)).collect()),
            seen: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(StatsTracker::new()),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Scraper for MockScraper {
    async fn fetch_single(
        &self,
        request: HttpRequest,
        _config: &SpiderConfig,
    ) -> ScraperResult<HttpResponse> {
        self.seen.lock().push(request.clone());

        let response = self
            .pages
            .get(request.url.as_str())
            .cloned()
            .unwrap_or(MockResponse {
                status: 404,
                body: "Not Found".to_string(),
                delay: None,
            });

        if let Some(delay) = response.delay {
            sleep(delay).await;
        }

        Ok(HttpResponse {
            url: request.url.clone(),
            status: response.status,
            headers: HashMap::new(),
            raw_body: response.body.clone().into_bytes(),
            decoded_body: response.body,
            timestamp: Utc::now(),
            meta: None,
            response_type: ResponseType::Html,
            from_request: Box::new(request),
        })
    }

    fn box_clone(&self) -> Box<dyn Scraper> {
        Box::new(self.clone())
    }

    fn stats(&self) -> &StatsTracker {
        &self.stats
    }

    fn set_stats(&mut self, stats: Arc<StatsTracker>) {
        self.stats = stats;
    }
}
