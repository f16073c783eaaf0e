use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use reqwest::{header, Client, ClientBuilder, Proxy};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use super::Scraper;
use crate::core::SpiderConfig;
use crate::http::{HttpRequest, HttpResponse, ResponseType};
use crate::{ScraperError, ScraperResult, StatsTracker};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum HttpScraperError {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] header::InvalidHeaderName),
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] header::InvalidHeaderValue),
    #[error("Invalid proxy {proxy}: {source}")]
    InvalidProxy {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },
}

impl From<HttpScraperError> for ScraperError {
    fn from(err: HttpScraperError) -> Self {
        match err {
            HttpScraperError::HttpError(e) => ScraperError::HttpError(e),
            invalid @ HttpScraperError::InvalidProxy { .. } => {
                ScraperError::MiddlewareError(invalid.to_string())
            }
            other => ScraperError::Config(other.to_string()),
        }
    }
}

/// reqwest-backed downloader. Requests carrying a proxy go through a client
/// built for that proxy; those clients are cached per proxy URI.
#[derive(Clone)]
pub struct HttpScraper {
    client: Client,
    default_headers: header::HeaderMap,
    proxy_clients: Arc<RwLock<HashMap<String, Client>>>,
    stats: Arc<StatsTracker>,
}

impl HttpScraper {
    pub fn new() -> Result<Self, HttpScraperError> {
        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(DEFAULT_USER_AGENT),
        );

        Ok(Self {
            client: Self::build_client(&default_headers)?,
            default_headers,
            proxy_clients: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(StatsTracker::new()),
        })
    }

    pub fn with_headers<K, V>(
        mut self,
        headers: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, HttpScraperError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in headers {
            let name = header::HeaderName::from_bytes(key.as_ref().as_bytes())?;
            let value = header::HeaderValue::from_str(value.as_ref())?;
            self.default_headers.insert(name, value);
        }

        self.client = Self::build_client(&self.default_headers)?;
        self.proxy_clients = Arc::new(RwLock::new(HashMap::new()));

        Ok(self)
    }

    fn build_client(headers: &header::HeaderMap) -> Result<Client, reqwest::Error> {
        ClientBuilder::new().default_headers(headers.clone()).build()
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<Client, HttpScraperError> {
        let Some(proxy) = proxy.filter(|proxy| !proxy.is_empty()) else {
            return Ok(self.client.clone());
        };

        if let Some(client) = self.proxy_clients.read().get(proxy) {
            return Ok(client.clone());
        }

        let invalid = |source| HttpScraperError::InvalidProxy {
            proxy: proxy.to_string(),
            source,
        };
        let client = ClientBuilder::new()
            .default_headers(self.default_headers.clone())
            .proxy(Proxy::all(proxy).map_err(invalid)?)
            .build()
            .map_err(invalid)?;

        self.proxy_clients
            .write()
            .insert(proxy.to_string(), client.clone());
        Ok(client)
    }

    fn extract_headers(response: &reqwest::Response) -> HashMap<String, String> {
        response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|val| (k.to_string(), val.to_string())))
            .collect()
    }

    fn detect_content_type(headers: &HashMap<String, String>, body: &str) -> ResponseType {
        if let Some(content_type) = headers.get("content-type") {
            if content_type.contains("text/html") {
                ResponseType::Html
            } else if content_type.contains("application/json") {
                ResponseType::Json
            } else if content_type.contains("text/") {
                ResponseType::Text
            } else {
                ResponseType::Binary
            }
        } else {
            let start = body.trim_start();
            if start.starts_with('{') || start.starts_with('[') {
                ResponseType::Json
            } else if start.starts_with("<!DOCTYPE") || start.starts_with("<html") {
                ResponseType::Html
            } else {
                ResponseType::Text
            }
        }
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn fetch_single(
        &self,
        request: HttpRequest,
        config: &SpiderConfig,
    ) -> ScraperResult<HttpResponse> {
        let client = self.client_for(request.proxy.as_deref())?;
        let mut req = client.request(request.method.clone(), request.url.clone());

        // Spider-wide headers first so request headers can override them
        for (key, value) in &config.headers {
            req = req.header(key, value);
        }
        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body.clone() {
            req = req.body(body);
        }

        let start_time = Utc::now();
        let response = req.send().await.map_err(HttpScraperError::HttpError)?;

        let status = response.status().as_u16();
        let headers = Self::extract_headers(&response);
        let raw_body = response
            .bytes()
            .await
            .map_err(HttpScraperError::HttpError)?
            .to_vec();
        let decoded_body = String::from_utf8_lossy(&raw_body).into_owned();

        let end_time = Utc::now();
        let meta = json!({
            "request": {
                "method": request.method.as_str(),
                "proxied": request.proxy.is_some(),
            },
            "response": {
                "elapsed": (end_time - start_time).num_milliseconds(),
                "content_length": raw_body.len(),
                "encoding": headers.get("content-encoding").cloned().unwrap_or_default(),
            }
        });

        let response_type = Self::detect_content_type(&headers, &decoded_body);

        Ok(HttpResponse {
            url: request.url.clone(),
            status,
            headers,
            raw_body,
            decoded_body,
            timestamp: start_time,
            meta: Some(meta),
            response_type,
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
