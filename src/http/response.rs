use super::HttpRequest;
use crate::core::SpiderCallback;
use crate::ScraperResult;
use chrono::prelude::*;
use serde_json::Value;
use std::collections::HashMap;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseType {
    Html,
    Json,
    Text,
    Binary,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: Url,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub raw_body: Vec<u8>,
    pub decoded_body: String,
    pub timestamp: DateTime<Utc>,
    pub meta: Option<Value>,
    pub response_type: ResponseType,
    pub from_request: Box<HttpRequest>,
}

impl HttpResponse {
    /// Builds a request for a link found on this page, one level deeper.
    pub fn follow(&self, href: &str, callback: SpiderCallback) -> ScraperResult<HttpRequest> {
        let url = self.url.join(href)?;
        Ok(HttpRequest::new(url, callback, self.from_request.depth + 1))
    }
}
