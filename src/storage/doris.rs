use super::base::{BulkLoader, LoadTarget, StorageError};
use crate::settings::DEFAULT_LABEL_PREFIX;
use crate::{ScraperError, ScraperResult};
use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DorisStreamLoaderConfig {
    pub host: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
    pub label_prefix: String,
    pub extra_headers: Vec<(String, String)>,
}

impl DorisStreamLoaderConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            password: None,
            timeout: Duration::from_secs(30),
            label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
            extra_headers: Vec::new(),
        }
    }
}

/// HTTP client for Apache Doris stream load (`PUT /api/{db}/{table}/_stream_load`).
#[derive(Clone)]
pub struct DorisStreamLoader {
    client: Client,
    host: String,
    user: Option<String>,
    password: String,
    label_prefix: String,
    extra_headers: HeaderMap,
}

impl DorisStreamLoader {
    pub fn new(config: DorisStreamLoaderConfig) -> ScraperResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        let mut extra_headers = HeaderMap::new();
        for (key, value) in &config.extra_headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ScraperError::Config(format!("stream load header {key:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ScraperError::Config(format!("stream load header {key:?}: {e}")))?;
            extra_headers.insert(name, value);
        }

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            user: config.user.filter(|user| !user.is_empty()),
            password: config.password.unwrap_or_default(),
            label_prefix: config.label_prefix,
            extra_headers,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn endpoint(&self, target: &LoadTarget) -> String {
        format!(
            "{}/api/{}/{}/_stream_load",
            self.host, target.database, target.table
        )
    }

    fn generate_label(&self) -> String {
        format!("{}-{}", self.label_prefix, Uuid::now_v7())
    }

    /// Doris answers 200 even for failed loads; the verdict is in the `Status` field.
    fn rejection_message(body: &str) -> Option<String> {
        let reply: Value = serde_json::from_str(body).ok()?;
        match reply.get("Status").and_then(Value::as_str) {
            Some("Fail") => Some(
                reply
                    .get("Message")
                    .and_then(Value::as_str)
                    .unwrap_or(body)
                    .to_string(),
            ),
            _ => None,
        }
    }
}

#[async_trait]
impl BulkLoader for DorisStreamLoader {
    async fn load(&self, target: &LoadTarget, records: &[Value]) -> Result<(), StorageError> {
        let payload = serde_json::to_vec(records)?;

        let mut request = self
            .client
            .put(self.endpoint(target))
            .header(header::CONTENT_TYPE, "application/json; charset=UTF-8")
            .header("format", "json")
            .header("strip_outer_array", "true")
            .header("label", self.generate_label())
            .body(payload);

        if let Some(user) = &self.user {
            request = request.basic_auth(user, Some(&self.password));
        }
        request = request.headers(self.extra_headers.clone());

        let transport_error = |source: reqwest::Error| {
            error!("Network error during stream load to {}: {}", target, source);
            StorageError::Transport {
                target: target.clone(),
                source,
            }
        };

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            error!(
                "HTTP error during stream load to {}: {} {}",
                target,
                status.as_u16(),
                body
            );
            return Err(StorageError::HttpStatus {
                target: target.clone(),
                status: status.as_u16(),
                body,
            });
        }

        if let Some(message) = Self::rejection_message(&body) {
            error!("Doris rejected stream load to {}: {}", target, message);
            return Err(StorageError::LoadRejected {
                target: target.clone(),
                message,
            });
        }

        debug!("Stream load to Doris succeeded for {}: {}", target, body);
        Ok(())
    }
}
