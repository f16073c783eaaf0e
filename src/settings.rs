//! Runtime settings, read from environment variables.
//!
//! Every value has a default so a bare `cargo run` crawls without a proxy
//! store or a Doris sink. Optional components decide for themselves whether
//! the settings are complete enough to enable them.

use crate::{ScraperError, ScraperResult};
use log::LevelFilter;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

pub const BOT_NAME: &str = "onlyupou";

/// Prefix of the stream load labels unless `DORIS_LABEL_PREFIX` is set.
pub const DEFAULT_LABEL_PREFIX: &str = "scrapy";

#[derive(Debug, Clone)]
pub struct RedisProxySettings {
    pub url: Option<String>,
    pub key: Option<String>,
    pub encoding: String,
    pub fallback: Option<String>,
}

impl Default for RedisProxySettings {
    fn default() -> Self {
        Self {
            url: Some("redis://localhost:6379/0".to_string()),
            key: Some("scrapy:proxies".to_string()),
            encoding: "utf-8".to_string(),
            fallback: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DorisSettings {
    pub enabled: bool,
    pub host: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
    pub label_prefix: String,
    pub default_database: String,
    pub default_table: String,
    pub batch_size: usize,
    pub stream_load_headers: Vec<(String, String)>,
}

impl Default for DorisSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            user: Some("root".to_string()),
            password: Some(String::new()),
            timeout: Duration::from_secs(30),
            label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
            default_database: "demo".to_string(),
            default_table: "items".to_string(),
            batch_size: 50,
            stream_load_headers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_name: String,
    pub log_level: LevelFilter,
    pub default_request_headers: Vec<(String, String)>,
    pub redis_proxy: RedisProxySettings,
    pub doris: DorisSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot_name: BOT_NAME.to_string(),
            log_level: LevelFilter::Info,
            default_request_headers: vec![
                (
                    "Accept".to_string(),
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
                ),
                ("Accept-Language".to_string(), "en".to_string()),
            ],
            redis_proxy: RedisProxySettings::default(),
            doris: DorisSettings::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> ScraperResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> ScraperResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        // SCRAPY_LOG_LEVEL is the established name; LOG_LEVEL is accepted too
        if let Some(level) = lookup("SCRAPY_LOG_LEVEL").or_else(|| lookup("LOG_LEVEL")) {
            settings.log_level = parse_log_level(&level)?;
        }

        let redis = &mut settings.redis_proxy;
        if let Some(url) = lookup("REDIS_PROXY_URL") {
            redis.url = Some(url);
        }
        if let Some(key) = lookup("REDIS_PROXY_KEY") {
            redis.key = Some(key);
        }
        if let Some(encoding) = lookup("REDIS_PROXY_ENCODING") {
            redis.encoding = encoding;
        }
        redis.fallback = lookup("REDIS_PROXY_FALLBACK");

        let doris = &mut settings.doris;
        if let Some(enabled) = lookup("DORIS_ENABLED") {
            doris.enabled = parse_flag(&enabled);
        }
        if let Some(host) = lookup("DORIS_HOST") {
            doris.host = host;
        }
        if let Some(user) = lookup("DORIS_USER") {
            doris.user = Some(user);
        }
        if let Some(password) = lookup("DORIS_PASSWORD") {
            doris.password = Some(password);
        }
        if let Some(timeout) = lookup("DORIS_TIMEOUT") {
            doris.timeout = Duration::from_secs(parse_number("DORIS_TIMEOUT", &timeout)?);
        }
        if let Some(prefix) = lookup("DORIS_LABEL_PREFIX") {
            doris.label_prefix = prefix;
        }
        if let Some(database) = lookup("DORIS_DEFAULT_DATABASE") {
            doris.default_database = database;
        }
        if let Some(table) = lookup("DORIS_DEFAULT_TABLE") {
            doris.default_table = table;
        }
        if let Some(batch_size) = lookup("DORIS_BATCH_SIZE") {
            doris.batch_size = parse_number("DORIS_BATCH_SIZE", &batch_size)?;
        }
        if let Some(headers) = lookup("DORIS_STREAM_LOAD_HEADERS") {
            doris.stream_load_headers = parse_headers(&headers)?;
        }

        Ok(settings)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> ScraperResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ScraperError::Config(format!("{key} must be a non-negative integer, got {value:?}")))
}

fn parse_log_level(value: &str) -> ScraperResult<LevelFilter> {
    match value.trim().to_ascii_lowercase().as_str() {
        "warning" => Ok(LevelFilter::Warn),
        "critical" => Ok(LevelFilter::Error),
        other => LevelFilter::from_str(other)
            .map_err(|_| ScraperError::Config(format!("unknown log level {value:?}"))),
    }
}

fn parse_headers(value: &str) -> ScraperResult<Vec<(String, String)>> {
    if value.trim().is_empty() {
        return Ok(Vec::new());
    }
    let headers: BTreeMap<String, String> = serde_json::from_str(value).map_err(|e| {
        ScraperError::Config(format!(
            "DORIS_STREAM_LOAD_HEADERS must be a JSON object of strings: {e}"
        ))
    })?;
    Ok(headers.into_iter().collect())
}
