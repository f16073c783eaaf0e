use super::ItemPipeline;
use crate::core::Spider;
use crate::settings::DorisSettings;
use crate::storage::{
    BulkLoader, DorisStreamLoader, DorisStreamLoaderConfig, LoadTarget, ScrapedItem,
};
use crate::{ScraperError, ScraperResult};
use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Buffers items per destination table and stream-loads them in batches.
pub struct DorisPipeline {
    loader: Arc<dyn BulkLoader>,
    default_target: LoadTarget,
    batch_size: usize,
    buffers: Mutex<HashMap<LoadTarget, Vec<Value>>>,
}

impl DorisPipeline {
    pub fn new(loader: Arc<dyn BulkLoader>, default_target: LoadTarget, batch_size: usize) -> Self {
        Self {
            loader,
            default_target,
            batch_size: batch_size.max(1),
            buffers: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_settings(settings: &DorisSettings) -> ScraperResult<Self> {
        if !settings.enabled {
            return Err(ScraperError::NotConfigured(
                "Doris pipeline is disabled".to_string(),
            ));
        }
        if settings.host.is_empty() {
            return Err(ScraperError::NotConfigured(
                "DORIS_HOST must be configured to enable the Doris pipeline".to_string(),
            ));
        }
        if settings.default_database.is_empty() || settings.default_table.is_empty() {
            return Err(ScraperError::NotConfigured(
                "Both DORIS_DEFAULT_DATABASE and DORIS_DEFAULT_TABLE must be set to enable the Doris pipeline"
                    .to_string(),
            ));
        }

        let loader = DorisStreamLoader::new(DorisStreamLoaderConfig {
            host: settings.host.clone(),
            user: settings.user.clone(),
            password: settings.password.clone(),
            timeout: settings.timeout,
            label_prefix: settings.label_prefix.clone(),
            extra_headers: settings.stream_load_headers.clone(),
        })?;

        Ok(Self::new(
            Arc::new(loader),
            LoadTarget::new(&settings.default_database, &settings.default_table),
            settings.batch_size,
        ))
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of records waiting for `target`.
    pub fn pending(&self, target: &LoadTarget) -> usize {
        self.buffers.lock().get(target).map_or(0, Vec::len)
    }

    fn resolve_target(&self, spider: &dyn Spider, record: &Value) -> ScraperResult<LoadTarget> {
        let route = spider.doris_target(record);
        let database = route
            .database
            .unwrap_or_else(|| self.default_target.database.clone());
        let table = route
            .table
            .unwrap_or_else(|| self.default_target.table.clone());

        if database.is_empty() || table.is_empty() {
            return Err(ScraperError::PipelineError(format!(
                "Doris target could not be resolved for spider {}; provide a database and a table",
                spider.name()
            )));
        }

        Ok(LoadTarget::new(database, table))
    }

    /// On failure the batch is put back ahead of anything buffered meanwhile.
    async fn flush(&self, target: &LoadTarget, batch: Vec<Value>) -> ScraperResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        debug!("Flushing {} item(s) to Doris table {}", batch.len(), target);
        if let Err(e) = self.loader.load(target, &batch).await {
            let mut buffers = self.buffers.lock();
            let buffer = buffers.entry(target.clone()).or_default();
            let newer = std::mem::replace(buffer, batch);
            buffer.extend(newer);
            return Err(e.into());
        }

        Ok(())
    }
}

#[async_trait]
impl ItemPipeline for DorisPipeline {
    fn name(&self) -> &str {
        "doris"
    }

    async fn open_spider(&self, spider: &dyn Spider) -> ScraperResult<()> {
        info!(
            "Opened Doris pipeline for spider {} with default target {}",
            spider.name(),
            self.default_target
        );
        Ok(())
    }

    async fn process_item(
        &self,
        item: ScrapedItem,
        spider: &dyn Spider,
    ) -> ScraperResult<Option<ScrapedItem>> {
        let record = serde_json::to_value(&item)?;
        let target = self.resolve_target(spider, &record)?;

        let full_batch = {
            let mut buffers = self.buffers.lock();
            let buffer = buffers.entry(target.clone()).or_default();
            buffer.push(record);
            (buffer.len() >= self.batch_size).then(|| std::mem::take(buffer))
        };

        if let Some(batch) = full_batch {
            if let Err(e) = self.flush(&target, batch).await {
                warn!(
                    "Keeping {} item(s) buffered for {}: {}",
                    self.pending(&target),
                    target,
                    e
                );
            }
        }

        Ok(Some(item))
    }

    async fn close_spider(&self, spider: &dyn Spider) -> ScraperResult<()> {
        let mut pending: Vec<(LoadTarget, Vec<Value>)> = self
            .buffers
            .lock()
            .iter_mut()
            .filter(|(_, buffer)| !buffer.is_empty())
            .map(|(target, buffer)| (target.clone(), std::mem::take(buffer)))
            .collect();
        pending.sort_by(|a, b| a.0.cmp(&b.0));

        let mut first_error = None;
        for (target, batch) in pending {
            if let Err(e) = self.flush(&target, batch).await {
                first_error.get_or_insert(e);
            }
        }

        info!("Closed Doris pipeline for spider {}", spider.name());
        first_error.map_or(Ok(()), Err)
    }
}
