//! Sample store collaborators: anything that can hand back a time-ordered
//! window of samples and accept ingested batches.

pub mod memory;
pub mod questdb;

use std::{pin::Pin, sync::Arc};

use futures::{Stream, TryStreamExt};
use microgrid_client::{Sample, TimeWindow};
use sqlx::postgres::PgPoolOptions;

use crate::config::QuestDbConfig;

pub use memory::InMemorySampleStore;
pub use questdb::QuestDbSampleStore;

pub type SampleStream<'a> = Pin<Box<dyn Stream<Item = Result<Sample, StoreError>> + Send + 'a>>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("sample query failed: {0}")]
    Query(String),
    #[error("sample write failed: {0}")]
    Write(String),
}

#[async_trait::async_trait]
pub trait SampleStore: Send + Sync {
    /// Samples inside `window` (inclusive), ascending by timestamp.
    fn stream(&self, window: TimeWindow) -> SampleStream<'_>;

    async fn insert_batch(&self, batch: &[Sample]) -> Result<u64, StoreError>;

    async fn query(&self, window: TimeWindow) -> Result<Vec<Sample>, StoreError> {
        self.stream(window).try_collect().await
    }
}

/// QuestDB when configured, otherwise a process-local store.
pub async fn from_config(questdb: Option<&QuestDbConfig>) -> anyhow::Result<Arc<dyn SampleStore>> {
    match questdb {
        Some(cfg) => {
            let pool = PgPoolOptions::new()
                .max_connections(cfg.max_connections)
                .connect(&cfg.uri)
                .await?;
            tracing::info!(max_connections = cfg.max_connections, "connected to QuestDB");
            Ok(Arc::new(QuestDbSampleStore::new(pool)))
        }
        None => {
            tracing::warn!("no [questdb] section configured, samples are kept in memory only");
            Ok(Arc::new(InMemorySampleStore::new()))
        }
    }
}
