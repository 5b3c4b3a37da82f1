use futures::{StreamExt, TryStreamExt};
use microgrid_client::{db::sample_queries, Sample, TimeWindow};
use sqlx::postgres::PgPool;

use super::{SampleStore, SampleStream, StoreError};

/// Sample store backed by QuestDB over the Postgres wire protocol.
#[derive(Debug, Clone)]
pub struct QuestDbSampleStore {
    pool: PgPool,
}

impl QuestDbSampleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SampleStore for QuestDbSampleStore {
    fn stream(&self, window: TimeWindow) -> SampleStream<'_> {
        sample_queries::stream_window(&self.pool, &window)
            .map_err(|e| StoreError::Query(e.to_string()))
            .boxed()
    }

    async fn insert_batch(&self, batch: &[Sample]) -> Result<u64, StoreError> {
        sample_queries::insert_samples(&self.pool, batch)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))
    }
}
