use microgrid_client::{Sample, TimeWindow};
use tokio::sync::RwLock;

use super::{SampleStore, SampleStream, StoreError};

/// Process-local store. Samples are kept sorted by timestamp; samples with
/// equal timestamps keep their insertion order.
#[derive(Debug, Default)]
pub struct InMemorySampleStore {
    samples: RwLock<Vec<Sample>>,
}

impl InMemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.samples.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.samples.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl SampleStore for InMemorySampleStore {
    fn stream(&self, window: TimeWindow) -> SampleStream<'_> {
        // Snapshot under the read lock so concurrent ingestion never tears a window.
        let s = async_stream::stream! {
            let snapshot: Vec<Sample> = {
                let guard = self.samples.read().await;
                let from = window
                    .start
                    .map_or(0, |start| guard.partition_point(|s| s.ts < start));
                let to = window
                    .end
                    .map_or(guard.len(), |end| guard.partition_point(|s| s.ts <= end));
                guard.get(from..to.max(from)).map(<[Sample]>::to_vec).unwrap_or_default()
            };

            for sample in snapshot {
                yield Ok(sample);
            }
        };

        Box::pin(s)
    }

    async fn insert_batch(&self, batch: &[Sample]) -> Result<u64, StoreError> {
        let mut guard = self.samples.write().await;
        for sample in batch {
            let idx = guard.partition_point(|s| s.ts <= sample.ts);
            guard.insert(idx, sample.clone());
        }
        Ok(batch.len() as u64)
    }
}
