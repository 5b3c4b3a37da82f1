use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use microgrid_client::Sample;

use crate::{
    pipeline::{Envelope, IngestSummary, PipelineError, Sink},
    store::SampleStore,
};

/// Batches validated samples into a [`SampleStore`].
///
/// Rejected records coming down the pipeline are counted and skipped; a
/// `Source` or `Sink` error aborts the run after flushing what was buffered.
pub struct SampleStoreSink {
    store: Arc<dyn SampleStore>,
    batch_size: usize,
    max_retries: u32,
    retry_backoff: Duration,
}

impl SampleStoreSink {
    pub fn new(store: Arc<dyn SampleStore>, batch_size: usize, max_retries: u32, retry_backoff: Duration) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            max_retries,
            retry_backoff,
        }
    }

    async fn flush_batch(&self, batch: &[Envelope<Sample>]) -> Result<u64, PipelineError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let samples: Vec<Sample> = batch.iter().map(|e| e.payload.clone()).collect();

        let mut attempt: u32 = 0;
        loop {
            match self.store.insert_batch(&samples).await {
                Ok(_) => {
                    metrics::counter!("ingest_samples_written_total").increment(samples.len() as u64);

                    if let Some(min_received) = batch.iter().map(|e| e.received_at).min() {
                        if let Ok(dur) = std::time::SystemTime::now().duration_since(min_received) {
                            metrics::histogram!("ingest_end_to_end_latency_seconds").record(dur.as_secs_f64());
                        }
                    }

                    return Ok(samples.len() as u64);
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let sleep_for = self.retry_backoff * attempt;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        "sample store flush failed, retrying with backoff"
                    );
                    tokio::time::sleep(sleep_for).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "sample store flush failed, giving up");
                    metrics::counter!("sample_store_errors_total").increment(1);
                    return Err(PipelineError::Sink(e.to_string()));
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Sink<Sample> for SampleStoreSink {
    async fn run<S>(&self, mut input: S) -> Result<IngestSummary, PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<Sample>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut summary = IngestSummary::default();
        let mut buffer: Vec<Envelope<Sample>> = Vec::with_capacity(self.batch_size);

        while let Some(item) = input.next().await {
            let env = match item {
                Ok(env) => env,
                Err(PipelineError::Rejected(reason)) => {
                    summary.skipped += 1;
                    metrics::counter!("ingest_rows_skipped_total").increment(1);
                    tracing::debug!(%reason, "skipping rejected sample");
                    continue;
                }
                Err(e) => {
                    tracing::error!(error = %e, "error in upstream pipeline for SampleStoreSink");
                    summary.imported += self.flush_batch(&buffer).await?;
                    return Err(e);
                }
            };

            buffer.push(env);
            if buffer.len() >= self.batch_size {
                summary.imported += self.flush_batch(&buffer).await?;
                buffer.clear();
            }
        }

        summary.imported += self.flush_batch(&buffer).await?;

        Ok(summary)
    }
}
