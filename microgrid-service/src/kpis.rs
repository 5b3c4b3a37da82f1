use std::time::Instant;

use futures::StreamExt;
use microgrid_client::{compute_stream, KpiError, KpiRecord, TimeWindow};

use crate::store::{SampleStore, StoreError};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ComputeError {
    #[error(transparent)]
    Kpi(#[from] KpiError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ComputeError {
    /// Bad data stays bad; only store failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ComputeError::Store(_))
    }
}

/// Stream a window out of `store` and integrate it in one pass.
///
/// `Ok(None)` means the window held no samples.
pub async fn compute_window(
    store: &dyn SampleStore,
    window: TimeWindow,
) -> Result<Option<KpiRecord>, ComputeError> {
    let started = Instant::now();
    let mut processed: u64 = 0;

    let counted = store.stream(window).map(|item| {
        if item.is_ok() {
            processed += 1;
        }
        item.map_err(ComputeError::from)
    });
    let result = compute_stream(counted).await;

    metrics::counter!("kpi_samples_processed_total").increment(processed);
    metrics::histogram!("kpi_compute_duration_seconds").record(started.elapsed().as_secs_f64());

    let outcome = match &result {
        Ok(Some(_)) => "ok",
        Ok(None) => "no_data",
        Err(ComputeError::Kpi(e)) => {
            metrics::counter!("kpi_integrity_errors_total").increment(1);
            tracing::error!(error = %e, start = ?window.start, end = ?window.end, "KPI window failed integrity checks");
            "integrity_error"
        }
        Err(ComputeError::Store(e)) => {
            tracing::warn!(error = %e, "sample store failed during KPI computation");
            "store_error"
        }
    };
    metrics::counter!("kpi_computations_total", "outcome" => outcome).increment(1);
    tracing::debug!(samples = processed, outcome, "KPI window computed");

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemorySampleStore, SampleStream};
    use microgrid_client::{Channel, Sample};
    use time::macros::datetime;

    #[tokio::test]
    async fn computes_over_the_requested_window_only() {
        let store = InMemorySampleStore::new();
        store
            .insert_batch(&[
                Sample::new(datetime!(2024-01-01 00:00:00 UTC)).with(Channel::Pv, 100.0),
                Sample::new(datetime!(2024-01-02 00:00:00 UTC)).with(Channel::Pv, 10.0),
                Sample::new(datetime!(2024-01-02 01:00:00 UTC)).with(Channel::Pv, 10.0),
            ])
            .await
            .unwrap();

        let window = TimeWindow::between(datetime!(2024-01-02 00:00:00 UTC), datetime!(2024-01-02 23:59:59 UTC));
        let record = compute_window(&store, window).await.unwrap().unwrap();

        assert_eq!(record.total_production_kwh, 20.0);
        assert_eq!(record.peak_production_kw, 10.0);
    }

    #[tokio::test]
    async fn empty_window_is_none() {
        let store = InMemorySampleStore::new();
        assert_eq!(compute_window(&store, TimeWindow::all()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn non_finite_reading_is_an_integrity_error() {
        let store = InMemorySampleStore::new();
        store
            .insert_batch(&[Sample::new(datetime!(2024-01-01 00:00:00 UTC)).with(Channel::BusFrequency, f64::NAN)])
            .await
            .unwrap();

        let err = compute_window(&store, TimeWindow::all()).await.unwrap_err();
        assert!(matches!(err, ComputeError::Kpi(KpiError::DataIntegrity { .. })));
        assert!(!err.is_retryable());
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl SampleStore for BrokenStore {
        fn stream(&self, _window: TimeWindow) -> SampleStream<'_> {
            Box::pin(futures::stream::once(async {
                Err(StoreError::Query("connection refused".to_string()))
            }))
        }

        async fn insert_batch(&self, _batch: &[Sample]) -> Result<u64, StoreError> {
            Err(StoreError::Write("read only".to_string()))
        }
    }

    #[tokio::test]
    async fn store_failures_are_retryable() {
        let err = compute_window(&BrokenStore, TimeWindow::all()).await.unwrap_err();
        assert!(matches!(err, ComputeError::Store(_)));
        assert!(err.is_retryable());
    }
}
