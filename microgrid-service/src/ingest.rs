use std::{path::Path, sync::Arc, time::Duration};

use microgrid_client::Sample;

use crate::{
    config::IngestionConfig,
    pipeline::{IngestSummary, Pipeline},
    sinks::SampleStoreSink,
    sources::{parse_utc_offset, SampleCsvFileSource},
    store::SampleStore,
    transform::SampleValidation,
};

/// Import one telemetry CSV into `store` through the validation pipeline.
pub async fn import_csv_file(
    path: &Path,
    store: Arc<dyn SampleStore>,
    cfg: &IngestionConfig,
) -> anyhow::Result<IngestSummary> {
    let delimiter = u8::try_from(cfg.delimiter)
        .map_err(|_| anyhow::anyhow!("ingestion.delimiter must be a single-byte character"))?;
    let offset = parse_utc_offset(&cfg.utc_offset)?;

    tracing::info!(path = %path.display(), "importing samples");

    let pipeline: Pipeline<_, Sample, _> = Pipeline {
        source: SampleCsvFileSource::new(path)
            .with_delimiter(delimiter)
            .with_default_offset(offset),
        transforms: vec![Arc::new(SampleValidation)],
        sink: SampleStoreSink::new(
            store,
            cfg.batch_size,
            cfg.max_retries,
            Duration::from_millis(cfg.retry_backoff_ms),
        ),
    };

    Ok(pipeline.run().await?)
}
