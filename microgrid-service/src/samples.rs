//! Paged, time-ordered sample listing for charting clients.

use futures::TryStreamExt;
use microgrid_client::{Sample, TimeWindow};
use serde::Serialize;

use crate::store::{SampleStore, StoreError};

pub const DEFAULT_PAGE_LIMIT: usize = 1000;
pub const MAX_PAGE_LIMIT: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplePage {
    pub offset: usize,
    pub limit: usize,
    /// More samples follow this page inside the window.
    pub has_more: bool,
    pub samples: Vec<Sample>,
}

/// Read `limit` samples of `window`, ascending, after skipping `offset`.
///
/// The stream is abandoned as soon as the page and one look-ahead sample are
/// read.
pub async fn page(
    store: &dyn SampleStore,
    window: TimeWindow,
    offset: usize,
    limit: usize,
) -> Result<SamplePage, StoreError> {
    let mut stream = store.stream(window);
    let mut skipped = 0;
    let mut samples = Vec::with_capacity(limit.min(DEFAULT_PAGE_LIMIT));
    let mut has_more = false;

    while let Some(sample) = stream.try_next().await? {
        if skipped < offset {
            skipped += 1;
            continue;
        }
        if samples.len() == limit {
            has_more = true;
            break;
        }
        samples.push(sample);
    }

    metrics::counter!("samples_listed_total").increment(samples.len() as u64);
    tracing::debug!(offset, limit, returned = samples.len(), has_more, "sample page read");

    Ok(SamplePage {
        offset,
        limit,
        has_more,
        samples,
    })
}
