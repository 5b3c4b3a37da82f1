use std::{pin::Pin, sync::Arc, time::SystemTime};

use futures::{Stream, StreamExt};

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
    /// 1-based position in the originating file, when there is one.
    pub line: Option<u64>,
}

impl<T> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
            line: None,
        }
    }

    pub fn at_line(payload: T, line: u64) -> Self {
        Self {
            line: Some(line),
            ..Self::new(payload)
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    /// A single record was rejected; the pipeline keeps going.
    #[error("rejected record: {0}")]
    Rejected(String),
    #[error("sink error: {0}")]
    Sink(String),
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct IngestSummary {
    pub imported: u64,
    pub skipped: u64,
}

impl IngestSummary {
    pub fn total(&self) -> u64 {
        self.imported + self.skipped
    }
}

pub type EnvelopeStream<T> = Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(&self) -> EnvelopeStream<T>;
}

#[async_trait::async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    async fn run<S>(&self, input: S) -> Result<IngestSummary, PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static;
}

pub struct Pipeline<S, T, K> {
    pub source: S,
    pub transforms: Vec<Arc<dyn Transform<T, T> + Send + Sync>>,
    pub sink: K,
}

impl<T, S, K> Pipeline<S, T, K>
where
    T: Send + 'static,
    S: Source<T> + Send + Sync + 'static,
    K: Sink<T> + Send + Sync + 'static,
{
    pub async fn run(self) -> Result<IngestSummary, PipelineError> {
        let mut stream = self.source.stream().await;

        for t in self.transforms {
            stream = Box::pin(stream.then(move |item| {
                let t = t.clone();
                async move {
                    match item {
                        Ok(env) => t.apply(env).await,
                        Err(e) => Err(e),
                    }
                }
            }));
        }

        let summary = self.sink.run(stream).await?;
        tracing::info!(
            imported = summary.imported,
            skipped = summary.skipped,
            "ingestion pipeline finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    struct VecSource(Vec<Result<i32, PipelineError>>);

    #[async_trait::async_trait]
    impl Source<i32> for VecSource {
        async fn stream(&self) -> EnvelopeStream<i32> {
            let items: Vec<_> = self.0.iter().cloned().map(|r| r.map(Envelope::new)).collect();
            Box::pin(futures::stream::iter(items))
        }
    }

    struct RejectNegative;

    #[async_trait::async_trait]
    impl Transform<i32, i32> for RejectNegative {
        async fn apply(&self, input: Envelope<i32>) -> Result<Envelope<i32>, PipelineError> {
            if input.payload < 0 {
                Err(PipelineError::Rejected("negative".to_string()))
            } else {
                Ok(input)
            }
        }
    }

    #[derive(Default)]
    struct CollectSink(Mutex<Vec<i32>>);

    #[async_trait::async_trait]
    impl Sink<i32> for Arc<CollectSink> {
        async fn run<S>(&self, mut input: S) -> Result<IngestSummary, PipelineError>
        where
            S: Stream<Item = Result<Envelope<i32>, PipelineError>> + Send + Unpin + 'static,
        {
            let mut summary = IngestSummary::default();
            while let Some(item) = input.next().await {
                match item {
                    Ok(env) => {
                        self.0.lock().await.push(env.payload);
                        summary.imported += 1;
                    }
                    Err(_) => summary.skipped += 1,
                }
            }
            Ok(summary)
        }
    }

    #[tokio::test]
    async fn transforms_run_in_order_and_errors_reach_the_sink() {
        let sink = Arc::new(CollectSink::default());
        let pipeline: Pipeline<_, i32, _> = Pipeline {
            source: VecSource(vec![
                Ok(1),
                Ok(-2),
                Err(PipelineError::Rejected("bad row".to_string())),
                Ok(3),
            ]),
            transforms: vec![Arc::new(RejectNegative)],
            sink: sink.clone(),
        };

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary, IngestSummary { imported: 2, skipped: 2 });
        assert_eq!(summary.total(), 4);
        assert_eq!(*sink.0.lock().await, vec![1, 3]);
    }
}
