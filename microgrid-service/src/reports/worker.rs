use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use microgrid_client::TimeWindow;
use time::OffsetDateTime;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::{render, JobStatus, ReportArtifact, ReportError, ReportJob, ReportMetadata, ReportRepository};
use crate::{config::ReportsConfig, kpis::compute_window, store::SampleStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Extra attempts after the first one fails with a transient error.
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl From<&ReportsConfig> for WorkerSettings {
    fn from(cfg: &ReportsConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            retry_backoff: Duration::from_millis(cfg.retry_backoff_ms),
        }
    }
}

/// Consumes queued job ids and drives each job through
/// query -> compute -> render -> persist.
pub struct ReportWorker {
    rx: mpsc::Receiver<Uuid>,
    runner: Arc<JobRunner>,
}

struct JobRunner {
    repo: Arc<ReportRepository>,
    store: Arc<dyn SampleStore>,
    settings: WorkerSettings,
}

impl ReportWorker {
    /// Build a worker and the sender used to enqueue job ids for it.
    pub fn new(
        repo: Arc<ReportRepository>,
        store: Arc<dyn SampleStore>,
        settings: WorkerSettings,
        queue_capacity: usize,
    ) -> (Self, mpsc::Sender<Uuid>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let runner = Arc::new(JobRunner { repo, store, settings });
        (Self { rx, runner }, tx)
    }

    /// Run until every sender is dropped. Each job runs in its own task so a
    /// job sleeping between retries does not hold up the queue.
    pub async fn run(self) {
        tracing::info!(
            max_retries = self.runner.settings.max_retries,
            retry_backoff_ms = self.runner.settings.retry_backoff.as_millis() as u64,
            "report worker started"
        );

        let mut jobs = ReceiverStream::new(self.rx);
        while let Some(job_id) = jobs.next().await {
            let runner = self.runner.clone();
            tokio::spawn(async move { runner.process(job_id).await });
        }

        tracing::info!("report queue closed, worker stopping");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

impl JobRunner {
    async fn process(&self, job_id: Uuid) {
        loop {
            let job = match self
                .repo
                .update_job(job_id, |j| j.transition_to(JobStatus::Processing, OffsetDateTime::now_utc()))
                .await
            {
                Ok(job) => job,
                Err(e) => {
                    tracing::warn!(%job_id, error = %e, "report job vanished before processing");
                    return;
                }
            };

            let err = match self.attempt(&job).await {
                Ok(done) => {
                    metrics::counter!("report_jobs_completed_total").increment(1);
                    tracing::info!(
                        %job_id,
                        attempts = done.attempts,
                        file_name = done.file_name.as_deref().unwrap_or_default(),
                        "report job completed"
                    );
                    return;
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                tracing::error!(%job_id, error = %err, "report job failed");
                self.fail(job_id, err.to_string()).await;
                return;
            }

            let message = err.to_string();
            let retried = self
                .repo
                .update_job(job_id, |j| {
                    j.transition_to(JobStatus::Retrying, OffsetDateTime::now_utc())?;
                    j.error_message = Some(message.clone());
                    Ok(())
                })
                .await;
            if let Err(e) = retried {
                tracing::warn!(%job_id, error = %e, "could not record report job retry");
                return;
            }

            if job.attempts > self.settings.max_retries {
                tracing::error!(%job_id, attempts = job.attempts, error = %err, "report job exhausted its retries");
                self.fail(job_id, format!("Max retries exceeded: {message}")).await;
                return;
            }

            metrics::counter!("report_jobs_retried_total").increment(1);
            tracing::warn!(
                %job_id,
                attempt = job.attempts,
                error = %err,
                "report job failed, retrying after backoff"
            );
            tokio::time::sleep(self.settings.retry_backoff).await;
        }
    }

    async fn attempt(&self, job: &ReportJob) -> Result<ReportJob, ReportError> {
        let config = self.repo.configuration_for_job(job).await?;
        let now = OffsetDateTime::now_utc();

        let (start, end) = config.date_range.resolve(now.date());
        let window = TimeWindow::from_dates(Some(start), Some(end))
            .map_err(|e| ReportError::InvalidConfiguration(e.to_string()))?;

        let record = compute_window(self.store.as_ref(), window).await?;
        if record.is_none() {
            tracing::info!(job_id = %job.id, %start, %end, "no samples in report period");
        }

        let meta = ReportMetadata {
            name: config.name,
            start,
            end,
            format: config.format,
            generated_at: now,
        };
        let rendered = render::render(record.as_ref(), &meta)?;

        self.repo
            .complete_job(ReportArtifact::new(job.id, config.id, rendered, now), now)
            .await
    }

    async fn fail(&self, job_id: Uuid, message: String) {
        metrics::counter!("report_jobs_failed_total").increment(1);
        let res = self
            .repo
            .update_job(job_id, |j| {
                j.transition_to(JobStatus::Failed, OffsetDateTime::now_utc())?;
                j.error_message = Some(message);
                Ok(())
            })
            .await;
        if let Err(e) = res {
            tracing::warn!(%job_id, error = %e, "could not record report job failure");
        }
    }
}

/// Periodically delete report jobs older than `retention`.
pub fn spawn_cleanup(repo: Arc<ReportRepository>, retention: time::Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            let cutoff = OffsetDateTime::now_utc() - retention;
            let removed = repo.purge_older_than(cutoff).await;
            metrics::counter!("report_jobs_purged_total").increment(removed as u64);
            tracing::info!(removed, %cutoff, "old report jobs purged");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        reports::{DateRangePreset, NewReportConfiguration, ReportConfiguration, ReportFormat, ReportType},
        store::{InMemorySampleStore, SampleStream, StoreError},
    };
    use microgrid_client::{Channel, Sample};
    use std::sync::atomic::{AtomicU32, Ordering};
    use time::macros::{date, datetime};

    fn settings(max_retries: u32) -> WorkerSettings {
        WorkerSettings {
            max_retries,
            retry_backoff: Duration::from_millis(1),
        }
    }

    async fn seed_job(repo: &ReportRepository, format: ReportFormat) -> Uuid {
        let config = ReportConfiguration::new(
            "alice",
            NewReportConfiguration {
                name: "January".to_string(),
                description: String::new(),
                report_type: ReportType::Kpi,
                format,
                include_charts: true,
                date_range: DateRangePreset::Custom {
                    start: date!(2024-01-01),
                    end: date!(2024-01-31),
                },
            },
            OffsetDateTime::now_utc(),
        );
        let job = ReportJob::new(config.id, "alice", OffsetDateTime::now_utc());
        let job_id = job.id;
        repo.insert_configuration(config).await;
        repo.insert_job(job).await;
        job_id
    }

    fn runner(repo: Arc<ReportRepository>, store: Arc<dyn SampleStore>, max_retries: u32) -> JobRunner {
        JobRunner {
            repo,
            store,
            settings: settings(max_retries),
        }
    }

    #[tokio::test]
    async fn job_completes_with_artifact() {
        let repo = Arc::new(ReportRepository::new());
        let store = Arc::new(InMemorySampleStore::new());
        store
            .insert_batch(&[
                Sample::new(datetime!(2024-01-10 00:00:00 UTC)).with(Channel::Pv, 4.0),
                Sample::new(datetime!(2024-01-10 01:00:00 UTC)).with(Channel::Pv, 4.0),
            ])
            .await
            .unwrap();
        let job_id = seed_job(&repo, ReportFormat::Markdown).await;

        runner(repo.clone(), store, 0).process(job_id).await;

        let job = repo.job("alice", job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.attempts, 1);
        let artifact = repo.artifact("alice", job_id).await.unwrap();
        let text = String::from_utf8(artifact.bytes).unwrap();
        assert!(text.contains("| pv_production_kwh | 8.00 | kWh |"));
    }

    #[tokio::test]
    async fn empty_period_still_completes() {
        let repo = Arc::new(ReportRepository::new());
        let job_id = seed_job(&repo, ReportFormat::Csv).await;

        runner(repo.clone(), Arc::new(InMemorySampleStore::new()), 0)
            .process(job_id)
            .await;

        let artifact = repo.artifact("alice", job_id).await.unwrap();
        assert!(String::from_utf8_lossy(&artifact.bytes).contains(render::NO_DATA_MESSAGE));
    }

    #[tokio::test]
    async fn integrity_errors_fail_without_retrying() {
        let repo = Arc::new(ReportRepository::new());
        let store = Arc::new(InMemorySampleStore::new());
        store
            .insert_batch(&[Sample::new(datetime!(2024-01-10 00:00:00 UTC)).with(Channel::Pv, f64::INFINITY)])
            .await
            .unwrap();
        let job_id = seed_job(&repo, ReportFormat::Pdf).await;

        runner(repo.clone(), store, 3).process(job_id).await;

        let job = repo.job("alice", job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 1);
        assert!(job.error_message.unwrap().contains("non-finite"));
    }

    struct FlakyStore {
        failures_left: AtomicU32,
    }

    #[async_trait::async_trait]
    impl SampleStore for FlakyStore {
        fn stream(&self, _window: TimeWindow) -> SampleStream<'_> {
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                Box::pin(futures::stream::once(async {
                    Err(StoreError::Query("connection reset".to_string()))
                }))
            } else {
                Box::pin(futures::stream::empty())
            }
        }

        async fn insert_batch(&self, batch: &[Sample]) -> Result<u64, StoreError> {
            Ok(batch.len() as u64)
        }
    }

    #[tokio::test]
    async fn transient_errors_retry_then_succeed() {
        let repo = Arc::new(ReportRepository::new());
        let store = Arc::new(FlakyStore {
            failures_left: AtomicU32::new(2),
        });
        let job_id = seed_job(&repo, ReportFormat::Csv).await;

        runner(repo.clone(), store, 3).process(job_id).await;

        let job = repo.job("alice", job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.attempts, 3);
        assert_eq!(job.error_message, None);
    }

    #[tokio::test]
    async fn exhausted_retries_record_the_last_error() {
        let repo = Arc::new(ReportRepository::new());
        let store = Arc::new(FlakyStore {
            failures_left: AtomicU32::new(10),
        });
        let job_id = seed_job(&repo, ReportFormat::Csv).await;

        runner(repo.clone(), store, 2).process(job_id).await;

        let job = repo.job("alice", job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 3);
        assert_eq!(
            job.error_message.as_deref(),
            Some("Max retries exceeded: sample query failed: connection reset")
        );
    }

    #[tokio::test]
    async fn queued_jobs_are_picked_up() {
        let repo = Arc::new(ReportRepository::new());
        let job_id = seed_job(&repo, ReportFormat::Markdown).await;
        let (worker, tx) = ReportWorker::new(repo.clone(), Arc::new(InMemorySampleStore::new()), settings(0), 4);
        let handle = worker.spawn();

        tx.send(job_id).await.unwrap();

        let mut status = JobStatus::Pending;
        for _ in 0..200 {
            status = repo.job("alice", job_id).await.unwrap().status;
            if status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(status, JobStatus::Completed);

        drop(tx);
        handle.await.unwrap();
    }
}
