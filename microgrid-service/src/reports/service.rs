use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{NewReportConfiguration, ReportArtifact, ReportConfiguration, ReportError, ReportJob, ReportRepository};

/// Owner-scoped entry point for report configurations and jobs.
#[derive(Clone)]
pub struct ReportService {
    repo: Arc<ReportRepository>,
    queue: mpsc::Sender<Uuid>,
}

impl ReportService {
    pub fn new(repo: Arc<ReportRepository>, queue: mpsc::Sender<Uuid>) -> Self {
        Self { repo, queue }
    }

    pub async fn create_configuration(
        &self,
        owner: &str,
        request: NewReportConfiguration,
    ) -> Result<ReportConfiguration, ReportError> {
        request.validate()?;
        let config = ReportConfiguration::new(owner, request, OffsetDateTime::now_utc());
        self.repo.insert_configuration(config.clone()).await;
        tracing::info!(config_id = %config.id, owner, format = config.format.extension(), "report configuration created");
        Ok(config)
    }

    pub async fn list_configurations(&self, owner: &str) -> Vec<ReportConfiguration> {
        self.repo.list_configurations(owner).await
    }

    pub async fn configuration(&self, owner: &str, id: Uuid) -> Result<ReportConfiguration, ReportError> {
        self.repo.configuration(owner, id).await
    }

    pub async fn update_configuration(
        &self,
        owner: &str,
        id: Uuid,
        request: NewReportConfiguration,
    ) -> Result<ReportConfiguration, ReportError> {
        let config = self
            .repo
            .update_configuration(owner, id, request, OffsetDateTime::now_utc())
            .await?;
        tracing::info!(config_id = %id, owner, format = config.format.extension(), "report configuration updated");
        Ok(config)
    }

    pub async fn delete_configuration(&self, owner: &str, id: Uuid) -> Result<(), ReportError> {
        self.repo.delete_configuration(owner, id).await?;
        tracing::info!(config_id = %id, owner, "report configuration deleted");
        Ok(())
    }

    /// Record a pending job for `config_id` and queue it. Returns as soon as
    /// the job is queued.
    pub async fn enqueue(&self, owner: &str, config_id: Uuid) -> Result<ReportJob, ReportError> {
        self.repo.configuration(owner, config_id).await?;

        let job = ReportJob::new(config_id, owner, OffsetDateTime::now_utc());
        self.repo.insert_job(job.clone()).await;

        if self.queue.send(job.id).await.is_err() {
            tracing::error!(job_id = %job.id, "report queue closed, dropping job");
            self.repo.remove_job(job.id).await;
            return Err(ReportError::QueueClosed);
        }

        metrics::counter!("report_jobs_enqueued_total").increment(1);
        tracing::info!(job_id = %job.id, %config_id, owner, "report job queued");
        Ok(job)
    }

    pub async fn job(&self, owner: &str, id: Uuid) -> Result<ReportJob, ReportError> {
        self.repo.job(owner, id).await
    }

    pub async fn list_jobs(&self, owner: &str) -> Vec<ReportJob> {
        self.repo.list_jobs(owner).await
    }

    /// The artifact of a completed job; `NotReady` while it is still running
    /// or after it failed.
    pub async fn download(&self, owner: &str, job_id: Uuid) -> Result<ReportArtifact, ReportError> {
        self.repo.artifact(owner, job_id).await
    }
}
