use std::collections::HashMap;

use time::{macros::format_description, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{JobStatus, NewReportConfiguration, RenderedReport, ReportConfiguration, ReportError, ReportJob};

/// A finished report document.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportArtifact {
    pub job_id: Uuid,
    pub file_name: String,
    pub content_type: &'static str,
    /// blake3 hex digest of `bytes`.
    pub checksum: String,
    pub bytes: Vec<u8>,
}

impl ReportArtifact {
    pub fn new(job_id: Uuid, config_id: Uuid, report: RenderedReport, now: OffsetDateTime) -> Self {
        let mut h = blake3::Hasher::new();
        h.update(&report.bytes);

        Self {
            job_id,
            file_name: artifact_file_name(config_id, report.format.extension(), now),
            content_type: report.content_type(),
            checksum: h.finalize().to_hex().to_string(),
            bytes: report.bytes,
        }
    }
}

/// `report_<config>_<YYYYmmdd_HHMMSS>.<ext>`
pub fn artifact_file_name(config_id: Uuid, extension: &str, now: OffsetDateTime) -> String {
    let stamp = now
        .format(format_description!("[year][month][day]_[hour][minute][second]"))
        .unwrap_or_else(|_| now.unix_timestamp().to_string());
    format!("report_{config_id}_{stamp}.{extension}")
}

#[derive(Debug, Default)]
struct Tables {
    configurations: HashMap<Uuid, ReportConfiguration>,
    jobs: HashMap<Uuid, ReportJob>,
    artifacts: HashMap<Uuid, ReportArtifact>,
}

/// Process-local persistence for configurations, jobs and artifacts.
///
/// Every owner-facing lookup treats another owner's record exactly like a
/// missing one.
#[derive(Debug, Default)]
pub struct ReportRepository {
    tables: RwLock<Tables>,
}

impl ReportRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_configuration(&self, config: ReportConfiguration) {
        self.tables.write().await.configurations.insert(config.id, config);
    }

    pub async fn configuration(&self, owner: &str, id: Uuid) -> Result<ReportConfiguration, ReportError> {
        self.tables
            .read()
            .await
            .configurations
            .get(&id)
            .filter(|c| c.owner == owner)
            .cloned()
            .ok_or_else(|| ReportError::configuration_not_found(id))
    }

    /// Newest first.
    pub async fn list_configurations(&self, owner: &str) -> Vec<ReportConfiguration> {
        let tables = self.tables.read().await;
        let mut out: Vec<_> = tables
            .configurations
            .values()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Replace the editable fields of an owned configuration. Jobs already
    /// queued pick up the new settings when they run.
    pub async fn update_configuration(
        &self,
        owner: &str,
        id: Uuid,
        request: NewReportConfiguration,
        now: OffsetDateTime,
    ) -> Result<ReportConfiguration, ReportError> {
        let mut tables = self.tables.write().await;
        let config = tables
            .configurations
            .get_mut(&id)
            .filter(|c| c.owner == owner)
            .ok_or_else(|| ReportError::configuration_not_found(id))?;
        request.validate()?;
        config.replace(request, now);
        Ok(config.clone())
    }

    /// Removes the configuration together with its jobs and artifacts.
    pub async fn delete_configuration(&self, owner: &str, id: Uuid) -> Result<(), ReportError> {
        let mut tables = self.tables.write().await;
        if !tables.configurations.get(&id).is_some_and(|c| c.owner == owner) {
            return Err(ReportError::configuration_not_found(id));
        }
        tables.configurations.remove(&id);

        let job_ids: Vec<Uuid> = tables
            .jobs
            .values()
            .filter(|j| j.config_id == id)
            .map(|j| j.id)
            .collect();
        for job_id in job_ids {
            tables.jobs.remove(&job_id);
            tables.artifacts.remove(&job_id);
        }
        Ok(())
    }

    /// Configuration lookup for the worker, which acts on behalf of the job owner.
    pub async fn configuration_for_job(&self, job: &ReportJob) -> Result<ReportConfiguration, ReportError> {
        self.configuration(&job.owner, job.config_id).await
    }

    pub async fn insert_job(&self, job: ReportJob) {
        self.tables.write().await.jobs.insert(job.id, job);
    }

    pub async fn remove_job(&self, id: Uuid) {
        let mut tables = self.tables.write().await;
        tables.jobs.remove(&id);
        tables.artifacts.remove(&id);
    }

    pub async fn job(&self, owner: &str, id: Uuid) -> Result<ReportJob, ReportError> {
        self.tables
            .read()
            .await
            .jobs
            .get(&id)
            .filter(|j| j.owner == owner)
            .cloned()
            .ok_or_else(|| ReportError::job_not_found(id))
    }

    /// Newest first.
    pub async fn list_jobs(&self, owner: &str) -> Vec<ReportJob> {
        let tables = self.tables.read().await;
        let mut out: Vec<_> = tables.jobs.values().filter(|j| j.owner == owner).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Apply `f` to the stored job and return the updated copy. The change is
    /// discarded if `f` fails.
    pub async fn update_job<F>(&self, id: Uuid, f: F) -> Result<ReportJob, ReportError>
    where
        F: FnOnce(&mut ReportJob) -> Result<(), ReportError>,
    {
        let mut tables = self.tables.write().await;
        let stored = tables.jobs.get_mut(&id).ok_or_else(|| ReportError::job_not_found(id))?;

        let mut next = stored.clone();
        f(&mut next)?;
        *stored = next.clone();
        Ok(next)
    }

    /// Store the artifact and mark the job completed in one step.
    pub async fn complete_job(
        &self,
        artifact: ReportArtifact,
        now: OffsetDateTime,
    ) -> Result<ReportJob, ReportError> {
        let mut tables = self.tables.write().await;
        let job_id = artifact.job_id;
        let stored = tables
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| ReportError::job_not_found(job_id))?;

        let mut next = stored.clone();
        next.transition_to(JobStatus::Completed, now)?;
        next.file_name = Some(artifact.file_name.clone());
        *stored = next.clone();

        tables.artifacts.insert(job_id, artifact);
        Ok(next)
    }

    /// The artifact of a completed job owned by `owner`.
    pub async fn artifact(&self, owner: &str, job_id: Uuid) -> Result<ReportArtifact, ReportError> {
        let tables = self.tables.read().await;
        let job = tables
            .jobs
            .get(&job_id)
            .filter(|j| j.owner == owner)
            .ok_or_else(|| ReportError::job_not_found(job_id))?;

        if job.status != JobStatus::Completed {
            return Err(ReportError::NotReady {
                job_id,
                status: job.status,
            });
        }

        tables
            .artifacts
            .get(&job_id)
            .cloned()
            .ok_or_else(|| ReportError::job_not_found(job_id))
    }

    /// Delete jobs created before `cutoff`, with their artifacts. Returns the
    /// number of jobs removed.
    pub async fn purge_older_than(&self, cutoff: OffsetDateTime) -> usize {
        let mut tables = self.tables.write().await;
        let stale: Vec<Uuid> = tables
            .jobs
            .values()
            .filter(|j| j.created_at < cutoff)
            .map(|j| j.id)
            .collect();

        for id in &stale {
            tables.jobs.remove(id);
            tables.artifacts.remove(id);
        }
        stale.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::{DateRangePreset, NewReportConfiguration, ReportFormat, ReportType};
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2024-03-15 09:30:05 UTC);

    fn config(owner: &str) -> ReportConfiguration {
        ReportConfiguration::new(
            owner,
            NewReportConfiguration {
                name: "Daily".to_string(),
                description: String::new(),
                report_type: ReportType::Kpi,
                format: ReportFormat::Csv,
                include_charts: true,
                date_range: DateRangePreset::Today,
            },
            T0,
        )
    }

    fn rendered() -> RenderedReport {
        RenderedReport {
            format: ReportFormat::Csv,
            bytes: b"KPI,Value,Unit\n".to_vec(),
        }
    }

    #[test]
    fn artifact_names_follow_the_report_pattern() {
        let id = Uuid::nil();
        assert_eq!(
            artifact_file_name(id, "pdf", T0),
            "report_00000000-0000-0000-0000-000000000000_20240315_093005.pdf"
        );
    }

    #[tokio::test]
    async fn configurations_are_owner_scoped() {
        let repo = ReportRepository::new();
        let cfg = config("alice");
        let id = cfg.id;
        repo.insert_configuration(cfg).await;

        assert!(repo.configuration("alice", id).await.is_ok());
        assert_eq!(
            repo.configuration("bob", id).await.unwrap_err(),
            ReportError::configuration_not_found(id)
        );
        assert!(repo.list_configurations("bob").await.is_empty());
        assert!(repo.delete_configuration("bob", id).await.is_err());
        assert_eq!(repo.list_configurations("alice").await.len(), 1);
    }

    #[tokio::test]
    async fn download_requires_a_completed_job() {
        let repo = ReportRepository::new();
        let cfg = config("alice");
        let job = ReportJob::new(cfg.id, "alice", T0);
        let job_id = job.id;
        repo.insert_job(job).await;

        assert!(matches!(
            repo.artifact("alice", job_id).await,
            Err(ReportError::NotReady { status: JobStatus::Pending, .. })
        ));

        repo.update_job(job_id, |j| j.transition_to(JobStatus::Processing, T0))
            .await
            .unwrap();
        let done = repo
            .complete_job(ReportArtifact::new(job_id, cfg.id, rendered(), T0), T0)
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.file_name.as_deref().unwrap().ends_with(".csv"));

        let artifact = repo.artifact("alice", job_id).await.unwrap();
        assert_eq!(artifact.content_type, "text/csv");
        assert_eq!(artifact.checksum, blake3::hash(b"KPI,Value,Unit\n").to_hex().to_string());
        assert!(repo.artifact("bob", job_id).await.is_err());
    }

    #[tokio::test]
    async fn failed_update_leaves_the_job_untouched() {
        let repo = ReportRepository::new();
        let job = ReportJob::new(Uuid::new_v4(), "alice", T0);
        let id = job.id;
        repo.insert_job(job).await;

        let res = repo.update_job(id, |j| j.transition_to(JobStatus::Completed, T0)).await;
        assert!(matches!(res, Err(ReportError::InvalidTransition { .. })));
        assert_eq!(repo.job("alice", id).await.unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn purge_removes_old_jobs_and_cascade_delete_removes_children() {
        let repo = ReportRepository::new();
        let cfg = config("alice");
        let cfg_id = cfg.id;
        repo.insert_configuration(cfg).await;

        repo.insert_job(ReportJob::new(cfg_id, "alice", datetime!(2024-01-01 00:00:00 UTC))).await;
        repo.insert_job(ReportJob::new(cfg_id, "alice", T0)).await;

        assert_eq!(repo.purge_older_than(datetime!(2024-02-01 00:00:00 UTC)).await, 1);
        assert_eq!(repo.list_jobs("alice").await.len(), 1);

        repo.delete_configuration("alice", cfg_id).await.unwrap();
        assert!(repo.list_jobs("alice").await.is_empty());
    }
}
