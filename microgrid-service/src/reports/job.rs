use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::ReportError;

/// Lifecycle of a report job.
///
/// ```text
/// Pending -> Processing -> Completed
///               |  ^
///               v  |
///            Retrying -> Failed
/// Processing -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Retrying,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Retrying => "retrying",
            JobStatus::Failed => "failed",
        }
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;

        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Retrying)
                | (Processing, Failed)
                | (Retrying, Processing)
                | (Retrying, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportJob {
    pub id: Uuid,
    pub config_id: Uuid,
    pub owner: String,
    pub status: JobStatus,
    /// Processing attempts started so far.
    pub attempts: u32,
    pub error_message: Option<String>,
    /// Artifact file name once the job has completed.
    pub file_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

impl ReportJob {
    pub fn new(config_id: Uuid, owner: impl Into<String>, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            config_id,
            owner: owner.into(),
            status: JobStatus::Pending,
            attempts: 0,
            error_message: None,
            file_name: None,
            created_at: now,
            completed_at: None,
        }
    }

    /// Move to `next`, stamping the bookkeeping fields that go with it.
    pub fn transition_to(&mut self, next: JobStatus, now: OffsetDateTime) -> Result<(), ReportError> {
        if !self.status.can_transition_to(next) {
            return Err(ReportError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        match next {
            JobStatus::Processing => self.attempts += 1,
            JobStatus::Completed => {
                self.error_message = None;
                self.completed_at = Some(now);
            }
            JobStatus::Failed => self.completed_at = Some(now),
            JobStatus::Pending | JobStatus::Retrying => {}
        }

        self.status = next;
        Ok(())
    }
}
