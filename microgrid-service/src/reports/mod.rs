//! Report configurations, background report jobs and their artifacts.

pub mod config;
pub mod job;
pub mod render;
pub mod repository;
pub mod service;
pub mod worker;

use uuid::Uuid;

use crate::kpis::ComputeError;

pub use config::{DateRangePreset, NewReportConfiguration, ReportConfiguration, ReportFormat, ReportType};
pub use job::{JobStatus, ReportJob};
pub use render::{RenderError, RenderedReport, ReportMetadata};
pub use repository::{ReportArtifact, ReportRepository};
pub use service::ReportService;
pub use worker::{ReportWorker, WorkerSettings};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ReportError {
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: Uuid },
    #[error("report job {job_id} is {status}, not completed")]
    NotReady { job_id: Uuid, status: JobStatus },
    #[error("invalid job transition {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
    #[error("invalid report configuration: {0}")]
    InvalidConfiguration(String),
    #[error("report queue is unavailable")]
    QueueClosed,
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Compute(#[from] ComputeError),
}

impl ReportError {
    pub fn configuration_not_found(id: Uuid) -> Self {
        ReportError::NotFound { what: "report configuration", id }
    }

    pub fn job_not_found(id: Uuid) -> Self {
        ReportError::NotFound { what: "report job", id }
    }

    /// Whether another attempt of the same job could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReportError::Compute(e) => e.is_retryable(),
            ReportError::Render(e) => e.is_retryable(),
            _ => false,
        }
    }
}
