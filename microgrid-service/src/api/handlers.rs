use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use microgrid_client::{KpiRecord, TimeWindow};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::{macros::format_description, Date};
use uuid::Uuid;

use super::{ApiError, AppState, Owner};
use crate::{
    kpis::compute_window,
    reports::{JobStatus, NewReportConfiguration, ReportConfiguration, ReportJob},
    samples::{self, SamplePage, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT},
};

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct KpiQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn parse_date(param: &str, raw: Option<&str>) -> Result<Option<Date>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map(Some)
        .map_err(|_| ApiError::BadRequest(format!("{param} must be a YYYY-MM-DD date, got '{raw}'")))
}

/// KPIs over an inclusive day range. Either bound may be omitted.
pub async fn kpis(State(state): State<AppState>, Query(q): Query<KpiQuery>) -> Result<Json<KpiRecord>, ApiError> {
    let start = parse_date("start_date", q.start_date.as_deref())?;
    let end = parse_date("end_date", q.end_date.as_deref())?;
    let window = TimeWindow::from_dates(start, end).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    match compute_window(state.store.as_ref(), window).await? {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError::NotFound("No data available for the selected period".to_string())),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SampleQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Raw samples of an inclusive day range, ascending, one page at a time.
pub async fn list_samples(
    State(state): State<AppState>,
    Query(q): Query<SampleQuery>,
) -> Result<Json<SamplePage>, ApiError> {
    let start = parse_date("start_date", q.start_date.as_deref())?;
    let end = parse_date("end_date", q.end_date.as_deref())?;
    let window = TimeWindow::from_dates(start, end).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let limit = q.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {MAX_PAGE_LIMIT}, got {limit}"
        )));
    }

    let page = samples::page(state.store.as_ref(), window, q.offset.unwrap_or(0), limit)
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok(Json(page))
}

pub async fn create_configuration(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(request): Json<NewReportConfiguration>,
) -> Result<(StatusCode, Json<ReportConfiguration>), ApiError> {
    let config = state.reports.create_configuration(&owner, request).await?;
    Ok((StatusCode::CREATED, Json(config)))
}

pub async fn list_configurations(State(state): State<AppState>, Owner(owner): Owner) -> Json<Vec<ReportConfiguration>> {
    Json(state.reports.list_configurations(&owner).await)
}

pub async fn get_configuration(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<ReportConfiguration>, ApiError> {
    Ok(Json(state.reports.configuration(&owner, id).await?))
}

pub async fn update_configuration(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
    Json(request): Json<NewReportConfiguration>,
) -> Result<Json<ReportConfiguration>, ApiError> {
    Ok(Json(state.reports.update_configuration(&owner, id, request).await?))
}

pub async fn delete_configuration(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.reports.delete_configuration(&owner, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub config_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub status: &'static str,
    pub job_id: Uuid,
}

pub async fn generate_report(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(request): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<GenerateResponse>), ApiError> {
    let job = state.reports.enqueue(&owner, request.config_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse {
            status: "accepted",
            job_id: job.id,
        }),
    ))
}

pub async fn list_jobs(State(state): State<AppState>, Owner(owner): Owner) -> Json<Vec<ReportJob>> {
    Json(state.reports.list_jobs(&owner).await)
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    /// Artifact file name once completed, the last error while retrying or
    /// after failure.
    pub result_or_error: Option<String>,
}

impl From<ReportJob> for JobStatusResponse {
    fn from(job: ReportJob) -> Self {
        let result_or_error = match job.status {
            JobStatus::Completed => job.file_name,
            JobStatus::Retrying | JobStatus::Failed => job.error_message,
            JobStatus::Pending | JobStatus::Processing => None,
        };
        Self {
            job_id: job.id,
            status: job.status,
            result_or_error,
        }
    }
}

pub async fn job_status(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    Ok(Json(state.reports.job(&owner, id).await?.into()))
}

pub async fn download_report(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let artifact = state.reports.download(&owner, id).await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", artifact.file_name))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let etag = HeaderValue::from_str(&format!("\"{}\"", artifact.checksum))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(artifact.content_type)),
            (header::CONTENT_DISPOSITION, disposition),
            (header::ETAG, etag),
        ],
        artifact.bytes,
    )
        .into_response())
}
