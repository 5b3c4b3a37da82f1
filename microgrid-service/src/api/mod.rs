//! HTTP surface: direct KPI and sample queries plus report configuration and
//! job management.
//!
//! Requests are attributed to the owner named in the `x-owner-id` header,
//! which a trusted upstream sets after authenticating the caller.

pub mod error;
pub mod handlers;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post},
    Router,
};

use crate::{reports::ReportService, store::SampleStore};
pub use error::ApiError;

pub const OWNER_HEADER: &str = "x-owner-id";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SampleStore>,
    pub reports: ReportService,
}

/// Caller identity taken from [`OWNER_HEADER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Owner(s.to_string()))
            .ok_or(ApiError::MissingOwner)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/kpis", get(handlers::kpis))
        .route("/samples", get(handlers::list_samples))
        .route(
            "/reports/configurations",
            get(handlers::list_configurations).post(handlers::create_configuration),
        )
        .route(
            "/reports/configurations/:id",
            get(handlers::get_configuration)
                .put(handlers::update_configuration)
                .delete(handlers::delete_configuration),
        )
        .route("/reports/generate", post(handlers::generate_report))
        .route("/reports/jobs", get(handlers::list_jobs))
        .route("/reports/jobs/:id", get(handlers::job_status))
        .route("/reports/jobs/:id/download", get(handlers::download_report))
        .with_state(state)
}

/// Bind `bind_addr` and serve the API until the listener fails.
pub async fn serve(bind_addr: &str, state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid api bind address '{bind_addr}': {e}"))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API listener started");
    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}
