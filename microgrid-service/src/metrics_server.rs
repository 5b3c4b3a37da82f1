use std::net::SocketAddr;

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROM_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder and serve `/metrics` on `bind_addr`.
pub fn init(bind_addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics bind address '{bind_addr}': {e}"))?;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus metrics recorder: {e}"))?;

    // Only the first installation wins; later calls keep the existing handle.
    let _ = PROM_HANDLE.set(handle);
    describe_metrics();

    tokio::spawn(async move {
        let app = Router::new().route("/metrics", get(metrics_handler));

        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                tracing::info!(%addr, "metrics listener started");
                if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                    tracing::error!(error = %e, "metrics server error");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to bind metrics listener");
            }
        }
    });

    Ok(())
}

fn describe_metrics() {
    describe_counter!("kpi_computations_total", "KPI windows computed, labelled by outcome");
    describe_counter!("kpi_samples_processed_total", Unit::Count, "Samples integrated by the KPI engine");
    describe_counter!("kpi_integrity_errors_total", "KPI computations aborted by malformed samples");
    describe_histogram!("kpi_compute_duration_seconds", Unit::Seconds, "Store query plus KPI integration time");
    describe_counter!("samples_listed_total", Unit::Count, "Samples returned by the paged listing endpoint");
    describe_counter!("report_jobs_enqueued_total", "Report jobs accepted onto the queue");
    describe_counter!("report_jobs_completed_total", "Report jobs that produced an artifact");
    describe_counter!("report_jobs_retried_total", "Report job attempts scheduled for retry");
    describe_counter!("report_jobs_failed_total", "Report jobs that ended in the failed state");
    describe_counter!("report_jobs_purged_total", "Report jobs removed by retention cleanup");
    describe_counter!("report_render_bytes_total", Unit::Bytes, "Bytes of rendered report artifacts");
    describe_counter!("ingest_samples_written_total", Unit::Count, "Samples written to the sample store");
    describe_counter!("ingest_rows_skipped_total", Unit::Count, "Rows rejected during ingestion");
    describe_counter!("sample_store_errors_total", "Sample store write failures after retries");
    describe_counter!("sample_csv_parse_errors_total", Unit::Count, "CSV rows that could not be parsed");
    describe_counter!("validation_sample_rejected_total", Unit::Count, "Samples rejected by validation");
    describe_histogram!(
        "ingest_end_to_end_latency_seconds",
        Unit::Seconds,
        "Time from reading a sample to writing it"
    );
}

async fn metrics_handler() -> String {
    PROM_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}
