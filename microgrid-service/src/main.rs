use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use microgrid_service::{
    api::{self, AppState},
    config::AppConfig,
    ingest, metrics_server, observability,
    reports::{worker::spawn_cleanup, ReportRepository, ReportService, ReportWorker, WorkerSettings},
    store,
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let store = store::from_config(cfg.questdb.as_ref()).await?;

    // Optional CSV files to load before serving, mainly for the in-memory store.
    for path in std::env::args().skip(1).map(PathBuf::from) {
        let summary = ingest::import_csv_file(&path, store.clone(), &cfg.ingestion).await?;
        tracing::info!(
            path = %path.display(),
            imported = summary.imported,
            skipped = summary.skipped,
            "seed file imported"
        );
    }

    let repo = Arc::new(ReportRepository::new());
    let (worker, queue) = ReportWorker::new(
        repo.clone(),
        store.clone(),
        WorkerSettings::from(&cfg.reports),
        cfg.reports.queue_capacity,
    );
    worker.spawn();
    spawn_cleanup(
        repo.clone(),
        time::Duration::days(cfg.reports.retention_days),
        Duration::from_secs(cfg.reports.cleanup_interval_secs),
    );

    let state = AppState {
        store,
        reports: ReportService::new(repo, queue),
    };

    api::serve(&cfg.api.bind_addr, state).await
}
