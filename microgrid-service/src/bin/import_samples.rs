use std::path::PathBuf;

use anyhow::Result;
use microgrid_service::{config::AppConfig, ingest, observability, store};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        anyhow::bail!("usage: import_samples <csv_path>...");
    }

    let cfg = AppConfig::load()?;
    let Some(questdb) = cfg.questdb.as_ref() else {
        anyhow::bail!("import_samples needs a [questdb] section; an in-memory store would be lost on exit");
    };
    let store = store::from_config(Some(questdb)).await?;

    let mut imported = 0;
    let mut skipped = 0;
    for path in &paths {
        let summary = ingest::import_csv_file(path, store.clone(), &cfg.ingestion).await?;
        println!(
            "{}: imported {}, skipped {}",
            path.display(),
            summary.imported,
            summary.skipped
        );
        imported += summary.imported;
        skipped += summary.skipped;
    }

    tracing::info!(files = paths.len(), imported, skipped, "import finished");
    Ok(())
}
