use anyhow::Result;
use microgrid_client::TimeWindow;
use microgrid_service::{config::AppConfig, kpis::compute_window, observability, store};
use time::{macros::format_description, Date};

fn parse_arg(raw: Option<String>) -> Result<Option<Date>> {
    raw.filter(|s| s != "-")
        .map(|s| {
            Date::parse(&s, format_description!("[year]-[month]-[day]"))
                .map_err(|e| anyhow::anyhow!("invalid date '{s}' (expected YYYY-MM-DD): {e}"))
        })
        .transpose()
}

/// `kpi_summary [start_date|-] [end_date|-]`
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let mut args = std::env::args().skip(1);
    let start = parse_arg(args.next())?;
    let end = parse_arg(args.next())?;
    let window = TimeWindow::from_dates(start, end)?;

    let cfg = AppConfig::load()?;
    let store = store::from_config(cfg.questdb.as_ref()).await?;

    match compute_window(store.as_ref(), window).await? {
        Some(record) => println!("{record}"),
        None => println!("No data available for the selected period"),
    }

    Ok(())
}
